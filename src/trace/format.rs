//! Binary trace format types
//!
//! A trace file starts with a text signature line naming the replay tool,
//! format version and receive address:
//!
//! ```text
//! #!rtpplay2.0 239.1.1.1/5004\n
//! ```
//!
//! followed by one binary file header and then one record per captured
//! datagram. All multi-byte fields are network byte order. Each record is a
//! one-byte media-kind tag, an 8-byte record header, and the (possibly
//! truncated) datagram bytes.

use bytes::{BufMut, Bytes, BytesMut};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::TRACE_FORMAT_VERSION;

/// Media kind of a captured session, also the record tag on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Record tag byte written before each record header
    pub fn tag(self) -> u8 {
        match self {
            MediaKind::Audio => b'A',
            MediaKind::Video => b'V',
        }
    }

    /// Label used in derived trace file names
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Derive the per-kind trace file path from the stream's output base path.
pub fn trace_path(base: &Path, kind: MediaKind) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{}.rtp", kind.label()));
    PathBuf::from(name)
}

/// Fixed binary header written once per file, after the signature line.
#[derive(Debug, Clone, Copy)]
pub struct FileHeader {
    /// Recording start, seconds since the Unix epoch
    pub start_sec: u32,
    /// Microsecond remainder of the recording start
    pub start_usec: u32,
    /// Receive address (multicast group or unicast host)
    pub source: Ipv4Addr,
    /// RTP port of this file's media session
    pub port: u16,
}

impl FileHeader {
    /// Encoded size on disk
    pub const LEN: usize = 14;

    /// Header stamped with the current wall clock.
    pub fn now(source: Ipv4Addr, port: u16) -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            start_sec: since_epoch.as_secs() as u32,
            start_usec: since_epoch.subsec_micros(),
            source,
            port,
        }
    }

    /// Signature line preceding the binary header
    pub fn signature_line(&self) -> String {
        format!(
            "#!rtpplay{} {}/{}\n",
            TRACE_FORMAT_VERSION, self.source, self.port
        )
    }

    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[0..4].copy_from_slice(&self.start_sec.to_be_bytes());
        buf[4..8].copy_from_slice(&self.start_usec.to_be_bytes());
        buf[8..12].copy_from_slice(&self.source.octets());
        buf[12..14].copy_from_slice(&self.port.to_be_bytes());
        buf
    }
}

/// One framed capture unit, ready for appending to a trace file.
#[derive(Debug, Clone)]
pub struct TraceRecord {
    pub kind: MediaKind,
    /// Total framed length: record header plus the kept payload bytes
    pub length: u16,
    /// Original datagram length for data packets, 0 for control packets
    pub payload_len: u16,
    /// Milliseconds since the stream's capture anchor
    pub offset_ms: u32,
    /// Datagram bytes as kept on disk, possibly truncated
    pub payload: Bytes,
}

impl TraceRecord {
    /// Encoded record header size, excluding the kind tag byte
    pub const HEADER_LEN: usize = 8;

    /// Encode the 8-byte record header.
    pub fn encode_header(&self) -> [u8; Self::HEADER_LEN] {
        let mut buf = BytesMut::with_capacity(Self::HEADER_LEN);
        buf.put_u16(self.length);
        buf.put_u16(self.payload_len);
        buf.put_u32(self.offset_ms);
        let mut out = [0u8; Self::HEADER_LEN];
        out.copy_from_slice(&buf);
        out
    }
}
