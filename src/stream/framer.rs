//! Datagram framing against the stream's capture anchor
//!
//! The framer turns raw datagrams into trace records. It owns the stream's
//! anchor timestamp: unset until the first data (non-control) datagram
//! arrives, then fixed for the stream's lifetime. The anchor is back-dated by
//! a few seconds so the earliest packets land at a positive offset instead of
//! being clipped to zero. Until the anchor exists, nothing is recorded.

use bytes::Bytes;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::constants::{PAYLOAD_TRUNCATION_LIMIT, RTP_VERSION};
use crate::trace::format::{MediaKind, TraceRecord};

/// Per-stream framer, shared by all four sockets of the stream.
pub struct PacketFramer {
    anchor: Option<SystemTime>,
    backdate: Duration,
}

impl PacketFramer {
    pub fn new(backdate: Duration) -> Self {
        Self {
            anchor: None,
            backdate,
        }
    }

    /// The anchor, once the first data datagram has established it
    pub fn anchor(&self) -> Option<SystemTime> {
        self.anchor
    }

    /// Frame one datagram received at `now`.
    ///
    /// Returns `None` when nothing should be written: the anchor is still
    /// unset, or a data datagram carries an unsupported version. Drops are
    /// silent; they are not errors.
    pub fn frame(
        &mut self,
        now: SystemTime,
        kind: MediaKind,
        is_control: bool,
        datagram: &[u8],
    ) -> Option<TraceRecord> {
        if !is_control && self.anchor.is_none() {
            // Clamped at the epoch, as offsets are unsigned.
            let anchor = now
                .duration_since(UNIX_EPOCH)
                .map(|since| UNIX_EPOCH + since.saturating_sub(self.backdate))
                .unwrap_or(UNIX_EPOCH);
            self.anchor = Some(anchor);
        }
        let anchor = self.anchor?;

        let header_len = if is_control {
            datagram.len()
        } else {
            data_header_len(datagram).unwrap_or(0)
        };

        let offset_ms = now
            .duration_since(anchor)
            .map(|since| since.as_millis() as u32)
            .unwrap_or(0);

        let mut keep = datagram.len();
        if !is_control && keep.saturating_sub(header_len) > PAYLOAD_TRUNCATION_LIMIT {
            keep = header_len + PAYLOAD_TRUNCATION_LIMIT;
        }

        if !is_control && datagram_version(datagram) != Some(RTP_VERSION) {
            return None;
        }

        Some(TraceRecord {
            kind,
            length: (keep + TraceRecord::HEADER_LEN) as u16,
            payload_len: if is_control { 0 } else { datagram.len() as u16 },
            offset_ms,
            payload: Bytes::copy_from_slice(&datagram[..keep]),
        })
    }
}

/// Protocol version carried in the first byte of a data datagram
fn datagram_version(datagram: &[u8]) -> Option<u8> {
    datagram.first().map(|first| first >> 6)
}

/// Header length of a data datagram, by version field.
///
/// Version 0 is the legacy audio header (8 bytes plus 4 per source id);
/// the current RTP version is 12 bytes plus 4 per CSRC entry. Other
/// versions have no known header shape.
fn data_header_len(datagram: &[u8]) -> Option<usize> {
    let first = *datagram.first()?;
    match first >> 6 {
        0 => Some(8 + 4 * (first & 0x3f) as usize),
        RTP_VERSION => Some(12 + 4 * (first & 0x0f) as usize),
        _ => None,
    }
}
