//! # RTP Recorder
//!
//! Unattended capture of live RTP/RTCP media streams to replayable binary
//! trace files in the rtpplay format.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        StreamRegistry (registry)                     │
//! │   bounded slot table · create / close / status / close_all           │
//! │  ┌────────────────────────────────────────────────────────────────┐  │
//! │  │ Stream worker task (stream::worker), one per active stream     │  │
//! │  │                                                                │  │
//! │  │   audio RTP ──┐                                                │  │
//! │  │   audio RTCP ─┤  select! over socket readiness                 │  │
//! │  │   video RTP ──┤  + window deadline + shutdown                  │  │
//! │  │   video RTCP ─┘          │                                     │  │
//! │  │   (network::session)     ▼                                     │  │
//! │  │                  PacketFramer (stream::framer)                 │  │
//! │  │                  anchor · offsets · truncation · filter        │  │
//! │  │                          │                                     │  │
//! │  │                          ▼                                     │  │
//! │  │           TraceWriter ×2 (trace::writer)                       │  │
//! │  │           <path>.video.rtp   <path>.audio.rtp                  │  │
//! │  │                                                                │  │
//! │  │   every period: throughput → StreamStatus (stream::status)     │  │
//! │  └────────────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Status snapshots are the only data shared between a worker and outside
//! readers, guarded by a per-stream lock; the slot table has its own lock.

pub mod config;
pub mod error;
pub mod network;
pub mod registry;
pub mod stream;
pub mod trace;

pub use error::{Error, Result};
pub use registry::StreamRegistry;
pub use stream::status::{StreamState, StreamStatus};

/// Application-wide constants
pub mod constants {
    /// Maximum number of concurrently captured streams
    pub const MAX_STREAMS: usize = 100;

    /// Throughput measurement window in seconds
    pub const CAPTURE_PERIOD_SECS: u64 = 5;

    /// Seconds the capture anchor is back-dated from the first data packet
    pub const ANCHOR_BACKDATE_SECS: u64 = 3;

    /// Grace period in seconds before a stopping worker is aborted
    pub const STOP_GRACE_SECS: u64 = 2;

    /// Receive buffer size; larger datagrams are cut off by the read
    pub const MAX_DATAGRAM_SIZE: usize = 8000;

    /// Maximum payload bytes kept past the packet header in a trace record
    pub const PAYLOAD_TRUNCATION_LIMIT: usize = 1_000_000;

    /// RTP protocol version accepted by the data-packet filter
    pub const RTP_VERSION: u8 = 2;

    /// Version string written in the trace file signature line
    pub const TRACE_FORMAT_VERSION: &str = "2.0";
}
