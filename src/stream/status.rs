//! Shared stream status snapshot
//!
//! The status is the only data shared between a stream's worker and outside
//! readers. The worker is its sole writer; readers get whole-struct copies
//! under the lock, never references into live state.

use parking_lot::Mutex;
use std::sync::Arc;

/// Lifecycle state of one captured stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Setup failed before the capture loop started
    Failed,
    /// Sessions and outputs are being constructed
    Initializing,
    /// Bytes arrived in the last wake cycle
    Recording,
    /// The loop is running but nothing arrived in the last wake cycle
    Waiting,
    /// The capture loop has exited
    Ended,
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StreamState::Failed => "failed",
            StreamState::Initializing => "initializing",
            StreamState::Recording => "recording",
            StreamState::Waiting => "waiting",
            StreamState::Ended => "ended",
        };
        f.write_str(label)
    }
}

/// Point-in-time view of one stream's progress
#[derive(Debug, Clone)]
pub struct StreamStatus {
    pub state: StreamState,
    /// Total bytes received since the stream started
    pub bytes_captured: u64,
    /// Last computed window throughput in kbit/s (1024-based)
    pub throughput_kbps: f64,
}

impl StreamStatus {
    pub fn new() -> Self {
        Self {
            state: StreamState::Initializing,
            bytes_captured: 0,
            throughput_kbps: 0.0,
        }
    }
}

impl Default for StreamStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock-guarded status handle shared between a worker and the registry
pub type SharedStatus = Arc<Mutex<StreamStatus>>;

/// Create a fresh shared status in the `Initializing` state
pub fn shared_status() -> SharedStatus {
    Arc::new(Mutex::new(StreamStatus::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_status_is_initializing() {
        let status = shared_status();
        let snapshot = status.lock().clone();
        assert_eq!(snapshot.state, StreamState::Initializing);
        assert_eq!(snapshot.bytes_captured, 0);
        assert_eq!(snapshot.throughput_kbps, 0.0);
    }
}
