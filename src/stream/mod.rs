//! Per-stream capture: status snapshot, packet framing, worker loop

pub mod framer;
pub mod status;
pub mod worker;

pub use framer::PacketFramer;
pub use status::{SharedStatus, StreamState, StreamStatus};
