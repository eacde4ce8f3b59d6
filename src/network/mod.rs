//! Network subsystem: UDP socket pairs for media sessions

pub mod session;

pub use session::MediaSession;
