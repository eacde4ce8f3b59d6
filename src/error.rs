//! Error types for the capture engine

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Trace output error: {0}")]
    Trace(#[from] TraceError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Media session socket errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("RTP port {0} is odd, must be even")]
    OddRtpPort(u16),

    #[error("Socket setup failed: {0}")]
    SocketSetup(String),

    #[error("Socket bind failed on port {port}: {reason}")]
    BindFailed { port: u16, reason: String },

    #[error("Multicast join of {group} failed: {reason}")]
    MulticastJoinFailed { group: std::net::Ipv4Addr, reason: String },
}

/// Trace file errors
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Invalid output path: {0}")]
    InvalidPath(String),

    #[error("Opening trace file {path} failed: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Write failed: {0}")]
    WriteFailed(String),
}

/// Stream registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("No free stream slot, capacity {0} exhausted")]
    CapacityExhausted(usize),

    #[error("Invalid or unused stream ID: {0}")]
    InvalidStreamId(usize),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
