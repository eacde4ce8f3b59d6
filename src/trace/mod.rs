//! On-disk trace format and file output

pub mod format;
pub mod writer;

pub use format::{FileHeader, MediaKind, TraceRecord};
pub use writer::TraceWriter;
