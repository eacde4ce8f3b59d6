//! Buffered trace file output
//!
//! One writer per media kind per stream. The file is created (truncated if it
//! exists) at open; the caller writes the header once before the first record.
//! A failed append is reported but leaves the writer usable, so a single bad
//! write never ends a capture.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use crate::trace::format::{FileHeader, TraceRecord};
use crate::error::TraceError;

/// Append-only writer for one trace file.
pub struct TraceWriter {
    file: Option<BufWriter<File>>,
    path: PathBuf,
}

impl TraceWriter {
    /// Create or truncate the trace file at `path`.
    pub fn create(path: &Path) -> Result<Self, TraceError> {
        if path.as_os_str().is_empty() {
            return Err(TraceError::InvalidPath("empty path".to_string()));
        }
        let file = File::create(path).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "opening trace file failed");
            TraceError::OpenFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        tracing::debug!(path = %path.display(), "trace file opened");
        Ok(Self {
            file: Some(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Write the signature line and binary file header.
    pub fn write_header(&mut self, source: Ipv4Addr, port: u16) -> Result<(), TraceError> {
        let header = FileHeader::now(source, port);
        let file = self.file_mut()?;
        file.write_all(header.signature_line().as_bytes())
            .map_err(write_err)?;
        file.write_all(&header.encode()).map_err(write_err)?;
        Ok(())
    }

    /// Append one framed record: kind tag, record header, payload.
    ///
    /// Returns the number of bytes written.
    pub fn append(&mut self, record: &TraceRecord) -> Result<usize, TraceError> {
        let tag = [record.kind.tag()];
        let header = record.encode_header();
        let file = self.file_mut()?;
        file.write_all(&tag).map_err(write_err)?;
        file.write_all(&header).map_err(write_err)?;
        file.write_all(&record.payload).map_err(write_err)?;
        Ok(tag.len() + header.len() + record.payload.len())
    }

    /// Flush and close the file. Closing an already-closed writer is a no-op.
    pub fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush() {
                tracing::warn!(path = %self.path.display(), error = %e, "trace file flush failed");
            } else {
                tracing::debug!(path = %self.path.display(), "trace file closed");
            }
        }
    }

    /// Path this writer outputs to
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_mut(&mut self) -> Result<&mut BufWriter<File>, TraceError> {
        self.file
            .as_mut()
            .ok_or_else(|| TraceError::WriteFailed("writer is closed".to_string()))
    }
}

impl Drop for TraceWriter {
    fn drop(&mut self) {
        self.close();
    }
}

fn write_err(e: std::io::Error) -> TraceError {
    TraceError::WriteFailed(e.to_string())
}
