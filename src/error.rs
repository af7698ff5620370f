//! Error types for slab reader operations

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for slab reads and writes
#[derive(Error, Debug)]
pub enum SlabError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("{what} index {index} out of range (limit {limit})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        limit: usize,
    },

    #[error("Failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Offset {offset} is past the end of {} ({file_len} bytes)", .path.display())]
    SeekBeyondEnd {
        path: PathBuf,
        offset: u64,
        file_len: u64,
    },

    #[error("Failed to seek {} to offset {offset}: {source}", .path.display())]
    Seek {
        path: PathBuf,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("Short read in {} at offset {offset}: expected {expected} bytes", .path.display())]
    ShortRead {
        path: PathBuf,
        offset: u64,
        expected: usize,
    },

    #[error(
        "Frame marker mismatch in {} at offset {offset}: header {header:#010x}, footer {footer:#010x}",
        .path.display()
    )]
    FrameMarkerMismatch {
        path: PathBuf,
        offset: u64,
        header: u32,
        footer: u32,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl SlabError {
    /// True for errors raised by validation before any I/O is attempted
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SlabError::InvalidGeometry(_) | SlabError::IndexOutOfRange { .. }
        )
    }

    pub(crate) fn out_of_range(what: &'static str, index: usize, limit: usize) -> Self {
        SlabError::IndexOutOfRange { what, index, limit }
    }
}

/// Specialized Result type for slab operations
pub type Result<T> = std::result::Result<T, SlabError>;

impl From<serde_json::Error> for SlabError {
    fn from(err: serde_json::Error) -> Self {
        SlabError::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SlabError {
    fn from(err: tokio::task::JoinError) -> Self {
        SlabError::Runtime(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_class() {
        assert!(SlabError::InvalidGeometry("x".into()).is_configuration());
        assert!(SlabError::out_of_range("timestep", 3, 3).is_configuration());
        assert!(!SlabError::ShortRead {
            path: PathBuf::from("a.bin"),
            offset: 0,
            expected: 4
        }
        .is_configuration());
    }

    #[test]
    fn test_marker_message() {
        let err = SlabError::FrameMarkerMismatch {
            path: PathBuf::from("wrf.bin"),
            offset: 72,
            header: 64,
            footer: 0xdead,
        };
        let msg = err.to_string();
        assert!(msg.contains("wrf.bin"));
        assert!(msg.contains("0x00000040"));
        assert!(msg.contains("0x0000dead"));
    }
}
