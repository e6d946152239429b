//! Error types for ZIP indexing and extraction

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for ZIP operations
pub type Result<T> = std::result::Result<T, ZipError>;

/// ZIP error types
#[derive(Error, Debug)]
pub enum ZipError {
    /// The archive could not be opened or read
    #[error("cannot read archive {}: {source}", path.display())]
    OpenRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An extraction destination could not be created or written
    #[error("cannot write {}: {source}", path.display())]
    OpenWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Structural signature mismatch or truncated record
    #[error("not a valid ZIP archive: {0}")]
    BadArchive(String),

    /// Compression method other than stored or deflate
    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    /// Decompressed size disagrees with the declared size
    #[error("corrupt entry data: expected {expected} bytes, got {actual}")]
    Corrupt { expected: u64, actual: u64 },

    /// Caller misuse, such as an out-of-range entry index
    #[error("internal error: {0}")]
    Internal(String),
}

impl ZipError {
    pub(crate) fn bad_archive(reason: impl Into<String>) -> Self {
        ZipError::BadArchive(reason.into())
    }

    /// Map a low-level read failure during indexing.
    ///
    /// Running out of bytes means a truncated record; anything else is a
    /// failure to read the archive at all.
    pub(crate) fn from_index_read(path: &std::path::Path, what: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            ZipError::BadArchive(format!("truncated {what}"))
        } else {
            ZipError::OpenRead {
                path: path.to_path_buf(),
                source: err,
            }
        }
    }
}
