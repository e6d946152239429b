//! ZIP archive indexing and extraction.
//!
//! This module reads ZIP archives without any external tool: it locates the
//! central directory, indexes every entry, and extracts entry data to
//! memory, to files, or to a whole directory tree.
//!
//! ## Architecture
//!
//! - [`structures`]: on-disk records (signatures, headers, data descriptor)
//!   and the resolved [`ZipEntry`]
//! - [`parser`]: EOCD scan, central directory walk, and local header
//!   resolution
//! - [`decompress`]: turns one entry's data region into its bytes
//! - [`extractor`]: the [`ZipArchive`] handle callers work with
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file, each optionally
//!    followed by a data descriptor
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end, followed by an
//!    optional comment
//!
//! ## Limitations
//!
//! - STORED and DEFLATE only
//! - No encryption, multi-disk or ZIP64 support
//! - CRC-32 values are not verified; an entry is accepted when it inflates
//!   to exactly its recorded size

pub mod decompress;
mod error;
mod extractor;
pub mod parser;
pub mod structures;
#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, ZipError};
pub use extractor::{EntryHook, ExtractOptions, ZipArchive};
pub use parser::ZipParser;
pub use structures::{CompressionMethod, EntryMetadata, ZipEntry};
