//! # zipread
//!
//! Read-only ZIP archive indexing and extraction.
//!
//! This library locates the central directory of a ZIP archive, builds an
//! index of its entries, and extracts STORED and DEFLATE entries to memory,
//! to files, or to a whole directory tree. The size and offset information
//! that ZIP scatters across the central directory, the local headers and
//! optional data descriptors is reconciled once, while indexing.
//!
//! ## Features
//!
//! - EOCD lookup behind archive comments of any length
//! - Entries written by streaming producers (data descriptors)
//! - Bulk extraction with directory creation, permission restoration, an
//!   explicit stop/continue policy, and optional cancellation
//! - Raw byte entry names, never truncated
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use zipread::ZipArchive;
//!
//! fn main() -> zipread::Result<()> {
//!     let mut archive = ZipArchive::open("archive.zip");
//!     archive.build_index()?;
//!
//!     for entry in archive.entries() {
//!         println!("{} ({} bytes)", entry.name(), entry.uncompressed_size());
//!     }
//!
//!     archive.extract_all(Path::new("out"), false)?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use io::{LocalFileReader, ReadAt};
pub use zip::{
    CompressionMethod, EntryMetadata, ExtractOptions, Result, ZipArchive, ZipEntry, ZipError,
};
