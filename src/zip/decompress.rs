//! Entry decompression.
//!
//! Turns the data region of one resolved entry into its uncompressed bytes.
//! Only STORED and DEFLATE are supported; CRC-32 values are never checked,
//! the declared uncompressed size is the only acceptance test.

use std::io::{self, Read};
use std::path::Path;

use flate2::read::ZlibDecoder;
use tracing::{debug, trace};

use crate::io::ReadAt;

use super::error::{Result, ZipError};
use super::structures::{CompressionMethod, ZipEntry};

/// Minimal zlib header (32K window, default compression) put in front of a
/// raw deflate stream so a zlib inflater accepts it.
const ZLIB_HEADER: [u8; 2] = [0x78, 0x9C];

/// Decompress one entry read from `reader`.
///
/// `origin` names the source in [`ZipError::OpenRead`] errors. Partial
/// output is never returned: on any failure the buffer is dropped.
///
/// # Errors
///
/// - [`ZipError::UnsupportedCompression`] for methods other than stored
///   and deflate (nothing is read in that case)
/// - [`ZipError::Corrupt`] when the produced length differs from the
///   entry's uncompressed size, including data cut short by end of file
pub fn decompress_entry<R: ReadAt + ?Sized>(
    reader: &R,
    origin: &Path,
    entry: &ZipEntry,
) -> Result<Vec<u8>> {
    let method = entry.compression_method();
    if !method.is_supported() {
        return Err(ZipError::UnsupportedCompression(method.as_u16()));
    }

    let compressed = read_compressed(reader, origin, entry)?;

    let data = match method {
        CompressionMethod::Stored => {
            trace!("No compression - returning {} bytes as-is", compressed.len());
            compressed
        }
        CompressionMethod::Deflate => inflate(&compressed, entry.uncompressed_size()),
        CompressionMethod::Unknown(code) => return Err(ZipError::UnsupportedCompression(code)),
    };

    let expected = entry.uncompressed_size();
    if data.len() as u64 != expected {
        debug!(
            name = %entry.name(),
            expected,
            actual = data.len(),
            "decompressed size mismatch"
        );
        return Err(ZipError::Corrupt {
            expected,
            actual: data.len() as u64,
        });
    }

    Ok(data)
}

/// Read the raw data region of an entry.
fn read_compressed<R: ReadAt + ?Sized>(
    reader: &R,
    origin: &Path,
    entry: &ZipEntry,
) -> Result<Vec<u8>> {
    let len = entry.compressed_size();
    let available = reader.size().saturating_sub(entry.data_offset());
    if len > available {
        return Err(ZipError::Corrupt {
            expected: len,
            actual: available,
        });
    }

    let mut buf = vec![0u8; len as usize];
    reader
        .read_exact_at(entry.data_offset(), &mut buf)
        .map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => ZipError::Corrupt {
                expected: len,
                actual: 0,
            },
            _ => ZipError::OpenRead {
                path: origin.to_path_buf(),
                source: e,
            },
        })?;
    Ok(buf)
}

/// Inflate a raw deflate stream.
///
/// Output is capped one byte past `expected`, which is enough for the caller
/// to notice an oversized stream without inflating all of it.
fn inflate(raw: &[u8], expected: u64) -> Vec<u8> {
    let framed = ZLIB_HEADER.iter().chain(raw.iter()).copied().collect::<Vec<u8>>();

    let mut out = Vec::with_capacity(expected.min(1 << 24) as usize);
    let decoder = ZlibDecoder::new(framed.as_slice());
    // The stream has no Adler-32 trailer, so the decoder may report an error
    // once the deflate data is exhausted. Whatever was produced is kept and
    // judged by length.
    if let Err(e) = decoder.take(expected.saturating_add(1)).read_to_end(&mut out) {
        trace!(produced = out.len(), "inflate stopped: {e}");
    }
    out
}
