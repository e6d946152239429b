//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Scan the trailing window of the file for the End of Central Directory
//!    (EOCD) signature, which gives the Central Directory offset
//! 2. Walk the Central Directory record by record until the EOCD signature
//! 3. For each record, read the entry's Local File Header (and its data
//!    descriptor, if any) to pin down where the data starts and how large
//!    it really is
//!
//! The three sources of size information can disagree. [`ZipParser`]
//! reconciles them once, while indexing, so the resulting [`ZipEntry`]
//! values carry a single answer.

use std::path::Path;

use tracing::{debug, trace};

use crate::io::ReadAt;

use super::error::{Result, ZipError};
use super::structures::*;

/// Largest trailing window searched for the EOCD signature.
///
/// Bounded by the maximum length of the archive comment.
pub const EOCD_SEARCH_WINDOW: u64 = 65536;

/// Low-level ZIP file parser.
///
/// Generic over the reader type so the same code indexes local files and
/// in-memory archives.
///
/// ## Example
///
/// ```ignore
/// let parser = ZipParser::new(&reader, path);
/// let entries = parser.read_central_directory()?;
/// for entry in entries {
///     println!("{} starts at {}", entry.name(), entry.data_offset());
/// }
/// ```
pub struct ZipParser<'a, R: ReadAt + ?Sized> {
    /// The underlying data source
    reader: &'a R,
    /// Total size of the archive in bytes
    size: u64,
    /// Where the bytes came from, for error reports
    origin: &'a Path,
}

/// One step of the central directory walk.
enum DirectoryRecord {
    Entry {
        header: CentralDirectoryHeader,
        file_name: Vec<u8>,
        /// Offset of the record that follows this one
        next_offset: u64,
    },
    /// The EOCD signature was reached; the walk is over.
    End,
}

/// Position of the EOCD record and the directory offset it carries.
#[derive(Debug, Clone, Copy)]
struct EndRecord {
    offset: u64,
    cd_offset: u64,
}

/// Where an entry's data lives once all three metadata sources agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedData {
    pub compression_method: CompressionMethod,
    pub data_offset: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub next_header_offset: u64,
    pub has_data_descriptor: bool,
}

impl<'a, R: ReadAt + ?Sized> ZipParser<'a, R> {
    /// Create a new parser for the given reader.
    ///
    /// `origin` names the source in [`ZipError::OpenRead`] errors.
    pub fn new(reader: &'a R, origin: &'a Path) -> Self {
        let size = reader.size();
        Self {
            reader,
            size,
            origin,
        }
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8], what: &str) -> Result<()> {
        self.reader
            .read_exact_at(offset, buf)
            .map_err(|e| ZipError::from_index_read(self.origin, what, e))
    }

    /// Find the Central Directory offset through the EOCD record.
    ///
    /// The EOCD cannot sit at a fixed distance from the end of the file
    /// because the archive comment that follows it is variable length, so
    /// the last 64 KiB are scanned forward and the first signature whose
    /// offset field fits inside the window wins.
    ///
    /// # Errors
    ///
    /// Returns [`ZipError::BadArchive`] when no EOCD signature is found.
    pub fn find_central_directory(&self) -> Result<u64> {
        self.locate_end_record().map(|end| end.cd_offset)
    }

    fn locate_end_record(&self) -> Result<EndRecord> {
        let window = EOCD_SEARCH_WINDOW.min(self.size);
        let window_start = self.size - window;

        let mut buf = vec![0u8; window as usize];
        self.read_exact_at(window_start, &mut buf, "archive tail")?;

        let field_end = EOCD_CD_OFFSET_FIELD + 4;
        let found = buf
            .windows(field_end)
            .position(|w| &w[0..4] == EOCD_SIGNATURE)
            .ok_or_else(|| ZipError::bad_archive("end of central directory record not found"))?;

        let field = &buf[found + EOCD_CD_OFFSET_FIELD..found + field_end];
        let end = EndRecord {
            offset: window_start + found as u64,
            cd_offset: u32::from_le_bytes([field[0], field[1], field[2], field[3]]) as u64,
        };

        debug!(
            eocd_offset = end.offset,
            cd_offset = end.cd_offset,
            "found end of central directory"
        );
        Ok(end)
    }

    /// Read every Central Directory record into resolved entries.
    ///
    /// Entries come back in on-disk order. An archive whose Central
    /// Directory is immediately terminated is valid and yields no entries.
    /// Records are read one at a time and may not run past the EOCD record.
    ///
    /// # Errors
    ///
    /// Any structural problem ([`ZipError::BadArchive`]) aborts the whole
    /// walk; no partial list is returned.
    pub fn read_central_directory(&self) -> Result<Vec<ZipEntry>> {
        let end = self.locate_end_record()?;
        if end.cd_offset > end.offset {
            return Err(ZipError::bad_archive(format!(
                "central directory offset {} is past the end record at {}",
                end.cd_offset, end.offset
            )));
        }

        let mut entries = Vec::new();
        let mut offset = end.cd_offset;

        loop {
            match self.next_record(offset, end.offset)? {
                DirectoryRecord::End => break,
                DirectoryRecord::Entry {
                    header,
                    file_name,
                    next_offset,
                } => {
                    trace!(
                        name = %String::from_utf8_lossy(&file_name),
                        method = header.compression_method,
                        flags = header.flags,
                        compressed = header.compressed_size,
                        uncompressed = header.uncompressed_size,
                        lfh_offset = header.lfh_offset,
                        "central directory record"
                    );
                    let resolved = self.resolve_local_header(&header)?;
                    entries.push(ZipEntry {
                        file_name,
                        compression_method: resolved.compression_method,
                        compressed_size: resolved.compressed_size,
                        uncompressed_size: resolved.uncompressed_size,
                        lfh_offset: header.lfh_offset,
                        data_offset: resolved.data_offset,
                        next_header_offset: resolved.next_header_offset,
                        has_data_descriptor: resolved.has_data_descriptor,
                        mode: header.unix_mode(),
                    });
                    offset = next_offset;
                }
            }
        }

        debug!(entries = entries.len(), "indexed central directory");
        Ok(entries)
    }

    /// Decode the record at `offset`, which must not extend past `limit`.
    fn next_record(&self, offset: u64, limit: u64) -> Result<DirectoryRecord> {
        let mut sig = [0u8; 4];
        self.read_exact_at(offset, &mut sig, "central directory")?;

        if &sig == EOCD_SIGNATURE {
            return Ok(DirectoryRecord::End);
        }
        if &sig != CDFH_SIGNATURE {
            return Err(ZipError::bad_archive(format!(
                "unexpected signature {sig:02x?} in central directory at offset {offset}"
            )));
        }

        let fixed_end = offset + CDFH_SIZE as u64;
        if fixed_end > limit {
            return Err(ZipError::bad_archive("truncated central directory record"));
        }
        let mut fixed = [0u8; CDFH_SIZE - 4];
        self.read_exact_at(offset + 4, &mut fixed, "central directory record")?;
        let header = CentralDirectoryHeader::from_bytes(&fixed)?;

        // Extra field and comment are skipped, only the name is kept
        let next_offset = fixed_end + header.variable_length();
        if next_offset > limit {
            return Err(ZipError::bad_archive(format!(
                "central directory record at offset {offset} runs past the end record"
            )));
        }

        // Name length is producer-controlled; size the buffer from it.
        let mut file_name = vec![0u8; header.file_name_length as usize];
        self.read_exact_at(fixed_end, &mut file_name, "central directory file name")?;

        Ok(DirectoryRecord::Entry {
            header,
            file_name,
            next_offset,
        })
    }

    /// Resolve where an entry's data starts and how large it truly is.
    ///
    /// This is the only place where the Central Directory, the Local File
    /// Header and the optional data descriptor are compared:
    ///
    /// - the data offset comes from the local header, whose name and extra
    ///   field lengths may differ from the Central Directory copy;
    /// - the compression method comes from the local header;
    /// - sizes come from the Central Directory, except that a data
    ///   descriptor's uncompressed size overrides it (flag bit 3).
    ///
    /// # Errors
    ///
    /// Returns [`ZipError::BadArchive`] if the local header or descriptor
    /// is truncated or carries the wrong signature.
    pub fn resolve_local_header(&self, record: &CentralDirectoryHeader) -> Result<ResolvedData> {
        let mut lfh_buf = [0u8; LFH_SIZE];
        self.read_exact_at(record.lfh_offset, &mut lfh_buf, "local file header")?;
        let lfh = LocalFileHeader::from_bytes(&lfh_buf)?;

        // Data starts after: LFH (30 bytes) + filename + extra field
        let data_offset = record.lfh_offset + lfh.header_length();
        let compressed_size = record.compressed_size;
        let mut uncompressed_size = record.uncompressed_size;
        let mut next_header_offset = data_offset + compressed_size;

        let has_data_descriptor = lfh.has_data_descriptor();
        if has_data_descriptor {
            let descriptor = self.read_data_descriptor(next_header_offset)?;
            trace!(
                local_compressed = lfh.compressed_size,
                local_uncompressed = lfh.uncompressed_size,
                descriptor_uncompressed = descriptor.uncompressed_size,
                descriptor_length = descriptor.length,
                "entry uses a data descriptor"
            );
            uncompressed_size = descriptor.uncompressed_size;
            next_header_offset += descriptor.length;
        }

        Ok(ResolvedData {
            compression_method: CompressionMethod::from_u16(lfh.compression_method),
            data_offset,
            compressed_size,
            uncompressed_size,
            next_header_offset,
            has_data_descriptor,
        })
    }

    fn read_data_descriptor(&self, offset: u64) -> Result<DataDescriptor> {
        // The unsigned form is only 12 bytes and may sit right at the end
        // of what is left, so read whatever is available up to 16.
        let available = self.size.saturating_sub(offset).min(16) as usize;
        let mut buf = vec![0u8; available];
        self.read_exact_at(offset, &mut buf, "data descriptor")?;
        DataDescriptor::from_bytes(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::testing::ArchiveBuilder;
    use std::cell::Cell;

    fn parse(data: &Vec<u8>) -> Result<Vec<ZipEntry>> {
        ZipParser::new(data, Path::new("<memory>")).read_central_directory()
    }

    #[test]
    fn finds_directory_behind_a_comment() {
        let data = ArchiveBuilder::new()
            .stored("a.txt", b"abc")
            .comment(&[b'x'; 300])
            .build();
        let entries = parse(&data).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name_bytes(), b"a.txt");
    }

    #[test]
    fn empty_archive_has_no_entries() {
        let data = ArchiveBuilder::new().build();
        assert_eq!(data.len(), EOCD_SIZE);
        assert!(parse(&data).unwrap().is_empty());
    }

    #[test]
    fn missing_eocd_is_bad_archive() {
        let mut data = ArchiveBuilder::new().stored("a", b"1").build();
        let len = data.len();
        data[len - EOCD_SIZE] = 0;
        assert!(matches!(parse(&data), Err(ZipError::BadArchive(_))));

        assert!(matches!(parse(&Vec::new()), Err(ZipError::BadArchive(_))));
    }

    #[test]
    fn garbage_in_directory_is_bad_archive() {
        let data = ArchiveBuilder::new()
            .stored("a", b"1")
            .corrupt_directory_signature()
            .build();
        assert!(matches!(parse(&data), Err(ZipError::BadArchive(_))));
    }

    #[test]
    fn data_offset_skips_local_name_and_extra() {
        let data = ArchiveBuilder::new()
            .stored("first", b"12345")
            .stored("second", b"xyz")
            .local_extra(&[0u8; 9])
            .build();
        let entries = parse(&data).unwrap();
        assert_eq!(entries[0].data_offset(), (LFH_SIZE + 5) as u64);
        let second = &entries[1];
        assert_eq!(
            second.data_offset(),
            second.local_header_offset() + (LFH_SIZE + 6 + 9) as u64
        );
        let start = second.data_offset() as usize;
        assert_eq!(&data[start..start + 3], b"xyz");
    }

    #[test]
    fn descriptor_overrides_sizes() {
        let data = ArchiveBuilder::new()
            .stored("streamed", b"hello world")
            .with_descriptor(true)
            .descriptor_size(99)
            .stored("after", b"!")
            .build();
        let entries = parse(&data).unwrap();
        let streamed = &entries[0];
        assert!(streamed.has_data_descriptor());
        assert_eq!(streamed.compressed_size(), 11);
        assert_eq!(streamed.uncompressed_size(), 99);
        assert_eq!(
            streamed.next_header_offset(),
            streamed.data_offset() + 11 + 16
        );
        assert_eq!(streamed.next_header_offset(), entries[1].local_header_offset());
    }

    #[test]
    fn unsigned_descriptor_is_twelve_bytes() {
        let data = ArchiveBuilder::new()
            .stored("streamed", b"hello world")
            .with_descriptor(false)
            .descriptor_size(42)
            .stored("after", b"!")
            .build();
        let entries = parse(&data).unwrap();
        assert_eq!(entries[0].uncompressed_size(), 42);
        assert_eq!(
            entries[0].next_header_offset(),
            entries[0].data_offset() + 11 + 12
        );
        assert_eq!(entries[0].next_header_offset(), entries[1].local_header_offset());
    }

    #[test]
    fn directory_sizes_stand_without_descriptor() {
        let data = ArchiveBuilder::new()
            .stored("plain", b"hello world")
            .declared_size(7)
            .build();
        let entries = parse(&data).unwrap();
        assert!(!entries[0].has_data_descriptor());
        assert_eq!(entries[0].uncompressed_size(), 7);
    }

    #[test]
    fn bad_local_header_aborts_indexing() {
        let data = ArchiveBuilder::new()
            .stored("a", b"1")
            .lfh_offset_override(3)
            .build();
        assert!(matches!(parse(&data), Err(ZipError::BadArchive(_))));
    }

    /// In-memory source that remembers its largest single read.
    struct LargestRead {
        data: Vec<u8>,
        largest: Cell<usize>,
    }

    impl ReadAt for LargestRead {
        fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
            self.largest.set(self.largest.get().max(buf.len()));
            self.data.read_at(offset, buf)
        }

        fn size(&self) -> u64 {
            self.data.len() as u64
        }
    }

    fn set_directory_offset(data: &mut [u8], cd_offset: u32) {
        let field = data.len() - EOCD_SIZE + EOCD_CD_OFFSET_FIELD;
        data[field..field + 4].copy_from_slice(&cd_offset.to_le_bytes());
    }

    #[test]
    fn bogus_directory_offset_does_not_load_the_archive() {
        let payload = vec![0x5a; 4 * EOCD_SEARCH_WINDOW as usize];
        let mut data = ArchiveBuilder::new().stored("big.bin", &payload).build();
        set_directory_offset(&mut data, 0);

        let source = LargestRead {
            data,
            largest: Cell::new(0),
        };
        let result = ZipParser::new(&source, Path::new("<memory>")).read_central_directory();
        assert!(matches!(result, Err(ZipError::BadArchive(_))));
        assert!(source.largest.get() <= EOCD_SEARCH_WINDOW as usize);
    }

    #[test]
    fn directory_offset_past_end_record_is_bad_archive() {
        let mut data = ArchiveBuilder::new().stored("a", b"1").build();
        let past = (data.len() - 4) as u32;
        set_directory_offset(&mut data, past);
        assert!(matches!(parse(&data), Err(ZipError::BadArchive(_))));
    }

    #[test]
    fn record_running_into_end_record_is_bad_archive() {
        let mut data = ArchiveBuilder::new().stored("a", b"1").build();
        // file name length of the only directory record
        let cd_offset = LFH_SIZE + 1 + 1;
        data[cd_offset + 28..cd_offset + 30].copy_from_slice(&0xffffu16.to_le_bytes());
        assert!(matches!(parse(&data), Err(ZipError::BadArchive(_))));
    }
}
