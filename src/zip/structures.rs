use byteorder::{LittleEndian, ReadBytesExt};
use std::borrow::Cow;
use std::io::{self, Cursor};

use super::error::{Result, ZipError};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, CompressionMethod::Unknown(_))
    }
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionMethod::Stored => f.write_str("stored"),
            CompressionMethod::Deflate => f.write_str("deflate"),
            CompressionMethod::Unknown(v) => write!(f, "method {v}"),
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes plus comment
pub const EOCD_SIGNATURE: &[u8; 4] = b"PK\x05\x06";
pub const EOCD_SIZE: usize = 22;
/// Offset of the central directory start field inside the EOCD
pub const EOCD_CD_OFFSET_FIELD: usize = 16;

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8; 4] = b"PK\x01\x02";
pub const CDFH_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8; 4] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Data descriptor - 12 bytes, or 16 with its optional signature
pub const DATA_DESCRIPTOR_SIGNATURE: &[u8; 4] = b"PK\x07\x08";
pub const DATA_DESCRIPTOR_SIZE: usize = 12;

/// General purpose flag: sizes follow the compressed data
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// Fixed part of a central directory record, signature excluded.
#[derive(Debug, Clone)]
pub struct CentralDirectoryHeader {
    pub flags: u16,
    pub compression_method: u16,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    pub file_comment_length: u16,
    pub external_attrs: u32,
    pub lfh_offset: u64,
}

impl CentralDirectoryHeader {
    /// Parse the 42 bytes that follow the record signature.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::decode(data).map_err(truncated("central directory record"))
    }

    fn decode(data: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(data);
        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let _crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let external_attrs = cursor.read_u32::<LittleEndian>()?;
        let lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        Ok(Self {
            flags,
            compression_method,
            compressed_size,
            uncompressed_size,
            file_name_length,
            extra_field_length,
            file_comment_length,
            external_attrs,
            lfh_offset,
        })
    }

    /// Length of the name, extra field and comment that follow the fixed record.
    pub fn variable_length(&self) -> u64 {
        self.file_name_length as u64
            + self.extra_field_length as u64
            + self.file_comment_length as u64
    }

    /// Unix permission bits kept in the high half of the external attributes.
    pub fn unix_mode(&self) -> u32 {
        (self.external_attrs >> 16) & 0o777
    }
}

/// Local File Header fields
#[derive(Debug, Clone)]
pub struct LocalFileHeader {
    pub flags: u16,
    pub compression_method: u16,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < LFH_SIZE {
            return Err(ZipError::bad_archive("truncated local file header"));
        }
        if &data[0..4] != LFH_SIGNATURE {
            return Err(ZipError::bad_archive("invalid local file header signature"));
        }

        Self::decode(&data[4..]).map_err(truncated("local file header"))
    }

    fn decode(body: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(body);
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let _crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;

        Ok(Self {
            flags,
            compression_method,
            compressed_size,
            uncompressed_size,
            file_name_length,
            extra_field_length,
        })
    }

    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Bytes from the start of this header to the first byte of entry data.
    pub fn header_length(&self) -> u64 {
        LFH_SIZE as u64 + self.file_name_length as u64 + self.extra_field_length as u64
    }
}

/// Trailer written after the compressed data by streaming producers
#[derive(Debug, Clone, Copy)]
pub struct DataDescriptor {
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// On-disk length, 12 or 16 depending on the optional signature
    pub length: u64,
}

impl DataDescriptor {
    /// Parse a descriptor from up to 16 bytes read at the end of entry data.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let signed = data.len() >= 4 && &data[0..4] == DATA_DESCRIPTOR_SIGNATURE;
        let body = if signed { &data[4..] } else { data };
        if body.len() < DATA_DESCRIPTOR_SIZE {
            return Err(ZipError::bad_archive("truncated data descriptor"));
        }

        let (compressed_size, uncompressed_size) =
            Self::decode_sizes(body).map_err(truncated("data descriptor"))?;

        Ok(Self {
            compressed_size,
            uncompressed_size,
            length: if signed { 16 } else { 12 },
        })
    }

    fn decode_sizes(body: &[u8]) -> io::Result<(u64, u64)> {
        let mut cursor = Cursor::new(body);
        let _crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        Ok((compressed_size, uncompressed_size))
    }
}

/// Error mapper for fixed-size fields decoded from an in-memory record.
fn truncated(what: &'static str) -> impl FnOnce(io::Error) -> ZipError {
    move |_| ZipError::bad_archive(format!("truncated {what}"))
}

/// Parsed ZIP file entry information
///
/// Built once while indexing; sizes and offsets are already reconciled
/// across the central directory, the local header and any data descriptor.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    pub(crate) file_name: Vec<u8>,
    pub(crate) compression_method: CompressionMethod,
    pub(crate) compressed_size: u64,
    pub(crate) uncompressed_size: u64,
    pub(crate) lfh_offset: u64,
    pub(crate) data_offset: u64,
    pub(crate) next_header_offset: u64,
    pub(crate) has_data_descriptor: bool,
    pub(crate) mode: u32,
}

impl ZipEntry {
    /// Raw name bytes as stored in the central directory
    pub fn name_bytes(&self) -> &[u8] {
        &self.file_name
    }

    /// Name decoded lossily as UTF-8, for display
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.file_name)
    }

    /// Directory entries end with '/'
    pub fn is_dir(&self) -> bool {
        self.file_name.last() == Some(&b'/')
    }

    pub fn compression_method(&self) -> CompressionMethod {
        self.compression_method
    }

    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    pub fn local_header_offset(&self) -> u64 {
        self.lfh_offset
    }

    /// Absolute offset of the first byte of entry data
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Offset just past this entry's data and descriptor
    pub fn next_header_offset(&self) -> u64 {
        self.next_header_offset
    }

    pub fn has_data_descriptor(&self) -> bool {
        self.has_data_descriptor
    }

    /// Unix permission bits, zero when the archive did not record any
    pub fn unix_mode(&self) -> u32 {
        self.mode
    }
}

/// Name and size of one entry, as exposed to listing callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMetadata<'a> {
    pub name: &'a [u8],
    pub uncompressed_size: u64,
}
