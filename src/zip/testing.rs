//! Byte-level archive builder for tests.
//!
//! Produces small archives with exactly the quirks a test needs: data
//! descriptors, local extra fields that differ from the central directory,
//! bogus method codes, or broken signatures.

use std::io::Write;

use flate2::Compression;
use flate2::write::DeflateEncoder;

use super::structures::*;

struct EntryPlan {
    name: Vec<u8>,
    payload: Vec<u8>,
    method: u16,
    /// Payload is written as-is even for method 8
    raw: bool,
    declared_size: Option<u64>,
    descriptor: Option<bool>,
    /// Uncompressed size written into the descriptor, when it should differ
    descriptor_size: Option<u64>,
    local_extra: Vec<u8>,
    mode: u32,
    lfh_offset_override: Option<u32>,
}

#[derive(Default)]
pub struct ArchiveBuilder {
    entries: Vec<EntryPlan>,
    comment: Vec<u8>,
    corrupt_directory: bool,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: &str, data: &[u8], method: u16) -> Self {
        self.entries.push(EntryPlan {
            name: name.as_bytes().to_vec(),
            payload: data.to_vec(),
            method,
            raw: false,
            declared_size: None,
            descriptor: None,
            descriptor_size: None,
            local_extra: Vec::new(),
            mode: 0,
            lfh_offset_override: None,
        });
        self
    }

    fn last(&mut self) -> &mut EntryPlan {
        self.entries.last_mut().expect("no entry to modify")
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.push(name, data, 0)
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        self.push(name, data, 8)
    }

    pub fn directory(self, name: &str) -> Self {
        self.push(name, b"", 0)
    }

    /// Entry whose payload is written verbatim under an arbitrary method code.
    pub fn with_method(self, name: &str, data: &[u8], method: u16) -> Self {
        let mut builder = self.push(name, data, method);
        builder.last().raw = true;
        builder
    }

    /// Declared uncompressed size for the last entry, in both headers.
    pub fn declared_size(mut self, size: u64) -> Self {
        self.last().declared_size = Some(size);
        self
    }

    /// Move the last entry's sizes into a trailing data descriptor.
    pub fn with_descriptor(mut self, signed: bool) -> Self {
        self.last().descriptor = Some(signed);
        self
    }

    /// Uncompressed size recorded in the last entry's data descriptor only.
    pub fn descriptor_size(mut self, size: u64) -> Self {
        self.last().descriptor_size = Some(size);
        self
    }

    /// Extra field present only in the last entry's local header.
    pub fn local_extra(mut self, extra: &[u8]) -> Self {
        self.last().local_extra = extra.to_vec();
        self
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.last().mode = mode;
        self
    }

    /// Point the last entry's directory record at the wrong offset.
    pub fn lfh_offset_override(mut self, offset: u32) -> Self {
        self.last().lfh_offset_override = Some(offset);
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    /// Replace the last directory record's signature with garbage.
    pub fn corrupt_directory_signature(mut self) -> Self {
        self.corrupt_directory = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut cd = Vec::new();
        let mut last_record = 0;

        for plan in &self.entries {
            let data = if plan.method == 8 && !plan.raw {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&plan.payload).unwrap();
                encoder.finish().unwrap()
            } else {
                plan.payload.clone()
            };
            let compressed = data.len() as u32;
            let uncompressed = plan.declared_size.unwrap_or(plan.payload.len() as u64) as u32;
            let flags = if plan.descriptor.is_some() {
                FLAG_DATA_DESCRIPTOR
            } else {
                0
            };
            let (local_compressed, local_uncompressed) = match plan.descriptor {
                Some(_) => (0, 0),
                None => (compressed, uncompressed),
            };

            let lfh_offset = out.len() as u32;
            out.extend_from_slice(LFH_SIGNATURE);
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&flags.to_le_bytes());
            out.extend_from_slice(&plan.method.to_le_bytes());
            out.extend_from_slice(&[0u8; 8]); // time, date, crc
            out.extend_from_slice(&local_compressed.to_le_bytes());
            out.extend_from_slice(&local_uncompressed.to_le_bytes());
            out.extend_from_slice(&(plan.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&(plan.local_extra.len() as u16).to_le_bytes());
            out.extend_from_slice(&plan.name);
            out.extend_from_slice(&plan.local_extra);
            out.extend_from_slice(&data);

            if let Some(signed) = plan.descriptor {
                if signed {
                    out.extend_from_slice(DATA_DESCRIPTOR_SIGNATURE);
                }
                out.extend_from_slice(&0u32.to_le_bytes());
                out.extend_from_slice(&compressed.to_le_bytes());
                let trailing = plan.descriptor_size.map_or(uncompressed, |size| size as u32);
                out.extend_from_slice(&trailing.to_le_bytes());
            }

            last_record = cd.len();
            cd.extend_from_slice(CDFH_SIGNATURE);
            cd.extend_from_slice(&((3u16 << 8) | 20).to_le_bytes());
            cd.extend_from_slice(&20u16.to_le_bytes());
            cd.extend_from_slice(&flags.to_le_bytes());
            cd.extend_from_slice(&plan.method.to_le_bytes());
            cd.extend_from_slice(&[0u8; 8]); // time, date, crc
            cd.extend_from_slice(&compressed.to_le_bytes());
            cd.extend_from_slice(&uncompressed.to_le_bytes());
            cd.extend_from_slice(&(plan.name.len() as u16).to_le_bytes());
            cd.extend_from_slice(&0u16.to_le_bytes()); // extra
            cd.extend_from_slice(&0u16.to_le_bytes()); // comment
            cd.extend_from_slice(&0u16.to_le_bytes()); // disk
            cd.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
            cd.extend_from_slice(&(plan.mode << 16).to_le_bytes());
            cd.extend_from_slice(&plan.lfh_offset_override.unwrap_or(lfh_offset).to_le_bytes());
            cd.extend_from_slice(&plan.name);
        }

        if self.corrupt_directory && !cd.is_empty() {
            cd[last_record..last_record + 4].copy_from_slice(b"JUNK");
        }

        let cd_offset = out.len() as u32;
        let count = self.entries.len() as u16;
        out.extend_from_slice(&cd);
        out.extend_from_slice(EOCD_SIGNATURE);
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&(cd.len() as u32).to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.comment);
        out
    }
}
