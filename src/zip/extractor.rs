use std::fs;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::io::LocalFileReader;

use super::decompress::decompress_entry;
use super::error::{Result, ZipError};
use super::parser::ZipParser;
use super::structures::{EntryMetadata, ZipEntry};

/// Per-entry hook consulted by [`ZipArchive::extract_all_with`] before each
/// entry; returning `false` stops the loop.
pub type EntryHook<'a> = Box<dyn Fn(usize, &ZipEntry) -> bool + 'a>;

/// Options for bulk extraction
#[derive(Default)]
pub struct ExtractOptions<'a> {
    continue_on_error: bool,
    on_entry: Option<EntryHook<'a>>,
}

impl<'a> ExtractOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep extracting after an entry fails instead of stopping.
    pub fn continue_on_error(mut self, value: bool) -> Self {
        self.continue_on_error = value;
        self
    }

    /// Run `hook` before each entry; returning `false` cancels the rest.
    pub fn on_entry(mut self, hook: impl Fn(usize, &ZipEntry) -> bool + 'a) -> Self {
        self.on_entry = Some(Box::new(hook));
        self
    }
}

/// A ZIP archive on disk and the index of its entries.
///
/// Creating the handle does no I/O. [`build_index`](Self::build_index)
/// reads the archive metadata once; every extraction call opens the file
/// again for its own duration, so a shared `&ZipArchive` can serve
/// extractions from several threads.
pub struct ZipArchive {
    path: PathBuf,
    entries: Vec<ZipEntry>,
}

impl ZipArchive {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entries: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_reader(&self) -> Result<LocalFileReader> {
        LocalFileReader::open(&self.path).map_err(|source| ZipError::OpenRead {
            path: self.path.clone(),
            source,
        })
    }

    /// Read the archive metadata and build the entry index.
    ///
    /// On failure the archive is left with no entries.
    pub fn build_index(&mut self) -> Result<()> {
        self.entries.clear();

        let reader = self.open_reader()?;
        let entries = ZipParser::new(&reader, &self.path).read_central_directory()?;

        debug!(archive = %self.path.display(), entries = entries.len(), "archive indexed");
        self.entries = entries;
        Ok(())
    }

    /// Number of indexed entries, directory markers included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entry_count(&self) -> usize {
        self.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in central directory order
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&ZipEntry> {
        self.entries.get(index)
    }

    fn checked_entry(&self, index: usize) -> Result<&ZipEntry> {
        self.entries.get(index).ok_or_else(|| {
            ZipError::Internal(format!(
                "entry {index} does not exist, archive has {} entries",
                self.entries.len()
            ))
        })
    }

    /// Name and uncompressed size of an entry.
    ///
    /// A name may be a path, and a trailing '/' marks a directory.
    pub fn entry_metadata(&self, index: usize) -> Result<EntryMetadata<'_>> {
        let entry = self.checked_entry(index)?;
        Ok(EntryMetadata {
            name: entry.name_bytes(),
            uncompressed_size: entry.uncompressed_size(),
        })
    }

    /// Extract file data to memory
    ///
    /// A directory entry yields an empty buffer, which is not an error.
    pub fn extract_to_memory(&self, index: usize) -> Result<Vec<u8>> {
        let entry = self.checked_entry(index)?;
        let reader = self.open_reader()?;
        decompress_entry(&reader, &self.path, entry)
    }

    /// Extract file data into a shared [`Bytes`] buffer without copying.
    pub fn extract_to_buffer(&self, index: usize) -> Result<Bytes> {
        Ok(Bytes::from(self.extract_to_memory(index)?))
    }

    /// Extract file to disk
    ///
    /// Any existing file at `output_path` is overwritten. Parent directories
    /// are not created.
    pub fn extract_to_file(&self, index: usize, output_path: &Path) -> Result<()> {
        let data = self.extract_to_memory(index)?;

        fs::write(output_path, &data).map_err(|source| ZipError::OpenWrite {
            path: output_path.to_path_buf(),
            source,
        })
    }

    /// Extract every entry below `root`.
    ///
    /// With `continue_on_error` unset, the first failing entry stops the
    /// loop and its error is returned; how many entries were written before
    /// it is not reported.
    pub fn extract_all(&self, root: &Path, continue_on_error: bool) -> Result<()> {
        self.extract_all_with(root, &ExtractOptions::new().continue_on_error(continue_on_error))
    }

    /// Extract every entry below `root` with explicit options.
    ///
    /// When continuing past failures, each one is logged and the first is
    /// returned once every entry has been attempted. A cancellation check
    /// that returns `false` ends the loop early without an error.
    pub fn extract_all_with(&self, root: &Path, options: &ExtractOptions<'_>) -> Result<()> {
        debug!(archive = %self.path.display(), root = %root.display(), "extracting all entries");

        let mut first_error = None;
        for (index, entry) in self.entries.iter().enumerate() {
            if let Some(hook) = &options.on_entry {
                if !hook(index, entry) {
                    info!(processed = index, total = self.entries.len(), "extraction cancelled");
                    break;
                }
            }

            match self.extract_entry_under(index, entry, root) {
                Ok(()) => {}
                Err(e) if options.continue_on_error => {
                    warn!(entry = %entry.name(), "skipping entry: {e}");
                    first_error.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn extract_entry_under(&self, index: usize, entry: &ZipEntry, root: &Path) -> Result<()> {
        let target = destination_path(root, entry.name_bytes())?;

        // Directory markers never have their payload read, whatever size
        // they declare.
        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|source| ZipError::OpenWrite {
                path: target.clone(),
                source,
            })?;
            debug!(path = %target.display(), "created directory");
            return Ok(());
        }

        // ZIP does not promise a directory entry before its files
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| ZipError::OpenWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        self.extract_to_file(index, &target)?;
        debug!(path = %target.display(), bytes = entry.uncompressed_size(), "extracted");

        if entry.unix_mode() != 0 {
            apply_mode(&target, entry.unix_mode());
        }
        Ok(())
    }

    /// Release the index. Dropping the archive does the same.
    pub fn close(self) {}
}

/// Join an entry name onto the extraction root.
///
/// Names that are absolute or climb out of the root with `..` are refused.
fn destination_path(root: &Path, name: &[u8]) -> Result<PathBuf> {
    let relative = name_to_path(name);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ZipError::bad_archive(format!(
            "entry name leaves the extraction directory: {}",
            String::from_utf8_lossy(name)
        )));
    }
    Ok(root.join(relative))
}

#[cfg(unix)]
fn name_to_path(name: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(name))
}

#[cfg(not(unix))]
fn name_to_path(name: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(name).into_owned())
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
        warn!(path = %path.display(), mode = %format!("{mode:o}"), "cannot restore permissions: {e}");
    }
}

#[cfg(not(unix))]
fn apply_mode(path: &Path, mode: u32) {
    debug!(path = %path.display(), mode = %format!("{mode:o}"), "permission bits ignored on this platform");
}
