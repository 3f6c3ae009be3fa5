//! Container reading, forced extraction and repackaging
//!
//! Each supported container family gets one [`ArchiveReader`] implementation,
//! selected once from the detected [`ArchiveFormat`]:
//!
//! - [`ZipArchiveReader`]: ZIP/CBZ via the `zip` crate (central directory)
//! - [`RarArchiveReader`]: RAR/CBR via `unrar`
//! - [`SevenZArchiveReader`]: 7Z/CB7 via `sevenz-rust`
//! - [`OtherArchiveReader`]: recognized signatures with no structural reader
//!
//! The forced-extraction and repackaging helpers used by recovery live in
//! `shared`.

mod other;
mod rar;
mod sevenz;
mod shared;
mod zip;


pub use other::OtherArchiveReader;
pub use rar::RarArchiveReader;
pub use sevenz::SevenZArchiveReader;
pub use shared::{CrcWriter, ExtractedEntry, force_extract, repackage_as_zip};
pub use zip::ZipArchiveReader;

use crate::error::Result;
use crate::types::ArchiveFormat;
use std::path::Path;
use tracing::debug;

/// One logical file inside a container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Position in the container's entry table
    pub index: usize,
    /// Entry name as stored in the container
    pub name: String,
    /// Directory entry
    pub is_dir: bool,
    /// Uncompressed size in bytes
    pub size: u64,
    /// CRC32 declared by the container, when the format stores one
    pub declared_crc: Option<u32>,
    /// Entry data is encrypted and cannot be verified without a password
    pub encrypted: bool,
    /// The underlying reader flagged the entry header as damaged
    pub corrupted: bool,
}

/// Result of verifying one entry's data
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryCheck {
    /// Data read completely and matched any declared checksum
    Intact,
    /// Data read completely but did not match the declared CRC32
    ChecksumMismatch {
        /// Declared CRC32
        expected: u32,
        /// CRC32 computed over the data, when the reader exposes it
        actual: Option<u32>,
    },
    /// Data could not be read
    Unreadable(String),
}

/// Read access to one container
///
/// Implementations are blocking and are driven from `spawn_blocking`.
pub trait ArchiveReader: Send {
    /// Container format this reader handles
    fn format(&self) -> ArchiveFormat;

    /// Enumerate the entry table
    fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>>;

    /// Read an entry completely, checking it against any declared checksum
    fn verify_entry(&mut self, entry: &ArchiveEntry) -> EntryCheck;

    /// Read an entry's data into memory
    fn open_entry(&mut self, entry: &ArchiveEntry) -> Result<Vec<u8>>;

    /// Verify every entry in `entries`, one check per entry in the same order
    ///
    /// Formats without random access override this with a single pass over
    /// the container.
    fn verify_all(&mut self, entries: &[ArchiveEntry]) -> Vec<EntryCheck> {
        entries.iter().map(|entry| self.verify_entry(entry)).collect()
    }

    /// Read every entry in `entries`, calling `visit` exactly once per entry
    ///
    /// Entries are visited in container order, which may differ from the
    /// order of `entries`.
    fn read_all(
        &mut self,
        entries: &[ArchiveEntry],
        visit: &mut dyn FnMut(&ArchiveEntry, Result<Vec<u8>>),
    ) {
        for entry in entries {
            let data = self.open_entry(entry);
            visit(entry, data);
        }
    }

    /// Generic "can this be opened" probe
    fn probe(&mut self) -> bool {
        self.list_entries()
            .map(|entries| !entries.is_empty())
            .unwrap_or(false)
    }
}

/// Open the reader matching `format`
pub fn open_reader(path: &Path, format: ArchiveFormat) -> Result<Box<dyn ArchiveReader>> {
    debug!(?path, %format, "opening archive reader");
    let reader: Box<dyn ArchiveReader> = match format {
        ArchiveFormat::Zip => Box::new(ZipArchiveReader::open(path)?),
        ArchiveFormat::Rar | ArchiveFormat::Rar5 => Box::new(RarArchiveReader::open(path, format)?),
        ArchiveFormat::SevenZ => Box::new(SevenZArchiveReader::open(path)?),
        ArchiveFormat::Other(_) => Box::new(OtherArchiveReader::new(path, format)),
    };
    Ok(reader)
}
