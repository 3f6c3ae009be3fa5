use crate::error::{Error, Result};
use crate::types::ArchiveFormat;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::{ArchiveEntry, ArchiveReader, EntryCheck};

/// Reader for recognized signatures that have no structural reader
///
/// Only the generic open probe is meaningful; entry-level access is unsupported.
pub struct OtherArchiveReader {
    path: PathBuf,
    format: ArchiveFormat,
}

impl OtherArchiveReader {
    /// Wrap a file of a recognized but unwalkable format
    pub fn new(path: &Path, format: ArchiveFormat) -> Self {
        Self {
            path: path.to_path_buf(),
            format,
        }
    }

    fn unsupported(&self) -> Error {
        Error::NotSupported(format!(
            "{} containers have no entry reader ({})",
            self.format,
            self.path.display()
        ))
    }
}

impl ArchiveReader for OtherArchiveReader {
    fn format(&self) -> ArchiveFormat {
        self.format
    }

    fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        Err(self.unsupported())
    }

    fn verify_entry(&mut self, _entry: &ArchiveEntry) -> EntryCheck {
        EntryCheck::Unreadable(self.unsupported().to_string())
    }

    fn open_entry(&mut self, _entry: &ArchiveEntry) -> Result<Vec<u8>> {
        Err(self.unsupported())
    }

    fn probe(&mut self) -> bool {
        let mut first = [0u8; 1];
        std::fs::File::open(&self.path)
            .and_then(|mut file| file.read(&mut first))
            .map(|n| n > 0)
            .unwrap_or(false)
    }
}
