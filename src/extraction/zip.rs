use crate::error::{ArchiveError, Error, Result};
use crate::types::ArchiveFormat;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::shared::{CrcWriter, is_checksum_error};
use super::{ArchiveEntry, ArchiveReader, EntryCheck};

/// Archive reader for ZIP-family containers (ZIP, CBZ)
pub struct ZipArchiveReader {
    path: PathBuf,
    archive: zip::ZipArchive<BufReader<File>>,
}

impl ZipArchiveReader {
    /// Open a ZIP container and read its central directory
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to open ZIP archive: {}", e),
            ))
        })?;

        let archive = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| {
            Error::Archive(ArchiveError::OpenFailed {
                archive: path.to_path_buf(),
                reason: format!("failed to read ZIP central directory: {}", e),
            })
        })?;

        debug!(?path, entries = archive.len(), "opened ZIP archive");

        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }
}

impl ArchiveReader for ZipArchiveReader {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::with_capacity(self.archive.len());

        for index in 0..self.archive.len() {
            // Raw access reads the local header without decrypting or inflating
            match self.archive.by_index_raw(index) {
                Ok(file) => entries.push(ArchiveEntry {
                    index,
                    name: file.name().to_string(),
                    is_dir: file.is_dir(),
                    size: file.size(),
                    declared_crc: Some(file.crc32()),
                    encrypted: file.encrypted(),
                    corrupted: false,
                }),
                Err(e) => {
                    debug!(path = ?self.path, index, error = %e, "damaged ZIP entry header");
                    entries.push(ArchiveEntry {
                        index,
                        name: format!("entry #{}", index),
                        is_dir: false,
                        size: 0,
                        declared_crc: None,
                        encrypted: false,
                        corrupted: true,
                    });
                }
            }
        }

        Ok(entries)
    }

    fn verify_entry(&mut self, entry: &ArchiveEntry) -> EntryCheck {
        let mut file = match self.archive.by_index(entry.index) {
            Ok(file) => file,
            Err(e) => return EntryCheck::Unreadable(e.to_string()),
        };
        let expected = file.crc32();
        let mut sink = CrcWriter::new();

        match std::io::copy(&mut file, &mut sink) {
            Ok(_) if sink.crc() == expected => EntryCheck::Intact,
            Ok(_) => EntryCheck::ChecksumMismatch {
                expected,
                actual: Some(sink.crc()),
            },
            // The zip reader checks the CRC itself on the final read
            Err(e) if is_checksum_error(&e) => EntryCheck::ChecksumMismatch {
                expected,
                actual: Some(sink.crc()),
            },
            Err(e) => EntryCheck::Unreadable(e.to_string()),
        }
    }

    fn open_entry(&mut self, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        let path = self.path.clone();
        let unreadable = |reason: String| {
            Error::Archive(ArchiveError::EntryUnreadable {
                archive: path.clone(),
                entry: entry.name.clone(),
                reason,
            })
        };

        let mut file = self
            .archive
            .by_index(entry.index)
            .map_err(|e| unreadable(e.to_string()))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| unreadable(e.to_string()))?;
        Ok(data)
    }
}
