use crate::error::{ArchiveError, Error, Result};
use crate::types::ArchiveFormat;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use unrar::{CursorBeforeHeader, OpenArchive, Process};

use super::{ArchiveEntry, ArchiveReader, EntryCheck};

/// Archive reader for RAR-family containers (RAR 4, RAR 5, CBR)
///
/// `unrar` exposes a forward-only cursor. Entry data is reached by one walk
/// over the headers; single-entry operations are walks that select one entry.
pub struct RarArchiveReader {
    path: PathBuf,
    format: ArchiveFormat,
}

/// What a header walk does with the entries it selects
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RarPass {
    /// Decompress and check the CRC without keeping the data
    Test,
    /// Decompress into memory
    Read,
}

impl RarArchiveReader {
    /// Open a RAR container, failing if its main header cannot be read
    pub fn open(path: &Path, format: ArchiveFormat) -> Result<Self> {
        unrar::Archive::new(path)
            .open_for_listing()
            .map_err(|e| Self::convert_unrar_error(e, path))?;

        debug!(?path, %format, "opened RAR archive");

        Ok(Self {
            path: path.to_path_buf(),
            format,
        })
    }

    /// Check if an unrar error means the entry data failed its CRC
    fn is_bad_data(e: &unrar::error::UnrarError) -> bool {
        matches!(e.code, unrar::error::Code::BadData)
    }

    fn convert_unrar_error(e: unrar::error::UnrarError, archive_path: &Path) -> Error {
        Error::Archive(ArchiveError::OpenFailed {
            archive: archive_path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn unreadable(&self, entry: &ArchiveEntry, reason: impl ToString) -> Error {
        Error::Archive(ArchiveError::EntryUnreadable {
            archive: self.path.clone(),
            entry: entry.name.clone(),
            reason: reason.to_string(),
        })
    }

    /// Walk the headers front to back, testing or reading the entries `wanted` selects
    ///
    /// A failed test or read consumes the cursor, so the archive is reopened
    /// past the failed entry and the walk continues. The error is the reason
    /// the walk stopped early at a damaged header.
    pub(crate) fn walk(
        path: &Path,
        pass: RarPass,
        mut wanted: impl FnMut(usize, &unrar::FileHeader) -> bool,
        mut visit: impl FnMut(usize, &str, unrar::UnrarResult<Vec<u8>>),
    ) -> std::result::Result<(), String> {
        let mut at_header = Self::cursor_at(path, 0)?;
        let mut position = 0;

        loop {
            let at_file = match at_header.read_header() {
                Ok(Some(at_file)) => at_file,
                Ok(None) => return Ok(()),
                Err(e) => return Err(format!("damaged header #{}: {}", position, e)),
            };

            at_header = if wanted(position, at_file.entry()) {
                let name = at_file.entry().filename.to_string_lossy().into_owned();
                let outcome = match pass {
                    RarPass::Test => at_file.test().map(|next| (Vec::new(), next)),
                    RarPass::Read => at_file.read(),
                };
                match outcome {
                    Ok((data, next)) => {
                        visit(position, &name, Ok(data));
                        next
                    }
                    Err(e) => {
                        debug!(
                            ?path,
                            position,
                            entry = %name,
                            error = %e,
                            "RAR entry failed, resuming after it"
                        );
                        visit(position, &name, Err(e));
                        Self::cursor_at(path, position + 1)?
                    }
                }
            } else {
                at_file
                    .skip()
                    .map_err(|e| format!("failed to skip entry #{}: {}", position, e))?
            };
            position += 1;
        }
    }

    /// Fresh processing cursor positioned before header `index`
    fn cursor_at(
        path: &Path,
        index: usize,
    ) -> std::result::Result<OpenArchive<Process, CursorBeforeHeader>, String> {
        let mut at_header = unrar::Archive::new(path)
            .open_for_processing()
            .map_err(|e| e.to_string())?;
        for position in 0..index {
            at_header = match at_header.read_header().map_err(|e| e.to_string())? {
                Some(at_file) => at_file.skip().map_err(|e| e.to_string())?,
                None => return Err(format!("archive ended before entry #{}", position)),
            };
        }
        Ok(at_header)
    }

    /// Entry-table index to position in `entries`
    fn positions(entries: &[ArchiveEntry]) -> HashMap<usize, usize> {
        entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.index, position))
            .collect()
    }
}

impl ArchiveReader for RarArchiveReader {
    fn format(&self) -> ArchiveFormat {
        self.format
    }

    fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        let listing = unrar::Archive::new(&self.path)
            .open_for_listing()
            .map_err(|e| Self::convert_unrar_error(e, &self.path))?;

        let mut entries = Vec::new();
        for (index, header) in listing.enumerate() {
            match header {
                Ok(header) => entries.push(ArchiveEntry {
                    index,
                    name: header.filename.to_string_lossy().into_owned(),
                    is_dir: header.is_directory(),
                    size: header.unpacked_size,
                    declared_crc: Some(header.file_crc),
                    encrypted: header.is_encrypted(),
                    corrupted: false,
                }),
                Err(e) => {
                    // The listing cursor cannot advance past a damaged header
                    debug!(path = ?self.path, index, error = %e, "damaged RAR header");
                    entries.push(ArchiveEntry {
                        index,
                        name: format!("header #{}", index),
                        is_dir: false,
                        size: 0,
                        declared_crc: None,
                        encrypted: false,
                        corrupted: true,
                    });
                    break;
                }
            }
        }

        Ok(entries)
    }

    fn verify_entry(&mut self, entry: &ArchiveEntry) -> EntryCheck {
        self.verify_all(std::slice::from_ref(entry))
            .pop()
            .unwrap_or_else(|| EntryCheck::Unreadable("entry not found".to_string()))
    }

    fn verify_all(&mut self, entries: &[ArchiveEntry]) -> Vec<EntryCheck> {
        let positions = Self::positions(entries);
        let mut checks: Vec<Option<EntryCheck>> = vec![None; entries.len()];

        let walked = Self::walk(
            &self.path,
            RarPass::Test,
            |index, _| positions.contains_key(&index),
            |index, _, outcome| {
                let Some(&at) = positions.get(&index) else {
                    return;
                };
                checks[at] = Some(match outcome {
                    Ok(_) => EntryCheck::Intact,
                    Err(e) if Self::is_bad_data(&e) => EntryCheck::ChecksumMismatch {
                        expected: entries[at].declared_crc.unwrap_or_default(),
                        actual: None,
                    },
                    Err(e) => EntryCheck::Unreadable(e.to_string()),
                });
            },
        );

        let missing = walked.err().unwrap_or_else(|| "entry not found".to_string());
        checks
            .into_iter()
            .map(|check| check.unwrap_or_else(|| EntryCheck::Unreadable(missing.clone())))
            .collect()
    }

    fn open_entry(&mut self, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        let mut read = None;
        self.read_all(std::slice::from_ref(entry), &mut |_, data| read = Some(data));
        read.unwrap_or_else(|| Err(self.unreadable(entry, "entry not found")))
    }

    fn read_all(
        &mut self,
        entries: &[ArchiveEntry],
        visit: &mut dyn FnMut(&ArchiveEntry, Result<Vec<u8>>),
    ) {
        let positions = Self::positions(entries);
        let mut reached = vec![false; entries.len()];

        let walked = Self::walk(
            &self.path,
            RarPass::Read,
            |index, _| positions.contains_key(&index),
            |index, _, outcome| {
                let Some(&at) = positions.get(&index) else {
                    return;
                };
                reached[at] = true;
                visit(
                    &entries[at],
                    outcome.map_err(|e| self.unreadable(&entries[at], e)),
                );
            },
        );

        let missing = walked.err().unwrap_or_else(|| "entry not found".to_string());
        for (entry, _) in entries.iter().zip(&reached).filter(|(_, reached)| !**reached) {
            visit(entry, Err(self.unreadable(entry, &missing)));
        }
    }
}
