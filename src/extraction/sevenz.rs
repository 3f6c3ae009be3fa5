use crate::error::{ArchiveError, Error, Result};
use crate::types::ArchiveFormat;
use sevenz_rust::{Password, SevenZReader};
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::shared::{CrcWriter, is_checksum_error};
use super::{ArchiveEntry, ArchiveReader, EntryCheck};

/// Archive reader for 7-Zip containers (7Z, CB7)
///
/// Entry data is only reachable through `for_each_entries`, which decodes
/// solid blocks front to back. Every data operation is one such walk, with
/// entries matched by name in container order.
pub struct SevenZArchiveReader {
    path: PathBuf,
    passes: usize,
}

impl SevenZArchiveReader {
    /// Open a 7z container and read its header database
    pub fn open(path: &Path) -> Result<Self> {
        let reader = Self::reader(path)?;
        debug!(
            ?path,
            entries = reader.archive().files.len(),
            "opened 7z archive"
        );
        Ok(Self {
            path: path.to_path_buf(),
            passes: 0,
        })
    }

    fn reader(path: &Path) -> Result<SevenZReader<File>> {
        SevenZReader::open(path, Password::empty()).map_err(|e| {
            Error::Archive(ArchiveError::OpenFailed {
                archive: path.to_path_buf(),
                reason: format!("failed to read 7z header: {}", e),
            })
        })
    }

    /// Number of decoding passes made over the container so far
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Decode the container once, handing each selected entry's data to `visit`
    ///
    /// `visit` receives the entry's position in `entries`. Unselected entries
    /// are drained. The error is the reason the walk stopped early.
    fn walk(
        &mut self,
        entries: &[ArchiveEntry],
        mut visit: impl FnMut(usize, &mut dyn Read),
    ) -> std::result::Result<(), String> {
        self.passes += 1;
        let mut pending: HashMap<&str, VecDeque<usize>> = HashMap::new();
        for (position, entry) in entries.iter().enumerate() {
            pending
                .entry(entry.name.as_str())
                .or_default()
                .push_back(position);
        }
        let mut remaining = entries.len();

        let mut reader = Self::reader(&self.path).map_err(|e| e.to_string())?;
        let path = &self.path;
        reader
            .for_each_entries(|entry, data| {
                if remaining == 0 {
                    return Ok(false);
                }
                match pending
                    .get_mut(entry.name.as_str())
                    .and_then(VecDeque::pop_front)
                {
                    Some(position) => {
                        remaining -= 1;
                        visit(position, data);
                    }
                    None => {
                        // Solid blocks share one decoder, so skipped entries must still be consumed
                        if let Err(e) = std::io::copy(data, &mut std::io::sink()) {
                            warn!(
                                ?path,
                                entry = %entry.name,
                                error = %e,
                                "failed to drain 7z entry"
                            );
                        }
                    }
                }
                Ok(true)
            })
            .map_err(|e| e.to_string())
    }
}

fn unreadable(archive: &Path, entry: &ArchiveEntry, reason: impl ToString) -> Error {
    Error::Archive(ArchiveError::EntryUnreadable {
        archive: archive.to_path_buf(),
        entry: entry.name.clone(),
        reason: reason.to_string(),
    })
}

/// Read an entry's data to the end, checking it against the declared CRC
fn check_data(entry: &ArchiveEntry, data: &mut dyn Read) -> EntryCheck {
    let mut sink = CrcWriter::new();
    let copied = std::io::copy(data, &mut sink);
    let actual = sink.crc();

    match (copied, entry.declared_crc) {
        (Ok(_), Some(expected)) if expected != actual => EntryCheck::ChecksumMismatch {
            expected,
            actual: Some(actual),
        },
        (Ok(_), _) => EntryCheck::Intact,
        (Err(e), expected) if is_checksum_error(&e) => EntryCheck::ChecksumMismatch {
            expected: expected.unwrap_or_default(),
            actual: Some(actual),
        },
        (Err(e), _) => EntryCheck::Unreadable(e.to_string()),
    }
}

impl ArchiveReader for SevenZArchiveReader {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::SevenZ
    }

    fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        let reader = Self::reader(&self.path)?;
        let entries = reader
            .archive()
            .files
            .iter()
            .enumerate()
            .map(|(index, file)| ArchiveEntry {
                index,
                name: file.name.clone(),
                is_dir: file.is_directory,
                size: file.size,
                declared_crc: file.has_crc.then_some(file.crc as u32),
                encrypted: false,
                corrupted: false,
            })
            .collect();
        Ok(entries)
    }

    fn verify_entry(&mut self, entry: &ArchiveEntry) -> EntryCheck {
        self.verify_all(std::slice::from_ref(entry))
            .pop()
            .unwrap_or_else(|| EntryCheck::Unreadable("entry not found".to_string()))
    }

    fn verify_all(&mut self, entries: &[ArchiveEntry]) -> Vec<EntryCheck> {
        let mut checks: Vec<Option<EntryCheck>> = vec![None; entries.len()];
        let walked = self.walk(entries, |position, data| {
            checks[position] = Some(check_data(&entries[position], data));
        });

        let missing = walked.err().unwrap_or_else(|| "entry not found".to_string());
        checks
            .into_iter()
            .map(|check| check.unwrap_or_else(|| EntryCheck::Unreadable(missing.clone())))
            .collect()
    }

    fn open_entry(&mut self, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        let mut read = None;
        self.read_all(std::slice::from_ref(entry), &mut |_, data| read = Some(data));
        read.unwrap_or_else(|| Err(unreadable(&self.path, entry, "entry not found")))
    }

    fn read_all(
        &mut self,
        entries: &[ArchiveEntry],
        visit: &mut dyn FnMut(&ArchiveEntry, Result<Vec<u8>>),
    ) {
        let path = self.path.clone();
        let mut reached = vec![false; entries.len()];
        let walked = self.walk(entries, |position, data| {
            reached[position] = true;
            let entry = &entries[position];
            let mut buffer = Vec::new();
            let read = data
                .read_to_end(&mut buffer)
                .map(|_| buffer)
                .map_err(|e| unreadable(&path, entry, e));
            visit(entry, read);
        });

        let missing = walked.err().unwrap_or_else(|| "entry not found".to_string());
        for (entry, _) in entries.iter().zip(&reached).filter(|(_, reached)| !**reached) {
            visit(entry, Err(unreadable(&path, entry, &missing)));
        }
    }
}
