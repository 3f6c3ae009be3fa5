//! Format-specific structural checks
//!
//! Every check runs on a blocking thread against one [`ArchiveReader`]. An
//! `Err` from here means the container could not be walked at all; the
//! pipeline turns it into a `STRUCTURE_DAMAGE` issue.

use crate::error::{ArchiveError, Result};
use crate::extraction::{ArchiveEntry, ArchiveReader, EntryCheck, open_reader};
use crate::types::{ArchiveFormat, IssueSeverity, IssueType, ValidationIssue};
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::debug;

/// Walk the container's entry table and verify entry data where possible
pub(crate) async fn validate(path: &Path, format: ArchiveFormat) -> Result<Vec<ValidationIssue>> {
    let path = path.to_path_buf();
    spawn_blocking(move || validate_blocking(&path, format)).await?
}

fn validate_blocking(path: &Path, format: ArchiveFormat) -> Result<Vec<ValidationIssue>> {
    let mut reader = open_reader(path, format)?;
    let issues = match format {
        ArchiveFormat::Zip => check_verified_entries(path, reader.as_mut(), true)?,
        ArchiveFormat::SevenZ => check_verified_entries(path, reader.as_mut(), false)?,
        ArchiveFormat::Rar | ArchiveFormat::Rar5 => check_rar_headers(path, reader.as_mut())?,
        ArchiveFormat::Other(_) => check_probe(path, reader.as_mut()),
    };
    debug!(?path, %format, issues = issues.len(), "structure validation finished");
    Ok(issues)
}

fn no_entries(path: &Path) -> ValidationIssue {
    ValidationIssue::new(
        IssueType::CorruptedArchive,
        IssueSeverity::Critical,
        "Archive contains no entries",
    )
    .at(path.display().to_string())
}

fn damaged_entry(entry: &ArchiveEntry, reason: &str) -> ValidationIssue {
    ValidationIssue::new(
        IssueType::CorruptedArchive,
        IssueSeverity::High,
        format!("Entry {} is damaged: {}", entry.name, reason),
    )
    .at(entry.name.clone())
    .repairable()
}

/// ZIP and 7Z: every data-bearing entry is read and checked against its CRC
fn check_verified_entries(
    path: &Path,
    reader: &mut dyn ArchiveReader,
    require_files: bool,
) -> Result<Vec<ValidationIssue>> {
    let entries = reader.list_entries()?;
    if entries.is_empty() {
        return Ok(vec![no_entries(path)]);
    }

    let mut issues = Vec::new();
    if require_files && entries.iter().all(|e| e.is_dir) {
        issues.push(
            ValidationIssue::new(
                IssueType::MissingFiles,
                IssueSeverity::High,
                "Archive contains only directories",
            )
            .at(path.display().to_string()),
        );
        return Ok(issues);
    }

    let mut to_verify = Vec::new();
    for entry in entries.iter().filter(|e| !e.is_dir) {
        if entry.corrupted {
            issues.push(damaged_entry(entry, "entry header is unreadable"));
            continue;
        }
        if entry.encrypted {
            debug!(?path, entry = %entry.name, "skipping CRC check for encrypted entry");
            continue;
        }
        to_verify.push(entry.clone());
    }

    let checks = reader.verify_all(&to_verify);
    for (entry, check) in to_verify.iter().zip(checks) {
        match check {
            EntryCheck::Intact => {}
            EntryCheck::ChecksumMismatch { expected, actual } => {
                issues.push(checksum_issue(path, entry, expected, actual));
            }
            EntryCheck::Unreadable(reason) => issues.push(damaged_entry(entry, &reason)),
        }
    }

    Ok(issues)
}

fn checksum_issue(
    path: &Path,
    entry: &ArchiveEntry,
    expected: u32,
    actual: Option<u32>,
) -> ValidationIssue {
    let description = match actual {
        Some(actual) => ArchiveError::ChecksumMismatch {
            archive: PathBuf::from(path),
            entry: entry.name.clone(),
            expected,
            actual,
        }
        .to_string(),
        None => format!("checksum mismatch for entry {} (stored {:08x})", entry.name, expected),
    };
    ValidationIssue::new(IssueType::ChecksumMismatch, IssueSeverity::High, description)
        .at(entry.name.clone())
        .with_fix("Run checksum repair to re-materialize the archive")
        .repairable()
}

/// RAR: only the header table is checked, data is left to deep validation
fn check_rar_headers(path: &Path, reader: &mut dyn ArchiveReader) -> Result<Vec<ValidationIssue>> {
    let entries = reader.list_entries()?;
    if entries.is_empty() {
        return Ok(vec![no_entries(path)]);
    }

    Ok(entries
        .iter()
        .filter(|e| e.corrupted)
        .map(|e| damaged_entry(e, "header flagged as corrupted"))
        .collect())
}

fn check_probe(path: &Path, reader: &mut dyn ArchiveReader) -> Vec<ValidationIssue> {
    if reader.probe() {
        return Vec::new();
    }
    vec![
        ValidationIssue::new(
            IssueType::CorruptedArchive,
            IssueSeverity::High,
            format!("{} file cannot be opened", reader.format()),
        )
        .at(path.display().to_string())
        .repairable(),
    ]
}
