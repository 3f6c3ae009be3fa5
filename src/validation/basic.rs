//! File-level and signature checks run before any container is opened

use crate::config::ValidationConfig;
use crate::format::{detect_format, extension_matches};
use crate::types::{ArchiveFormat, IssueSeverity, IssueType, ValidationIssue};
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Outcome of the basic file checks
pub(crate) struct FileCheck {
    pub(crate) issues: Vec<ValidationIssue>,
    /// No further step can run on this file
    pub(crate) halt: bool,
    pub(crate) size: u64,
}

/// Existence, readability and size checks
pub(crate) async fn check_file(path: &Path, config: &ValidationConfig) -> FileCheck {
    let location = path.display().to_string();
    let halted = |issue: ValidationIssue| FileCheck {
        issues: vec![issue],
        halt: true,
        size: 0,
    };

    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => {
            return halted(
                ValidationIssue::new(
                    IssueType::MissingFiles,
                    IssueSeverity::Critical,
                    "Path is not a regular file",
                )
                .at(location),
            );
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            return halted(permission_issue(location));
        }
        Err(e) => {
            debug!(?path, error = %e, "file not found");
            return halted(
                ValidationIssue::new(
                    IssueType::MissingFiles,
                    IssueSeverity::Critical,
                    "File does not exist",
                )
                .at(location),
            );
        }
    };

    if let Err(e) = tokio::fs::File::open(path).await {
        debug!(?path, error = %e, "file cannot be opened for reading");
        return halted(permission_issue(location));
    }

    let size = metadata.len();
    if size == 0 {
        return halted(
            ValidationIssue::new(IssueType::SizeMismatch, IssueSeverity::Critical, "File is empty")
                .at(location),
        );
    }

    let mut issues = Vec::new();
    if size > config.max_file_size {
        issues.push(
            ValidationIssue::new(
                IssueType::SizeMismatch,
                IssueSeverity::Medium,
                format!(
                    "File is suspiciously large ({} bytes, limit {})",
                    size, config.max_file_size
                ),
            )
            .at(location),
        );
    }

    FileCheck {
        issues,
        halt: false,
        size,
    }
}

fn permission_issue(location: String) -> ValidationIssue {
    ValidationIssue::new(
        IssueType::PermissionIssues,
        IssueSeverity::High,
        "File cannot be read",
    )
    .at(location)
    .with_fix("Adjust file permissions so the file is readable")
    .repairable()
}

/// Signature detection plus the extension cross-check
pub(crate) fn check_format(path: &Path, issues: &mut Vec<ValidationIssue>) -> Option<ArchiveFormat> {
    let location = path.display().to_string();
    let Some(format) = detect_format(path) else {
        issues.push(
            ValidationIssue::new(
                IssueType::InvalidFormat,
                IssueSeverity::High,
                "Unrecognized container format",
            )
            .at(location),
        );
        return None;
    };

    if !extension_matches(path, format) {
        let expected = format.extensions().join(" or .");
        issues.push(
            ValidationIssue::new(
                IssueType::InvalidFormat,
                IssueSeverity::Medium,
                format!("File contents are {} but the extension does not match", format),
            )
            .at(location)
            .with_fix(format!("Rename the file to use the .{} extension", expected))
            .repairable(),
        );
    }

    Some(format)
}
