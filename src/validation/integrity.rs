//! Aggregation of issues into integrity flags, corruption level and advice

use crate::types::{CorruptionLevel, FileIntegrityStatus, IssueSeverity, IssueType, ValidationIssue};

/// Derive the integrity flags and corruption level from a set of issues
pub fn assess(issues: &[ValidationIssue]) -> FileIntegrityStatus {
    let none_of = |issue_type: IssueType| !issues.iter().any(|i| i.issue_type == issue_type);
    let high_count = issues
        .iter()
        .filter(|i| i.severity == IssueSeverity::High)
        .count();

    let corruption_level = if issues.iter().any(|i| i.severity == IssueSeverity::Critical) {
        CorruptionLevel::Critical
    } else if high_count > 3 {
        CorruptionLevel::Severe
    } else if issues.len() > 5 {
        CorruptionLevel::Moderate
    } else if !issues.is_empty() {
        CorruptionLevel::Minimal
    } else {
        CorruptionLevel::None
    };

    FileIntegrityStatus {
        checksum_valid: none_of(IssueType::ChecksumMismatch),
        structure_valid: none_of(IssueType::StructureDamage),
        content_valid: none_of(IssueType::CorruptedImages),
        metadata_valid: none_of(IssueType::MetadataCorruption),
        corruption_level,
    }
}

/// Human-readable advice for the corruption level and each issue type present
pub fn recommendations(issues: &[ValidationIssue], integrity: &FileIntegrityStatus) -> Vec<String> {
    let mut advice: Vec<&str> = match integrity.corruption_level {
        CorruptionLevel::None => vec!["File is in excellent condition"],
        CorruptionLevel::Minimal => vec!["Minor issues found; automatic repair is recommended"],
        CorruptionLevel::Moderate => vec![
            "Moderate damage found; recovery is recommended",
            "Create a backup before attempting recovery",
        ],
        CorruptionLevel::Severe => vec![
            "Severe damage found; comprehensive recovery is required",
            "Consider obtaining the file from another source",
        ],
        CorruptionLevel::Critical => vec![
            "Critical damage found; the file may be unrecoverable",
            "Look for a backup copy or another source for this file",
        ],
    };

    for issue in issues {
        let specific = match issue.issue_type {
            IssueType::PermissionIssues => Some("Check the file's access permissions"),
            IssueType::CorruptedImages => Some("Try image recovery"),
            IssueType::MetadataCorruption => Some("Rebuild metadata from the file name"),
            IssueType::ChecksumMismatch => Some("Recalculate archive checksums"),
            IssueType::InvalidFormat => Some("Rename the file to match its actual format"),
            IssueType::StructureDamage => Some("Rebuild the archive structure"),
            IssueType::MissingFiles => Some("Extract whatever pages remain readable"),
            _ => None,
        };
        advice.extend(specific);
    }

    let mut distinct: Vec<String> = Vec::with_capacity(advice.len());
    for line in advice {
        if !distinct.iter().any(|d| d == line) {
            distinct.push(line.to_string());
        }
    }
    distinct
}
