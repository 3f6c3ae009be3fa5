//! Core types: issue taxonomy, validation and recovery results, container formats

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Category of a detected problem
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    /// The container or one of its entries cannot be read
    CorruptedArchive,
    /// The file, or the pages it should contain, are missing
    MissingFiles,
    /// Unknown signature, or signature and extension disagree
    InvalidFormat,
    /// An extracted page does not decode as an image
    CorruptedImages,
    /// Embedded metadata is unreadable or incomplete
    MetadataCorruption,
    /// Text encoding problems in names or metadata
    EncodingIssues,
    /// The file cannot be read with the current permissions
    PermissionIssues,
    /// Empty or implausibly large file
    SizeMismatch,
    /// Entry data does not match its stored checksum
    ChecksumMismatch,
    /// The container structure could not be walked at all
    StructureDamage,
}

impl IssueType {
    /// Stable upper-case name, as used in logs and serialized output
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::CorruptedArchive => "CORRUPTED_ARCHIVE",
            IssueType::MissingFiles => "MISSING_FILES",
            IssueType::InvalidFormat => "INVALID_FORMAT",
            IssueType::CorruptedImages => "CORRUPTED_IMAGES",
            IssueType::MetadataCorruption => "METADATA_CORRUPTION",
            IssueType::EncodingIssues => "ENCODING_ISSUES",
            IssueType::PermissionIssues => "PERMISSION_ISSUES",
            IssueType::SizeMismatch => "SIZE_MISMATCH",
            IssueType::ChecksumMismatch => "CHECKSUM_MISMATCH",
            IssueType::StructureDamage => "STRUCTURE_DAMAGE",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of an issue, ordered `Info < Low < Medium < High < Critical`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueSeverity {
    /// Informational only
    Info,
    /// Minor problem
    Low,
    /// Moderate problem
    Medium,
    /// Serious problem affecting functionality
    High,
    /// The file is unreadable
    Critical,
}

/// Five-point summary of how damaged a file is, derived from its issues
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorruptionLevel {
    /// No issues
    None,
    /// A handful of issues
    Minimal,
    /// More than five issues
    Moderate,
    /// More than three high-severity issues
    Severe,
    /// At least one critical issue
    Critical,
}

/// A single problem found during validation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Issue category
    pub issue_type: IssueType,
    /// Issue severity
    pub severity: IssueSeverity,
    /// Human-readable description
    pub description: String,
    /// File or entry the issue refers to
    pub location: Option<String>,
    /// Suggested manual fix
    pub suggested_fix: Option<String>,
    /// Whether an automated recovery method addresses this issue
    pub auto_repairable: bool,
}

impl ValidationIssue {
    /// Create a non-repairable issue without location or suggested fix
    pub fn new(
        issue_type: IssueType,
        severity: IssueSeverity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            issue_type,
            severity,
            description: description.into(),
            location: None,
            suggested_fix: None,
            auto_repairable: false,
        }
    }

    /// Attach a location (file path or entry name)
    #[must_use]
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Attach a suggested fix
    #[must_use]
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    /// Mark the issue as automatically repairable
    #[must_use]
    pub fn repairable(mut self) -> Self {
        self.auto_repairable = true;
        self
    }
}

/// Per-family integrity flags plus the derived corruption level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIntegrityStatus {
    /// No `CHECKSUM_MISMATCH` issue present
    pub checksum_valid: bool,
    /// No `STRUCTURE_DAMAGE` issue present
    pub structure_valid: bool,
    /// No `CORRUPTED_IMAGES` issue present
    pub content_valid: bool,
    /// No `METADATA_CORRUPTION` issue present
    pub metadata_valid: bool,
    /// Derived corruption level
    pub corruption_level: CorruptionLevel,
}

/// Outcome of validating one file
///
/// Built once by the validation pipeline and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// `true` iff no issue is `Critical`
    pub is_valid: bool,
    /// Every issue found, in discovery order
    pub issues: Vec<ValidationIssue>,
    /// The subset of `issues` with `auto_repairable == true`
    pub repairable_issues: Vec<ValidationIssue>,
    /// Aggregated integrity flags
    pub file_integrity: FileIntegrityStatus,
    /// Human-readable recommendations, de-duplicated
    pub recommendations: Vec<String>,
}

impl ValidationResult {
    /// Assemble a result, deriving `is_valid` and `repairable_issues` from `issues`
    pub fn new(
        issues: Vec<ValidationIssue>,
        file_integrity: FileIntegrityStatus,
        recommendations: Vec<String>,
    ) -> Self {
        let is_valid = !issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Critical);
        let repairable_issues = issues
            .iter()
            .filter(|i| i.auto_repairable)
            .cloned()
            .collect();
        Self {
            is_valid,
            issues,
            repairable_issues,
            file_integrity,
            recommendations,
        }
    }

    /// Whether any issue has the given type
    pub fn has_issue(&self, issue_type: IssueType) -> bool {
        self.issues.iter().any(|i| i.issue_type == issue_type)
    }
}

/// Named repair strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryMethod {
    /// No recovery attempted
    None,
    /// Re-materialize the bytes so checksums are recomputed consistently
    ChecksumRepair,
    /// Force-extract readable entries and repackage them
    StructureRebuild,
    /// Keep whatever entries can be extracted and repackage them
    PartialExtraction,
    /// Attach synthesized metadata to a copy
    MetadataReconstruction,
    /// Re-encode decodable images and repackage
    ImageRecovery,
    /// Format-specific container repair
    ArchiveRepair,
    /// Restore from a conventional sibling backup
    BackupRestore,
}

impl fmt::Display for RecoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryMethod::None => "NONE",
            RecoveryMethod::ChecksumRepair => "CHECKSUM_REPAIR",
            RecoveryMethod::StructureRebuild => "STRUCTURE_REBUILD",
            RecoveryMethod::PartialExtraction => "PARTIAL_EXTRACTION",
            RecoveryMethod::MetadataReconstruction => "METADATA_RECONSTRUCTION",
            RecoveryMethod::ImageRecovery => "IMAGE_RECOVERY",
            RecoveryMethod::ArchiveRepair => "ARCHIVE_REPAIR",
            RecoveryMethod::BackupRestore => "BACKUP_RESTORE",
        };
        f.write_str(name)
    }
}

/// Outcome of one `recover()` call
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryResult {
    /// `true` only if a recovered file was produced and exists
    pub success: bool,
    /// The newly created file (never the original input)
    pub recovered_file: Option<PathBuf>,
    /// The method that ran
    pub recovery_method: RecoveryMethod,
    /// Repairable issues that no longer appear after re-validation
    pub issues_fixed: Vec<ValidationIssue>,
    /// Issues still present (all original issues when recovery failed)
    pub remaining_issues: Vec<ValidationIssue>,
    /// Human-readable trail of every step
    pub recovery_log: Vec<String>,
}

impl RecoveryResult {
    /// A failed result carrying every original issue as remaining
    pub fn failed(
        method: RecoveryMethod,
        validation: &ValidationResult,
        recovery_log: Vec<String>,
    ) -> Self {
        Self {
            success: false,
            recovered_file: None,
            recovery_method: method,
            issues_fixed: Vec::new(),
            remaining_issues: validation.issues.clone(),
            recovery_log,
        }
    }
}

/// Container format detected from the file signature
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    /// ZIP family (.zip, .cbz)
    Zip,
    /// RAR 1.5-4.x family (.rar, .cbr)
    Rar,
    /// RAR 5 family (.rar, .cbr)
    Rar5,
    /// 7-Zip family (.7z, .cb7)
    SevenZ,
    /// Recognized signature without a structural reader
    Other(OtherFormat),
}

/// Signatures that are recognized but only get the generic open probe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtherFormat {
    /// gzip stream (e.g. .tar.gz)
    Gzip,
    /// bzip2 stream (e.g. .tar.bz2)
    Bzip2,
    /// PDF document
    Pdf,
}

impl ArchiveFormat {
    /// Lowercase file extensions that belong to this format family
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ArchiveFormat::Zip => &["cbz", "zip"],
            ArchiveFormat::Rar | ArchiveFormat::Rar5 => &["cbr", "rar"],
            ArchiveFormat::SevenZ => &["cb7", "7z"],
            ArchiveFormat::Other(OtherFormat::Gzip) => &["gz", "tgz"],
            ArchiveFormat::Other(OtherFormat::Bzip2) => &["bz2", "tbz2"],
            ArchiveFormat::Other(OtherFormat::Pdf) => &["pdf"],
        }
    }

    /// ZIP-family container
    pub fn is_zip(&self) -> bool {
        matches!(self, ArchiveFormat::Zip)
    }

    /// Either RAR generation
    pub fn is_rar(&self) -> bool {
        matches!(self, ArchiveFormat::Rar | ArchiveFormat::Rar5)
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArchiveFormat::Zip => "ZIP",
            ArchiveFormat::Rar => "RAR",
            ArchiveFormat::Rar5 => "RAR5",
            ArchiveFormat::SevenZ => "7Z",
            ArchiveFormat::Other(OtherFormat::Gzip) => "GZIP",
            ArchiveFormat::Other(OtherFormat::Bzip2) => "BZIP2",
            ArchiveFormat::Other(OtherFormat::Pdf) => "PDF",
        };
        f.write_str(name)
    }
}
