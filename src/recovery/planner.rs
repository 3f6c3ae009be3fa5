use crate::types::{IssueSeverity, IssueType, RecoveryMethod, ValidationResult};

/// Choose one recovery method for a validation result, first matching rule wins
///
/// 1. critical `CORRUPTED_ARCHIVE` → `ARCHIVE_REPAIR`
/// 2. high `CHECKSUM_MISMATCH` → `CHECKSUM_REPAIR`
/// 3. high `STRUCTURE_DAMAGE` → `STRUCTURE_REBUILD`
/// 4. any `CORRUPTED_IMAGES` → `IMAGE_RECOVERY`
/// 5. any `METADATA_CORRUPTION` → `METADATA_RECONSTRUCTION`
/// 6. any `MISSING_FILES` → `PARTIAL_EXTRACTION`
/// 7. otherwise `NONE`
///
/// `BACKUP_RESTORE` is never planned; callers request it explicitly.
pub fn plan(validation: &ValidationResult) -> RecoveryMethod {
    let has = |issue_type: IssueType, severity: Option<IssueSeverity>| {
        validation
            .issues
            .iter()
            .any(|i| i.issue_type == issue_type && severity.is_none_or(|s| i.severity == s))
    };

    if has(IssueType::CorruptedArchive, Some(IssueSeverity::Critical)) {
        RecoveryMethod::ArchiveRepair
    } else if has(IssueType::ChecksumMismatch, Some(IssueSeverity::High)) {
        RecoveryMethod::ChecksumRepair
    } else if has(IssueType::StructureDamage, Some(IssueSeverity::High)) {
        RecoveryMethod::StructureRebuild
    } else if has(IssueType::CorruptedImages, None) {
        RecoveryMethod::ImageRecovery
    } else if has(IssueType::MetadataCorruption, None) {
        RecoveryMethod::MetadataReconstruction
    } else if has(IssueType::MissingFiles, None) {
        RecoveryMethod::PartialExtraction
    } else {
        RecoveryMethod::None
    }
}
