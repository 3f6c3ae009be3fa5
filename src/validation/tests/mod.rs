use super::*;
use crate::collaborators::{
    ArchiveContentExtractor, ComicInfoMetadataExtractor, LightMetadata, MetadataExtractor,
};
use crate::error::Error;
use crate::image::HeaderImageDecoder;
use crate::image::tests::tiny_png;
use crate::recovery::plan;
use crate::types::{CorruptionLevel, RecoveryMethod};
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn pipeline_with(config: ValidationConfig) -> Pipeline {
    let config = Arc::new(config);
    Pipeline {
        content: Arc::new(ArchiveContentExtractor::new(Arc::clone(&config))),
        metadata: Arc::new(ComicInfoMetadataExtractor),
        images: Arc::new(HeaderImageDecoder),
        config,
    }
}

fn pipeline() -> Pipeline {
    pipeline_with(ValidationConfig::default())
}

fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

fn clean_comic(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let page = tiny_png(800, 1200);
    write_zip(&path, &[("001.png", &page), ("002.png", &page)]);
    path
}

/// Smallest well-formed 7z container: a header database with no files
fn write_empty_7z(path: &Path) {
    // kHeader, kEnd
    let next_header = [0x01u8, 0x00];
    let mut start_header = Vec::new();
    start_header.extend_from_slice(&0u64.to_le_bytes());
    start_header.extend_from_slice(&(next_header.len() as u64).to_le_bytes());
    start_header.extend_from_slice(&crc32fast::hash(&next_header).to_le_bytes());

    let mut bytes = b"7z\xbc\xaf\x27\x1c\x00\x04".to_vec();
    bytes.extend_from_slice(&crc32fast::hash(&start_header).to_le_bytes());
    bytes.extend_from_slice(&start_header);
    bytes.extend_from_slice(&next_header);
    std::fs::write(path, bytes).unwrap();
}

fn critical_archive_issues(result: &ValidationResult) -> usize {
    result
        .issues
        .iter()
        .filter(|i| {
            i.issue_type == IssueType::CorruptedArchive && i.severity == IssueSeverity::Critical
        })
        .count()
}

fn types_of(result: &ValidationResult) -> Vec<IssueType> {
    result.issues.iter().map(|i| i.issue_type).collect()
}

fn issue(issue_type: IssueType, severity: IssueSeverity) -> ValidationIssue {
    ValidationIssue::new(issue_type, severity, "test issue")
}

struct FailingMetadata;

#[async_trait]
impl MetadataExtractor for FailingMetadata {
    async fn extract_light(&self, _file: &Path) -> crate::error::Result<LightMetadata> {
        Err(Error::Other("metadata backend offline".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

// ---------------------------------------------------------------------------
// Basic checks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_missing_file_is_critical_and_halts() {
    let dir = TempDir::new().unwrap();
    let result = pipeline()
        .run(&dir.path().join("absent.cbz"), true, &ProgressReporter::disabled())
        .await;

    assert!(!result.is_valid);
    assert_eq!(types_of(&result), vec![IssueType::MissingFiles]);
    assert_eq!(result.issues[0].severity, IssueSeverity::Critical);
    assert_eq!(
        result.file_integrity.corruption_level,
        CorruptionLevel::Critical
    );
}

#[tokio::test]
async fn test_empty_file_is_a_single_critical_size_issue() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.cbz");
    std::fs::write(&path, b"").unwrap();

    let result = pipeline()
        .run(&path, true, &ProgressReporter::disabled())
        .await;

    assert!(!result.is_valid);
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].issue_type, IssueType::SizeMismatch);
    assert_eq!(result.issues[0].severity, IssueSeverity::Critical);
    assert!(result.repairable_issues.is_empty());
}

#[tokio::test]
async fn test_directory_is_not_a_comic() {
    let dir = TempDir::new().unwrap();
    let result = pipeline()
        .run(dir.path(), false, &ProgressReporter::disabled())
        .await;
    assert!(!result.is_valid);
    assert!(result.has_issue(IssueType::MissingFiles));
}

#[tokio::test]
async fn test_oversized_file_is_flagged_medium() {
    let dir = TempDir::new().unwrap();
    let path = clean_comic(dir.path(), "big.cbz");
    let config = ValidationConfig {
        max_file_size: 16,
        ..ValidationConfig::default()
    };

    let result = pipeline_with(config)
        .run(&path, false, &ProgressReporter::disabled())
        .await;

    let size = result
        .issues
        .iter()
        .find(|i| i.issue_type == IssueType::SizeMismatch)
        .unwrap();
    assert_eq!(size.severity, IssueSeverity::Medium);
    assert!(result.is_valid);
}

// ---------------------------------------------------------------------------
// Format and structure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_clean_comic_has_no_issues() {
    let dir = TempDir::new().unwrap();
    let path = clean_comic(dir.path(), "Saga 001.cbz");

    let result = pipeline()
        .run(&path, true, &ProgressReporter::disabled())
        .await;

    assert!(result.is_valid, "{:?}", result.issues);
    assert!(result.issues.is_empty(), "{:?}", result.issues);
    assert_eq!(result.file_integrity.corruption_level, CorruptionLevel::None);
    assert!(result.file_integrity.checksum_valid);
    assert!(result.file_integrity.content_valid);
    assert_eq!(result.recommendations, vec!["File is in excellent condition"]);
}

#[tokio::test]
async fn test_unknown_signature_is_invalid_format() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.cbz");
    std::fs::write(&path, b"just some text, not a container").unwrap();

    let result = pipeline()
        .run(&path, true, &ProgressReporter::disabled())
        .await;

    assert_eq!(types_of(&result), vec![IssueType::InvalidFormat]);
    assert_eq!(result.issues[0].severity, IssueSeverity::High);
    assert!(result.is_valid);
}

#[tokio::test]
async fn test_extension_mismatch_is_repairable_medium() {
    let dir = TempDir::new().unwrap();
    let path = clean_comic(dir.path(), "mislabelled.cbr");

    let result = pipeline()
        .run(&path, false, &ProgressReporter::disabled())
        .await;

    let mismatch = result
        .issues
        .iter()
        .find(|i| i.issue_type == IssueType::InvalidFormat)
        .unwrap();
    assert_eq!(mismatch.severity, IssueSeverity::Medium);
    assert!(mismatch.auto_repairable);
    assert!(mismatch.suggested_fix.as_deref().unwrap().contains(".cbz"));
}

#[tokio::test]
async fn test_flipped_entry_data_is_a_checksum_mismatch() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flipped.cbz");
    write_zip(
        &path,
        &[("001.png", b"first page bytes"), ("002.png", b"second page bytes")],
    );
    let mut bytes = std::fs::read(&path).unwrap();
    let offset = bytes
        .windows(b"second page".len())
        .position(|w| w == b"second page")
        .unwrap();
    bytes[offset] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    let result = pipeline()
        .run(&path, false, &ProgressReporter::disabled())
        .await;

    let mismatch = result
        .issues
        .iter()
        .find(|i| i.issue_type == IssueType::ChecksumMismatch)
        .unwrap();
    assert_eq!(mismatch.severity, IssueSeverity::High);
    assert!(mismatch.auto_repairable);
    assert_eq!(mismatch.location.as_deref(), Some("002.png"));
    assert!(!result.file_integrity.checksum_valid);
    assert!(result.is_valid);
}

#[tokio::test]
async fn test_zip_without_central_directory_is_structure_damage() {
    let dir = TempDir::new().unwrap();
    let path = clean_comic(dir.path(), "cut.cbz");
    let bytes = std::fs::read(&path).unwrap();
    let central = bytes.windows(4).position(|w| w == b"PK\x01\x02").unwrap();
    std::fs::write(&path, &bytes[..central]).unwrap();

    let result = pipeline()
        .run(&path, false, &ProgressReporter::disabled())
        .await;

    let damage = result
        .issues
        .iter()
        .find(|i| i.issue_type == IssueType::StructureDamage)
        .unwrap();
    assert_eq!(damage.severity, IssueSeverity::High);
    assert!(damage.auto_repairable);
    assert!(!result.file_integrity.structure_valid);
}

#[tokio::test]
async fn test_directory_only_zip_is_missing_files() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hollow.cbz");
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    writer
        .add_directory("pages/", ::zip::write::FileOptions::default())
        .unwrap();
    writer.finish().unwrap();

    let result = pipeline()
        .run(&path, false, &ProgressReporter::disabled())
        .await;

    let missing: Vec<_> = result
        .issues
        .iter()
        .filter(|i| i.issue_type == IssueType::MissingFiles)
        .collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].severity, IssueSeverity::High);
    assert!(!missing[0].auto_repairable);
    assert!(result.repairable_issues.is_empty());
    assert_eq!(plan(&result), RecoveryMethod::PartialExtraction);
}

#[tokio::test]
async fn test_empty_zip_is_critical_corrupted_archive() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nothing.cbz");
    ::zip::ZipWriter::new(std::fs::File::create(&path).unwrap())
        .finish()
        .unwrap();
    assert!(std::fs::read(&path).unwrap().starts_with(b"PK\x05\x06"));

    let result = pipeline()
        .run(&path, false, &ProgressReporter::disabled())
        .await;

    assert_eq!(critical_archive_issues(&result), 1);
    assert!(!result.is_valid);
    assert_eq!(plan(&result), RecoveryMethod::ArchiveRepair);
}

#[tokio::test]
async fn test_empty_seven_zip_is_critical_corrupted_archive() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nothing.cb7");
    write_empty_7z(&path);

    let result = pipeline()
        .run(&path, false, &ProgressReporter::disabled())
        .await;

    assert_eq!(critical_archive_issues(&result), 1);
    assert!(!result.is_valid);
    assert_eq!(plan(&result), RecoveryMethod::ArchiveRepair);
}

#[tokio::test]
async fn test_many_page_seven_zip_validates_clean() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("pages");
    std::fs::create_dir_all(&source).unwrap();
    for n in 1..=30 {
        std::fs::write(source.join(format!("{:03}.png", n)), tiny_png(600 + n, 900)).unwrap();
    }
    let path = dir.path().join("omnibus.cb7");
    sevenz_rust::compress_to_path(&source, &path).unwrap();

    let shallow = pipeline()
        .run(&path, false, &ProgressReporter::disabled())
        .await;
    assert!(shallow.issues.is_empty(), "{:?}", shallow.issues);

    let deep = pipeline()
        .run(&path, true, &ProgressReporter::disabled())
        .await;
    assert!(deep.issues.is_empty(), "{:?}", deep.issues);
    assert!(deep.file_integrity.content_valid);
}

// ---------------------------------------------------------------------------
// Deep validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_undecodable_page_is_corrupted_image() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbled.cbz");
    let page = tiny_png(800, 1200);
    write_zip(
        &path,
        &[("001.png", &page), ("002.png", b"definitely not an image")],
    );

    let shallow = pipeline()
        .run(&path, false, &ProgressReporter::disabled())
        .await;
    assert!(!shallow.has_issue(IssueType::CorruptedImages));

    let deep = pipeline()
        .run(&path, true, &ProgressReporter::disabled())
        .await;
    let corrupted: Vec<_> = deep
        .issues
        .iter()
        .filter(|i| i.issue_type == IssueType::CorruptedImages)
        .collect();
    assert_eq!(corrupted.len(), 1);
    assert_eq!(corrupted[0].severity, IssueSeverity::Medium);
    assert_eq!(corrupted[0].location.as_deref(), Some("002.png"));
    assert!(!deep.file_integrity.content_valid);
}

#[tokio::test]
async fn test_deep_validation_without_pages_is_missing_files() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("textonly.cbz");
    write_zip(&path, &[("readme.txt", b"no pages here")]);

    let result = pipeline()
        .run(&path, true, &ProgressReporter::disabled())
        .await;

    let missing = result
        .issues
        .iter()
        .find(|i| i.issue_type == IssueType::MissingFiles)
        .unwrap();
    assert_eq!(missing.severity, IssueSeverity::High);
    assert!(!missing.auto_repairable);
}

#[tokio::test]
async fn test_deep_validation_over_budget_is_skipped_with_note() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("budget.cbz");
    write_zip(&path, &[("001.png", b"not an image at all")]);
    let config = ValidationConfig {
        max_deep_validation_bytes: Some(8),
        ..ValidationConfig::default()
    };

    let result = pipeline_with(config)
        .run(&path, true, &ProgressReporter::disabled())
        .await;

    assert!(!result.has_issue(IssueType::CorruptedImages));
    assert!(
        result
            .recommendations
            .iter()
            .any(|r| r == DEEP_VALIDATION_SKIPPED)
    );
}

#[tokio::test]
async fn test_deep_validation_leaves_no_scratch_behind() {
    let dir = TempDir::new().unwrap();
    let scratch_parent = TempDir::new().unwrap();
    let path = clean_comic(dir.path(), "tidy.cbz");
    let config = ValidationConfig {
        scratch_dir: Some(scratch_parent.path().to_path_buf()),
        ..ValidationConfig::default()
    };

    pipeline_with(config)
        .run(&path, true, &ProgressReporter::disabled())
        .await;

    let leftovers = std::fs::read_dir(scratch_parent.path()).unwrap().count();
    assert_eq!(leftovers, 0);
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_blank_title_is_low_repairable_metadata_issue() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("untitled.cbz");
    let page = tiny_png(10, 10);
    write_zip(
        &path,
        &[
            ("001.png", &page),
            ("ComicInfo.xml", b"<ComicInfo><Title>  </Title></ComicInfo>"),
        ],
    );

    let result = pipeline()
        .run(&path, false, &ProgressReporter::disabled())
        .await;

    let missing_title = result
        .issues
        .iter()
        .find(|i| i.description == "Title is missing")
        .unwrap();
    assert_eq!(missing_title.issue_type, IssueType::MetadataCorruption);
    assert_eq!(missing_title.severity, IssueSeverity::Low);
    assert!(missing_title.auto_repairable);
    assert!(!result.file_integrity.metadata_valid);
}

#[tokio::test]
async fn test_failing_metadata_extractor_becomes_medium_issue() {
    let dir = TempDir::new().unwrap();
    let path = clean_comic(dir.path(), "fine.cbz");
    let mut pipeline = pipeline();
    pipeline.metadata = Arc::new(FailingMetadata);

    let result = pipeline
        .run(&path, false, &ProgressReporter::disabled())
        .await;

    assert_eq!(types_of(&result), vec![IssueType::MetadataCorruption]);
    assert_eq!(result.issues[0].severity, IssueSeverity::Medium);
    assert!(result.issues[0].description.contains("metadata backend offline"));
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_progress_ends_at_one() {
    let dir = TempDir::new().unwrap();
    let path = clean_comic(dir.path(), "progress.cbz");
    let (reporter, receiver) = ProgressReporter::channel();

    pipeline().run(&path, true, &reporter).await;
    assert_eq!(*receiver.borrow(), 1.0);

    reporter.set(0.0);
    pipeline()
        .run(&dir.path().join("gone.cbz"), true, &reporter)
        .await;
    assert_eq!(*receiver.borrow(), 1.0);
}

// ---------------------------------------------------------------------------
// Assessment
// ---------------------------------------------------------------------------

#[test]
fn test_assess_levels() {
    assert_eq!(assess(&[]).corruption_level, CorruptionLevel::None);

    let minimal = vec![issue(IssueType::MetadataCorruption, IssueSeverity::Low)];
    assert_eq!(assess(&minimal).corruption_level, CorruptionLevel::Minimal);

    let moderate = vec![issue(IssueType::CorruptedImages, IssueSeverity::Medium); 6];
    assert_eq!(assess(&moderate).corruption_level, CorruptionLevel::Moderate);

    let severe = vec![issue(IssueType::ChecksumMismatch, IssueSeverity::High); 4];
    assert_eq!(assess(&severe).corruption_level, CorruptionLevel::Severe);

    let mut critical = severe.clone();
    critical.push(issue(IssueType::SizeMismatch, IssueSeverity::Critical));
    assert_eq!(assess(&critical).corruption_level, CorruptionLevel::Critical);
}

#[test]
fn test_three_high_issues_are_not_severe() {
    let issues = vec![issue(IssueType::StructureDamage, IssueSeverity::High); 3];
    assert_eq!(assess(&issues).corruption_level, CorruptionLevel::Minimal);
}

#[test]
fn test_assess_flags_follow_issue_families() {
    let status = assess(&[
        issue(IssueType::ChecksumMismatch, IssueSeverity::High),
        issue(IssueType::MetadataCorruption, IssueSeverity::Low),
    ]);
    assert!(!status.checksum_valid);
    assert!(!status.metadata_valid);
    assert!(status.structure_valid);
    assert!(status.content_valid);
}

#[test]
fn test_recommendations_are_deduplicated() {
    let issues = vec![
        issue(IssueType::CorruptedImages, IssueSeverity::Medium),
        issue(IssueType::CorruptedImages, IssueSeverity::Medium),
        issue(IssueType::MetadataCorruption, IssueSeverity::Low),
    ];
    let advice = recommendations(&issues, &assess(&issues));

    assert_eq!(
        advice,
        vec![
            "Minor issues found; automatic repair is recommended",
            "Try image recovery",
            "Rebuild metadata from the file name",
        ]
    );
}

#[test]
fn test_critical_recommendations_point_at_backups() {
    let issues = vec![issue(IssueType::MissingFiles, IssueSeverity::Critical)];
    let advice = recommendations(&issues, &assess(&issues));
    assert!(advice.iter().any(|a| a.contains("backup copy")));
}
