use crate::collaborators::MetadataExtractor;
use crate::error::Result;
use crate::types::{IssueSeverity, IssueType, ValidationIssue};
use std::path::Path;

/// Light metadata read; errors and a blank title become `METADATA_CORRUPTION`
pub(crate) async fn validate(
    path: &Path,
    extractor: &dyn MetadataExtractor,
) -> Result<Vec<ValidationIssue>> {
    let metadata = extractor.extract_light(path).await?;
    let location = path.display().to_string();

    let mut issues: Vec<_> = metadata
        .extraction_errors
        .into_iter()
        .map(|error| {
            ValidationIssue::new(
                IssueType::MetadataCorruption,
                IssueSeverity::Low,
                format!("Metadata extraction error: {}", error),
            )
            .at(location.clone())
            .repairable()
        })
        .collect();

    if metadata.title.trim().is_empty() {
        issues.push(
            ValidationIssue::new(
                IssueType::MetadataCorruption,
                IssueSeverity::Low,
                "Title is missing",
            )
            .at(location)
            .with_fix("Derive title from file name")
            .repairable(),
        );
    }

    Ok(issues)
}
