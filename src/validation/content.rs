//! Deep validation: extract every page and check that it decodes

use crate::collaborators::ContentExtractor;
use crate::config::ValidationConfig;
use crate::error::Result;
use crate::image::ImageDecoder;
use crate::types::{IssueSeverity, IssueType, ValidationIssue};
use std::path::Path;
use tracing::{debug, warn};

pub(crate) async fn validate(
    path: &Path,
    config: &ValidationConfig,
    extractor: &dyn ContentExtractor,
    images: &dyn ImageDecoder,
) -> Result<Vec<ValidationIssue>> {
    // Dropping the handle removes the directory on every return path
    let scratch = config.scratch("comic-validate-")?;
    debug!(?path, scratch = ?scratch.path(), extractor = extractor.name(), "deep validation");

    let outcome = extractor.extract(path, scratch.path()).await?;

    let mut issues = Vec::new();
    if outcome.pages.is_empty() {
        issues.push(
            ValidationIssue::new(
                IssueType::MissingFiles,
                IssueSeverity::High,
                "No pages could be extracted",
            )
            .at(path.display().to_string()),
        );
    }

    for page in &outcome.pages {
        let name = page
            .strip_prefix(scratch.path())
            .unwrap_or(page)
            .to_string_lossy()
            .into_owned();
        let decodes = match tokio::fs::read(page).await {
            Ok(bytes) => images.decode_header(&bytes).is_some(),
            Err(e) => {
                debug!(page = %name, error = %e, "extracted page unreadable");
                false
            }
        };
        if !decodes {
            issues.push(
                ValidationIssue::new(
                    IssueType::CorruptedImages,
                    IssueSeverity::Medium,
                    format!("Page {} is not a valid image", name),
                )
                .at(name)
                .with_fix("Run image recovery")
                .repairable(),
            );
        }
    }

    for error in outcome.errors {
        issues.push(
            ValidationIssue::new(IssueType::CorruptedArchive, IssueSeverity::Medium, error)
                .at(path.display().to_string())
                .repairable(),
        );
    }

    if let Err(e) = scratch.close() {
        warn!(?path, error = %e, "failed to remove validation scratch directory");
    }
    Ok(issues)
}
