//! Validation pipeline
//!
//! One run walks the fixed sequence of steps and collects every problem as a
//! [`ValidationIssue`]:
//!
//! 1. basic file checks (existence, readability, size); missing, unreadable
//!    and empty files stop the run here
//! 2. signature detection and extension cross-check
//! 3. structure validation for the detected container
//! 4. content validation, only when deep validation is requested
//! 5. light metadata validation
//! 6. integrity assessment and recommendations
//!
//! Steps 3-5 return `Result<Vec<ValidationIssue>>`; an `Err` becomes the
//! step's fallback issue so a damaged file never aborts the run.

mod basic;
mod content;
mod integrity;
mod metadata;
mod structure;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use integrity::{assess, recommendations};

use crate::collaborators::{ContentExtractor, MetadataExtractor};
use crate::config::ValidationConfig;
use crate::image::ImageDecoder;
use crate::progress::ProgressReporter;
use crate::types::{IssueSeverity, IssueType, ValidationIssue, ValidationResult};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEEP_VALIDATION_SKIPPED: &str =
    "Deep validation was skipped because the file exceeds the configured size budget";

/// Settings and collaborators shared by every validation run
#[derive(Clone)]
pub(crate) struct Pipeline {
    pub(crate) config: Arc<ValidationConfig>,
    pub(crate) content: Arc<dyn ContentExtractor>,
    pub(crate) metadata: Arc<dyn MetadataExtractor>,
    pub(crate) images: Arc<dyn ImageDecoder>,
}

impl Pipeline {
    /// Run every step against `path` and assemble the result
    pub(crate) async fn run(
        &self,
        path: &Path,
        deep: bool,
        progress: &ProgressReporter,
    ) -> ValidationResult {
        progress.set(0.0);
        let mut issues = Vec::new();
        let mut notes = Vec::new();

        let file = basic::check_file(path, &self.config).await;
        issues.extend(file.issues);
        progress.set(0.2);
        if file.halt {
            debug!(?path, "basic checks failed, stopping validation");
            return self.finish(path, issues, notes, progress);
        }

        let format = basic::check_format(path, &mut issues);
        progress.set(0.4);
        let Some(format) = format else {
            return self.finish(path, issues, notes, progress);
        };

        match structure::validate(path, format).await {
            Ok(found) => issues.extend(found),
            Err(e) => {
                warn!(?path, %format, error = %e, "structure validation failed");
                issues.push(
                    ValidationIssue::new(
                        IssueType::StructureDamage,
                        IssueSeverity::High,
                        format!("Archive structure could not be read: {}", e),
                    )
                    .at(path.display().to_string())
                    .with_fix("Rebuild the archive from its readable entries")
                    .repairable(),
                );
            }
        }
        progress.set(0.6);

        if deep {
            let over_budget = self
                .config
                .max_deep_validation_bytes
                .is_some_and(|limit| file.size > limit);
            if over_budget {
                warn!(?path, size = file.size, "skipping deep validation, file over budget");
                notes.push(DEEP_VALIDATION_SKIPPED.to_string());
            } else {
                let checked = content::validate(
                    path,
                    &self.config,
                    self.content.as_ref(),
                    self.images.as_ref(),
                )
                .await;
                match checked {
                    Ok(found) => issues.extend(found),
                    Err(e) => {
                        warn!(?path, error = %e, "content validation failed");
                        issues.push(
                            ValidationIssue::new(
                                IssueType::CorruptedArchive,
                                IssueSeverity::High,
                                format!("Content could not be extracted: {}", e),
                            )
                            .at(path.display().to_string()),
                        );
                    }
                }
            }
            progress.set(0.8);
        }

        match metadata::validate(path, self.metadata.as_ref()).await {
            Ok(found) => issues.extend(found),
            Err(e) => {
                warn!(?path, error = %e, "metadata validation failed");
                issues.push(
                    ValidationIssue::new(
                        IssueType::MetadataCorruption,
                        IssueSeverity::Medium,
                        format!("Metadata could not be read: {}", e),
                    )
                    .at(path.display().to_string())
                    .repairable(),
                );
            }
        }
        progress.set(0.9);

        self.finish(path, issues, notes, progress)
    }

    fn finish(
        &self,
        path: &Path,
        issues: Vec<ValidationIssue>,
        notes: Vec<String>,
        progress: &ProgressReporter,
    ) -> ValidationResult {
        let integrity = assess(&issues);
        let mut advice = recommendations(&issues, &integrity);
        for note in notes {
            if !advice.contains(&note) {
                advice.push(note);
            }
        }
        progress.set(1.0);

        let result = ValidationResult::new(issues, integrity, advice);
        info!(
            ?path,
            valid = result.is_valid,
            issues = result.issues.len(),
            repairable = result.repairable_issues.len(),
            corruption = ?result.file_integrity.corruption_level,
            "validation finished"
        );
        result
    }
}
