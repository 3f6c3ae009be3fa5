//! Capabilities consumed by the validators

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Pages produced by a content extractor
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionOutcome {
    /// Extracted page images, in reading order
    pub pages: Vec<PathBuf>,
    /// One message per entry that could not be extracted
    pub errors: Vec<String>,
}

/// Metadata read in lightweight mode
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LightMetadata {
    /// Title; blank when the metadata declares none
    pub title: String,
    /// Problems encountered while reading the metadata
    pub extraction_errors: Vec<String>,
}

/// Turns a container into a sequence of page images on disk
///
/// # Errors
///
/// `extract` fails only when the container cannot be processed at all;
/// per-page problems are reported through [`ExtractionOutcome::errors`].
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Extract the pages of `file` into `output_dir`
    async fn extract(&self, file: &Path, output_dir: &Path) -> crate::Result<ExtractionOutcome>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Reads the descriptive metadata embedded in a container
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Read metadata without extracting pages
    async fn extract_light(&self, file: &Path) -> crate::Result<LightMetadata>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
