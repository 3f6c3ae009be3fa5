//! The integrity engine: validation, recovery and their shared state

use crate::cache::{AttemptLimiter, ValidationCache, content_hash};
use crate::checksum;
use crate::collaborators::{
    ArchiveContentExtractor, ComicInfoMetadataExtractor, ContentExtractor, MetadataExtractor,
};
use crate::config::ValidationConfig;
use crate::error::Result;
use crate::image::{HeaderImageDecoder, ImageDecoder};
use crate::progress::ProgressReporter;
use crate::recovery::{Recovery, RecoveryOptions};
use crate::types::{RecoveryResult, ValidationResult};
use crate::validation::Pipeline;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Validates comic containers and attempts bounded recovery
///
/// The validation cache and the attempt counters live inside the engine and
/// are shared by every clone, so one engine per importer session bounds
/// repeated work across concurrent callers.
///
/// # Examples
///
/// ```no_run
/// use comic_integrity::IntegrityEngine;
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = IntegrityEngine::new();
/// let path = Path::new("Saga 001.cbz");
///
/// let validation = engine.validate(path, true).await;
/// if !validation.repairable_issues.is_empty() {
///     let recovery = engine.recover(path, &validation, true).await;
///     for line in &recovery.recovery_log {
///         println!("{}", line);
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct IntegrityEngine {
    pipeline: Pipeline,
    cache: Arc<ValidationCache>,
    limiter: Arc<AttemptLimiter>,
}

impl Default for IntegrityEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrityEngine {
    /// Engine with the default configuration and collaborators
    pub fn new() -> Self {
        Self::build(Arc::new(ValidationConfig::default()))
    }

    /// Engine with a custom configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the configuration is unusable.
    pub fn with_config(config: ValidationConfig) -> Result<Self> {
        config.check()?;
        Ok(Self::build(Arc::new(config)))
    }

    fn build(config: Arc<ValidationConfig>) -> Self {
        let limiter = AttemptLimiter::new(config.max_recovery_attempts);
        Self {
            pipeline: Pipeline {
                content: Arc::new(ArchiveContentExtractor::new(Arc::clone(&config))),
                metadata: Arc::new(ComicInfoMetadataExtractor),
                images: Arc::new(HeaderImageDecoder),
                config,
            },
            cache: Arc::new(ValidationCache::new()),
            limiter: Arc::new(limiter),
        }
    }

    /// Replace the content extractor used by deep validation
    #[must_use]
    pub fn with_content_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.pipeline.content = extractor;
        self
    }

    /// Replace the metadata extractor
    #[must_use]
    pub fn with_metadata_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.pipeline.metadata = extractor;
        self
    }

    /// Replace the image decoder used by deep validation and image recovery
    #[must_use]
    pub fn with_image_decoder(mut self, decoder: Arc<dyn ImageDecoder>) -> Self {
        self.pipeline.images = decoder;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &ValidationConfig {
        &self.pipeline.config
    }

    /// Validate a file, serving repeat calls on unchanged content from the cache
    pub async fn validate(&self, path: &Path, deep: bool) -> ValidationResult {
        self.validate_with_progress(path, deep, &ProgressReporter::disabled())
            .await
    }

    /// [`validate`](Self::validate) publishing progress to `progress`
    pub async fn validate_with_progress(
        &self,
        path: &Path,
        deep: bool,
        progress: &ProgressReporter,
    ) -> ValidationResult {
        let hash = content_hash(path, self.pipeline.config.hash_chunk_size).await;
        if let Some(cached) = self.cache.get(&hash, deep).await {
            debug!(?path, %hash, deep, "validation cache hit");
            progress.set(1.0);
            return cached;
        }
        debug!(?path, %hash, deep, "validation cache miss");

        let result = self.pipeline.run(path, deep, progress).await;
        self.cache.insert(&hash, deep, result).await
    }

    /// Attempt recovery with the planned method
    pub async fn recover(
        &self,
        path: &Path,
        validation: &ValidationResult,
        create_backup: bool,
    ) -> RecoveryResult {
        let options = RecoveryOptions {
            create_backup,
            ..RecoveryOptions::default()
        };
        self.recover_with(path, validation, options).await
    }

    /// Attempt recovery with explicit options
    pub async fn recover_with(
        &self,
        path: &Path,
        validation: &ValidationResult,
        options: RecoveryOptions,
    ) -> RecoveryResult {
        Recovery {
            pipeline: &self.pipeline,
            limiter: &self.limiter,
        }
        .run(path, validation, &options)
        .await
    }

    /// Write a SHA-256 manifest for `files`, returning the number of lines
    pub async fn create_checksums(&self, files: &[PathBuf], output: &Path) -> Result<usize> {
        checksum::create_checksums(files, output, self.pipeline.config.hash_chunk_size).await
    }

    /// Verify every file listed in a manifest
    pub async fn verify_checksums(&self, manifest: &Path) -> Result<BTreeMap<PathBuf, bool>> {
        checksum::verify_checksums(manifest, self.pipeline.config.hash_chunk_size).await
    }

    /// Empty both the validation cache and the attempt counters
    pub async fn clear_validation_cache(&self) {
        self.cache.clear().await;
        self.limiter.clear().await;
    }

    /// Forget the recovery attempts recorded for this file's content
    pub async fn reset_recovery_attempts(&self, path: &Path) {
        let hash = content_hash(path, self.pipeline.config.hash_chunk_size).await;
        self.limiter.reset(&hash).await;
    }

    /// Recovery attempts recorded for this file's content
    pub async fn recovery_attempts(&self, path: &Path) -> u32 {
        let hash = content_hash(path, self.pipeline.config.hash_chunk_size).await;
        self.limiter.attempts(&hash).await
    }
}
