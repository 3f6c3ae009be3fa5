//! Configuration types for comic-integrity

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Validation and recovery configuration
///
/// Every field has a default, so an empty JSON object is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum `recover()` calls per content hash (default: 3)
    #[serde(default = "default_max_recovery_attempts")]
    pub max_recovery_attempts: u32,

    /// Chunk size used when streaming a file through SHA-256 (default: 8192)
    #[serde(default = "default_hash_chunk_size")]
    pub hash_chunk_size: usize,

    /// Files larger than this are flagged as suspiciously large (default: 10 GiB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Deep validation is skipped for files larger than this (default: 2 GiB)
    ///
    /// `None` removes the cap and always extracts the whole container.
    #[serde(default = "default_max_deep_validation_bytes")]
    pub max_deep_validation_bytes: Option<u64>,

    /// Parent directory for scoped scratch directories (None = system temp dir)
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// Entry extensions treated as page images (lowercase, without dots)
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// How recovered and backup files avoid existing paths
    #[serde(default)]
    pub output_collision: FileCollisionAction,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_recovery_attempts: default_max_recovery_attempts(),
            hash_chunk_size: default_hash_chunk_size(),
            max_file_size: default_max_file_size(),
            max_deep_validation_bytes: default_max_deep_validation_bytes(),
            scratch_dir: None,
            image_extensions: default_image_extensions(),
            output_collision: FileCollisionAction::default(),
        }
    }
}

impl ValidationConfig {
    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.check()?;
        Ok(config)
    }

    /// Reject settings the engine cannot work with
    pub fn check(&self) -> Result<()> {
        if self.max_recovery_attempts == 0 {
            return Err(Error::config(
                "max_recovery_attempts must be at least 1",
                "max_recovery_attempts",
            ));
        }
        if self.hash_chunk_size == 0 {
            return Err(Error::config(
                "hash_chunk_size must be greater than zero",
                "hash_chunk_size",
            ));
        }
        if let Some(dir) = &self.scratch_dir
            && !dir.is_dir()
        {
            return Err(Error::config(
                format!("scratch_dir {} is not a directory", dir.display()),
                "scratch_dir",
            ));
        }
        Ok(())
    }

    /// Whether an entry name has one of the configured image extensions
    pub fn is_image_name(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                self.image_extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
            })
            .unwrap_or(false)
    }

    /// Create a scoped scratch directory, deleted when the handle drops
    pub fn scratch(&self, prefix: &str) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let dir = match &self.scratch_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

/// Output path collision handling strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to the file name (default)
    #[default]
    Rename,
    /// Overwrite the existing output file
    Overwrite,
    /// Refuse to write, failing the step
    Skip,
}

fn default_max_recovery_attempts() -> u32 {
    3
}

fn default_hash_chunk_size() -> usize {
    8192
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 * 1024 // 10 GiB
}

fn default_max_deep_validation_bytes() -> Option<u64> {
    Some(2 * 1024 * 1024 * 1024) // 2 GiB
}

fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "bmp", "webp", "avif", "heif", "heic"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
