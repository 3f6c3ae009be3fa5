//! Default content extractor backed by the container readers

use super::traits::{ContentExtractor, ExtractionOutcome};
use crate::config::ValidationConfig;
use crate::error::{ArchiveError, Error, Result};
use crate::extraction::open_reader;
use crate::format::detect_format;
use crate::utils::{natural_cmp, sanitize_entry_name};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tracing::{debug, info};

/// Extracts every non-directory entry through [`crate::extraction::ArchiveReader`]
///
/// Pages are the extracted entries whose extension is a configured image
/// extension, sorted in natural order.
pub struct ArchiveContentExtractor {
    config: Arc<ValidationConfig>,
}

impl ArchiveContentExtractor {
    /// Create an extractor using the image extensions from `config`
    pub fn new(config: Arc<ValidationConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ContentExtractor for ArchiveContentExtractor {
    async fn extract(&self, file: &Path, output_dir: &Path) -> Result<ExtractionOutcome> {
        let format = detect_format(file).ok_or_else(|| {
            Error::Archive(ArchiveError::UnsupportedFormat {
                archive: file.to_path_buf(),
                format: "unknown signature".to_string(),
            })
        })?;

        let config = Arc::clone(&self.config);
        let file_owned = file.to_path_buf();
        let output_owned = output_dir.to_path_buf();
        let outcome =
            spawn_blocking(move || extract_blocking(&file_owned, format, &output_owned, &config))
                .await??;

        info!(
            ?file,
            pages = outcome.pages.len(),
            errors = outcome.errors.len(),
            "content extraction finished"
        );
        Ok(outcome)
    }

    fn name(&self) -> &'static str {
        "archive"
    }
}

fn extract_blocking(
    file: &Path,
    format: crate::types::ArchiveFormat,
    output_dir: &Path,
    config: &ValidationConfig,
) -> Result<ExtractionOutcome> {
    std::fs::create_dir_all(output_dir).map_err(|e| {
        Error::Io(std::io::Error::other(format!(
            "failed to create output directory: {}",
            e
        )))
    })?;

    let mut reader = open_reader(file, format)?;
    let entries = reader.list_entries()?;

    let mut pages: Vec<(String, PathBuf)> = Vec::new();
    let mut errors = Vec::new();

    let mut wanted = Vec::new();
    for entry in entries.iter().filter(|e| !e.is_dir) {
        if entry.corrupted {
            errors.push(format!("{}: entry header is damaged", entry.name));
            continue;
        }
        if sanitize_entry_name(&entry.name).is_none() {
            errors.push(format!("{}: unsafe entry name", entry.name));
            continue;
        }
        wanted.push(entry.clone());
    }

    reader.read_all(&wanted, &mut |entry, data| {
        let data = match data {
            Ok(data) => data,
            Err(e) => {
                debug!(entry = %entry.name, error = %e, "entry extraction failed");
                errors.push(format!("{}: {}", entry.name, e));
                return;
            }
        };
        let Some(relative) = sanitize_entry_name(&entry.name) else {
            return;
        };

        let target = output_dir.join(&relative);
        let written = target
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(&target, &data));
        if let Err(e) = written {
            errors.push(format!("{}: failed to write extracted data: {}", entry.name, e));
            return;
        }

        if config.is_image_name(&entry.name) {
            pages.push((relative.to_string_lossy().into_owned(), target));
        }
    });

    pages.sort_by(|a, b| natural_cmp(&a.0, &b.0));
    Ok(ExtractionOutcome {
        pages: pages.into_iter().map(|(_, path)| path).collect(),
        errors,
    })
}
