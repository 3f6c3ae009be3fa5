//! Blocking recovery algorithms
//!
//! Each executor writes a new sibling file and returns its path, or `None`
//! when it could not produce one. The original input is only ever read.

use super::RecoveryLog;
use crate::collaborators::{COMIC_INFO_NAME, escape_xml};
use crate::config::ValidationConfig;
use crate::error::{ArchiveError, Error, Result};
use crate::extraction::{force_extract, repackage_as_zip};
use crate::image::ImageDecoder;
use crate::types::{ArchiveFormat, RecoveryMethod};
use crate::utils::{derived_output_path, sibling_path, zip_family_extension};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a blocking executor needs, owned so it can cross `spawn_blocking`
pub(crate) struct ExecutionContext {
    pub(crate) config: Arc<ValidationConfig>,
    pub(crate) images: Arc<dyn ImageDecoder>,
    pub(crate) source: PathBuf,
    pub(crate) format: Option<ArchiveFormat>,
}

impl ExecutionContext {
    fn output_path(&self, suffix: &str, extension: Option<&str>) -> Result<PathBuf> {
        derived_output_path(
            &self.source,
            &sibling_path(&self.source, suffix, extension),
            self.config.output_collision,
        )
    }

    fn require_format(&self, log: &mut RecoveryLog) -> Option<ArchiveFormat> {
        if self.format.is_none() {
            log.push("Container format could not be detected");
        }
        self.format
    }
}

/// Run one of the file-producing methods
pub(crate) fn execute(
    method: RecoveryMethod,
    ctx: &ExecutionContext,
    log: &mut RecoveryLog,
) -> Result<Option<PathBuf>> {
    debug!(source = ?ctx.source, %method, "running recovery executor");
    match method {
        RecoveryMethod::ChecksumRepair => checksum_repair(ctx, log),
        RecoveryMethod::StructureRebuild => {
            log.push("Starting archive structure rebuild");
            rebuild(ctx, "_rebuilt", log)
        }
        RecoveryMethod::PartialExtraction => {
            log.push("Starting partial extraction");
            rebuild(ctx, "_partial", log)
        }
        RecoveryMethod::MetadataReconstruction => metadata_reconstruction(ctx, log),
        RecoveryMethod::ImageRecovery => image_recovery(ctx, log),
        RecoveryMethod::ArchiveRepair => archive_repair(ctx, log),
        RecoveryMethod::BackupRestore | RecoveryMethod::None => {
            log.push(format!("{} does not produce a file directly", method));
            Ok(None)
        }
    }
}

fn copy_to(ctx: &ExecutionContext, suffix: &str) -> Result<PathBuf> {
    let output = ctx.output_path(suffix, None)?;
    std::fs::copy(&ctx.source, &output).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("failed to copy {} to {}: {}", ctx.source.display(), output.display(), e),
        ))
    })?;
    Ok(output)
}

fn checksum_repair(ctx: &ExecutionContext, log: &mut RecoveryLog) -> Result<Option<PathBuf>> {
    log.push("Starting checksum repair");
    let output = copy_to(ctx, "_repaired")?;
    log.push(format!("Checksums recalculated in {}", output.display()));
    Ok(Some(output))
}

/// Force-extract readable entries and repackage them as a fresh ZIP
fn rebuild(ctx: &ExecutionContext, suffix: &str, log: &mut RecoveryLog) -> Result<Option<PathBuf>> {
    let Some(format) = ctx.require_format(log) else {
        return Ok(None);
    };
    let scratch = ctx.config.scratch("comic-recover-")?;

    let entries = force_extract(&ctx.source, format, scratch.path(), log);
    if entries.is_empty() {
        log.push("No entries could be extracted");
        return Ok(None);
    }

    let output = ctx.output_path(suffix, Some(zip_family_extension(&ctx.source)))?;
    if let Err(e) = repackage_as_zip(&entries, &output, log) {
        log.push(format!("Failed to create new archive: {}", e));
        remove_partial_output(&output);
        return Ok(None);
    }

    info!(source = ?ctx.source, ?output, entries = entries.len(), "container rebuilt");
    log.push(format!("Rebuilt archive with {} entries", entries.len()));
    Ok(Some(output))
}

fn remove_partial_output(output: &Path) {
    if let Err(e) = std::fs::remove_file(output)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(?output, error = %e, "failed to remove partial output");
    }
}

fn metadata_reconstruction(ctx: &ExecutionContext, log: &mut RecoveryLog) -> Result<Option<PathBuf>> {
    log.push("Starting metadata reconstruction");
    let output = ctx.output_path("_metadata_fixed", None)?;
    let comic_info = synthesize_comic_info(&ctx.source);

    if ctx.format.is_some_and(|f| f.is_zip()) {
        match write_with_comic_info(&ctx.source, &output, &comic_info) {
            Ok(copied) => {
                log.push(format!(
                    "Metadata added to archive ({} entries carried over)",
                    copied
                ));
                return Ok(Some(output));
            }
            Err(e) => {
                warn!(source = ?ctx.source, error = %e, "failed to attach metadata");
                log.push(format!("Failed to attach metadata: {}", e));
            }
        }
    } else {
        log.push("Metadata can only be attached to ZIP-family containers");
    }

    std::fs::copy(&ctx.source, &output)?;
    log.push(format!("Kept a plain copy at {}", output.display()));
    Ok(Some(output))
}

/// Minimal `ComicInfo.xml` derived from the file name and size
pub(crate) fn synthesize_comic_info(source: &Path) -> String {
    let title = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = source
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let size = std::fs::metadata(source).map(|m| m.len()).unwrap_or(0);
    let now = chrono::Utc::now().to_rfc3339();

    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <ComicInfo xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\">\n  \
         <Title>{}</Title>\n  \
         <Notes>Reconstructed from {} ({} bytes) on {}</Notes>\n\
         </ComicInfo>\n",
        escape_xml(&title),
        escape_xml(&name),
        size,
        now
    )
}

/// Copy every entry verbatim except an existing ComicInfo.xml, then add the new one
fn write_with_comic_info(source: &Path, output: &Path, comic_info: &str) -> Result<usize> {
    let mut archive = zip::ZipArchive::new(BufReader::new(File::open(source)?)).map_err(|e| {
        Error::Archive(ArchiveError::OpenFailed {
            archive: source.to_path_buf(),
            reason: e.to_string(),
        })
    })?;

    let written = rewrite_zip(&mut archive, output, comic_info);
    if written.is_err() {
        remove_partial_output(output);
    }
    written
}

fn rewrite_zip(
    archive: &mut zip::ZipArchive<BufReader<File>>,
    output: &Path,
    comic_info: &str,
) -> Result<usize> {
    let write_failed = |reason: String| {
        Error::Archive(ArchiveError::WriteFailed {
            archive: output.to_path_buf(),
            reason,
        })
    };

    let mut writer = zip::ZipWriter::new(File::create(output)?);
    let mut copied = 0;
    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(|e| write_failed(format!("entry #{} unreadable: {}", index, e)))?;
        let is_comic_info = Path::new(entry.name())
            .file_name()
            .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(COMIC_INFO_NAME));
        if is_comic_info {
            continue;
        }
        writer
            .raw_copy_file(entry)
            .map_err(|e| write_failed(e.to_string()))?;
        copied += 1;
    }

    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    writer
        .start_file(COMIC_INFO_NAME, options)
        .map_err(|e| write_failed(e.to_string()))?;
    writer.write_all(comic_info.as_bytes())?;
    writer.finish().map_err(|e| write_failed(e.to_string()))?;
    Ok(copied)
}

fn image_recovery(ctx: &ExecutionContext, log: &mut RecoveryLog) -> Result<Option<PathBuf>> {
    log.push("Starting image recovery");
    let Some(format) = ctx.require_format(log) else {
        return Ok(None);
    };
    let scratch = ctx.config.scratch("comic-recover-")?;

    let entries = force_extract(&ctx.source, format, scratch.path(), log);
    if entries.is_empty() {
        log.push("No entries could be extracted");
        return Ok(None);
    }

    let mut recovered = 0;
    for entry in entries.iter().filter(|e| ctx.config.is_image_name(&e.name)) {
        let bytes = match std::fs::read(&entry.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log.push(format!("Could not read image {}: {}", entry.name, e));
                continue;
            }
        };
        match ctx.images.reencode(&bytes) {
            Some(reencoded) => {
                std::fs::write(&entry.path, reencoded)?;
                recovered += 1;
                log.push(format!("Image recovered: {}", entry.name));
            }
            None => log.push(format!(
                "Could not recover image {}, keeping original bytes",
                entry.name
            )),
        }
    }

    let output = ctx.output_path("_images_fixed", Some(zip_family_extension(&ctx.source)))?;
    if let Err(e) = repackage_as_zip(&entries, &output, log) {
        log.push(format!("Failed to create new archive: {}", e));
        remove_partial_output(&output);
        return Ok(None);
    }

    log.push(format!("Images recovered: {}", recovered));
    Ok(Some(output))
}

fn archive_repair(ctx: &ExecutionContext, log: &mut RecoveryLog) -> Result<Option<PathBuf>> {
    log.push("Starting archive repair");
    match ctx.format {
        Some(format @ (ArchiveFormat::Zip | ArchiveFormat::SevenZ)) => {
            let output = copy_to(ctx, "_repaired")?;
            log.push(format!("{} archive copied for repair", format));
            Ok(Some(output))
        }
        Some(ArchiveFormat::Rar | ArchiveFormat::Rar5) => {
            log.push("RAR repair requires external tools and is not supported");
            Ok(None)
        }
        Some(format) => {
            log.push(format!("Archive repair is not supported for {} files", format));
            Ok(None)
        }
        None => {
            log.push("Archive repair is not supported for unrecognized files");
            Ok(None)
        }
    }
}

/// Copy the original to `{stem}.backup`; failures are logged, never fatal
pub(crate) async fn create_backup(
    source: &Path,
    config: &ValidationConfig,
    log: &mut RecoveryLog,
) -> Option<PathBuf> {
    let target = match derived_output_path(
        source,
        &sibling_path(source, "", Some("backup")),
        config.output_collision,
    ) {
        Ok(target) => target,
        Err(e) => {
            log.push(format!("Failed to create backup: {}", e));
            return None;
        }
    };

    match tokio::fs::copy(source, &target).await {
        Ok(_) => {
            log.push(format!("Created backup: {}", target.display()));
            Some(target)
        }
        Err(e) => {
            warn!(?source, ?target, error = %e, "backup failed");
            log.push(format!("Failed to create backup: {}", e));
            None
        }
    }
}

/// Conventional backup locations, probed in order
pub(crate) fn backup_candidates(source: &Path) -> Vec<PathBuf> {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = source.parent().unwrap_or_else(|| Path::new(""));
    vec![
        sibling_path(source, "", Some("backup")),
        parent.join(format!("backup_{}", name)),
        parent.join(".backup").join(&name),
    ]
}

/// Copy a validated backup to `{stem}_restored.{ext}`
pub(crate) async fn restore_copy(
    source: &Path,
    backup: &Path,
    config: &ValidationConfig,
) -> Result<PathBuf> {
    let output = derived_output_path(
        source,
        &sibling_path(source, "_restored", None),
        config.output_collision,
    )?;
    tokio::fs::copy(backup, &output).await?;
    Ok(output)
}
