//! SHA-256 checksum manifests
//!
//! One line per file: `<sha256-hex>  <absolute-path>`, lines joined by `\n`.

use crate::cache::sha256_file;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

const SEPARATOR: &str = "  ";

/// Hash every file and write the manifest to `output`
///
/// Returns the number of lines written. Fails if any file cannot be hashed.
pub async fn create_checksums(files: &[PathBuf], output: &Path, chunk_size: usize) -> Result<usize> {
    let files = files.to_vec();
    let lines = spawn_blocking(move || -> Result<Vec<String>> {
        files
            .iter()
            .map(|file| -> Result<String> {
                let absolute = std::path::absolute(file)?;
                let digest = sha256_file(&absolute, chunk_size).map_err(|e| {
                    Error::Io(std::io::Error::new(
                        e.kind(),
                        format!("failed to hash {}: {}", absolute.display(), e),
                    ))
                })?;
                Ok(format!("{}{}{}", digest, SEPARATOR, absolute.display()))
            })
            .collect()
    })
    .await??;

    tokio::fs::write(output, lines.join("\n")).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("failed to write checksum manifest: {}", e),
        ))
    })?;

    info!(?output, files = lines.len(), "checksum manifest written");
    Ok(lines.len())
}

/// Re-hash every file listed in a manifest
///
/// Malformed lines are skipped; missing or unreadable files map to `false`.
pub async fn verify_checksums(manifest: &Path, chunk_size: usize) -> Result<BTreeMap<PathBuf, bool>> {
    let raw = tokio::fs::read_to_string(manifest).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read checksum manifest: {}", e),
        ))
    })?;

    let mut expected = Vec::new();
    for (number, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(entry) => expected.push(entry),
            None => warn!(?manifest, line = number + 1, "skipping malformed checksum line"),
        }
    }

    let results = spawn_blocking(move || {
        expected
            .into_iter()
            .map(|(digest, path)| {
                let matches = match sha256_file(&path, chunk_size) {
                    Ok(actual) => actual.eq_ignore_ascii_case(&digest),
                    Err(e) => {
                        debug!(?path, error = %e, "listed file unreadable");
                        false
                    }
                };
                (path, matches)
            })
            .collect::<BTreeMap<_, _>>()
    })
    .await?;

    info!(
        ?manifest,
        files = results.len(),
        mismatched = results.values().filter(|ok| !**ok).count(),
        "checksum manifest verified"
    );
    Ok(results)
}

fn parse_line(line: &str) -> Option<(String, PathBuf)> {
    let (digest, path) = line.split_once(SEPARATOR)?;
    let is_hex = digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit());
    if !is_hex || path.is_empty() {
        return None;
    }
    Some((digest.to_string(), PathBuf::from(path)))
}
