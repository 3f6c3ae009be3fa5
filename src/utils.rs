//! Utility functions for output naming, entry-name sanitising and page ordering

use crate::config::FileCollisionAction;
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Get a unique path for a file, handling collisions according to the specified action
///
/// For `Rename`, `comic_repaired.cbz` becomes `comic_repaired (1).cbz`,
/// `comic_repaired (2).cbz` and so on. For `Skip`, an existing path is an error.
/// For `Overwrite`, the path is returned unchanged.
///
/// # Examples
///
/// ```
/// use comic_integrity::utils::get_unique_path;
/// use comic_integrity::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/does-not-exist/comic_repaired.cbz");
/// let unique = get_unique_path(path, FileCollisionAction::Rename).unwrap();
/// assert_eq!(unique, path);
/// ```
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<PathBuf> {
    match action {
        FileCollisionAction::Overwrite => Ok(path.to_path_buf()),
        FileCollisionAction::Skip => {
            if path.exists() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("{} already exists and collision action is Skip", path.display()),
                )));
            }
            Ok(path.to_path_buf())
        }
        FileCollisionAction::Rename => {
            if !path.exists() {
                return Ok(path.to_path_buf());
            }

            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| Error::Other(format!("cannot extract file stem of {}", path.display())))?;
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path.parent().ok_or_else(|| {
                Error::Other(format!("cannot extract parent directory of {}", path.display()))
            })?;

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(new_path);
                }
            }

            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!(
                    "could not find unique filename for {} after {} attempts",
                    path.display(),
                    MAX_RENAME_ATTEMPTS
                ),
            )))
        }
    }
}

/// Resolve where a file derived from `source` should be written
///
/// Like [`get_unique_path`], except the result is never `source` itself: a
/// candidate that resolves to the source is renamed whatever `action` says.
pub fn derived_output_path(
    source: &Path,
    candidate: &Path,
    action: FileCollisionAction,
) -> Result<PathBuf> {
    if is_same_file(source, candidate) {
        return get_unique_path(candidate, FileCollisionAction::Rename);
    }
    get_unique_path(candidate, action)
}

/// Whether two paths name the same file, following symlinks when both exist
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Sibling output path `{stem}{suffix}.{extension}` next to `original`
///
/// `extension` overrides the original extension when given.
pub fn sibling_path(original: &Path, suffix: &str, extension: Option<&str>) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    let ext = extension
        .map(str::to_string)
        .or_else(|| original.extension().map(|e| e.to_string_lossy().into_owned()));
    let name = match ext {
        Some(ext) if !ext.is_empty() => format!("{stem}{suffix}.{ext}"),
        _ => format!("{stem}{suffix}"),
    };
    original
        .parent()
        .map(|p| p.join(&name))
        .unwrap_or_else(|| PathBuf::from(&name))
}

/// ZIP-family extension to use when a container is repackaged as ZIP
///
/// Comic extensions stay comic extensions (`cbr`/`cb7` become `cbz`),
/// everything else becomes `zip`.
pub fn zip_family_extension(original: &Path) -> &'static str {
    let ext = original
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if ext.starts_with("cb") { "cbz" } else { "zip" }
}

/// Strip traversal and root components from an entry name
///
/// Returns `None` when nothing safe remains (e.g. an entry named `../..`).
pub fn sanitize_entry_name(name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    let sanitized: PathBuf = Path::new(&normalized)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    if sanitized.as_os_str().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Compare two names so that embedded numbers sort numerically (`2.png` < `10.png`)
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();

    loop {
        match (a_chars.peek().copied(), b_chars.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let na = take_number(&mut a_chars);
                let nb = take_number(&mut b_chars);
                let trimmed_a = na.trim_start_matches('0');
                let trimmed_b = nb.trim_start_matches('0');
                let ord = trimmed_a
                    .len()
                    .cmp(&trimmed_b.len())
                    .then_with(|| trimmed_a.cmp(trimmed_b))
                    .then_with(|| na.len().cmp(&nb.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                let ord = ca.to_ascii_lowercase().cmp(&cb.to_ascii_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                a_chars.next();
                b_chars.next();
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}
