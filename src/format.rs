//! Container format detection from the file signature
//!
//! The extension is never trusted here; callers compare the detected format's
//! extension family against the actual extension separately.

use crate::types::{ArchiveFormat, OtherFormat};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Number of header bytes read for signature matching
pub const HEADER_LEN: usize = 16;

const ZIP_LOCAL: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY: &[u8] = b"PK\x05\x06";
const ZIP_SPANNED: &[u8] = b"PK\x07\x08";
const RAR5: &[u8] = b"Rar!\x1a\x07\x01\x00";
const RAR4: &[u8] = b"Rar!\x1a\x07\x00";
const SEVEN_Z: &[u8] = b"7z\xbc\xaf\x27\x1c";
const GZIP: &[u8] = b"\x1f\x8b";
const BZIP2: &[u8] = b"BZh";
const PDF: &[u8] = b"%PDF";

/// Detect the container format of a file by its signature
///
/// Returns `None` when the file cannot be read or no signature matches.
pub fn detect_format(path: &Path) -> Option<ArchiveFormat> {
    let mut header = [0u8; HEADER_LEN];
    let read = match read_header(path, &mut header) {
        Ok(n) => n,
        Err(e) => {
            debug!(?path, error = %e, "failed to read header for format detection");
            return None;
        }
    };
    let format = detect_from_bytes(&header[..read]);
    debug!(?path, ?format, "detected container format");
    format
}

/// Match a header against the known signatures
pub fn detect_from_bytes(header: &[u8]) -> Option<ArchiveFormat> {
    if header.starts_with(ZIP_LOCAL) || header.starts_with(ZIP_EMPTY) || header.starts_with(ZIP_SPANNED)
    {
        Some(ArchiveFormat::Zip)
    } else if header.starts_with(RAR5) {
        Some(ArchiveFormat::Rar5)
    } else if header.starts_with(RAR4) {
        Some(ArchiveFormat::Rar)
    } else if header.starts_with(SEVEN_Z) {
        Some(ArchiveFormat::SevenZ)
    } else if header.starts_with(GZIP) {
        Some(ArchiveFormat::Other(OtherFormat::Gzip))
    } else if header.starts_with(BZIP2) {
        Some(ArchiveFormat::Other(OtherFormat::Bzip2))
    } else if header.starts_with(PDF) {
        Some(ArchiveFormat::Other(OtherFormat::Pdf))
    } else {
        None
    }
}

/// Whether the file's extension belongs to the detected format family
pub fn extension_matches(path: &Path, format: ArchiveFormat) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            format.extensions().contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn read_header(path: &Path, header: &mut [u8]) -> std::io::Result<usize> {
    let mut file = std::fs::File::open(path)?;
    let mut filled = 0;
    while filled < header.len() {
        let n = file.read(&mut header[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
