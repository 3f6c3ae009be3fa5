use super::rar::{RarArchiveReader, RarPass};
use crate::error::{ArchiveError, Error, Result};
use crate::recovery::RecoveryLog;
use crate::types::ArchiveFormat;
use crate::utils::sanitize_entry_name;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// `Write` sink that only accumulates a CRC32
#[derive(Clone, Default)]
pub struct CrcWriter {
    hasher: crc32fast::Hasher,
}

impl CrcWriter {
    /// Fresh CRC32 state
    pub fn new() -> Self {
        Self::default()
    }

    /// CRC32 of everything written so far
    pub fn crc(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

impl Write for CrcWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.hasher.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Whether a reader error reports a checksum failure rather than unreadable data
pub(crate) fn is_checksum_error(e: &std::io::Error) -> bool {
    e.to_string().to_lowercase().contains("checksum")
}

/// An entry written to disk by [`force_extract`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedEntry {
    /// Sanitized, de-duplicated entry name (`/`-separated)
    pub name: String,
    /// Where the entry's data was written
    pub path: PathBuf,
}

/// Extract every readable entry, skipping the ones that fail
///
/// Never fails as a whole: problems are recorded in `log` and the entries
/// that could be read are returned in container order. Runs blocking I/O.
pub fn force_extract(
    archive: &Path,
    format: ArchiveFormat,
    out_dir: &Path,
    log: &mut RecoveryLog,
) -> Vec<ExtractedEntry> {
    if let Err(e) = std::fs::create_dir_all(out_dir) {
        log.push(format!("Failed to create extraction directory: {}", e));
        return Vec::new();
    }

    let mut sink = EntrySink::new(out_dir);
    match format {
        ArchiveFormat::Zip => force_extract_zip(archive, &mut sink, log),
        ArchiveFormat::Rar | ArchiveFormat::Rar5 => force_extract_rar(archive, &mut sink, log),
        ArchiveFormat::SevenZ => force_extract_7z(archive, &mut sink, log),
        ArchiveFormat::Other(_) => {
            log.push(format!("Forced extraction is not supported for {} files", format));
        }
    }

    info!(
        ?archive,
        %format,
        extracted = sink.entries.len(),
        "forced extraction finished"
    );
    log.push(format!("Extracted {} readable entries", sink.entries.len()));
    sink.entries
}

fn force_extract_zip(archive: &Path, sink: &mut EntrySink, log: &mut RecoveryLog) {
    let file = match File::open(archive) {
        Ok(file) => file,
        Err(e) => {
            log.push(format!("Failed to open archive: {}", e));
            return;
        }
    };

    let mut zip = match ::zip::ZipArchive::new(BufReader::new(file)) {
        Ok(zip) => zip,
        Err(e) => {
            log.push(format!(
                "Central directory unreadable ({}), scanning local headers",
                e
            ));
            scan_zip_local_headers(archive, sink, log);
            return;
        }
    };

    for index in 0..zip.len() {
        let mut entry = match zip.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                log.push(format!("Skipped entry #{}: {}", index, e));
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let mut data = Vec::new();
        match entry.read_to_end(&mut data) {
            Ok(_) => sink.write(&name, &data, log),
            Err(e) => log.push(format!("Skipped entry {}: {}", name, e)),
        }
    }
}

/// Walk local file headers front to back, for archives whose central directory is gone
fn scan_zip_local_headers(archive: &Path, sink: &mut EntrySink, log: &mut RecoveryLog) {
    let file = match File::open(archive) {
        Ok(file) => file,
        Err(e) => {
            log.push(format!("Failed to reopen archive: {}", e));
            return;
        }
    };
    let mut reader = BufReader::new(file);

    loop {
        let mut entry = match ::zip::read::read_zipfile_from_stream(&mut reader) {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                log.push(format!("Stopped scanning at damaged local header: {}", e));
                break;
            }
        };
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let mut data = Vec::new();
        if let Err(e) = entry.read_to_end(&mut data) {
            // The stream position is unknown after a failed read
            log.push(format!("Stopped scanning at entry {}: {}", name, e));
            break;
        }
        sink.write(&name, &data, log);
    }
}

fn force_extract_rar(archive: &Path, sink: &mut EntrySink, log: &mut RecoveryLog) {
    let walked = RarArchiveReader::walk(
        archive,
        RarPass::Read,
        |_, header| !header.is_directory(),
        |_, name, data| match data {
            Ok(data) => sink.write(name, &data, log),
            Err(e) => log.push(format!("Skipped entry {}: {}", name, e)),
        },
    );

    if let Err(reason) = walked {
        log.push(format!("Stopped at damaged RAR header: {}", reason));
    }
}

fn force_extract_7z(archive: &Path, sink: &mut EntrySink, log: &mut RecoveryLog) {
    let mut reader = match sevenz_rust::SevenZReader::open(archive, sevenz_rust::Password::empty())
    {
        Ok(reader) => reader,
        Err(e) => {
            log.push(format!("Failed to open 7z archive: {}", e));
            return;
        }
    };

    let walked = reader.for_each_entries(|entry, data| {
        if entry.is_directory {
            return Ok(true);
        }
        let mut buffer = Vec::new();
        match data.read_to_end(&mut buffer) {
            Ok(_) => sink.write(&entry.name, &buffer, log),
            Err(e) => log.push(format!("Skipped entry {}: {}", entry.name, e)),
        }
        Ok(true)
    });

    if let Err(e) = walked {
        log.push(format!("Stopped walking 7z entries: {}", e));
    }
}

/// Writes extracted entries under one directory with sanitized, unique names
struct EntrySink {
    out_dir: PathBuf,
    seen: HashSet<String>,
    entries: Vec<ExtractedEntry>,
}

impl EntrySink {
    fn new(out_dir: &Path) -> Self {
        Self {
            out_dir: out_dir.to_path_buf(),
            seen: HashSet::new(),
            entries: Vec::new(),
        }
    }

    fn write(&mut self, name: &str, data: &[u8], log: &mut RecoveryLog) {
        let Some(relative) = sanitize_entry_name(name) else {
            warn!(entry = name, "skipping entry with unsafe path");
            log.push(format!("Skipped entry with unsafe name: {}", name));
            return;
        };
        let relative = self.unique_name(&relative.to_string_lossy().replace('\\', "/"));
        let path = self.out_dir.join(&relative);

        let written = path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(&path, data));
        match written {
            Ok(()) => {
                debug!(entry = %relative, bytes = data.len(), "extracted entry");
                self.entries.push(ExtractedEntry {
                    name: relative,
                    path,
                });
            }
            Err(e) => log.push(format!("Failed to write entry {}: {}", relative, e)),
        }
    }

    /// `page.png`, `page (1).png`, `page (2).png`, ... compared case-insensitively
    fn unique_name(&mut self, name: &str) -> String {
        if self.seen.insert(name.to_lowercase()) {
            return name.to_string();
        }

        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => {
                (stem.to_string(), Some(ext))
            }
            _ => (name.to_string(), None),
        };
        let mut counter = 1;
        loop {
            let candidate = match ext {
                Some(ext) => format!("{} ({}).{}", stem, counter, ext),
                None => format!("{} ({})", stem, counter),
            };
            if self.seen.insert(candidate.to_lowercase()) {
                return candidate;
            }
            counter += 1;
        }
    }
}

/// Write extracted entries into a fresh ZIP container at `output`
///
/// Returns the number of entries written.
pub fn repackage_as_zip(
    entries: &[ExtractedEntry],
    output: &Path,
    log: &mut RecoveryLog,
) -> Result<usize> {
    let write_failed = |reason: String| {
        Error::Archive(ArchiveError::WriteFailed {
            archive: output.to_path_buf(),
            reason,
        })
    };

    let file = File::create(output).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("failed to create {}: {}", output.display(), e),
        ))
    })?;
    let mut writer = ::zip::ZipWriter::new(file);

    for entry in entries {
        let size = std::fs::metadata(&entry.path).map(|m| m.len()).unwrap_or(0);
        let options = ::zip::write::FileOptions::default()
            .compression_method(::zip::CompressionMethod::Deflated)
            .large_file(size > u64::from(u32::MAX));

        writer
            .start_file(entry.name.as_str(), options)
            .map_err(|e| write_failed(format!("failed to start entry {}: {}", entry.name, e)))?;
        let mut source = File::open(&entry.path).map_err(|e| {
            write_failed(format!("failed to reopen extracted {}: {}", entry.name, e))
        })?;
        std::io::copy(&mut source, &mut writer)
            .map_err(|e| write_failed(format!("failed to write entry {}: {}", entry.name, e)))?;
    }

    writer
        .finish()
        .map_err(|e| write_failed(format!("failed to finish archive: {}", e)))?;

    log.push(format!(
        "Repackaged {} entries into {}",
        entries.len(),
        output.display()
    ));
    Ok(entries.len())
}
