//! Comic container fixtures

use std::io::Write;
use std::path::{Path, PathBuf};

/// Minimal PNG with the given dimensions
pub fn png_page(width: u32, height: u32) -> Vec<u8> {
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);

    let mut out = b"\x89PNG\r\n\x1a\n".to_vec();
    push_chunk(&mut out, b"IHDR", &ihdr);
    push_chunk(&mut out, b"IDAT", b"\x78\x9c\x63\x00\x00\x00\x01\x00\x01");
    push_chunk(&mut out, b"IEND", &[]);
    out
}

fn push_chunk(out: &mut Vec<u8>, kind: &[u8], data: &[u8]) {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Write a ZIP with stored (uncompressed) entries
pub fn write_stored_zip(path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).expect("create zip");
    let mut writer = zip::ZipWriter::new(file);
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).expect("start entry");
        writer.write_all(content).expect("write entry");
    }
    writer.finish().expect("finish zip");
}

/// A well-formed comic with three distinct PNG pages
pub fn clean_comic(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let pages: Vec<(String, Vec<u8>)> = (1..=3)
        .map(|n| (format!("page{:02}.png", n), png_page(1000 + n, 1500)))
        .collect();
    let files: Vec<(&str, &[u8])> = pages
        .iter()
        .map(|(n, d)| (n.as_str(), d.as_slice()))
        .collect();
    write_stored_zip(&path, &files);
    path
}

/// A comic whose `page02.png` data no longer matches its stored CRC
pub fn comic_with_bad_crc(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    write_stored_zip(
        &path,
        &[
            ("page01.png", b"intact page data"),
            ("page02.png", b"damaged page data"),
        ],
    );
    flip_first_byte_of(&path, b"damaged page");
    path
}

/// A comic cut off just before its central directory
pub fn truncated_comic(dir: &Path, name: &str) -> PathBuf {
    let path = clean_comic(dir, name);
    let bytes = std::fs::read(&path).expect("read zip");
    let central = bytes
        .windows(4)
        .position(|w| w == b"PK\x01\x02")
        .expect("central directory present");
    std::fs::write(&path, &bytes[..central]).expect("truncate zip");
    path
}

/// XOR the first byte of `needle` inside the file
pub fn flip_first_byte_of(path: &Path, needle: &[u8]) {
    let mut bytes = std::fs::read(path).expect("read file");
    let offset = bytes
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("needle present");
    bytes[offset] ^= 0xFF;
    std::fs::write(path, bytes).expect("write file");
}
