//! Image sanity checks without a pixel decoder
//!
//! Pages only need to prove that they carry a decodable header with positive
//! dimensions. [`HeaderImageDecoder`] parses the headers of the formats comic
//! containers actually use and can re-materialise PNG and JPEG streams.

/// Image decoding capability used by deep validation and image recovery
pub trait ImageDecoder: Send + Sync {
    /// Dimensions `(width, height)` when the header decodes with both > 0
    fn decode_header(&self, bytes: &[u8]) -> Option<(u32, u32)>;

    /// Re-encode a decodable stream, or `None` when the header does not decode
    fn reencode(&self, bytes: &[u8]) -> Option<Vec<u8>>;
}

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_SOI: &[u8] = b"\xff\xd8";
const JPEG_EOI: &[u8] = b"\xff\xd9";

/// Header-parsing decoder for PNG, JPEG, GIF, BMP and WebP
#[derive(Clone, Copy, Debug, Default)]
pub struct HeaderImageDecoder;

impl ImageDecoder for HeaderImageDecoder {
    fn decode_header(&self, bytes: &[u8]) -> Option<(u32, u32)> {
        let dims = if bytes.starts_with(PNG_SIGNATURE) {
            png_dimensions(bytes)
        } else if bytes.starts_with(JPEG_SOI) {
            jpeg_dimensions(bytes)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            gif_dimensions(bytes)
        } else if bytes.starts_with(b"BM") {
            bmp_dimensions(bytes)
        } else if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP") {
            webp_dimensions(bytes)
        } else {
            None
        };
        dims.filter(|&(w, h)| w > 0 && h > 0)
    }

    fn reencode(&self, bytes: &[u8]) -> Option<Vec<u8>> {
        self.decode_header(bytes)?;
        if bytes.starts_with(PNG_SIGNATURE) {
            Some(rewrite_png(bytes))
        } else if bytes.starts_with(JPEG_SOI) {
            Some(terminate_jpeg(bytes))
        } else {
            Some(bytes.to_vec())
        }
    }
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(raw))
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let raw: [u8; 2] = bytes.get(at..at + 2)?.try_into().ok()?;
    Some(u16::from_be_bytes(raw))
}

fn le_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let raw: [u8; 2] = bytes.get(at..at + 2)?.try_into().ok()?;
    Some(u16::from_le_bytes(raw))
}

fn le_u24(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at + 3)?;
    Some(u32::from(raw[0]) | u32::from(raw[1]) << 8 | u32::from(raw[2]) << 16)
}

fn le_i32(bytes: &[u8], at: usize) -> Option<i32> {
    let raw: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
    Some(i32::from_le_bytes(raw))
}

fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    // IHDR must be the first chunk
    if bytes.get(12..16) != Some(b"IHDR") {
        return None;
    }
    Some((be_u32(bytes, 16)?, be_u32(bytes, 20)?))
}

fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let mut pos = 2;
    loop {
        // Skip fill bytes before the marker
        while bytes.get(pos) == Some(&0xff) && bytes.get(pos + 1) == Some(&0xff) {
            pos += 1;
        }
        if bytes.get(pos) != Some(&0xff) {
            return None;
        }
        let marker = *bytes.get(pos + 1)?;
        match marker {
            0xd8 | 0x01 | 0xd0..=0xd7 => {
                pos += 2;
                continue;
            }
            0xd9 | 0xda => return None,
            _ => {}
        }

        let length = usize::from(be_u16(bytes, pos + 2)?);
        let is_sof = matches!(marker, 0xc0..=0xcf) && !matches!(marker, 0xc4 | 0xc8 | 0xcc);
        if is_sof {
            let height = be_u16(bytes, pos + 5)?;
            let width = be_u16(bytes, pos + 7)?;
            return Some((u32::from(width), u32::from(height)));
        }
        if length < 2 {
            return None;
        }
        pos += 2 + length;
    }
}

fn gif_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    Some((u32::from(le_u16(bytes, 6)?), u32::from(le_u16(bytes, 8)?)))
}

fn bmp_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let width = le_i32(bytes, 18)?;
    // Negative height means a top-down bitmap
    let height = le_i32(bytes, 22)?;
    Some((width.try_into().ok()?, height.unsigned_abs()))
}

fn webp_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    match bytes.get(12..16)? {
        b"VP8 " => {
            // Key frame start code precedes the 14-bit dimensions
            if bytes.get(23..26) != Some(b"\x9d\x01\x2a") {
                return None;
            }
            let width = le_u16(bytes, 26)? & 0x3fff;
            let height = le_u16(bytes, 28)? & 0x3fff;
            Some((u32::from(width), u32::from(height)))
        }
        b"VP8L" => {
            if bytes.get(20) != Some(&0x2f) {
                return None;
            }
            let b = bytes.get(21..25)?;
            let bits = u32::from(b[0]) | u32::from(b[1]) << 8 | u32::from(b[2]) << 16 | u32::from(b[3]) << 24;
            Some(((bits & 0x3fff) + 1, ((bits >> 14) & 0x3fff) + 1))
        }
        b"VP8X" => Some((le_u24(bytes, 24)? + 1, le_u24(bytes, 27)? + 1)),
        _ => None,
    }
}

/// Re-emit PNG chunks with recomputed CRCs, stopping at `IEND`
fn rewrite_png(bytes: &[u8]) -> Vec<u8> {
    let mut out = PNG_SIGNATURE.to_vec();
    let mut pos = PNG_SIGNATURE.len();

    while let Some(length) = be_u32(bytes, pos) {
        let length = length as usize;
        let Some(kind) = bytes.get(pos + 4..pos + 8) else {
            break;
        };
        let Some(data) = bytes.get(pos + 8..pos + 8 + length) else {
            // Truncated chunk
            break;
        };
        push_png_chunk(&mut out, kind, data);
        if kind == b"IEND" {
            return out;
        }
        pos += 12 + length;
    }

    push_png_chunk(&mut out, b"IEND", &[]);
    out
}

fn push_png_chunk(out: &mut Vec<u8>, kind: &[u8], data: &[u8]) {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Drop trailing bytes after the last EOI, or append one when it is missing
fn terminate_jpeg(bytes: &[u8]) -> Vec<u8> {
    match bytes.windows(2).rposition(|w| w == JPEG_EOI) {
        Some(end) if end >= 2 => bytes[..end + 2].to_vec(),
        _ => {
            let mut out = bytes.to_vec();
            out.extend_from_slice(JPEG_EOI);
            out
        }
    }
}
