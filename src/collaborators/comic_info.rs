//! Default metadata extractor reading `ComicInfo.xml`

use super::traits::{LightMetadata, MetadataExtractor};
use crate::error::Result;
use crate::extraction::open_reader;
use crate::format::detect_format;
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tokio::task::spawn_blocking;
use tracing::debug;

/// Name of the metadata entry, matched case-insensitively in any folder
pub const COMIC_INFO_NAME: &str = "ComicInfo.xml";

/// Reads the title from a container's `ComicInfo.xml`
///
/// Containers without a `ComicInfo.xml` get their file stem as title.
#[derive(Clone, Copy, Debug, Default)]
pub struct ComicInfoMetadataExtractor;

#[async_trait]
impl MetadataExtractor for ComicInfoMetadataExtractor {
    async fn extract_light(&self, file: &Path) -> Result<LightMetadata> {
        let file_owned = file.to_path_buf();
        let metadata = spawn_blocking(move || read_light(&file_owned)).await?;
        debug!(
            ?file,
            title = %metadata.title,
            errors = metadata.extraction_errors.len(),
            "read light metadata"
        );
        Ok(metadata)
    }

    fn name(&self) -> &'static str {
        "comic-info"
    }
}

fn title_pattern() -> Option<&'static Regex> {
    static TITLE: OnceLock<Option<Regex>> = OnceLock::new();
    TITLE
        .get_or_init(|| Regex::new(r"(?is)<Title>(.*?)</Title>").ok())
        .as_ref()
}

fn root_pattern() -> Option<&'static Regex> {
    static ROOT: OnceLock<Option<Regex>> = OnceLock::new();
    ROOT.get_or_init(|| Regex::new(r"(?i)<ComicInfo[\s>/]").ok())
        .as_ref()
}

fn file_stem(file: &Path) -> String {
    file.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_light(file: &Path) -> LightMetadata {
    let stem_only = |errors: Vec<String>| LightMetadata {
        title: file_stem(file),
        extraction_errors: errors,
    };

    let Some(format) = detect_format(file) else {
        return stem_only(vec!["unrecognized container format".to_string()]);
    };
    if matches!(format, crate::types::ArchiveFormat::Other(_)) {
        return stem_only(Vec::new());
    }

    let mut reader = match open_reader(file, format) {
        Ok(reader) => reader,
        Err(e) => return stem_only(vec![format!("cannot open container: {}", e)]),
    };
    let entries = match reader.list_entries() {
        Ok(entries) => entries,
        Err(e) => return stem_only(vec![format!("cannot list entries: {}", e)]),
    };

    let Some(entry) = entries.iter().find(|e| {
        !e.is_dir
            && Path::new(&e.name.replace('\\', "/"))
                .file_name()
                .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(COMIC_INFO_NAME))
    }) else {
        return stem_only(Vec::new());
    };

    let raw = match reader.open_entry(entry) {
        Ok(raw) => raw,
        Err(e) => return stem_only(vec![format!("cannot read {}: {}", COMIC_INFO_NAME, e)]),
    };
    let Ok(xml) = String::from_utf8(raw) else {
        return stem_only(vec![format!("{} is not valid UTF-8", COMIC_INFO_NAME)]);
    };

    parse_comic_info(&xml, file)
}

/// Extract the title from `ComicInfo.xml` text
///
/// A missing or empty `<Title>` yields a blank title; a document without a
/// `ComicInfo` root is reported as an extraction error.
pub fn parse_comic_info(xml: &str, file: &Path) -> LightMetadata {
    let has_root = root_pattern().is_some_and(|re| re.is_match(xml));
    if !has_root {
        return LightMetadata {
            title: file_stem(file),
            extraction_errors: vec![format!("{} has no ComicInfo root element", COMIC_INFO_NAME)],
        };
    }

    let title = title_pattern()
        .and_then(|re| re.captures(xml))
        .and_then(|caps| caps.get(1))
        .map(|m| unescape_xml(m.as_str().trim()))
        .unwrap_or_default();

    LightMetadata {
        title,
        extraction_errors: Vec::new(),
    }
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Escape text for inclusion in an XML element
pub(crate) fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
