//! External capabilities driven by the validators
//!
//! Content and metadata extraction are consumed through narrow traits so the
//! embedding application can substitute its own importer components:
//!
//! - [`ContentExtractor`]: container → page images on disk
//! - [`MetadataExtractor`]: container → title plus extraction errors
//!
//! [`ArchiveContentExtractor`] and [`ComicInfoMetadataExtractor`] are the
//! defaults, both built on the [`crate::extraction`] readers.

mod archive;
mod comic_info;
mod traits;

pub use archive::ArchiveContentExtractor;
pub use comic_info::{COMIC_INFO_NAME, ComicInfoMetadataExtractor, parse_comic_info};
pub(crate) use comic_info::escape_xml;
pub use traits::{ContentExtractor, ExtractionOutcome, LightMetadata, MetadataExtractor};
