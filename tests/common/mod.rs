//! Common test utilities for comic-integrity integration tests

#[allow(dead_code)]
pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::*;

use comic_integrity::{IntegrityEngine, ValidationConfig};
use std::path::Path;

/// Engine whose scratch directories live under `scratch`
#[allow(dead_code)]
pub fn engine_with_scratch(scratch: &Path) -> IntegrityEngine {
    let config = ValidationConfig {
        scratch_dir: Some(scratch.to_path_buf()),
        ..ValidationConfig::default()
    };
    IntegrityEngine::with_config(config).expect("valid test configuration")
}

/// Number of files below `dir`, recursively
#[allow(dead_code)]
pub fn count_files(dir: &Path) -> usize {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}
