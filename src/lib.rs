//! # comic-integrity
//!
//! Integrity validation and bounded recovery for comic book containers
//! (CBZ/ZIP, CBR/RAR, CB7/7Z).
//!
//! ## Design Philosophy
//!
//! comic-integrity is designed to be:
//! - **Data, not exceptions** - a damaged file always yields a populated
//!   [`ValidationResult`] or [`RecoveryResult`], never an error
//! - **Non-destructive** - recovery only ever writes new sibling files
//! - **Bounded** - at most three recovery attempts per file content by default
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use comic_integrity::{IntegrityEngine, RecoveryMethod};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = IntegrityEngine::new();
//!     let comic = Path::new("/library/Saga 001.cbz");
//!
//!     let validation = engine.validate(comic, true).await;
//!     for issue in &validation.issues {
//!         println!("{:?} {}: {}", issue.severity, issue.issue_type, issue.description);
//!     }
//!
//!     if !validation.is_valid || !validation.repairable_issues.is_empty() {
//!         let recovery = engine.recover(comic, &validation, true).await;
//!         if recovery.success && recovery.recovery_method != RecoveryMethod::None {
//!             println!("Recovered to {:?}", recovery.recovered_file);
//!         }
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Content hashing, validation cache and attempt limiter
pub mod cache;
/// Checksum manifests
pub mod checksum;
/// Content and metadata extraction capabilities
pub mod collaborators;
/// Configuration types
pub mod config;
/// The integrity engine
pub mod engine;
/// Error types
pub mod error;
/// Container readers, forced extraction and repackaging
pub mod extraction;
/// Signature-based format detection
pub mod format;
/// Image header decoding
pub mod image;
/// Progress reporting
pub mod progress;
/// Recovery planning and execution
pub mod recovery;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;
/// Validation pipeline and integrity assessment
pub mod validation;

// Re-export commonly used types
pub use config::{FileCollisionAction, ValidationConfig};
pub use engine::IntegrityEngine;
pub use error::{ArchiveError, Error, Result};
pub use progress::ProgressReporter;
pub use recovery::{RecoveryOptions, plan};
pub use types::{
    ArchiveFormat, CorruptionLevel, FileIntegrityStatus, IssueSeverity, IssueType, OtherFormat,
    RecoveryMethod, RecoveryResult, ValidationIssue, ValidationResult,
};
pub use validation::{assess, recommendations};
