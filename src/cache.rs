//! Content hashing, validation cache and recovery attempt limiter
//!
//! Both stores are keyed by content hash, so two identical files share one
//! cache entry and one attempt counter regardless of their paths.

use crate::types::ValidationResult;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tokio::sync::{Mutex, RwLock};
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

/// Lowercase hex SHA-256 of a file, streamed in `chunk_size` chunks
///
/// Falls back to a weak `weak:{len}:{mtime}:{path}` key when the file cannot
/// be read, so callers degrade instead of failing.
pub async fn content_hash(path: &Path, chunk_size: usize) -> String {
    let owned = path.to_path_buf();
    let hashed = spawn_blocking(move || sha256_file(&owned, chunk_size)).await;
    match hashed {
        Ok(Ok(hash)) => hash,
        Ok(Err(e)) => {
            warn!(?path, error = %e, "failed to hash file, using weak key");
            weak_hash(path)
        }
        Err(e) => {
            warn!(?path, error = %e, "hashing task failed, using weak key");
            weak_hash(path)
        }
    }
}

/// Streamed SHA-256 of a file as lowercase hex
pub fn sha256_file(path: &Path, chunk_size: usize) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; chunk_size.max(1)];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn weak_hash(path: &Path) -> String {
    let metadata = std::fs::metadata(path).ok();
    let len = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
    let mtime = metadata
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("weak:{}:{}:{}", len, mtime, path.display())
}

#[derive(Default)]
struct CachedValidation {
    shallow: Option<ValidationResult>,
    deep: Option<ValidationResult>,
}

impl CachedValidation {
    fn slot(&mut self, deep: bool) -> &mut Option<ValidationResult> {
        if deep { &mut self.deep } else { &mut self.shallow }
    }
}

/// Validation results per content hash, one slot per validation depth
#[derive(Default)]
pub struct ValidationCache {
    entries: RwLock<HashMap<String, CachedValidation>>,
}

impl ValidationCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached result for `hash` at the requested depth
    pub async fn get(&self, hash: &str, deep: bool) -> Option<ValidationResult> {
        let entries = self.entries.read().await;
        let cached = entries.get(hash)?;
        let slot = if deep { &cached.deep } else { &cached.shallow };
        slot.clone()
    }

    /// Store a result; an existing result at the same depth wins
    pub async fn insert(&self, hash: &str, deep: bool, result: ValidationResult) -> ValidationResult {
        let mut entries = self.entries.write().await;
        let slot = entries.entry(hash.to_string()).or_default().slot(deep);
        slot.get_or_insert(result).clone()
    }

    /// Drop every cached result
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        debug!(entries = entries.len(), "clearing validation cache");
        entries.clear();
    }

    /// Number of content hashes with at least one cached result
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing is cached
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Per-content-hash recovery attempt counters
pub struct AttemptLimiter {
    max_attempts: u32,
    counts: Mutex<HashMap<String, u32>>,
}

impl AttemptLimiter {
    /// Limiter allowing `max_attempts` recoveries per content hash
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Record an attempt unless the limit is reached
    ///
    /// Returns the attempt number on success, or the number of attempts
    /// already made when the limit is reached. Check and increment happen
    /// under one lock.
    pub async fn try_acquire(&self, hash: &str) -> std::result::Result<u32, u32> {
        let mut counts = self.counts.lock().await;
        let count = counts.entry(hash.to_string()).or_insert(0);
        if *count >= self.max_attempts {
            return Err(*count);
        }
        *count += 1;
        Ok(*count)
    }

    /// Attempts recorded for `hash`
    pub async fn attempts(&self, hash: &str) -> u32 {
        self.counts.lock().await.get(hash).copied().unwrap_or(0)
    }

    /// Forget the attempts for one hash
    pub async fn reset(&self, hash: &str) {
        self.counts.lock().await.remove(hash);
    }

    /// Forget every counter
    pub async fn clear(&self) {
        self.counts.lock().await.clear();
    }

    /// Configured limit
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
