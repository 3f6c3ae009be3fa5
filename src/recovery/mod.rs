//! Bounded, automated recovery
//!
//! A recovery call walks a fixed sequence of states:
//!
//! ```text
//! Start -> (Backup) -> Plan -> Execute -> Re-validate -> Done
//! ```
//!
//! The attempt limiter is consulted before anything else; a rejected call
//! runs no executor. Every step appends to the recovery log and no error
//! escapes: failures become a `RecoveryResult` with `success == false`.
//!
//! Re-validation of the produced file (and of backup candidates) runs the
//! shallow pipeline directly, the same checks `validate` runs, without
//! reading or filling the engine's validation cache.

mod executors;
mod log;
mod planner;


pub use log::RecoveryLog;
pub use planner::plan;

use crate::cache::{AttemptLimiter, content_hash};
use crate::error::Result;
use crate::format::detect_format;
use crate::progress::ProgressReporter;
use crate::types::{RecoveryMethod, RecoveryResult, ValidationIssue, ValidationResult};
use crate::utils::is_same_file;
use crate::validation::Pipeline;
use executors::ExecutionContext;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tracing::{info, warn};

/// Per-call recovery options
#[derive(Clone, Debug)]
pub struct RecoveryOptions {
    /// Copy the original to a `.backup` sibling before executing (default: true)
    pub create_backup: bool,
    /// Run this method instead of the planned one
    pub method: Option<RecoveryMethod>,
    /// Progress channel for this call
    pub progress: ProgressReporter,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            create_backup: true,
            method: None,
            progress: ProgressReporter::disabled(),
        }
    }
}

/// One recovery run against the engine's shared state
pub(crate) struct Recovery<'a> {
    pub(crate) pipeline: &'a Pipeline,
    pub(crate) limiter: &'a AttemptLimiter,
}

impl Recovery<'_> {
    pub(crate) async fn run(
        &self,
        path: &Path,
        validation: &ValidationResult,
        options: &RecoveryOptions,
    ) -> RecoveryResult {
        let progress = &options.progress;
        let mut log = RecoveryLog::new();

        let hash = content_hash(path, self.pipeline.config.hash_chunk_size).await;
        match self.limiter.try_acquire(&hash).await {
            Ok(attempt) => log.push(format!(
                "Recovery attempt {} of {}",
                attempt,
                self.limiter.max_attempts()
            )),
            Err(used) => {
                warn!(?path, attempts = used, "recovery attempt limit reached");
                log.push(format!(
                    "Recovery attempt limit exceeded ({} of {} attempts used); no recovery performed",
                    used,
                    self.limiter.max_attempts()
                ));
                return RecoveryResult::failed(RecoveryMethod::None, validation, log.into_lines());
            }
        }

        let backup = if options.create_backup {
            executors::create_backup(path, &self.pipeline.config, &mut log).await
        } else {
            None
        };
        progress.set(0.1);

        let method = options.method.unwrap_or_else(|| plan(validation));
        log.push(format!("Selected recovery method: {}", method));
        progress.set(0.3);

        if method == RecoveryMethod::None {
            log.push("No applicable recovery method");
            progress.set(1.0);
            return RecoveryResult::failed(method, validation, log.into_lines());
        }

        let produced = match method {
            RecoveryMethod::BackupRestore => {
                self.restore_from_backup(path, backup.as_deref(), &mut log)
                    .await
            }
            _ => self.execute_blocking(path, method, &mut log).await,
        };
        progress.set(0.8);

        let result = match produced {
            Ok(Some(recovered)) if recovered.exists() => {
                self.finish(recovered, method, validation, log).await
            }
            Ok(_) => {
                log.push("Recovery failed");
                RecoveryResult::failed(method, validation, log.into_lines())
            }
            Err(e) => {
                warn!(?path, %method, error = %e, "recovery executor failed");
                log.push(format!("Recovery error: {}", e));
                log.push("Recovery failed");
                RecoveryResult::failed(method, validation, log.into_lines())
            }
        };
        progress.set(1.0);

        info!(
            ?path,
            %method,
            success = result.success,
            fixed = result.issues_fixed.len(),
            remaining = result.remaining_issues.len(),
            "recovery finished"
        );
        result
    }

    async fn execute_blocking(
        &self,
        path: &Path,
        method: RecoveryMethod,
        log: &mut RecoveryLog,
    ) -> Result<Option<PathBuf>> {
        let ctx = ExecutionContext {
            config: Arc::clone(&self.pipeline.config),
            images: Arc::clone(&self.pipeline.images),
            source: path.to_path_buf(),
            format: detect_format(path),
        };

        let before = log.clone();
        let mut owned = std::mem::take(log);
        let joined = spawn_blocking(move || {
            let produced = executors::execute(method, &ctx, &mut owned);
            (produced, owned)
        })
        .await;

        match joined {
            Ok((produced, owned)) => {
                *log = owned;
                produced
            }
            Err(e) => {
                *log = before;
                Err(e.into())
            }
        }
    }

    /// Probe conventional backup paths; the first that validates is copied out
    async fn restore_from_backup(
        &self,
        path: &Path,
        just_created: Option<&Path>,
        log: &mut RecoveryLog,
    ) -> Result<Option<PathBuf>> {
        log.push("Searching for backups");

        for candidate in executors::backup_candidates(path) {
            if Some(candidate.as_path()) == just_created
                || !candidate.is_file()
                || is_same_file(&candidate, path)
            {
                continue;
            }
            log.push(format!("Found backup: {}", candidate.display()));

            let checked = self
                .pipeline
                .run(&candidate, false, &ProgressReporter::disabled())
                .await;
            if checked.is_valid {
                log.push("Backup is valid, restoring");
                let restored =
                    executors::restore_copy(path, &candidate, &self.pipeline.config).await?;
                log.push(format!("Restored to {}", restored.display()));
                return Ok(Some(restored));
            }
            log.push("Backup is also damaged");
        }

        log.push("No usable backup found");
        Ok(None)
    }

    /// Re-validate the produced file and partition the repairable issues
    async fn finish(
        &self,
        recovered: PathBuf,
        method: RecoveryMethod,
        validation: &ValidationResult,
        mut log: RecoveryLog,
    ) -> RecoveryResult {
        let revalidated = self
            .pipeline
            .run(&recovered, false, &ProgressReporter::disabled())
            .await;

        let (remaining, fixed): (Vec<ValidationIssue>, Vec<ValidationIssue>) = validation
            .repairable_issues
            .iter()
            .cloned()
            .partition(|issue| revalidated.has_issue(issue.issue_type));

        log.push("Recovery completed successfully");
        log.push(format!("Issues fixed: {}", fixed.len()));
        log.push(format!("Issues remaining: {}", remaining.len()));

        RecoveryResult {
            success: true,
            recovered_file: Some(recovered),
            recovery_method: method,
            issues_fixed: fixed,
            remaining_issues: remaining,
            recovery_log: log.into_lines(),
        }
    }
}
