//! File arrival handling.
//!
//! Every arrived file becomes one independent task: the guard waits for the
//! file to settle, runs the pipeline with retries and reports a terminal
//! outcome. Tasks share only the reference factors and settings.

pub mod guard;
pub mod scanner;
pub mod watcher;

pub use guard::{AbandonReason, IngressGuard, Outcome, RetryPolicy};
pub use scanner::{scan_existing, InputFilter};
pub use watcher::DirectoryWatcher;

use crate::analysis::EngineOptions;
use crate::error::ProcessError;
use crate::pipeline::{self, ProcessedFile};
use crate::reference::ReferenceFactors;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Settings shared by every processing task.
#[derive(Debug, Clone)]
pub struct ProcessingSettings {
    pub output_dir: PathBuf,
    pub policy: RetryPolicy,
    pub engine: EngineOptions,
}

/// Terminal result for one input path.
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: Outcome<ProcessedFile>,
}

/// Spawns a guarded task per arrived file.
pub struct Dispatcher {
    factors: Arc<ReferenceFactors>,
    settings: Arc<ProcessingSettings>,
    cancel: watch::Receiver<bool>,
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
    tasks: JoinSet<FileReport>,
}

impl Dispatcher {
    pub fn new(
        factors: Arc<ReferenceFactors>,
        settings: ProcessingSettings,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            factors,
            settings: Arc::new(settings),
            cancel,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            tasks: JoinSet::new(),
        }
    }

    /// Start processing `path`. Returns `false` when the same path is
    /// already being processed.
    pub fn dispatch(&mut self, path: PathBuf) -> bool {
        if !lock(&self.in_flight).insert(path.clone()) {
            debug!("{} is already being processed", path.display());
            return false;
        }

        let factors = Arc::clone(&self.factors);
        let settings = Arc::clone(&self.settings);
        let in_flight = Arc::clone(&self.in_flight);
        let mut guard = IngressGuard::new(settings.policy, self.cancel.clone());

        self.tasks.spawn(async move {
            let outcome = guard
                .run(&path, || {
                    let path = path.clone();
                    let factors = Arc::clone(&factors);
                    let settings = Arc::clone(&settings);
                    async move {
                        tokio::task::spawn_blocking(move || {
                            pipeline::process_and_write(
                                &path,
                                &settings.output_dir,
                                &factors,
                                &settings.engine,
                            )
                        })
                        .await
                        .unwrap_or_else(|e| Err(ProcessError::Aborted(e.to_string())))
                    }
                })
                .await;

            lock(&in_flight).remove(&path);
            FileReport { path, outcome }
        });

        true
    }

    /// Number of files still being processed.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for the next finished file. `None` when nothing is pending.
    pub async fn next_finished(&mut self) -> Option<FileReport> {
        loop {
            match self.tasks.join_next().await? {
                Ok(report) => {
                    log_report(&report);
                    return Some(report);
                }
                Err(e) => error!("Processing task failed: {}", e),
            }
        }
    }

    /// Wait for every pending file.
    pub async fn drain(&mut self) -> Vec<FileReport> {
        let mut reports = Vec::new();
        while let Some(report) = self.next_finished().await {
            reports.push(report);
        }
        reports
    }
}

fn lock(set: &Mutex<HashSet<PathBuf>>) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn log_report(report: &FileReport) {
    match &report.outcome {
        Outcome::Done { value, .. } => {
            let errors = value.diagnostics.iter().filter(|d| !d.is_warning()).count();
            info!(
                "Processing complete. Result saved to: {} ({} entries, {} skipped records)",
                value.output.display(),
                value.entries,
                errors
            );
        }
        Outcome::Failed { .. } => {
            warn!(
                "Gave up on {} after {} attempt(s): processing failed",
                report.path.display(),
                report.outcome.attempts()
            );
        }
        Outcome::Abandoned { reason, .. } => match reason {
            AbandonReason::RetriesExhausted(_) => warn!(
                "Gave up on {} after {} attempt(s): still in use",
                report.path.display(),
                report.outcome.attempts()
            ),
            AbandonReason::Cancelled => {
                warn!("Gave up on {}: shutting down", report.path.display())
            }
        },
    }
}
