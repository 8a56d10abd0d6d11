//! Model download manager.
//!
//! # Lifecycle
//!
//! ```text
//! begin(model) ──▶ token T  ── transport task streams into a temp file ──┐
//!                                                                        │
//!     Progress{T, written, expected} ──▶ apply ──▶ progress updated      │
//!     Finished{T, temp}              ──▶ apply ──▶ Completed ──▶ publish ┘
//!     Failed{T, msg}                 ──▶ apply ──▶ Failed (error kept)
//!
//! cancel() clears the active task; any later event carrying T is stale.
//! ```
//!
//! At most one download is active. Events are matched against the active
//! task's token, so a completion racing a cancellation is dropped (and its
//! temp file deleted with it) instead of resurrecting the task.

pub mod transport;

use std::io;
use std::path::Path;

use tempfile::TempPath;

use crate::engine::ModelSize;

pub use transport::{DownloadError, DownloadTransport, HttpTransport, ProgressFn};

#[cfg(test)]
pub use transport::mock::ScriptedTransport;

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress in `[0, 1]`.
///
/// With a known total this is `written / expected`. Without one it is
/// approximated against `reference` bytes and capped at `0.99`, so an
/// unknown-length download never claims to be finished.
pub fn progress_for(written: u64, expected: Option<u64>, reference: u64) -> f64 {
    match expected {
        Some(total) if total > 0 => (written as f64 / total as f64).min(1.0),
        _ => (written as f64 / reference.max(1) as f64).min(0.99),
    }
}

// ---------------------------------------------------------------------------
// Task / events
// ---------------------------------------------------------------------------

/// Identifies one download attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DownloadToken(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadTask {
    pub token: DownloadToken,
    pub model: ModelSize,
    pub expected_bytes: Option<u64>,
    pub bytes_written: u64,
    pub progress: f64,
    pub cancelled: bool,
}

/// Message from a transport task back to the owning context.
#[derive(Debug)]
pub enum DownloadEvent {
    Progress {
        token: DownloadToken,
        written: u64,
        expected: Option<u64>,
    },
    /// The body is complete in `temp`; dropping `temp` deletes it.
    Finished {
        token: DownloadToken,
        temp: TempPath,
    },
    Failed {
        token: DownloadToken,
        message: String,
    },
}

/// What the owner should do after [`DownloadManager::apply`].
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The event belongs to a task that is no longer active.
    Stale,
    Progress,
    Completed { model: ModelSize, temp: TempPath },
    Failed { model: ModelSize, message: String },
}

/// Observable download state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadView {
    pub active: Option<ModelSize>,
    pub progress: f64,
    pub bytes_written: u64,
    pub expected_bytes: Option<u64>,
    /// Last failure, kept until the next download starts.
    pub error: Option<String>,
    pub last_completed: Option<ModelSize>,
}

// ---------------------------------------------------------------------------
// DownloadManager
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct DownloadManager {
    reference_bytes: u64,
    next_token: u64,
    active: Option<DownloadTask>,
    error: Option<String>,
    last_completed: Option<ModelSize>,
}

impl DownloadManager {
    pub fn new(reference_bytes: u64) -> Self {
        Self {
            reference_bytes,
            next_token: 1,
            active: None,
            error: None,
            last_completed: None,
        }
    }

    pub fn is_downloading(&self) -> bool {
        self.active.is_some()
    }

    /// Start tracking a download of `model`. Returns `None` while another
    /// download is in flight.
    pub fn begin(&mut self, model: ModelSize) -> Option<DownloadToken> {
        if self.active.is_some() {
            return None;
        }
        let token = DownloadToken(self.next_token);
        self.next_token += 1;
        self.error = None;
        self.active = Some(DownloadTask {
            token,
            model,
            expected_bytes: None,
            bytes_written: 0,
            progress: 0.0,
            cancelled: false,
        });
        Some(token)
    }

    /// Cancel the active download. Idempotent; returns the cancelled task.
    pub fn cancel(&mut self) -> Option<DownloadTask> {
        self.active.take().map(|mut task| {
            task.cancelled = true;
            task
        })
    }

    /// Record a failure that happened after the transport finished
    /// (e.g. publishing the file).
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn apply(&mut self, event: DownloadEvent) -> DownloadOutcome {
        let token = match &event {
            DownloadEvent::Progress { token, .. }
            | DownloadEvent::Finished { token, .. }
            | DownloadEvent::Failed { token, .. } => *token,
        };
        if self.active.as_ref().map(|t| t.token) != Some(token) {
            return DownloadOutcome::Stale;
        }

        match event {
            DownloadEvent::Progress {
                written, expected, ..
            } => {
                if let Some(task) = self.active.as_mut() {
                    task.bytes_written = written;
                    task.expected_bytes = expected;
                    task.progress = progress_for(written, expected, self.reference_bytes);
                }
                DownloadOutcome::Progress
            }
            DownloadEvent::Finished { temp, .. } => match self.active.take() {
                Some(task) => {
                    self.last_completed = Some(task.model);
                    DownloadOutcome::Completed {
                        model: task.model,
                        temp,
                    }
                }
                None => DownloadOutcome::Stale,
            },
            DownloadEvent::Failed { message, .. } => match self.active.take() {
                Some(task) => {
                    self.error = Some(message.clone());
                    DownloadOutcome::Failed {
                        model: task.model,
                        message,
                    }
                }
                None => DownloadOutcome::Stale,
            },
        }
    }

    pub fn view(&self) -> DownloadView {
        DownloadView {
            active: self.active.as_ref().map(|t| t.model),
            progress: self.active.as_ref().map_or(0.0, |t| t.progress),
            bytes_written: self.active.as_ref().map_or(0, |t| t.bytes_written),
            expected_bytes: self.active.as_ref().and_then(|t| t.expected_bytes),
            error: self.error.clone(),
            last_completed: self.last_completed,
        }
    }
}

// ---------------------------------------------------------------------------
// Publish
// ---------------------------------------------------------------------------

/// Move a completed temp file to `dest`.
///
/// An existing file at `dest` is removed first, so the final path is either
/// absent or holds a complete file.
pub fn publish(temp: TempPath, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::remove_file(dest) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    temp.persist(dest).map_err(|e| e.error)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
