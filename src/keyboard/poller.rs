//! Periodic pull of the shared snapshot and prefix-diff insertion.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::{Affordance, TextSink};
use crate::engine::ModelPaths;
use crate::session::SessionStatus;
use crate::shared::{SharedSnapshot, SharedStore};

// ---------------------------------------------------------------------------
// Delta
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    Unchanged,
    /// `current` extends `previous`; insert only the suffix.
    Append(String),
    /// `current` is not an extension (cleared or rewritten). Insert nothing
    /// and adopt it as the new baseline.
    Resync,
}

/// Compare the text already emitted with the latest transcript.
///
/// ```
/// use voice_dictation::keyboard::{compute_delta, Delta};
///
/// assert_eq!(compute_delta("hello ", "hello world"), Delta::Append("world".into()));
/// assert_eq!(compute_delta("hello world", "goodbye"), Delta::Resync);
/// ```
pub fn compute_delta(previous: &str, current: &str) -> Delta {
    if previous == current {
        Delta::Unchanged
    } else if let Some(suffix) = current.strip_prefix(previous) {
        Delta::Append(suffix.to_string())
    } else {
        Delta::Resync
    }
}

// ---------------------------------------------------------------------------
// TranscriptPoller
// ---------------------------------------------------------------------------

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub affordance: Affordance,
    /// Text to insert into the host field, if any.
    pub insert: Option<String>,
}

pub struct TranscriptPoller {
    store: Arc<dyn SharedStore>,
    models: ModelPaths,
    baseline: String,
}

impl TranscriptPoller {
    pub fn new(store: Arc<dyn SharedStore>, models: ModelPaths) -> Self {
        Self {
            store,
            models,
            baseline: String::new(),
        }
    }

    /// Text this process has already emitted for the current transcript.
    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    /// The host's text context changed (new field, external edit): start
    /// from an empty baseline again.
    pub fn reset_baseline(&mut self) {
        self.baseline.clear();
    }

    pub fn poll(&mut self) -> PollOutcome {
        let snapshot = match SharedSnapshot::read_from(self.store.as_ref()) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::debug!("poller: shared store unreadable: {e}");
                return PollOutcome {
                    affordance: Affordance::disabled(),
                    insert: None,
                };
            }
        };

        let model_present = snapshot
            .selected_model_filename
            .as_deref()
            .is_some_and(|name| self.models.has_file(name));

        let affordance = Affordance {
            can_record: snapshot.is_model_loaded && model_present,
            is_recording: snapshot.is_recording,
            status: SessionStatus::from_code(snapshot.status_code).unwrap_or_default(),
            store_unavailable: false,
        };

        let insert = match compute_delta(&self.baseline, &snapshot.transcript_text) {
            Delta::Unchanged => None,
            Delta::Append(suffix) => {
                self.baseline = snapshot.transcript_text;
                Some(suffix)
            }
            Delta::Resync => {
                log::debug!("poller: transcript diverged, resyncing without insert");
                self.baseline = snapshot.transcript_text;
                None
            }
        };

        PollOutcome { affordance, insert }
    }

    /// Poll every `interval` until `shutdown` flips to `true`.
    pub async fn run(
        mut self,
        sink: &mut dyn TextSink,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_affordance: Option<Affordance> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let outcome = self.poll();
            if last_affordance.as_ref() != Some(&outcome.affordance) {
                sink.update_affordance(&outcome.affordance);
                last_affordance = Some(outcome.affordance);
            }
            if let Some(text) = outcome.insert {
                sink.insert_text(&text);
            }
        }

        log::info!("poller: stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
