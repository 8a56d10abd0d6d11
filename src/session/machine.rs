//! Pure session transitions.
//!
//! [`SessionMachine`] performs no I/O. The coordinator asks it whether a
//! command is allowed, calls the engine, then records the outcome; engine
//! events are applied one at a time in arrival order through
//! [`SessionMachine::apply`].

use thiserror::Error;

use super::state::{SessionState, SessionStatus};
use crate::engine::{EngineEvent, EngineStatus};

/// Why a `start` command was not honoured. None of these are user-visible
/// errors; the command is simply a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartRefusal {
    #[error("already recording")]
    AlreadyRecording,
    #[error("no engine session")]
    NoEngine,
    #[error("no model loaded")]
    ModelNotLoaded,
}

/// Side effect requested by an applied engine event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    /// A final transcript arrived: schedule the overlay dismiss and (desktop)
    /// paste the text.
    FinalTranscript(String),
}

#[derive(Debug, Default)]
pub struct SessionMachine {
    state: SessionState,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    pub fn check_start(&self, has_engine: bool) -> Result<(), StartRefusal> {
        if self.state.is_recording() {
            Err(StartRefusal::AlreadyRecording)
        } else if !has_engine {
            Err(StartRefusal::NoEngine)
        } else if !self.state.is_model_loaded() {
            Err(StartRefusal::ModelNotLoaded)
        } else {
            Ok(())
        }
    }

    /// The engine accepted `start_live`.
    pub fn recording_started(&mut self) {
        self.state.set_transcript("");
        self.state.set_status(SessionStatus::Recording);
    }

    pub fn check_stop(&self) -> bool {
        self.state.is_recording()
    }

    /// `stop` was issued; recording ends now, whatever the engine says later.
    pub fn recording_stopped(&mut self) {
        self.state.set_status(SessionStatus::Transcribing);
    }

    pub fn model_loaded(&mut self, loaded: bool) {
        self.state.set_model_loaded(loaded);
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.state.set_status(SessionStatus::Error(message.into()));
    }

    pub fn clear(&mut self) {
        self.state.set_transcript("");
    }

    // -----------------------------------------------------------------------
    // Engine events
    // -----------------------------------------------------------------------

    pub fn apply(&mut self, event: &EngineEvent) -> Effect {
        match event {
            EngineEvent::StatusChanged(status) => {
                self.apply_status(*status);
                Effect::None
            }
            EngineEvent::Transcript { text, is_final } => {
                self.state.set_transcript(text.as_str());
                // Only a session still being processed can finish. While
                // recording, or with no session in flight, the text is just
                // a live update.
                if *is_final && !self.state.is_recording() && self.state.status().is_busy() {
                    self.state.set_status(SessionStatus::Ready);
                    Effect::FinalTranscript(text.clone())
                } else {
                    Effect::None
                }
            }
            EngineEvent::Error { message } => {
                self.fail(message.as_str());
                Effect::None
            }
        }
    }

    fn apply_status(&mut self, status: EngineStatus) {
        match status {
            EngineStatus::Recording if !self.state.is_recording() => {
                // Late confirmation of a session that was already stopped.
                log::debug!(
                    "session: ignoring Recording status while {}",
                    self.state.status().label()
                );
            }
            EngineStatus::Error => {
                // Keep a message the error callback may already have set.
                if !matches!(self.state.status(), SessionStatus::Error(_)) {
                    self.state.set_status(SessionStatus::Error(String::new()));
                }
            }
            other => self.state.set_status(other.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
