//! Session status and the authoritative session state.
//!
//! [`SessionState`] keeps its fields private: the only way to change
//! `status` is [`SessionState::set_status`], which also derives
//! `is_recording`, so `is_recording == (status == Recording)` holds for every
//! value of the type.

use crate::engine::EngineStatus;
use crate::shared::SharedSnapshot;

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Lifecycle of one dictation session.
///
/// ```text
/// Idle ──start──▶ Recording ──stop──▶ Transcribing ──▶ [Formatting] ──final──▶ Ready
///   ▲                                                                          │
///   └──────────────────────────── start (any non-Recording state) ◀────────────┘
/// any state ──engine error──▶ Error(message)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Recording,
    Transcribing,
    Formatting,
    Ready,
    /// Engine-reported failure; the message may be empty.
    Error(String),
}

impl SessionStatus {
    /// Integer code written to the shared store (matches the engine's codes).
    pub fn code(&self) -> i32 {
        match self {
            SessionStatus::Idle => 0,
            SessionStatus::Recording => 1,
            SessionStatus::Transcribing => 2,
            SessionStatus::Formatting => 3,
            SessionStatus::Ready => 4,
            SessionStatus::Error(_) => 5,
        }
    }

    /// Inverse of [`code`](Self::code). The error message is not replicated,
    /// so code 5 yields `Error("")`.
    pub fn from_code(code: i32) -> Option<Self> {
        EngineStatus::from_raw(code).map(Self::from)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "Idle",
            SessionStatus::Recording => "Recording",
            SessionStatus::Transcribing => "Transcribing",
            SessionStatus::Formatting => "Formatting",
            SessionStatus::Ready => "Ready",
            SessionStatus::Error(_) => "Error",
        }
    }

    /// `true` while the engine is still working on the current session.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SessionStatus::Recording | SessionStatus::Transcribing | SessionStatus::Formatting
        )
    }
}

impl From<EngineStatus> for SessionStatus {
    fn from(status: EngineStatus) -> Self {
        match status {
            EngineStatus::Idle => SessionStatus::Idle,
            EngineStatus::Recording => SessionStatus::Recording,
            EngineStatus::Transcribing => SessionStatus::Transcribing,
            EngineStatus::Formatting => SessionStatus::Formatting,
            EngineStatus::Ready => SessionStatus::Ready,
            EngineStatus::Error => SessionStatus::Error(String::new()),
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Error(msg) if !msg.is_empty() => write!(f, "Error: {msg}"),
            other => f.write_str(other.label()),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// State owned exclusively by the session machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    status: SessionStatus,
    is_recording: bool,
    transcript: String,
    is_model_loaded: bool,
}

impl SessionState {
    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn is_model_loaded(&self) -> bool {
        self.is_model_loaded
    }

    pub(super) fn set_status(&mut self, status: SessionStatus) {
        self.is_recording = status == SessionStatus::Recording;
        self.status = status;
    }

    pub(super) fn set_transcript(&mut self, text: impl Into<String>) {
        self.transcript = text.into();
    }

    pub(super) fn set_model_loaded(&mut self, loaded: bool) {
        self.is_model_loaded = loaded;
    }

    /// Project into the replicated snapshot.
    pub fn snapshot(&self, selected_model_filename: Option<&str>) -> SharedSnapshot {
        SharedSnapshot {
            transcript_text: self.transcript.clone(),
            status_code: self.status.code(),
            is_recording: self.is_recording,
            is_model_loaded: self.is_model_loaded,
            selected_model_filename: selected_model_filename.map(str::to_owned),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
