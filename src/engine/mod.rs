//! Boundary to the external transcription engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────── engine thread(s) ────────────────┐
//! │  on_status_change / on_transcript / on_error     │
//! │        (borrowed buffers, opaque userdata)        │
//! └──────────────────────┬───────────────────────────┘
//!                        │ bridge: copy → owned EngineEvent
//!                        ▼
//!        EngineEventSender (unbounded, non-blocking)
//!                        │
//!                        ▼
//!        SessionCoordinator  (single writer, in order)
//! ```
//!
//! The engine itself (audio capture, Whisper inference, VAD, LLM
//! formatting) is a native library. [`TranscriptionEngine`] is the narrow
//! command surface the session uses; [`ffi`] mirrors the C header and, with
//! the `native-engine` feature, links the library; [`bridge`] turns the
//! engine's callbacks into owned [`EngineEvent`]s.

pub mod bridge;
pub mod ffi;
pub mod model;

#[cfg(test)]
pub mod mock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

pub use bridge::Registration;
pub use model::{ModelPaths, ModelSize};

#[cfg(feature = "native-engine")]
pub use ffi::NativeEngine;

#[cfg(test)]
pub use mock::MockEngine;

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Errors raised while bringing the engine up.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The library-wide `init()` returned a non-zero status.
    #[error("engine initialisation failed with status {0}")]
    Init(i32),

    /// `create()` returned a null handle.
    #[error("engine refused to create a session handle")]
    Create,

    /// A path or language string contained an interior NUL byte.
    #[error("string passed to the engine contains a NUL byte: {0:?}")]
    InvalidString(String),
}

// ---------------------------------------------------------------------------
// EngineStatus
// ---------------------------------------------------------------------------

/// Status codes reported by the engine's status-changed callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum EngineStatus {
    Idle = 0,
    Recording = 1,
    Transcribing = 2,
    Formatting = 3,
    Ready = 4,
    Error = 5,
}

impl EngineStatus {
    /// Map a raw C enum value; unknown codes yield `None`.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Idle),
            1 => Some(Self::Recording),
            2 => Some(Self::Transcribing),
            3 => Some(Self::Formatting),
            4 => Some(Self::Ready),
            5 => Some(Self::Error),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tone / options / settings
// ---------------------------------------------------------------------------

/// Output tone applied by the engine's formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Neutral,
    Formal,
    Casual,
    Code,
}

impl Tone {
    pub fn raw(self) -> i32 {
        match self {
            Tone::Neutral => 0,
            Tone::Formal => 1,
            Tone::Casual => 2,
            Tone::Code => 3,
        }
    }
}

impl std::str::FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "neutral" => Ok(Tone::Neutral),
            "formal" => Ok(Tone::Formal),
            "casual" => Ok(Tone::Casual),
            "code" => Ok(Tone::Code),
            other => Err(format!("unknown tone '{other}'")),
        }
    }
}

/// Options handed to `stop_live` when a live session is finalised.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeOptions {
    pub language: String,
    pub tone: Tone,
    pub remove_filler_words: bool,
    pub auto_punctuate: bool,
    pub use_llm_formatting: bool,
}

/// Persistent formatter settings written through to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub tone: Tone,
    pub remove_filler_words: bool,
    pub auto_punctuate: bool,
    pub use_llm_formatting: bool,
}

impl From<&TranscribeOptions> for EngineSettings {
    fn from(opts: &TranscribeOptions) -> Self {
        Self {
            tone: opts.tone,
            remove_filler_words: opts.remove_filler_words,
            auto_punctuate: opts.auto_punctuate,
            use_llm_formatting: opts.use_llm_formatting,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineEvent
// ---------------------------------------------------------------------------

/// An engine notification, fully owned so it can cross threads.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StatusChanged(EngineStatus),
    /// Live (`is_final == false`) or final transcript text.
    Transcript { text: String, is_final: bool },
    /// Engine-reported failure. `message` is empty when the engine sent none.
    Error { message: String },
}

/// Sending half used by the callback bridge.
pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;
/// Receiving half drained by the session coordinator.
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Create the channel that carries engine callbacks to the session.
pub fn event_channel() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::unbounded_channel()
}

// ---------------------------------------------------------------------------
// TranscriptionEngine trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe command surface of one engine session handle.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn TranscriptionEngine>`; [`model_load`](Self::model_load) runs on
/// the blocking pool while the session keeps serving other messages.
pub trait TranscriptionEngine: Send + Sync {
    /// Begin a live (streaming) recording. Returns `false` if the engine
    /// refused.
    fn start_live(&self, language: &str) -> bool;

    /// Stop the live recording and finalise the transcript.
    fn stop_live(&self, options: &TranscribeOptions) -> bool;

    fn model_exists(&self, size: ModelSize) -> bool;

    /// Load a model. Long-running; never call on the session's context.
    fn model_load(&self, size: ModelSize) -> bool;

    fn model_unload(&self);

    /// RMS input level; `0.0` when not recording.
    fn audio_level(&self) -> f32;

    fn write_settings(&self, settings: &EngineSettings) -> bool;
}

// Compile-time assertion: Box<dyn TranscriptionEngine> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn TranscriptionEngine>) {}
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_back() {
        for raw in 0..=5 {
            let status = EngineStatus::from_raw(raw).expect("known code");
            assert_eq!(status as i32, raw);
        }
        assert_eq!(EngineStatus::from_raw(6), None);
        assert_eq!(EngineStatus::from_raw(-1), None);
    }

    #[test]
    fn tone_parses_case_insensitively() {
        assert_eq!("Formal".parse::<Tone>(), Ok(Tone::Formal));
        assert_eq!("code".parse::<Tone>(), Ok(Tone::Code));
        assert!("loud".parse::<Tone>().is_err());
    }

    #[test]
    fn settings_from_options() {
        let opts = TranscribeOptions {
            language: "en".into(),
            tone: Tone::Casual,
            remove_filler_words: false,
            auto_punctuate: true,
            use_llm_formatting: true,
        };
        let settings = EngineSettings::from(&opts);
        assert_eq!(settings.tone, Tone::Casual);
        assert!(!settings.remove_filler_words);
        assert!(settings.use_llm_formatting);
    }
}
