//! Restricted-process side: the keyboard extension.
//!
//! The extension cannot run the engine and cannot be called back. It polls
//! the shared store on a fixed interval and turns transcript changes into
//! append-only insertions into the host text field.
//!
//! ```text
//! every poll interval:
//!   SharedSnapshot::read_from(store)
//!     ├─ Affordance { can_record, is_recording, status }  ──▶ TextSink::update_affordance
//!     └─ compute_delta(baseline, transcript)
//!           Append(suffix) ──▶ TextSink::insert_text(suffix), baseline = transcript
//!           Resync         ──▶ baseline = transcript (nothing inserted)
//!           Unchanged      ──▶ nothing
//! ```

pub mod poller;

use crate::config::ActivationConfig;
use crate::session::SessionStatus;

pub use poller::{compute_delta, Delta, TranscriptPoller};

// ---------------------------------------------------------------------------
// Affordance
// ---------------------------------------------------------------------------

/// What the extension's UI may offer this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Affordance {
    /// A model is loaded in the app and its file is present on disk.
    pub can_record: bool,
    pub is_recording: bool,
    pub status: SessionStatus,
    /// The shared store could not be read; everything is disabled.
    pub store_unavailable: bool,
}

impl Affordance {
    pub fn disabled() -> Self {
        Self {
            store_unavailable: true,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// TextSink
// ---------------------------------------------------------------------------

/// The host text field plus the extension's own UI.
pub trait TextSink: Send {
    /// Insert `text` at the cursor.
    fn insert_text(&mut self, text: &str);

    fn update_affordance(&mut self, affordance: &Affordance);
}

/// URL the extension opens to bring the app forward and toggle recording.
pub fn activation_url(config: &ActivationConfig) -> String {
    format!("{}://{}", config.scheme, config.host)
}
