//! Shared state store replicated between the full app and the keyboard
//! extension.
//!
//! # Protocol
//!
//! ```text
//! privileged process                         restricted process
//! ──────────────────                         ──────────────────
//! SessionCoordinator                         TranscriptPoller
//!     │ SnapshotWriter::sync                      ▲ SharedSnapshot::read_from
//!     ▼                                           │  (every poll interval)
//! ┌──────────────── SharedStore (5 slots) ────────┴───┐
//! │ transcript · status · isRecording ·               │
//! │ isModelLoaded · selectedModelFilename             │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! Each slot is written independently and without acknowledgement; readers
//! must tolerate combinations that are transiently inconsistent. Only the
//! privileged process ever writes.

pub mod file_store;
pub mod memory;
pub mod writer;

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

pub use file_store::FileStore;
pub use memory::MemoryStore;
pub use writer::SnapshotWriter;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    /// The shared container is missing or not accessible.
    #[error("shared store unavailable at {0}")]
    Unavailable(PathBuf),

    #[error("shared store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("shared store value is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// The five named slots of the shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Transcript,
    Status,
    IsRecording,
    IsModelLoaded,
    SelectedModelFilename,
}

impl Slot {
    pub const ALL: [Slot; 5] = [
        Slot::Transcript,
        Slot::Status,
        Slot::IsRecording,
        Slot::IsModelLoaded,
        Slot::SelectedModelFilename,
    ];

    /// Stable key shared by both processes.
    pub fn key(self) -> &'static str {
        match self {
            Slot::Transcript => "keyboard.transcript",
            Slot::Status => "keyboard.status",
            Slot::IsRecording => "keyboard.isRecording",
            Slot::IsModelLoaded => "keyboard.isModelLoaded",
            Slot::SelectedModelFilename => "keyboard.selectedModelFilename",
        }
    }
}

// ---------------------------------------------------------------------------
// SharedStore trait
// ---------------------------------------------------------------------------

/// Key/value store visible to both processes.
pub trait SharedStore: Send + Sync {
    /// Read one slot. `Ok(None)` means the slot was never written or removed.
    fn read(&self, slot: Slot) -> Result<Option<Value>, StoreError>;

    fn write(&self, slot: Slot, value: Value) -> Result<(), StoreError>;

    fn remove(&self, slot: Slot) -> Result<(), StoreError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SharedStore>) {}
};

// ---------------------------------------------------------------------------
// SharedSnapshot
// ---------------------------------------------------------------------------

/// Replicated, eventually consistent copy of the session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedSnapshot {
    pub transcript_text: String,
    pub status_code: i32,
    pub is_recording: bool,
    pub is_model_loaded: bool,
    pub selected_model_filename: Option<String>,
}

impl SharedSnapshot {
    /// Read every slot from `store`.
    ///
    /// Missing slots take their defaults; a slot that holds a value of the
    /// wrong type, or that cannot be decoded, reads as missing. Only an
    /// unavailable store is reported as an error.
    pub fn read_from(store: &dyn SharedStore) -> Result<Self, StoreError> {
        let transcript_text = read_slot(store, Slot::Transcript)?
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        let status_code = read_slot(store, Slot::Status)?
            .and_then(|v| v.as_i64())
            .and_then(|n| i32::try_from(n).ok())
            .unwrap_or_default();
        let is_recording = read_slot(store, Slot::IsRecording)?
            .and_then(|v| v.as_bool())
            .unwrap_or_default();
        let is_model_loaded = read_slot(store, Slot::IsModelLoaded)?
            .and_then(|v| v.as_bool())
            .unwrap_or_default();
        let selected_model_filename = read_slot(store, Slot::SelectedModelFilename)?
            .and_then(|v| v.as_str().map(str::to_owned))
            .filter(|s| !s.is_empty());

        Ok(Self {
            transcript_text,
            status_code,
            is_recording,
            is_model_loaded,
            selected_model_filename,
        })
    }
}

fn read_slot(store: &dyn SharedStore, slot: Slot) -> Result<Option<Value>, StoreError> {
    match store.read(slot) {
        Ok(value) => Ok(value),
        Err(e @ StoreError::Unavailable(_)) => Err(e),
        Err(e) => {
            log::debug!("shared: treating unreadable slot {} as missing: {e}", slot.key());
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_stable() {
        assert_eq!(Slot::Transcript.key(), "keyboard.transcript");
        assert_eq!(Slot::Status.key(), "keyboard.status");
        assert_eq!(Slot::IsRecording.key(), "keyboard.isRecording");
        assert_eq!(Slot::IsModelLoaded.key(), "keyboard.isModelLoaded");
        assert_eq!(
            Slot::SelectedModelFilename.key(),
            "keyboard.selectedModelFilename"
        );
    }

    #[test]
    fn empty_store_reads_defaults() {
        let store = MemoryStore::new();
        let snap = SharedSnapshot::read_from(&store).expect("read");
        assert_eq!(snap, SharedSnapshot::default());
    }

    #[test]
    fn wrong_types_read_as_missing() {
        let store = MemoryStore::new();
        store.write(Slot::Transcript, json!(42)).unwrap();
        store.write(Slot::IsRecording, json!("yes")).unwrap();
        store.write(Slot::Status, json!(3)).unwrap();
        store.write(Slot::SelectedModelFilename, json!("")).unwrap();

        let snap = SharedSnapshot::read_from(&store).expect("read");
        assert_eq!(snap.transcript_text, "");
        assert!(!snap.is_recording);
        assert_eq!(snap.status_code, 3);
        assert_eq!(snap.selected_model_filename, None);
    }

    #[test]
    fn unavailable_store_is_an_error() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(matches!(
            SharedSnapshot::read_from(&store),
            Err(StoreError::Unavailable(_))
        ));
    }
}
