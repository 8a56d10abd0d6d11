//! Write side of the replication: mirrors session state into the store.
//!
//! Writes are fire-and-forget: a failed write is logged, never returned.
//! [`SnapshotWriter::sync`] reports what actually landed so the caller can
//! retry a failed slot on the next sync.

use std::sync::Arc;

use serde_json::{json, Value};

use super::{SharedSnapshot, SharedStore, Slot};

#[derive(Clone)]
pub struct SnapshotWriter {
    store: Arc<dyn SharedStore>,
}

impl std::fmt::Debug for SnapshotWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotWriter").finish_non_exhaustive()
    }
}

impl SnapshotWriter {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    fn write(&self, slot: Slot, value: Value) -> bool {
        match self.store.write(slot, value) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("shared: failed to write {}: {e}", slot.key());
                false
            }
        }
    }

    pub fn transcript(&self, text: &str) -> bool {
        self.write(Slot::Transcript, json!(text))
    }

    pub fn status(&self, code: i32) -> bool {
        self.write(Slot::Status, json!(code))
    }

    pub fn recording(&self, is_recording: bool) -> bool {
        self.write(Slot::IsRecording, json!(is_recording))
    }

    pub fn model_loaded(&self, loaded: bool) -> bool {
        self.write(Slot::IsModelLoaded, json!(loaded))
    }

    /// Write the selected model's file name, or remove the slot.
    pub fn selected_model(&self, filename: Option<&str>) -> bool {
        match filename {
            Some(name) => self.write(Slot::SelectedModelFilename, json!(name)),
            None => match self.store.remove(Slot::SelectedModelFilename) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!(
                        "shared: failed to clear {}: {e}",
                        Slot::SelectedModelFilename.key()
                    );
                    false
                }
            },
        }
    }

    /// Write the fields that differ between `stored` and `next`.
    ///
    /// Returns the snapshot the store now holds: `next` for every field that
    /// was written, `stored` for every field whose write failed. Pass it back
    /// as `stored` next time so a failed slot is retried.
    pub fn sync(&self, stored: &SharedSnapshot, next: &SharedSnapshot) -> SharedSnapshot {
        let mut landed = stored.clone();
        if stored.transcript_text != next.transcript_text && self.transcript(&next.transcript_text)
        {
            landed.transcript_text = next.transcript_text.clone();
        }
        if stored.status_code != next.status_code && self.status(next.status_code) {
            landed.status_code = next.status_code;
        }
        if stored.is_recording != next.is_recording && self.recording(next.is_recording) {
            landed.is_recording = next.is_recording;
        }
        if stored.is_model_loaded != next.is_model_loaded
            && self.model_loaded(next.is_model_loaded)
        {
            landed.is_model_loaded = next.is_model_loaded;
        }
        if stored.selected_model_filename != next.selected_model_filename
            && self.selected_model(next.selected_model_filename.as_deref())
        {
            landed.selected_model_filename = next.selected_model_filename.clone();
        }
        landed
    }

    /// Write every field of `snapshot`.
    pub fn publish(&self, snapshot: &SharedSnapshot) {
        self.transcript(&snapshot.transcript_text);
        self.status(snapshot.status_code);
        self.recording(snapshot.is_recording);
        self.model_loaded(snapshot.is_model_loaded);
        self.selected_model(snapshot.selected_model_filename.as_deref());
    }

    /// Clear stale state left by a previous run. The selected model slot is
    /// kept.
    pub fn reset(&self) {
        self.recording(false);
        self.model_loaded(false);
        self.transcript("");
        self.status(0);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{MemoryStore, StoreError};
    use std::sync::Mutex;

    /// Store that counts writes per slot.
    #[derive(Default)]
    struct CountingStore {
        writes: Mutex<Vec<Slot>>,
    }

    impl SharedStore for CountingStore {
        fn read(&self, _slot: Slot) -> Result<Option<Value>, StoreError> {
            Ok(None)
        }
        fn write(&self, slot: Slot, _value: Value) -> Result<(), StoreError> {
            self.writes.lock().unwrap().push(slot);
            Ok(())
        }
        fn remove(&self, slot: Slot) -> Result<(), StoreError> {
            self.writes.lock().unwrap().push(slot);
            Ok(())
        }
    }

    #[test]
    fn sync_writes_only_changed_fields() {
        let store = Arc::new(CountingStore::default());
        let writer = SnapshotWriter::new(store.clone());

        let prev = SharedSnapshot::default();
        let next = SharedSnapshot {
            transcript_text: "hi".into(),
            is_recording: true,
            status_code: 1,
            ..prev.clone()
        };
        let landed = writer.sync(&prev, &next);

        let writes = store.writes.lock().unwrap().clone();
        assert_eq!(writes, vec![Slot::Transcript, Slot::Status, Slot::IsRecording]);
        assert_eq!(landed, next);
    }

    #[test]
    fn failed_slot_is_retried_on_next_sync() {
        let store = Arc::new(MemoryStore::new());
        let writer = SnapshotWriter::new(store.clone());
        let recording = SharedSnapshot {
            is_recording: true,
            status_code: 1,
            ..SharedSnapshot::default()
        };
        let stored = writer.sync(&SharedSnapshot::default(), &recording);
        assert_eq!(stored, recording);

        // The stop lands while the container is gone.
        store.set_available(false);
        let stopped = SharedSnapshot {
            status_code: 2,
            ..SharedSnapshot::default()
        };
        let stored = writer.sync(&stored, &stopped);
        assert_eq!(stored, recording);

        // Back again; a later unrelated change carries the stop along.
        store.set_available(true);
        let ready = SharedSnapshot {
            transcript_text: "done".into(),
            status_code: 4,
            ..SharedSnapshot::default()
        };
        let stored = writer.sync(&stored, &ready);
        assert_eq!(stored, ready);

        let snap = SharedSnapshot::read_from(store.as_ref()).unwrap();
        assert_eq!(snap, ready);
        assert!(!snap.is_recording);
    }

    #[test]
    fn reset_clears_live_fields_and_keeps_model_name() {
        let store = Arc::new(MemoryStore::new());
        let writer = SnapshotWriter::new(store.clone());
        writer.publish(&SharedSnapshot {
            transcript_text: "old".into(),
            status_code: 4,
            is_recording: true,
            is_model_loaded: true,
            selected_model_filename: Some("ggml-base.bin".into()),
        });

        writer.reset();

        let snap = SharedSnapshot::read_from(store.as_ref()).unwrap();
        assert_eq!(
            snap,
            SharedSnapshot {
                selected_model_filename: Some("ggml-base.bin".into()),
                ..SharedSnapshot::default()
            }
        );
    }

    #[test]
    fn write_failures_are_swallowed() {
        let store = Arc::new(MemoryStore::new());
        store.set_available(false);
        let writer = SnapshotWriter::new(store.clone());
        writer.transcript("lost");
        writer.selected_model(None);

        store.set_available(true);
        let snap = SharedSnapshot::read_from(store.as_ref()).unwrap();
        assert_eq!(snap.transcript_text, "");
    }
}
