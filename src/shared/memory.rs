//! In-process shared store for tests and single-process runs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde_json::Value;

use super::{SharedStore, Slot, StoreError};

#[derive(Debug)]
pub struct MemoryStore {
    slots: Mutex<HashMap<Slot, Value>>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the shared container disappearing (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(PathBuf::from("<memory>")))
        }
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<Slot, Value>> {
        // A panicking writer cannot leave a half-written Value behind.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SharedStore for MemoryStore {
    fn read(&self, slot: Slot) -> Result<Option<Value>, StoreError> {
        self.check()?;
        Ok(self.slots().get(&slot).cloned())
    }

    fn write(&self, slot: Slot, value: Value) -> Result<(), StoreError> {
        self.check()?;
        self.slots().insert(slot, value);
        Ok(())
    }

    fn remove(&self, slot: Slot) -> Result<(), StoreError> {
        self.check()?;
        self.slots().remove(&slot);
        Ok(())
    }
}
