//! Directory-backed shared store: one JSON file per slot.
//!
//! Each write goes to a temporary file in the same directory and is renamed
//! over the slot file, so a reader sees either the old or the new value of a
//! slot, never a torn one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;

use super::{SharedStore, Slot, StoreError};

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open the store, creating the shared directory if needed.
    ///
    /// Used by the privileged process, which owns the container.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        log::debug!("shared: store created at {}", dir.display());
        Ok(Self { dir })
    }

    /// Open an existing store without creating anything.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(StoreError::Unavailable(dir));
        }
        Ok(Self { dir })
    }

    /// Point at `dir` without checking it. Every operation fails with
    /// [`StoreError::Unavailable`] until the directory appears.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, slot: Slot) -> PathBuf {
        self.dir.join(format!("{}.json", slot.key()))
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(StoreError::Unavailable(self.dir.clone()))
        }
    }
}

impl SharedStore for FileStore {
    fn read(&self, slot: Slot) -> Result<Option<Value>, StoreError> {
        self.ensure_available()?;
        let bytes = match fs::read(self.slot_path(slot)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn write(&self, slot: Slot, value: Value) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut tmp, &value)?;
        tmp.flush()?;
        tmp.persist(self.slot_path(slot)).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, slot: Slot) -> Result<(), StoreError> {
        self.ensure_available()?;
        match fs::remove_file(self.slot_path(slot)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
