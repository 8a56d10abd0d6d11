//! Scriptable in-process engine used by the session tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{EngineSettings, ModelSize, TranscribeOptions, TranscriptionEngine};

/// Records every call and answers with pre-configured results.
#[derive(Debug)]
pub struct MockEngine {
    pub start_ok: AtomicBool,
    pub load_ok: AtomicBool,
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub unload_calls: AtomicUsize,
    pub loaded: Mutex<Vec<ModelSize>>,
    pub settings: Mutex<Vec<EngineSettings>>,
    pub present: Mutex<Vec<ModelSize>>,
    pub last_stop_options: Mutex<Option<TranscribeOptions>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            start_ok: AtomicBool::new(true),
            load_ok: AtomicBool::new(true),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            unload_calls: AtomicUsize::new(0),
            loaded: Mutex::new(Vec::new()),
            settings: Mutex::new(Vec::new()),
            present: Mutex::new(Vec::new()),
            last_stop_options: Mutex::new(None),
        }
    }

    pub fn with_models(models: &[ModelSize]) -> Self {
        let engine = Self::new();
        *engine.present.lock().unwrap() = models.to_vec();
        engine
    }

    pub fn starts(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl TranscriptionEngine for MockEngine {
    fn start_live(&self, _language: &str) -> bool {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.start_ok.load(Ordering::SeqCst)
    }

    fn stop_live(&self, options: &TranscribeOptions) -> bool {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_stop_options.lock().unwrap() = Some(options.clone());
        true
    }

    fn model_exists(&self, size: ModelSize) -> bool {
        self.present.lock().unwrap().contains(&size)
    }

    fn model_load(&self, size: ModelSize) -> bool {
        self.loaded.lock().unwrap().push(size);
        self.load_ok.load(Ordering::SeqCst)
    }

    fn model_unload(&self) {
        self.unload_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn audio_level(&self) -> f32 {
        0.25
    }

    fn write_settings(&self, settings: &EngineSettings) -> bool {
        self.settings.lock().unwrap().push(*settings);
        true
    }
}
