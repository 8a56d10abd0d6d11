//! `#[repr(C)]` mirror of the engine's C header.
//!
//! The layout types are always compiled because the callback bridge speaks
//! them. The `extern "C"` declarations and [`NativeEngine`] are only built
//! with the `native-engine` feature, which links `libbobrwhisper`.

use std::ffi::c_void;
use std::os::raw::{c_char, c_int};

/// Borrowed `(ptr, len)` string. Not NUL-terminated.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawString {
    pub ptr: *const c_char,
    pub len: usize,
}

pub type StatusCallback = Option<unsafe extern "C" fn(userdata: *mut c_void, status: c_int)>;
pub type TranscriptCallback =
    Option<unsafe extern "C" fn(userdata: *mut c_void, text: RawString, is_final: bool)>;
pub type ErrorCallback = Option<unsafe extern "C" fn(userdata: *mut c_void, error: RawString)>;

/// Runtime configuration passed to `bobrwhisper_app_new`.
#[repr(C)]
#[derive(Debug)]
pub struct RawRuntimeConfig {
    pub userdata: *mut c_void,
    pub on_status_change: StatusCallback,
    pub on_transcript: TranscriptCallback,
    pub on_error: ErrorCallback,
    pub models_dir: *const c_char,
    pub config_path: *const c_char,
    pub llm_model_path: *const c_char,
    pub vad_model_path: *const c_char,
}

#[repr(C)]
#[derive(Debug)]
pub struct RawTranscribeOptions {
    pub language: *const c_char,
    pub tone: c_int,
    pub remove_filler_words: bool,
    pub auto_punctuate: bool,
    pub use_llm_formatting: bool,
}

#[repr(C)]
#[derive(Debug)]
pub struct RawSettings {
    pub tone: c_int,
    pub remove_filler_words: bool,
    pub auto_punctuate: bool,
    pub use_llm_formatting: bool,
}

#[cfg(feature = "native-engine")]
pub use native::{deinit, init, NativeEngine};

#[cfg(feature = "native-engine")]
mod native {
    use std::ffi::{c_void, CString};
    use std::os::raw::{c_char, c_int};
    use std::path::Path;
    use std::sync::Arc;

    use super::{RawRuntimeConfig, RawSettings, RawString, RawTranscribeOptions};
    use crate::config::EngineConfig;
    use crate::engine::bridge::{self, Registration};
    use crate::engine::{
        EngineError, EngineEventSender, EngineSettings, ModelSize, TranscribeOptions,
        TranscriptionEngine,
    };

    #[link(name = "bobrwhisper")]
    extern "C" {
        fn bobrwhisper_init() -> c_int;
        fn bobrwhisper_deinit();
        fn bobrwhisper_app_new(config: *const RawRuntimeConfig) -> *mut c_void;
        fn bobrwhisper_app_free(app: *mut c_void);
        fn bobrwhisper_model_exists(app: *mut c_void, size: c_int) -> bool;
        fn bobrwhisper_model_load(app: *mut c_void, size: c_int) -> bool;
        fn bobrwhisper_model_unload(app: *mut c_void);
        fn bobrwhisper_settings_write(app: *mut c_void, settings: *const RawSettings) -> bool;
        fn bobrwhisper_start_recording_live(app: *mut c_void, language: *const c_char) -> bool;
        fn bobrwhisper_stop_recording_live(
            app: *mut c_void,
            options: *const RawTranscribeOptions,
        ) -> bool;
        fn bobrwhisper_get_audio_level(app: *mut c_void) -> f32;
        #[allow(dead_code)]
        fn bobrwhisper_string_free(s: RawString);
    }

    /// Library-wide initialisation; call once before [`NativeEngine::create`].
    pub fn init() -> Result<(), EngineError> {
        // SAFETY: no preconditions.
        let status = unsafe { bobrwhisper_init() };
        if status == 0 {
            Ok(())
        } else {
            Err(EngineError::Init(status))
        }
    }

    pub fn deinit() {
        // SAFETY: every NativeEngine must have been dropped by now.
        unsafe { bobrwhisper_deinit() }
    }

    fn c_string(s: &str) -> Result<CString, EngineError> {
        CString::new(s).map_err(|_| EngineError::InvalidString(s.to_string()))
    }

    fn c_path(path: &Path) -> Result<CString, EngineError> {
        c_string(&path.to_string_lossy())
    }

    /// One engine session handle.
    pub struct NativeEngine {
        app: *mut c_void,
        // Keeps callbacks routable for as long as the handle lives.
        _registration: Registration,
        // Paths the engine may keep referencing after `app_new`.
        _strings: Vec<CString>,
    }

    // SAFETY: the engine's entry points are thread-safe per its header
    // contract; the handle is only freed in Drop.
    unsafe impl Send for NativeEngine {}
    unsafe impl Sync for NativeEngine {}

    impl std::fmt::Debug for NativeEngine {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("NativeEngine").finish_non_exhaustive()
        }
    }

    impl NativeEngine {
        /// Create a session handle whose callbacks are delivered to `events`.
        pub fn create(
            config: &EngineConfig,
            models_dir: &Path,
            config_domain: &str,
            events: EngineEventSender,
        ) -> Result<Arc<Self>, EngineError> {
            let registration = Registration::new(events);

            let models_dir = c_path(models_dir)?;
            let config_domain = c_string(config_domain)?;
            let vad = config.vad_model_path.as_deref().map(c_path).transpose()?;
            let llm = config.llm_model_path.as_deref().map(c_path).transpose()?;

            let raw = RawRuntimeConfig {
                userdata: registration.userdata(),
                on_status_change: Some(bridge::on_status_change),
                on_transcript: Some(bridge::on_transcript),
                on_error: Some(bridge::on_error),
                models_dir: models_dir.as_ptr(),
                config_path: config_domain.as_ptr(),
                llm_model_path: llm.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
                vad_model_path: vad.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
            };

            // SAFETY: `raw` and every string it points to outlive the call and
            // are kept alive in `_strings` afterwards.
            let app = unsafe { bobrwhisper_app_new(&raw) };
            if app.is_null() {
                return Err(EngineError::Create);
            }

            let mut strings = vec![models_dir, config_domain];
            strings.extend(vad);
            strings.extend(llm);

            Ok(Arc::new(Self {
                app,
                _registration: registration,
                _strings: strings,
            }))
        }
    }

    impl Drop for NativeEngine {
        fn drop(&mut self) {
            // SAFETY: `app` came from app_new and is freed exactly once.
            unsafe { bobrwhisper_app_free(self.app) };
        }
    }

    impl TranscriptionEngine for NativeEngine {
        fn start_live(&self, language: &str) -> bool {
            let Ok(language) = c_string(language) else {
                return false;
            };
            // SAFETY: `language` lives across the call.
            unsafe { bobrwhisper_start_recording_live(self.app, language.as_ptr()) }
        }

        fn stop_live(&self, options: &TranscribeOptions) -> bool {
            let Ok(language) = c_string(&options.language) else {
                return false;
            };
            let raw = RawTranscribeOptions {
                language: language.as_ptr(),
                tone: options.tone.raw(),
                remove_filler_words: options.remove_filler_words,
                auto_punctuate: options.auto_punctuate,
                use_llm_formatting: options.use_llm_formatting,
            };
            // SAFETY: `raw` and `language` live across the call.
            unsafe { bobrwhisper_stop_recording_live(self.app, &raw) }
        }

        fn model_exists(&self, size: ModelSize) -> bool {
            unsafe { bobrwhisper_model_exists(self.app, size.raw()) }
        }

        fn model_load(&self, size: ModelSize) -> bool {
            unsafe { bobrwhisper_model_load(self.app, size.raw()) }
        }

        fn model_unload(&self) {
            unsafe { bobrwhisper_model_unload(self.app) }
        }

        fn audio_level(&self) -> f32 {
            unsafe { bobrwhisper_get_audio_level(self.app) }
        }

        fn write_settings(&self, settings: &EngineSettings) -> bool {
            let raw = RawSettings {
                tone: settings.tone.raw(),
                remove_filler_words: settings.remove_filler_words,
                auto_punctuate: settings.auto_punctuate,
                use_llm_formatting: settings.use_llm_formatting,
            };
            unsafe { bobrwhisper_settings_write(self.app, &raw) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_string_matches_c_layout() {
        assert_eq!(
            std::mem::size_of::<RawString>(),
            std::mem::size_of::<*const c_char>() + std::mem::size_of::<usize>()
        );
    }

    #[test]
    fn bridge_callbacks_fit_the_config_slots() {
        let config = RawRuntimeConfig {
            userdata: std::ptr::null_mut(),
            on_status_change: Some(crate::engine::bridge::on_status_change),
            on_transcript: Some(crate::engine::bridge::on_transcript),
            on_error: Some(crate::engine::bridge::on_error),
            models_dir: std::ptr::null(),
            config_path: std::ptr::null(),
            llm_model_path: std::ptr::null(),
            vad_model_path: std::ptr::null(),
        };
        assert!(config.on_transcript.is_some());
    }
}
