//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every struct is `#[serde(default)]`, so a settings file written by an older
//! build (or edited by hand) only needs the keys it wants to override.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::engine::{ModelSize, Tone, TranscribeOptions};
use crate::hotkey::HotkeyCombo;

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Which flavour of the privileged process is running.
///
/// | Variant | Auto-paste | Overlay | Global hotkey |
/// |---------|------------|---------|---------------|
/// | Desktop | yes        | yes     | yes           |
/// | Mobile  | no         | no      | no            |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Desktop,
    Mobile,
}

impl Default for Profile {
    fn default() -> Self {
        Self::Desktop
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Options forwarded to the transcription engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Speech language as an ISO-639-1 code.
    pub language: String,
    /// Output tone used by the engine's formatter.
    pub tone: Tone,
    pub remove_filler_words: bool,
    pub auto_punctuate: bool,
    /// Ask the engine for an LLM post-formatting pass (adds the
    /// `Formatting` phase).
    pub use_llm_formatting: bool,
    /// Silero VAD model file; `None` lets the engine run without VAD.
    pub vad_model_path: Option<PathBuf>,
    /// Local LLM used for post-formatting.
    pub llm_model_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            language: "en".into(),
            tone: Tone::default(),
            remove_filler_words: true,
            auto_punctuate: true,
            use_llm_formatting: false,
            vad_model_path: None,
            llm_model_path: None,
        }
    }
}

impl EngineConfig {
    /// Options passed to the engine when a live session is finalised.
    pub fn transcribe_options(&self) -> TranscribeOptions {
        TranscribeOptions {
            language: self.language.clone(),
            tone: self.tone,
            remove_filler_words: self.remove_filler_words,
            auto_punctuate: self.auto_punctuate,
            use_llm_formatting: self.use_llm_formatting,
        }
    }
}

// ---------------------------------------------------------------------------
// ModelConfig
// ---------------------------------------------------------------------------

/// Whisper model selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model the user has picked in settings.
    pub selected: ModelSize,
    /// Last model that loaded successfully; reloaded on startup.
    pub default_model: Option<ModelSize>,
    /// Reload `default_model` when the privileged process starts.
    pub load_on_start: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            selected: ModelSize::Small,
            default_model: None,
            load_on_start: true,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Global hotkey binding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// Press-and-hold combination that drives recording.
    pub combo: HotkeyCombo,
}

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

/// Cross-process synchronisation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How often the restricted process re-reads the shared snapshot.
    pub poll_interval_ms: u64,
    /// Overrides the shared container location from [`AppPaths`].
    pub shared_dir: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            shared_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// OverlayConfig
// ---------------------------------------------------------------------------

/// Timing of the transcript overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub enabled: bool,
    /// Lower bound of the auto-dismiss delay.
    pub min_dismiss_ms: u64,
    /// Upper bound of the auto-dismiss delay.
    pub max_dismiss_ms: u64,
    /// Reading time granted per transcript word.
    pub per_word_ms: u64,
    pub fade_in_ms: u64,
    pub fade_out_ms: u64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_dismiss_ms: 1_500,
            max_dismiss_ms: 5_000,
            per_word_ms: 400,
            fade_in_ms: 250,
            fade_out_ms: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// DownloadConfig
// ---------------------------------------------------------------------------

/// Model download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Mirror that serves `ggml-*.bin` files.
    pub base_url: String,
    /// Size used to approximate progress when the server sends no
    /// `Content-Length`.
    pub indeterminate_reference_bytes: u64,
    pub timeout_secs: u64,
    /// Select and load the model as soon as it is published.
    pub load_after_download: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            base_url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main".into(),
            indeterminate_reference_bytes: 100_000_000,
            timeout_secs: 600,
            load_after_download: true,
        }
    }
}

// ---------------------------------------------------------------------------
// PasteConfig
// ---------------------------------------------------------------------------

/// Desktop auto-paste of final transcripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasteConfig {
    pub auto_paste: bool,
    /// Put the previous clipboard text back after pasting.
    pub restore_clipboard: bool,
    /// Milliseconds between setting the clipboard and simulating paste.
    pub delay_ms: u64,
}

impl Default for PasteConfig {
    fn default() -> Self {
        Self {
            auto_paste: true,
            restore_clipboard: false,
            delay_ms: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// ActivationConfig
// ---------------------------------------------------------------------------

/// Deep-link entry point that toggles recording (`<scheme>://<host>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    pub scheme: String,
    pub host: String,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            scheme: "voicedictation".into(),
            host: "record".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_dictation::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub profile: Profile,
    pub engine: EngineConfig,
    pub model: ModelConfig,
    pub hotkey: HotkeyConfig,
    pub sync: SyncConfig,
    pub overlay: OverlayConfig,
    pub download: DownloadConfig,
    pub paste: PasteConfig,
    pub activation: ActivationConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolved paths with the `sync.shared_dir` override applied.
    pub fn paths(&self) -> AppPaths {
        AppPaths::new().with_shared_dir(self.sync.shared_dir.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
