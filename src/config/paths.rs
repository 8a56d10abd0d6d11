//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\voice-dictation\
//!   macOS:   ~/Library/Application Support/voice-dictation/
//!   Linux:   ~/.config/voice-dictation/
//!
//! Data dir (models + shared container):
//!   Windows: %LOCALAPPDATA%\voice-dictation\
//!   macOS:   ~/Library/Application Support/voice-dictation/
//!   Linux:   ~/.local/share/voice-dictation/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for downloaded GGML model files.
    ///
    /// Lives next to the shared container so the restricted process can
    /// check that a model file is actually present.
    pub models_dir: PathBuf,
    /// Shared container backing the cross-process state store.
    pub shared_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-dictation";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let models_dir = data_dir.join("models");
        let shared_dir = data_dir.join("shared");

        Self {
            config_dir,
            settings_file,
            models_dir,
            shared_dir,
        }
    }

    /// Replace the shared container location (from `SyncConfig::shared_dir`).
    pub fn with_shared_dir(mut self, shared_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = shared_dir {
            self.shared_dir = dir;
        }
        self
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
