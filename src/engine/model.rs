//! Model registry, metadata and path resolution.
//!
//! [`ModelSize`] enumerates the GGML Whisper models the engine understands.
//! [`ModelPaths`] resolves the on-disk location of a model given a models
//! directory; both processes use it, the restricted one to decide whether a
//! model file is actually present.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ModelSize
// ---------------------------------------------------------------------------

/// Capacity tier of a Whisper GGML model.
///
/// Serialised with its storage key (`"tiny"`, …, `"large_turbo"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSize {
    /// ~75 MB: fastest, least accurate.
    Tiny,
    /// ~142 MB: fast, basic accuracy.
    Base,
    /// ~466 MB: balanced (default).
    Small,
    /// ~1.5 GB: high accuracy.
    Medium,
    /// ~3.1 GB: highest accuracy, slowest.
    Large,
    /// ~809 MB: large-v3 distilled for speed.
    LargeTurbo,
}

impl ModelSize {
    /// Every model, smallest first.
    pub const ALL: [ModelSize; 6] = [
        ModelSize::Tiny,
        ModelSize::Base,
        ModelSize::Small,
        ModelSize::Medium,
        ModelSize::Large,
        ModelSize::LargeTurbo,
    ];

    /// Value of the engine's `model_size` C enum.
    pub fn raw(self) -> i32 {
        match self {
            ModelSize::Tiny => 0,
            ModelSize::Base => 1,
            ModelSize::Small => 2,
            ModelSize::Medium => 3,
            ModelSize::Large => 4,
            ModelSize::LargeTurbo => 5,
        }
    }

    /// Key used in settings and on the command line.
    pub fn storage_key(self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
            ModelSize::LargeTurbo => "large_turbo",
        }
    }

    /// File name under the models directory.
    pub fn filename(self) -> &'static str {
        match self {
            ModelSize::Tiny => "ggml-tiny.bin",
            ModelSize::Base => "ggml-base.bin",
            ModelSize::Small => "ggml-small.bin",
            ModelSize::Medium => "ggml-medium.bin",
            ModelSize::Large => "ggml-large-v3.bin",
            ModelSize::LargeTurbo => "ggml-large-v3-turbo.bin",
        }
    }

    /// Human-readable name with the approximate download size.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelSize::Tiny => "Tiny (~75 MB)",
            ModelSize::Base => "Base (~142 MB)",
            ModelSize::Small => "Small (~466 MB)",
            ModelSize::Medium => "Medium (~1.5 GB)",
            ModelSize::Large => "Large (~3.1 GB)",
            ModelSize::LargeTurbo => "Large Turbo (~809 MB)",
        }
    }

    /// Download URL of the model file below `base_url`.
    pub fn download_url(self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.filename())
    }

    /// Look a model up by its file name (the form replicated to the
    /// restricted process).
    pub fn from_filename(filename: &str) -> Option<ModelSize> {
        Self::ALL.into_iter().find(|m| m.filename() == filename)
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_key())
    }
}

impl FromStr for ModelSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.storage_key() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|m| m.storage_key()).collect();
                format!("unknown model '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

// ---------------------------------------------------------------------------
// ModelPaths
// ---------------------------------------------------------------------------

/// Resolves the on-disk location of model files.
///
/// ```rust,no_run
/// use voice_dictation::config::AppPaths;
/// use voice_dictation::engine::{ModelPaths, ModelSize};
///
/// let paths = ModelPaths::new(AppPaths::new().models_dir);
/// let available = paths.list_local_models();
/// assert!(available.len() <= ModelSize::ALL.len());
/// ```
#[derive(Debug, Clone)]
pub struct ModelPaths {
    /// Directory that contains (or will contain) GGML `.bin` files.
    pub models_dir: PathBuf,
}

impl ModelPaths {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    /// Full path to the GGML file for the given model.
    pub fn model_path(&self, model: ModelSize) -> PathBuf {
        self.models_dir.join(model.filename())
    }

    /// Returns `true` if the model file exists on disk.
    pub fn is_available(&self, model: ModelSize) -> bool {
        self.model_path(model).is_file()
    }

    /// Returns `true` if a file called `filename` exists in the models
    /// directory. Path separators are rejected so a replicated filename can
    /// never point outside the directory.
    pub fn has_file(&self, filename: &str) -> bool {
        if filename.is_empty() || Path::new(filename).components().count() != 1 {
            return false;
        }
        self.models_dir.join(filename).is_file()
    }

    /// Returns all models that are present on disk.
    pub fn list_local_models(&self) -> Vec<ModelSize> {
        ModelSize::ALL
            .into_iter()
            .filter(|m| self.is_available(*m))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
