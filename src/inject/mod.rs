//! Desktop auto-paste of final transcripts into the foreground application.
//!
//! 1. Open the clipboard and remember its text.
//! 2. Put the transcript on the clipboard.
//! 3. Wait `delay_ms` so the clipboard owner has published it.
//! 4. Simulate ⌘V / Ctrl+V.
//! 5. Optionally restore the previous clipboard text.
//!
//! All of this blocks; the session runs it on `spawn_blocking`.

pub mod clipboard;
pub mod keyboard;

use std::time::Duration;

use thiserror::Error;

use crate::config::PasteConfig;
use clipboard::ClipboardSession;

// ---------------------------------------------------------------------------
// InjectError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum InjectError {
    #[error("cannot access clipboard: {0}")]
    ClipboardAccess(String),

    #[error("cannot set clipboard text: {0}")]
    ClipboardSet(String),

    #[error("cannot simulate key press: {0}")]
    KeySimulation(String),
}

// ---------------------------------------------------------------------------
// Paster trait
// ---------------------------------------------------------------------------

/// Something that can paste text into the foreground application.
pub trait Paster: Send + Sync {
    fn paste(&self, text: &str) -> Result<(), InjectError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Paster>) {}
};

// ---------------------------------------------------------------------------
// TextInjector
// ---------------------------------------------------------------------------

/// Clipboard + simulated-keystroke paster.
#[derive(Debug, Clone)]
pub struct TextInjector {
    delay: Duration,
    /// Time the target gets to read the clipboard before it is restored.
    restore_after: Duration,
    restore_clipboard: bool,
}

impl TextInjector {
    pub fn new(config: &PasteConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.delay_ms),
            restore_after: Duration::from_millis(100),
            restore_clipboard: config.restore_clipboard,
        }
    }
}

impl Paster for TextInjector {
    fn paste(&self, text: &str) -> Result<(), InjectError> {
        let mut session = ClipboardSession::open()?;
        session.set_text(text)?;
        std::thread::sleep(self.delay);
        keyboard::send_paste_shortcut()?;

        if self.restore_clipboard {
            std::thread::sleep(self.restore_after);
            if let Err(e) = session.restore() {
                log::warn!("inject: could not restore clipboard: {e}");
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------
