//! Clipboard access for auto-paste, backed by `arboard`.
//!
//! One [`ClipboardSession`] is opened per paste on the blocking thread that
//! performs it; `arboard::Clipboard` is not `Send` on every platform.

use arboard::Clipboard;

use super::InjectError;

pub struct ClipboardSession {
    clipboard: Clipboard,
    previous: Option<String>,
}

impl ClipboardSession {
    /// Open the clipboard and remember its current text, if any.
    pub fn open() -> Result<Self, InjectError> {
        let mut clipboard =
            Clipboard::new().map_err(|e| InjectError::ClipboardAccess(e.to_string()))?;
        // Empty or non-text contents are not an error.
        let previous = clipboard.get_text().ok();
        Ok(Self {
            clipboard,
            previous,
        })
    }

    pub fn set_text(&mut self, text: &str) -> Result<(), InjectError> {
        self.clipboard
            .set_text(text)
            .map_err(|e| InjectError::ClipboardSet(e.to_string()))
    }

    /// Put the remembered text back. Nothing to do if there was none.
    pub fn restore(mut self) -> Result<(), InjectError> {
        match self.previous.take() {
            Some(text) => self.set_text(&text),
            None => Ok(()),
        }
    }
}
