//! Paste shortcut simulation backed by `enigo`.
//!
//! | Platform        | Shortcut |
//! |-----------------|----------|
//! | macOS           | ⌘V       |
//! | Windows / Linux | Ctrl+V   |

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use super::InjectError;

#[cfg(target_os = "macos")]
const PASTE_MODIFIER: Key = Key::Meta;
#[cfg(not(target_os = "macos"))]
const PASTE_MODIFIER: Key = Key::Control;

fn key(enigo: &mut Enigo, key: Key, direction: Direction) -> Result<(), InjectError> {
    enigo
        .key(key, direction)
        .map_err(|e| InjectError::KeySimulation(e.to_string()))
}

/// Send the platform paste shortcut to the focused application.
pub fn send_paste_shortcut() -> Result<(), InjectError> {
    let mut enigo =
        Enigo::new(&Settings::default()).map_err(|e| InjectError::KeySimulation(e.to_string()))?;

    key(&mut enigo, PASTE_MODIFIER, Direction::Press)?;
    let pasted = key(&mut enigo, Key::Unicode('v'), Direction::Click);
    // Always release the modifier, even if the click failed.
    key(&mut enigo, PASTE_MODIFIER, Direction::Release)?;
    pasted
}
