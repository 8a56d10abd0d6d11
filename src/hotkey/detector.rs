//! Edge-triggered hold-to-talk detection.
//!
//! The detector derives a single "pressed" boolean from each event and only
//! acts when it changes:
//!
//! - modifier-only combos: pressed = all required modifier bits are set;
//! - key + modifier combos: pressed on a non-repeat key-down of the trigger
//!   key while the modifiers are held, released on key-up of the trigger or
//!   when a required modifier is let go.
//!
//! A rising edge yields `Start` unless a session is already recording; a
//! falling edge yields `Stop` if a session is recording (or this detector
//! just asked for one and the state has not caught up yet).

use super::{HotkeyAction, HotkeyCombo, InputEvent};

#[derive(Debug, Clone)]
pub struct HotkeyDetector {
    combo: HotkeyCombo,
    pressed: bool,
    started: bool,
}

impl HotkeyDetector {
    pub fn new(combo: HotkeyCombo) -> Self {
        Self {
            combo,
            pressed: false,
            started: false,
        }
    }

    pub fn combo(&self) -> HotkeyCombo {
        self.combo
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn handle(&mut self, event: &InputEvent, is_recording: bool) -> Option<HotkeyAction> {
        let required = self.combo.required_modifiers();

        let pressed = match (self.combo.trigger_key(), *event) {
            (None, InputEvent::FlagsChanged(mods)) => mods.contains(required),
            (None, _) => return None,

            (Some(trigger), InputEvent::KeyDown {
                key,
                modifiers,
                is_repeat,
            }) if key == trigger => {
                if is_repeat {
                    return None;
                }
                modifiers.contains(required)
            }
            (Some(trigger), InputEvent::KeyUp { key, .. }) if key == trigger => false,
            (Some(_), InputEvent::FlagsChanged(mods)) if !mods.contains(required) => false,
            (Some(_), _) => return None,
        };

        self.transition(pressed, is_recording)
    }

    fn transition(&mut self, pressed: bool, is_recording: bool) -> Option<HotkeyAction> {
        if pressed == self.pressed {
            return None;
        }
        self.pressed = pressed;

        if pressed {
            if is_recording {
                None
            } else {
                self.started = true;
                Some(HotkeyAction::Start)
            }
        } else {
            let stop = is_recording || self.started;
            self.started = false;
            stop.then_some(HotkeyAction::Stop)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
