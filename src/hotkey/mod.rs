//! Global hotkey activation.
//!
//! # Design
//!
//! ```text
//! rdev::listen (dedicated OS thread)
//!     │ raw press/release
//!     ▼
//! ModifierTracker ──▶ InputEvent (modifier bitmask, repeat flag)
//!     │
//!     ▼
//! HotkeyDetector  ──▶ HotkeyAction::{Start, Stop} ──▶ SessionHandle
//! ```
//!
//! The detector is pure and only sees [`InputEvent`]s, so it never depends on
//! the order in which individual modifier keys went down; only the resulting
//! bitmask matters.

pub mod detector;
pub mod listener;

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use detector::HotkeyDetector;
pub use listener::{HotkeyListener, ModifierTracker};

// ---------------------------------------------------------------------------
// Modifiers
// ---------------------------------------------------------------------------

/// Modifier-key bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const FN: Modifiers = Modifiers(1 << 0);
    pub const OPTION: Modifiers = Modifiers(1 << 1);
    pub const COMMAND: Modifiers = Modifiers(1 << 2);
    pub const CONTROL: Modifiers = Modifiers(1 << 3);
    pub const SHIFT: Modifiers = Modifiers(1 << 4);

    pub fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Input events
// ---------------------------------------------------------------------------

/// Non-modifier keys the detector distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Space,
    Other,
}

/// Normalised keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// The set of held modifiers changed.
    FlagsChanged(Modifiers),
    KeyDown {
        key: KeyCode,
        modifiers: Modifiers,
        is_repeat: bool,
    },
    KeyUp {
        key: KeyCode,
        modifiers: Modifiers,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    Start,
    Stop,
}

// ---------------------------------------------------------------------------
// HotkeyCombo
// ---------------------------------------------------------------------------

/// The hold-to-talk combinations a user can choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HotkeyCombo {
    #[serde(rename = "option+space")]
    OptionSpace,
    #[default]
    #[serde(rename = "fn+option")]
    FnOption,
    #[serde(rename = "fn+option+cmd")]
    FnOptionCmd,
    #[serde(rename = "fn+cmd")]
    FnCmd,
    #[serde(rename = "option+cmd")]
    OptionCmd,
    #[serde(rename = "control+option")]
    ControlOption,
}

impl HotkeyCombo {
    pub const ALL: [HotkeyCombo; 6] = [
        HotkeyCombo::OptionSpace,
        HotkeyCombo::FnOption,
        HotkeyCombo::FnOptionCmd,
        HotkeyCombo::FnCmd,
        HotkeyCombo::OptionCmd,
        HotkeyCombo::ControlOption,
    ];

    pub fn required_modifiers(self) -> Modifiers {
        match self {
            HotkeyCombo::OptionSpace => Modifiers::OPTION,
            HotkeyCombo::FnOption => Modifiers::FN | Modifiers::OPTION,
            HotkeyCombo::FnOptionCmd => Modifiers::FN | Modifiers::OPTION | Modifiers::COMMAND,
            HotkeyCombo::FnCmd => Modifiers::FN | Modifiers::COMMAND,
            HotkeyCombo::OptionCmd => Modifiers::OPTION | Modifiers::COMMAND,
            HotkeyCombo::ControlOption => Modifiers::CONTROL | Modifiers::OPTION,
        }
    }

    /// Non-modifier key that must be held too; `None` for modifier-only
    /// combos.
    pub fn trigger_key(self) -> Option<KeyCode> {
        match self {
            HotkeyCombo::OptionSpace => Some(KeyCode::Space),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HotkeyCombo::OptionSpace => "option+space",
            HotkeyCombo::FnOption => "fn+option",
            HotkeyCombo::FnOptionCmd => "fn+option+cmd",
            HotkeyCombo::FnCmd => "fn+cmd",
            HotkeyCombo::OptionCmd => "option+cmd",
            HotkeyCombo::ControlOption => "control+option",
        }
    }
}

impl fmt::Display for HotkeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HotkeyCombo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown hotkey combo '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combos_parse_from_their_names() {
        for combo in HotkeyCombo::ALL {
            assert_eq!(combo.as_str().parse::<HotkeyCombo>(), Ok(combo));
        }
        assert_eq!("Control+Option".parse::<HotkeyCombo>(), Ok(HotkeyCombo::ControlOption));
        assert!("ctrl+v".parse::<HotkeyCombo>().is_err());
    }

    #[test]
    fn only_option_space_has_a_trigger_key() {
        for combo in HotkeyCombo::ALL {
            assert_eq!(
                combo.trigger_key().is_some(),
                combo == HotkeyCombo::OptionSpace
            );
        }
    }

    #[test]
    fn modifier_containment() {
        let held = Modifiers::FN | Modifiers::OPTION | Modifiers::SHIFT;
        assert!(held.contains(HotkeyCombo::FnOption.required_modifiers()));
        assert!(!held.contains(HotkeyCombo::FnOptionCmd.required_modifiers()));
        assert!(Modifiers::NONE.is_empty());
    }
}
