//! Dedicated OS-thread hotkey listener using `rdev::listen`.
//!
//! `rdev::listen` is a blocking call that must live on its own OS thread.
//! [`HotkeyListener`] owns that thread and a stop flag; dropping it sets the
//! flag so the callback silently ignores further events.
//!
//! # Shutdown caveat
//!
//! `rdev::listen` has no graceful shutdown API. Setting the stop flag stops
//! forwarding, but the OS thread stays blocked in the rdev event loop until
//! the process exits.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use rdev::{EventType, Key};

use super::{HotkeyAction, HotkeyCombo, HotkeyDetector, InputEvent, KeyCode, Modifiers};
use crate::session::SessionHandle;

// ---------------------------------------------------------------------------
// ModifierTracker
// ---------------------------------------------------------------------------

fn modifier_bit(key: Key) -> Option<Modifiers> {
    match key {
        Key::Alt | Key::AltGr => Some(Modifiers::OPTION),
        Key::MetaLeft | Key::MetaRight => Some(Modifiers::COMMAND),
        Key::ControlLeft | Key::ControlRight => Some(Modifiers::CONTROL),
        Key::ShiftLeft | Key::ShiftRight => Some(Modifiers::SHIFT),
        Key::Function => Some(Modifiers::FN),
        _ => None,
    }
}

fn key_code(key: Key) -> KeyCode {
    match key {
        Key::Space => KeyCode::Space,
        _ => KeyCode::Other,
    }
}

/// Turns raw `rdev` press/release events into [`InputEvent`]s.
///
/// rdev reports each physical modifier key separately and repeats key
/// presses while a key is held. The tracker keeps the set of held keys so it
/// can derive the modifier bitmask (left and right variants count once) and
/// flag auto-repeat.
#[derive(Debug, Default)]
pub struct ModifierTracker {
    held: Vec<Key>,
    modifiers: Modifiers,
}

impl ModifierTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    fn recompute(&mut self) -> Option<InputEvent> {
        let mods = self
            .held
            .iter()
            .filter_map(|k| modifier_bit(*k))
            .fold(Modifiers::NONE, |acc, m| acc | m);
        if mods == self.modifiers {
            return None;
        }
        self.modifiers = mods;
        Some(InputEvent::FlagsChanged(mods))
    }

    pub fn translate(&mut self, event: &EventType) -> Option<InputEvent> {
        match *event {
            EventType::KeyPress(key) => {
                let first_press = !self.held.contains(&key);
                if first_press {
                    self.held.push(key);
                }
                if modifier_bit(key).is_some() {
                    return self.recompute();
                }
                Some(InputEvent::KeyDown {
                    key: key_code(key),
                    modifiers: self.modifiers,
                    is_repeat: !first_press,
                })
            }
            EventType::KeyRelease(key) => {
                self.held.retain(|k| *k != key);
                if modifier_bit(key).is_some() {
                    return self.recompute();
                }
                Some(InputEvent::KeyUp {
                    key: key_code(key),
                    modifiers: self.modifiers,
                })
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyListener
// ---------------------------------------------------------------------------

/// Handle to a running hotkey listener thread. Drop it to stop forwarding.
pub struct HotkeyListener {
    stop: Arc<AtomicBool>,
    /// Never joined: `rdev::listen` does not return.
    _thread: std::thread::JoinHandle<()>,
}

impl HotkeyListener {
    /// Spawn the listener thread. Detected actions are sent straight to the
    /// session through `session`; the recording flag is read from its latest
    /// published view.
    pub fn start(combo: HotkeyCombo, session: SessionHandle) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let mut tracker = ModifierTracker::new();
                let mut detector = HotkeyDetector::new(combo);

                let result = rdev::listen(move |event| {
                    if stop_clone.load(Ordering::Relaxed) {
                        return;
                    }
                    let Some(input) = tracker.translate(&event.event_type) else {
                        return;
                    };
                    match detector.handle(&input, session.is_recording()) {
                        Some(HotkeyAction::Start) => {
                            log::debug!("hotkey: {combo} pressed");
                            session.start();
                        }
                        Some(HotkeyAction::Stop) => {
                            log::debug!("hotkey: {combo} released");
                            session.stop();
                        }
                        None => {}
                    }
                });

                if let Err(e) = result {
                    log::error!("hotkey-listener: rdev::listen exited with error: {:?}", e);
                }
            })?;

        log::info!("hotkey: listening for {combo}");
        Ok(Self {
            stop,
            _thread: thread,
        })
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
