//! Engine callback bridge.
//!
//! The engine calls back on its own threads with an opaque `userdata`
//! pointer and buffers it may free as soon as the callback returns. Two
//! rules follow:
//!
//! 1. `userdata` carries a registry token, never a real pointer. The token
//!    is looked up in a process-wide table that owns the destination
//!    session's event sender, so a callback racing session teardown finds
//!    nothing instead of a dangling object.
//! 2. Every `(ptr, len)` payload is copied into an owned `String` before the
//!    callback returns. Null or empty payloads become `""`.
//!
//! The resulting [`EngineEvent`] is pushed onto an unbounded channel; the
//! send never blocks the engine thread and the receiver applies events in
//! arrival order on the session's single writer context.

use std::collections::HashMap;
use std::ffi::c_void;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use super::ffi::RawString;
use super::{EngineEvent, EngineEventSender, EngineStatus};

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type Registry = Mutex<HashMap<u64, EngineEventSender>>;

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// RAII registration of one session's event sender.
///
/// Pass [`userdata`](Self::userdata) to the engine's runtime config. Dropping
/// the registration removes the token; callbacks that arrive afterwards are
/// discarded.
#[derive(Debug)]
pub struct Registration {
    token: u64,
}

impl Registration {
    pub fn new(sender: EngineEventSender) -> Self {
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut map) = registry().lock() {
            map.insert(token, sender);
        }
        log::debug!("bridge: registered session token {token}");
        Self { token }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Opaque value handed to the engine as callback `userdata`.
    pub fn userdata(&self) -> *mut c_void {
        self.token as usize as *mut c_void
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Ok(mut map) = registry().lock() {
            map.remove(&self.token);
        }
        log::debug!("bridge: unregistered session token {}", self.token);
    }
}

/// Deliver an owned event to the session registered under `userdata`.
fn dispatch(userdata: *mut c_void, event: EngineEvent) {
    let token = userdata as usize as u64;
    let sender = match registry().lock() {
        Ok(map) => map.get(&token).cloned(),
        Err(_) => None,
    };

    match sender {
        Some(tx) => {
            if tx.send(event).is_err() {
                log::debug!("bridge: session {token} is gone, dropping callback");
            }
        }
        None => log::debug!("bridge: no session for token {token}, dropping callback"),
    }
}

// ---------------------------------------------------------------------------
// Payload copy
// ---------------------------------------------------------------------------

/// Copy a borrowed engine string into owned memory.
///
/// # Safety
///
/// When `raw.ptr` is non-null it must point to `raw.len` readable bytes for
/// the duration of this call.
pub unsafe fn copy_owned(raw: RawString) -> String {
    if raw.ptr.is_null() || raw.len == 0 {
        return String::new();
    }
    // SAFETY: guaranteed by the caller for the duration of the callback.
    let bytes = unsafe { std::slice::from_raw_parts(raw.ptr.cast::<u8>(), raw.len) };
    String::from_utf8_lossy(bytes).into_owned()
}

// ---------------------------------------------------------------------------
// Callback trampolines (installed in the engine's runtime config)
// ---------------------------------------------------------------------------

/// Status-changed callback.
///
/// # Safety
///
/// Called by the engine with the `userdata` of a [`Registration`].
pub unsafe extern "C" fn on_status_change(userdata: *mut c_void, status: c_int) {
    match EngineStatus::from_raw(status) {
        Some(status) => dispatch(userdata, EngineEvent::StatusChanged(status)),
        None => log::warn!("bridge: ignoring unknown engine status {status}"),
    }
}

/// Transcript callback.
///
/// # Safety
///
/// `text` must be valid for the duration of the call.
pub unsafe extern "C" fn on_transcript(userdata: *mut c_void, text: RawString, is_final: bool) {
    // SAFETY: the engine keeps `text` alive until we return.
    let text = unsafe { copy_owned(text) };
    dispatch(userdata, EngineEvent::Transcript { text, is_final });
}

/// Error callback.
///
/// # Safety
///
/// `error` must be valid for the duration of the call.
pub unsafe extern "C" fn on_error(userdata: *mut c_void, error: RawString) {
    // SAFETY: the engine keeps `error` alive until we return.
    let message = unsafe { copy_owned(error) };
    dispatch(userdata, EngineEvent::Error { message });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
