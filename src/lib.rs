//! Voice dictation core.
//!
//! Two process roles share this crate:
//!
//! - the **privileged** process owns the transcription engine and the
//!   dictation session ([`session`]), mirrors session state into a shared
//!   store ([`shared`]), and on desktop drives the global hotkey
//!   ([`hotkey`]), transcript overlay ([`overlay`]) and auto-paste
//!   ([`inject`]);
//! - the **restricted** process (a keyboard extension) polls the shared
//!   store and inserts transcript deltas into the host text field
//!   ([`keyboard`]).

pub mod config;
pub mod control;
pub mod download;
pub mod engine;
pub mod hotkey;
pub mod inject;
pub mod keyboard;
pub mod overlay;
pub mod session;
pub mod shared;
