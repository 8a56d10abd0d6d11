//! Dictation session: state machine and its single-writer coordinator.
//!
//! # Architecture
//!
//! ```text
//! HotkeyListener / control lines / CLI
//!        │ SessionHandle (commands)
//!        ▼
//! SessionCoordinator::run()  ← async tokio task, sole owner of SessionMachine
//!        │
//!        ├─ start  → engine.start_live        → Recording, overlay.show()
//!        ├─ stop   → engine.stop_live         → Transcribing
//!        ├─ engine events (bridge, in order)  → Formatting / Ready / Error
//!        │     └─ final transcript → overlay auto-dismiss + auto-paste (desktop)
//!        ├─ load   → spawn_blocking(model_load) → isModelLoaded
//!        └─ download → tokio::spawn(transport.fetch) → publish → load
//!
//! after every message:
//!   SnapshotWriter::sync  ──▶ shared store (restricted process polls it)
//!   watch<SessionView>    ──▶ SessionHandle::subscribe / view
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voice_dictation::config::AppConfig;
//! use voice_dictation::engine::event_channel;
//! use voice_dictation::session::SessionCoordinator;
//! use voice_dictation::shared::FileStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let store = Arc::new(FileStore::create(config.paths().shared_dir)?);
//!     let (_events_tx, events_rx) = event_channel();
//!
//!     // The engine is created with `_events_tx` as its callback sink.
//!     let coordinator = SessionCoordinator::new(config, None, events_rx, store);
//!     let handle = coordinator.handle();
//!     tokio::spawn(coordinator.run());
//!
//!     handle.start();
//!     Ok(())
//! }
//! ```

pub mod machine;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use machine::{Effect, SessionMachine, StartRefusal};
pub use runner::{SessionCommand, SessionCoordinator, SessionHandle, SessionView};
pub use state::{SessionState, SessionStatus};
