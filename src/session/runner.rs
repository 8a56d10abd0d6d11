//! Session coordinator: the single writer of all session state.
//!
//! [`SessionCoordinator`] owns the [`SessionMachine`] and every side effect
//! hanging off it. Commands from collaborators (hotkey thread, control
//! surface, CLI) and engine events from the callback bridge are serialised
//! through one `tokio::select!` loop, so transitions apply in arrival order
//! and never concurrently.
//!
//! # Flow
//!
//! ```text
//! SessionHandle ──SessionCommand──┐
//! spawn_blocking(model_load) ─────┤ inbox (mpsc)
//! download task (progress/done) ──┘        │
//!                                          ▼
//! bridge ──EngineEvent (mpsc)──────▶ SessionCoordinator::run
//!                                          │
//!            ┌─────────────────────────────┼──────────────────────────┐
//!            ▼                             ▼                          ▼
//!   SnapshotWriter::sync          watch<SessionView>         overlay / paste
//!   (changed slots only)          (read-only observers)      (final transcript)
//! ```
//!
//! Long-running work never runs on the loop: model loading and clipboard
//! paste go through `spawn_blocking`, downloads through `tokio::spawn`, and
//! their results come back as inbox messages.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::machine::{Effect, SessionMachine};
use super::state::{SessionState, SessionStatus};
use crate::config::{AppConfig, Profile};
use crate::download::{
    publish, DownloadEvent, DownloadManager, DownloadOutcome, DownloadTransport, DownloadView,
};
use crate::engine::{
    EngineEvent, EngineEventReceiver, EngineSettings, ModelPaths, ModelSize, Tone,
    TranscriptionEngine,
};
use crate::inject::Paster;
use crate::overlay::OverlayController;
use crate::shared::{SharedSnapshot, SharedStore, SnapshotWriter};

/// Audio level sampling period while recording (~30 Hz).
const AUDIO_LEVEL_INTERVAL: Duration = Duration::from_millis(33);

// ---------------------------------------------------------------------------
// Commands and view
// ---------------------------------------------------------------------------

/// Commands accepted by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    Stop,
    /// Stop if recording, start otherwise.
    Toggle,
    LoadModel(ModelSize),
    UnloadModel,
    DownloadModel(ModelSize),
    CancelDownload,
    ClearTranscript,
    SetTone(Tone),
}

#[derive(Debug)]
enum SessionMessage {
    Command(SessionCommand),
    ModelLoaded { size: ModelSize, ok: bool },
    Download(DownloadEvent),
    Shutdown,
}

/// Read-only projection published after every processed message.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub session: SessionState,
    pub selected_model: ModelSize,
    pub loaded_model: Option<ModelSize>,
    /// Model currently being loaded off the loop.
    pub model_loading: Option<ModelSize>,
    pub download: DownloadView,
    /// Input level in `[0, 1]`; `0.0` when not recording.
    pub audio_level: f32,
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Narrow, clonable command interface to a running coordinator.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inbox: mpsc::UnboundedSender<SessionMessage>,
    view: watch::Receiver<SessionView>,
}

impl SessionHandle {
    /// Queue `command`. Returns `false` once the coordinator has stopped.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.inbox.send(SessionMessage::Command(command)).is_ok()
    }

    pub fn start(&self) {
        self.send(SessionCommand::Start);
    }

    pub fn stop(&self) {
        self.send(SessionCommand::Stop);
    }

    pub fn toggle(&self) {
        self.send(SessionCommand::Toggle);
    }

    pub fn load_model(&self, size: ModelSize) {
        self.send(SessionCommand::LoadModel(size));
    }

    pub fn unload_model(&self) {
        self.send(SessionCommand::UnloadModel);
    }

    pub fn download_model(&self, size: ModelSize) {
        self.send(SessionCommand::DownloadModel(size));
    }

    pub fn cancel_download(&self) {
        self.send(SessionCommand::CancelDownload);
    }

    pub fn clear_transcript(&self) {
        self.send(SessionCommand::ClearTranscript);
    }

    pub fn set_tone(&self, tone: Tone) {
        self.send(SessionCommand::SetTone(tone));
    }

    /// Ask the coordinator to finish its loop.
    pub fn shutdown(&self) {
        let _ = self.inbox.send(SessionMessage::Shutdown);
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Latest published view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn is_recording(&self) -> bool {
        self.view.borrow().session.is_recording()
    }
}

// ---------------------------------------------------------------------------
// SessionCoordinator
// ---------------------------------------------------------------------------

/// Owns the session and drives it from one task.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use voice_dictation::config::AppConfig;
/// use voice_dictation::engine::event_channel;
/// use voice_dictation::session::SessionCoordinator;
/// use voice_dictation::shared::MemoryStore;
///
/// # async fn example() {
/// let (_events_tx, events_rx) = event_channel();
/// let coordinator = SessionCoordinator::new(
///     AppConfig::default(),
///     None,
///     events_rx,
///     Arc::new(MemoryStore::new()),
/// );
/// let handle = coordinator.handle();
/// tokio::spawn(coordinator.run());
/// handle.toggle();
/// # }
/// ```
pub struct SessionCoordinator {
    config: AppConfig,
    settings_path: Option<PathBuf>,
    engine: Option<Arc<dyn TranscriptionEngine>>,
    engine_rx: EngineEventReceiver,
    machine: SessionMachine,
    writer: SnapshotWriter,
    last_snapshot: SharedSnapshot,
    overlay: Option<OverlayController>,
    injector: Option<Arc<dyn Paster>>,
    transport: Option<Arc<dyn DownloadTransport>>,
    downloads: DownloadManager,
    download_job: Option<JoinHandle<()>>,
    models: ModelPaths,
    selected_model: ModelSize,
    loaded_model: Option<ModelSize>,
    model_loading: Option<ModelSize>,
    audio_level: f32,
    inbox_tx: mpsc::UnboundedSender<SessionMessage>,
    inbox_rx: mpsc::UnboundedReceiver<SessionMessage>,
    view_tx: watch::Sender<SessionView>,
    view_rx: watch::Receiver<SessionView>,
}

impl SessionCoordinator {
    /// `engine` is `None` when no engine session could be created; every
    /// `start` is then a no-op.
    pub fn new(
        config: AppConfig,
        engine: Option<Arc<dyn TranscriptionEngine>>,
        engine_rx: EngineEventReceiver,
        store: Arc<dyn SharedStore>,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let downloads = DownloadManager::new(config.download.indeterminate_reference_bytes);
        let models = ModelPaths::new(config.paths().models_dir);
        let selected_model = config.model.selected;
        let machine = SessionMachine::new();

        let view = SessionView {
            session: machine.state().clone(),
            selected_model,
            loaded_model: None,
            model_loading: None,
            download: downloads.view(),
            audio_level: 0.0,
        };
        let (view_tx, view_rx) = watch::channel(view);

        Self {
            config,
            settings_path: None,
            engine,
            engine_rx,
            machine,
            writer: SnapshotWriter::new(store),
            last_snapshot: SharedSnapshot::default(),
            overlay: None,
            injector: None,
            transport: None,
            downloads,
            download_job: None,
            models,
            selected_model,
            loaded_model: None,
            model_loading: None,
            audio_level: 0.0,
            inbox_tx,
            inbox_rx,
            view_tx,
            view_rx,
        }
    }

    pub fn with_overlay(mut self, overlay: OverlayController) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn with_injector(mut self, injector: Arc<dyn Paster>) -> Self {
        self.injector = Some(injector);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn DownloadTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Persist model and tone changes to this settings file.
    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Override the models directory resolved from the config.
    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models = ModelPaths::new(dir);
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            inbox: self.inbox_tx.clone(),
            view: self.view_rx.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------

    /// Run until [`SessionHandle::shutdown`] is called.
    pub async fn run(mut self) {
        // A previous run may have died mid-session.
        self.writer.reset();
        self.last_snapshot = self.snapshot();
        self.writer.publish(&self.last_snapshot);

        self.load_on_start();
        self.publish();

        let mut level_tick = tokio::time::interval(AUDIO_LEVEL_INTERVAL);
        level_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut engine_open = true;

        loop {
            let recording = self.machine.state().is_recording();
            tokio::select! {
                msg = self.inbox_rx.recv() => match msg {
                    Some(SessionMessage::Shutdown) | None => break,
                    Some(msg) => self.handle_message(msg),
                },
                event = self.engine_rx.recv(), if engine_open => match event {
                    Some(event) => self.handle_engine_event(event),
                    None => {
                        log::debug!("session: engine event channel closed");
                        engine_open = false;
                    }
                },
                _ = level_tick.tick(), if recording => self.sample_audio_level(),
            }
            self.publish();
        }

        self.shutdown();
    }

    fn handle_message(&mut self, msg: SessionMessage) {
        match msg {
            SessionMessage::Command(command) => self.handle_command(command),
            SessionMessage::ModelLoaded { size, ok } => self.finish_model_load(size, ok),
            SessionMessage::Download(event) => self.handle_download(event),
            SessionMessage::Shutdown => {}
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        log::debug!("session: command {command:?}");
        match command {
            SessionCommand::Start => self.start(),
            SessionCommand::Stop => self.stop(),
            SessionCommand::Toggle => {
                if self.machine.state().is_recording() {
                    self.stop();
                } else {
                    self.start();
                }
            }
            SessionCommand::LoadModel(size) => self.load_model(size),
            SessionCommand::UnloadModel => self.unload_model(),
            SessionCommand::DownloadModel(size) => self.download_model(size),
            SessionCommand::CancelDownload => self.cancel_download(),
            SessionCommand::ClearTranscript => {
                if !self.machine.state().is_recording() {
                    self.machine.clear();
                }
            }
            SessionCommand::SetTone(tone) => self.set_tone(tone),
        }
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    fn start(&mut self) {
        if let Err(refusal) = self.machine.check_start(self.engine.is_some()) {
            log::debug!("session: start ignored ({refusal})");
            return;
        }
        let Some(engine) = &self.engine else {
            return;
        };

        if engine.start_live(&self.config.engine.language) {
            self.machine.recording_started();
            if let Some(overlay) = &self.overlay {
                overlay.show();
            }
            log::info!("session: recording started");
        } else {
            self.machine.fail("failed to start recording");
            log::warn!("session: engine refused to start recording");
        }
    }

    fn stop(&mut self) {
        if !self.machine.check_stop() {
            log::debug!("session: stop ignored, not recording");
            return;
        }
        self.machine.recording_stopped();
        self.audio_level = 0.0;

        let Some(engine) = &self.engine else {
            return;
        };
        let options = self.config.engine.transcribe_options();
        if engine.stop_live(&options) {
            log::info!("session: recording stopped, transcribing");
        } else {
            self.machine.fail("failed to stop recording");
            log::warn!("session: engine refused to stop recording");
        }
    }

    fn sample_audio_level(&mut self) {
        if let Some(engine) = &self.engine {
            self.audio_level = engine.audio_level().clamp(0.0, 1.0);
        }
    }

    // -----------------------------------------------------------------------
    // Engine events
    // -----------------------------------------------------------------------

    fn handle_engine_event(&mut self, event: EngineEvent) {
        if let EngineEvent::Error { message } = &event {
            log::warn!("session: engine error: {message}");
        }
        let is_transcript = matches!(event, EngineEvent::Transcript { .. });

        if let Effect::FinalTranscript(text) = self.machine.apply(&event) {
            self.deliver(text);
        }
        if is_transcript {
            if let Some(overlay) = &self.overlay {
                overlay.content_changed();
            }
        }
    }

    fn deliver(&mut self, text: String) {
        log::info!("session: final transcript ({} chars)", text.len());
        if let Some(overlay) = &self.overlay {
            overlay.schedule_auto_dismiss(&text);
        }

        if self.config.profile != Profile::Desktop
            || !self.config.paste.auto_paste
            || text.trim().is_empty()
        {
            return;
        }
        let Some(injector) = self.injector.clone() else {
            return;
        };
        tokio::task::spawn_blocking(move || {
            if let Err(e) = injector.paste(&text) {
                log::warn!("session: auto-paste failed: {e}");
            }
        });
    }

    // -----------------------------------------------------------------------
    // Models
    // -----------------------------------------------------------------------

    fn load_on_start(&mut self) {
        if !self.config.model.load_on_start || self.engine.is_none() {
            return;
        }
        let size = self
            .config
            .model
            .default_model
            .unwrap_or(self.config.model.selected);
        self.load_model(size);
    }

    fn load_model(&mut self, size: ModelSize) {
        let Some(engine) = self.engine.clone() else {
            log::warn!("session: cannot load {size}, no engine");
            return;
        };
        if self.machine.state().is_recording() {
            log::debug!("session: load of {size} ignored while recording");
            return;
        }
        if let Some(loading) = self.model_loading {
            log::debug!("session: load of {size} ignored, {loading} is loading");
            return;
        }
        if !engine.model_exists(size) {
            log::info!("session: model {size} is not present on disk");
            return;
        }

        log::info!("session: loading model {size}");
        self.selected_model = size;
        self.model_loading = Some(size);
        self.loaded_model = None;
        self.machine.model_loaded(false);

        let tx = self.inbox_tx.clone();
        tokio::task::spawn_blocking(move || {
            let ok = engine.model_load(size);
            let _ = tx.send(SessionMessage::ModelLoaded { size, ok });
        });
    }

    fn finish_model_load(&mut self, size: ModelSize, ok: bool) {
        self.model_loading = None;
        if ok {
            log::info!("session: model {size} loaded");
            self.loaded_model = Some(size);
            self.machine.model_loaded(true);
            self.config.model.selected = size;
            self.config.model.default_model = Some(size);
            self.persist_config();
        } else {
            log::error!("session: model {size} failed to load");
            self.loaded_model = None;
            self.machine.model_loaded(false);
            self.machine.fail(format!("failed to load model {size}"));
        }
    }

    fn unload_model(&mut self) {
        if self.machine.state().is_recording() || self.model_loading.is_some() {
            log::debug!("session: unload ignored while busy");
            return;
        }
        let Some(engine) = &self.engine else {
            return;
        };
        engine.model_unload();
        self.loaded_model = None;
        self.machine.model_loaded(false);
        log::info!("session: model unloaded");
    }

    fn set_tone(&mut self, tone: Tone) {
        self.config.engine.tone = tone;
        if let Some(engine) = &self.engine {
            let settings = EngineSettings::from(&self.config.engine.transcribe_options());
            if !engine.write_settings(&settings) {
                log::warn!("session: engine rejected settings update");
            }
        }
        self.persist_config();
    }

    fn persist_config(&self) {
        let Some(path) = &self.settings_path else {
            return;
        };
        if let Err(e) = self.config.save_to(path) {
            log::warn!("session: failed to save settings to {}: {e}", path.display());
        }
    }

    // -----------------------------------------------------------------------
    // Downloads
    // -----------------------------------------------------------------------

    fn download_model(&mut self, size: ModelSize) {
        let Some(transport) = self.transport.clone() else {
            log::warn!("session: no download transport configured");
            return;
        };
        let Some(token) = self.downloads.begin(size) else {
            log::debug!("session: download of {size} ignored, another is in flight");
            return;
        };

        let url = size.download_url(&self.config.download.base_url);
        let dir = self.models.models_dir.clone();
        let tx = self.inbox_tx.clone();
        log::info!("session: downloading {size} from {url}");

        self.download_job = Some(tokio::spawn(async move {
            let progress_tx = tx.clone();
            let progress = move |written: u64, expected: Option<u64>| {
                let _ = progress_tx.send(SessionMessage::Download(DownloadEvent::Progress {
                    token,
                    written,
                    expected,
                }));
            };
            let event = match transport.fetch(&url, &dir, &progress).await {
                Ok(temp) => DownloadEvent::Finished { token, temp },
                Err(e) => DownloadEvent::Failed {
                    token,
                    message: e.to_string(),
                },
            };
            let _ = tx.send(SessionMessage::Download(event));
        }));
    }

    fn cancel_download(&mut self) {
        if let Some(task) = self.downloads.cancel() {
            log::info!("session: download of {} cancelled", task.model);
        }
        // Dropping the in-flight fetch deletes its temp file.
        if let Some(job) = self.download_job.take() {
            job.abort();
        }
    }

    fn handle_download(&mut self, event: DownloadEvent) {
        match self.downloads.apply(event) {
            DownloadOutcome::Stale => log::debug!("session: dropped stale download event"),
            DownloadOutcome::Progress => {}
            DownloadOutcome::Completed { model, temp } => {
                self.download_job = None;
                let dest = self.models.model_path(model);
                match publish(temp, &dest) {
                    Ok(()) => {
                        log::info!("session: {model} installed at {}", dest.display());
                        if self.config.download.load_after_download {
                            self.load_model(model);
                        }
                    }
                    Err(e) => {
                        log::warn!("session: failed to install {model}: {e}");
                        self.downloads
                            .fail(format!("failed to install {model}: {e}"));
                    }
                }
            }
            DownloadOutcome::Failed { model, message } => {
                self.download_job = None;
                log::warn!("session: download of {model} failed: {message}");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Publishing
    // -----------------------------------------------------------------------

    fn snapshot(&self) -> SharedSnapshot {
        self.machine
            .state()
            .snapshot(Some(self.selected_model.filename()))
    }

    fn view(&self) -> SessionView {
        let session = self.machine.state().clone();
        let audio_level = if session.is_recording() {
            self.audio_level
        } else {
            0.0
        };
        SessionView {
            session,
            selected_model: self.selected_model,
            loaded_model: self.loaded_model,
            model_loading: self.model_loading,
            download: self.downloads.view(),
            audio_level,
        }
    }

    fn publish(&mut self) {
        let next = self.snapshot();
        self.last_snapshot = self.writer.sync(&self.last_snapshot, &next);

        let view = self.view();
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }

    fn shutdown(&mut self) {
        self.cancel_download();
        if self.machine.check_stop() {
            if let Some(engine) = &self.engine {
                // The transcript is abandoned; only the microphone matters.
                if !engine.stop_live(&self.config.engine.transcribe_options()) {
                    log::warn!("session: engine refused to stop recording on shutdown");
                }
            }
        }
        self.writer.recording(false);
        self.writer.status(SessionStatus::Idle.code());
        log::info!("session: coordinator stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::ScriptedTransport;
    use crate::engine::{event_channel, EngineEventSender, EngineStatus, MockEngine};
    use crate::inject::mock::RecordingPaster;
    use crate::overlay::mock::{RecordingSurface, SurfaceCall};
    use crate::shared::{MemoryStore, Slot};
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use tempfile::{tempdir, TempDir};

    struct Harness {
        handle: SessionHandle,
        engine: Arc<MockEngine>,
        events: EngineEventSender,
        store: Arc<MemoryStore>,
        paster: Arc<RecordingPaster>,
        surface: Arc<RecordingSurface>,
        dir: TempDir,
        task: JoinHandle<()>,
    }

    impl Harness {
        fn settings_path(&self) -> PathBuf {
            self.dir.path().join("settings.toml")
        }

        fn models_dir(&self) -> PathBuf {
            self.dir.path().join("models")
        }

        async fn wait(&self, what: &str, pred: impl FnMut(&SessionView) -> bool) {
            let mut rx = self.handle.subscribe();
            tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
                .expect("coordinator alive");
        }

        async fn ready(&self) {
            self.wait("model load", |v| v.session.is_model_loaded()).await;
        }

        fn emit(&self, event: EngineEvent) {
            self.events.send(event).unwrap();
        }
    }

    fn spawn_with(
        engine: MockEngine,
        transport: Option<ScriptedTransport>,
        configure: impl FnOnce(&mut AppConfig),
    ) -> Harness {
        let dir = tempdir().unwrap();
        let engine = Arc::new(engine);
        let store = Arc::new(MemoryStore::new());
        let paster = Arc::new(RecordingPaster::default());
        let surface = Arc::new(RecordingSurface::default());
        let (events, events_rx) = event_channel();

        let mut config = AppConfig::default();
        configure(&mut config);
        let overlay = OverlayController::new(surface.clone(), config.overlay.clone());

        let mut coordinator = SessionCoordinator::new(
            config,
            Some(engine.clone() as Arc<dyn TranscriptionEngine>),
            events_rx,
            store.clone(),
        )
        .with_injector(paster.clone())
        .with_overlay(overlay)
        .with_settings_path(dir.path().join("settings.toml"))
        .with_models_dir(dir.path().join("models"));
        if let Some(transport) = transport {
            coordinator = coordinator.with_transport(Arc::new(transport));
        }

        let handle = coordinator.handle();
        let task = tokio::spawn(coordinator.run());
        Harness {
            handle,
            engine,
            events,
            store,
            paster,
            surface,
            dir,
            task,
        }
    }

    fn spawn() -> Harness {
        spawn_with(MockEngine::with_models(&[ModelSize::Small]), None, |_| {})
    }

    async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition never held: {what}");
    }

    #[tokio::test]
    async fn startup_loads_model_and_resets_store() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.write(Slot::IsRecording, json!(true)).unwrap();
        store.write(Slot::Transcript, json!("stale")).unwrap();

        let engine = Arc::new(MockEngine::with_models(&[ModelSize::Small]));
        let (_events, events_rx) = event_channel();
        let coordinator = SessionCoordinator::new(
            AppConfig::default(),
            Some(engine.clone() as Arc<dyn TranscriptionEngine>),
            events_rx,
            store.clone(),
        )
        .with_models_dir(dir.path());
        let handle = coordinator.handle();
        tokio::spawn(coordinator.run());

        let mut rx = handle.subscribe();
        rx.wait_for(|v| v.loaded_model == Some(ModelSize::Small))
            .await
            .unwrap();

        let snap = SharedSnapshot::read_from(store.as_ref()).unwrap();
        assert!(!snap.is_recording);
        assert!(snap.is_model_loaded);
        assert_eq!(snap.transcript_text, "");
        assert_eq!(snap.status_code, 0);
        assert_eq!(snap.selected_model_filename.as_deref(), Some("ggml-small.bin"));
        assert_eq!(*engine.loaded.lock().unwrap(), vec![ModelSize::Small]);
        handle.shutdown();
    }

    #[tokio::test]
    async fn start_while_recording_does_not_call_engine_twice() {
        let h = spawn();
        h.ready().await;

        h.handle.start();
        h.wait("recording", |v| v.session.is_recording()).await;
        h.handle.start();
        h.handle.clear_transcript();
        h.handle.toggle();
        h.wait("transcribing", |v| {
            *v.session.status() == SessionStatus::Transcribing
        })
        .await;

        assert_eq!(h.engine.starts(), 1);
        assert_eq!(h.engine.stops(), 1);
    }

    #[tokio::test]
    async fn stop_while_idle_is_a_no_op() {
        let h = spawn();
        h.ready().await;

        h.handle.stop();
        h.handle.start();
        h.wait("recording", |v| v.session.is_recording()).await;

        assert_eq!(h.engine.stops(), 0);
        assert_eq!(h.engine.starts(), 1);
    }

    #[tokio::test]
    async fn start_without_model_is_refused() {
        let h = spawn_with(MockEngine::new(), None, |_| {});
        h.handle.start();
        h.handle.load_model(ModelSize::Small);
        h.handle.toggle();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(h.engine.starts(), 0);
        assert!(!h.handle.is_recording());
    }

    #[tokio::test]
    async fn full_session_reaches_ready_and_pastes() {
        let h = spawn();
        h.ready().await;

        h.handle.start();
        h.wait("recording", |v| v.session.is_recording()).await;
        h.emit(EngineEvent::StatusChanged(EngineStatus::Recording));
        h.emit(EngineEvent::Transcript {
            text: "hello".into(),
            is_final: false,
        });
        h.wait("partial", |v| v.session.transcript() == "hello").await;
        assert_eq!(
            h.store.read(Slot::Transcript).unwrap(),
            Some(json!("hello"))
        );
        assert_eq!(h.store.read(Slot::IsRecording).unwrap(), Some(json!(true)));

        h.handle.stop();
        h.wait("transcribing", |v| !v.session.is_recording()).await;
        assert_eq!(h.store.read(Slot::IsRecording).unwrap(), Some(json!(false)));

        h.emit(EngineEvent::StatusChanged(EngineStatus::Transcribing));
        h.emit(EngineEvent::Transcript {
            text: "Hello world.".into(),
            is_final: true,
        });
        h.wait("ready", |v| *v.session.status() == SessionStatus::Ready)
            .await;

        assert_eq!(h.store.read(Slot::Status).unwrap(), Some(json!(4)));
        assert_eq!(
            h.store.read(Slot::Transcript).unwrap(),
            Some(json!("Hello world."))
        );
        let paster = h.paster.clone();
        eventually("paste", move || paster.pasted() == vec!["Hello world.".to_string()]).await;

        let opts = h.engine.last_stop_options.lock().unwrap().clone().unwrap();
        assert_eq!(opts.language, "en");
    }

    #[tokio::test]
    async fn overlay_shows_on_start_and_dismisses_after_final() {
        let h = spawn_with(
            MockEngine::with_models(&[ModelSize::Small]),
            None,
            |cfg| {
                cfg.overlay.min_dismiss_ms = 20;
                cfg.overlay.max_dismiss_ms = 20;
                cfg.overlay.fade_in_ms = 0;
                cfg.overlay.fade_out_ms = 10;
            },
        );
        h.ready().await;
        assert!(h.surface.calls().is_empty());

        h.handle.start();
        h.wait("recording", |v| v.session.is_recording()).await;
        assert_eq!(h.surface.count(&SurfaceCall::OrderFront), 1);

        h.handle.stop();
        h.wait("transcribing", |v| !v.session.is_recording()).await;
        h.emit(EngineEvent::Transcript {
            text: "done".into(),
            is_final: true,
        });
        h.wait("ready", |v| *v.session.status() == SessionStatus::Ready)
            .await;

        let surface = h.surface.clone();
        eventually("overlay dismissed", move || {
            surface.count(&SurfaceCall::OrderOut) == 1
        })
        .await;
    }

    #[tokio::test]
    async fn mobile_profile_does_not_paste() {
        let h = spawn_with(
            MockEngine::with_models(&[ModelSize::Small]),
            None,
            |cfg| cfg.profile = Profile::Mobile,
        );
        h.ready().await;
        h.handle.start();
        h.wait("recording", |v| v.session.is_recording()).await;
        h.handle.stop();
        h.wait("transcribing", |v| !v.session.is_recording()).await;
        h.emit(EngineEvent::Transcript {
            text: "private".into(),
            is_final: true,
        });
        h.wait("ready", |v| *v.session.status() == SessionStatus::Ready)
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.paster.pasted().is_empty());
    }

    #[tokio::test]
    async fn engine_error_ends_recording_and_is_recoverable() {
        let h = spawn();
        h.ready().await;
        h.handle.start();
        h.wait("recording", |v| v.session.is_recording()).await;

        h.emit(EngineEvent::Error {
            message: "microphone unavailable".into(),
        });
        h.wait("error", |v| {
            *v.session.status() == SessionStatus::Error("microphone unavailable".into())
        })
        .await;
        assert!(!h.handle.is_recording());
        assert_eq!(h.store.read(Slot::IsRecording).unwrap(), Some(json!(false)));
        assert_eq!(h.store.read(Slot::Status).unwrap(), Some(json!(5)));

        h.handle.start();
        h.wait("recording again", |v| v.session.is_recording()).await;
        assert_eq!(h.engine.starts(), 2);
    }

    #[tokio::test]
    async fn refused_start_reports_error() {
        let engine = MockEngine::with_models(&[ModelSize::Small]);
        engine.start_ok.store(false, Ordering::SeqCst);
        let h = spawn_with(engine, None, |_| {});
        h.ready().await;

        h.handle.start();
        h.wait("error", |v| matches!(v.session.status(), SessionStatus::Error(_)))
            .await;
        assert!(!h.handle.is_recording());
    }

    #[tokio::test]
    async fn successful_load_is_persisted_as_default() {
        let h = spawn_with(
            MockEngine::with_models(&[ModelSize::Small, ModelSize::Tiny]),
            None,
            |_| {},
        );
        h.ready().await;

        h.handle.load_model(ModelSize::Tiny);
        h.wait("tiny loaded", |v| v.loaded_model == Some(ModelSize::Tiny))
            .await;

        let saved = AppConfig::load_from(&h.settings_path()).unwrap();
        assert_eq!(saved.model.default_model, Some(ModelSize::Tiny));
        assert_eq!(saved.model.selected, ModelSize::Tiny);
        assert_eq!(
            h.store.read(Slot::SelectedModelFilename).unwrap(),
            Some(json!("ggml-tiny.bin"))
        );
    }

    #[tokio::test]
    async fn failed_load_reports_error() {
        let engine = MockEngine::with_models(&[ModelSize::Small]);
        engine.load_ok.store(false, Ordering::SeqCst);
        let h = spawn_with(engine, None, |_| {});

        h.wait("load failure", |v| {
            matches!(v.session.status(), SessionStatus::Error(_)) && v.model_loading.is_none()
        })
        .await;
        assert!(!h.handle.view().session.is_model_loaded());
        assert!(!h.settings_path().exists());
    }

    #[tokio::test]
    async fn unload_clears_model_flag() {
        let h = spawn();
        h.ready().await;
        h.handle.unload_model();
        h.wait("unloaded", |v| !v.session.is_model_loaded()).await;

        assert_eq!(h.engine.unload_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            h.store.read(Slot::IsModelLoaded).unwrap(),
            Some(json!(false))
        );
    }

    #[tokio::test]
    async fn tone_change_writes_engine_settings_and_config() {
        let h = spawn();
        h.ready().await;
        h.handle.set_tone(Tone::Formal);

        let engine = h.engine.clone();
        eventually("settings write", move || {
            engine.settings.lock().unwrap().iter().any(|s| s.tone == Tone::Formal)
        })
        .await;
        let saved = AppConfig::load_from(&h.settings_path()).unwrap();
        assert_eq!(saved.engine.tone, Tone::Formal);
    }

    #[tokio::test]
    async fn download_installs_and_loads_model() {
        let h = spawn_with(
            MockEngine::with_models(&[ModelSize::Small, ModelSize::Tiny]),
            Some(ScriptedTransport::ok(b"tiny weights")),
            |_| {},
        );
        h.ready().await;

        h.handle.download_model(ModelSize::Tiny);
        h.wait("tiny loaded", |v| {
            v.download.last_completed == Some(ModelSize::Tiny)
                && v.loaded_model == Some(ModelSize::Tiny)
        })
        .await;

        let dest = h.models_dir().join("ggml-tiny.bin");
        assert_eq!(std::fs::read(dest).unwrap(), b"tiny weights");
        assert!(h.handle.view().download.active.is_none());
    }

    #[tokio::test]
    async fn failed_download_keeps_message() {
        let h = spawn_with(
            MockEngine::with_models(&[ModelSize::Small]),
            Some(ScriptedTransport::failing(503)),
            |_| {},
        );
        h.ready().await;

        h.handle.download_model(ModelSize::Base);
        h.wait("failure", |v| v.download.error.is_some()).await;

        let view = h.handle.view();
        assert!(view.download.active.is_none());
        assert!(view.download.error.unwrap().contains("503"));
        assert!(!h.models_dir().join("ggml-base.bin").exists());
    }

    #[tokio::test]
    async fn cancelled_download_never_publishes() {
        let mut transport = ScriptedTransport::ok(b"medium weights");
        transport.hold = Some(Duration::from_secs(30));
        let h = spawn_with(
            MockEngine::with_models(&[ModelSize::Small]),
            Some(transport),
            |_| {},
        );
        h.ready().await;

        h.handle.download_model(ModelSize::Medium);
        h.wait("download active", |v| v.download.active.is_some()).await;
        // Second request while one is in flight is ignored.
        h.handle.download_model(ModelSize::Tiny);
        h.handle.cancel_download();
        h.handle.cancel_download();
        h.wait("cancelled", |v| v.download.active.is_none()).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        let view = h.handle.view();
        assert_eq!(view.download.last_completed, None);
        assert!(!h.models_dir().join("ggml-medium.bin").exists());
        assert!(!h.models_dir().join("ggml-tiny.bin").exists());
    }

    #[tokio::test]
    async fn shutdown_clears_recording_flag() {
        let h = spawn();
        h.ready().await;
        h.handle.start();
        h.wait("recording", |v| v.session.is_recording()).await;
        assert_eq!(h.store.read(Slot::IsRecording).unwrap(), Some(json!(true)));

        h.handle.shutdown();
        h.task.await.unwrap();
        assert_eq!(h.store.read(Slot::IsRecording).unwrap(), Some(json!(false)));
        assert_eq!(h.store.read(Slot::Status).unwrap(), Some(json!(0)));
        assert_eq!(h.engine.stops(), 1);
        assert!(!h.handle.send(SessionCommand::Start));
    }

    #[tokio::test]
    async fn store_outage_is_repaired_by_next_change() {
        let h = spawn();
        h.ready().await;
        h.handle.start();
        h.wait("recording", |v| v.session.is_recording()).await;
        assert_eq!(h.store.read(Slot::IsRecording).unwrap(), Some(json!(true)));

        h.store.set_available(false);
        h.handle.stop();
        h.wait("transcribing", |v| !v.session.is_recording()).await;
        h.store.set_available(true);

        h.emit(EngineEvent::StatusChanged(EngineStatus::Transcribing));
        h.emit(EngineEvent::Transcript {
            text: "after outage".into(),
            is_final: true,
        });
        h.wait("ready", |v| *v.session.status() == SessionStatus::Ready)
            .await;

        let store = h.store.clone();
        eventually("store repaired", move || {
            store.read(Slot::IsRecording).ok() == Some(Some(json!(false)))
                && store.read(Slot::Status).ok() == Some(Some(json!(4)))
        })
        .await;
    }

    #[tokio::test]
    async fn audio_level_is_sampled_only_while_recording() {
        let h = spawn();
        h.ready().await;
        assert_eq!(h.handle.view().audio_level, 0.0);

        h.handle.start();
        h.wait("level", |v| v.audio_level > 0.0).await;
        h.handle.stop();
        h.wait("level reset", |v| v.audio_level == 0.0).await;
    }
}
