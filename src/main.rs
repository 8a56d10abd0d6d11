//! Application entry point for voice dictation.
//!
//! # `run` startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Open the shared store, creating the container if needed.
//! 5. Create the engine session (`native-engine` builds only) with its
//!    callbacks routed into the engine event channel.
//! 6. Spawn the session coordinator.
//! 7. Start the global hotkey listener (desktop profile).
//! 8. Read control lines from stdin until Ctrl-C.
//!
//! `keyboard` runs the restricted-process poller instead, with stdout as the
//! host text field.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use voice_dictation::{
    config::{AppConfig, AppPaths, Profile},
    control::ControlLine,
    download::HttpTransport,
    engine::{event_channel, EngineEventSender, ModelPaths, ModelSize, TranscriptionEngine},
    hotkey::HotkeyListener,
    inject::TextInjector,
    keyboard::{activation_url, Affordance, TextSink, TranscriptPoller},
    overlay::{LogSurface, OverlayController},
    session::{SessionCoordinator, SessionHandle, SessionStatus},
    shared::{FileStore, SharedSnapshot},
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "voice-dictation")]
#[command(about = "Push-to-talk dictation with a shared-state keyboard companion", long_about = None)]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dictation session (default)
    Run,
    /// Run the keyboard poller, printing inserted text to stdout
    Keyboard {
        /// Poll interval in milliseconds (defaults to the configured one)
        #[arg(short, long)]
        interval_ms: Option<u64>,
    },
    /// Print the shared session snapshot
    Status,
    /// List models and whether they are downloaded
    Models,
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // 2. Configuration
    let settings_path = cli
        .config
        .clone()
        .unwrap_or_else(|| AppPaths::new().settings_file);
    let config = AppConfig::load_from(&settings_path).unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_session(config, settings_path),
        Commands::Keyboard { interval_ms } => run_keyboard(&config, interval_ms),
        Commands::Status => print_status(&config),
        Commands::Models => {
            print_models(&config);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// run: privileged process
// ---------------------------------------------------------------------------

fn run_session(config: AppConfig, settings_path: PathBuf) -> Result<()> {
    log::info!("voice-dictation starting ({:?} profile)", config.profile);

    // 3. Tokio runtime (2 worker threads; model loads use the blocking pool)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(async move {
        // 4. Shared store
        let paths = config.paths();
        let store = Arc::new(
            FileStore::create(&paths.shared_dir).context("cannot create shared container")?,
        );

        // 5. Engine
        let (events_tx, events_rx) = event_channel();
        let engine = create_engine(&config, &paths, events_tx);

        // 6. Coordinator
        let transport = HttpTransport::new(Duration::from_secs(config.download.timeout_secs))
            .context("cannot build HTTP client")?;
        let mut coordinator = SessionCoordinator::new(config.clone(), engine, events_rx, store)
            .with_transport(Arc::new(transport))
            .with_settings_path(settings_path);
        if config.profile == Profile::Desktop {
            coordinator = coordinator
                .with_overlay(OverlayController::new(
                    Arc::new(LogSurface),
                    config.overlay.clone(),
                ))
                .with_injector(Arc::new(TextInjector::new(&config.paste)));
        }
        let handle = coordinator.handle();
        let session_task = tokio::spawn(coordinator.run());

        // 7. Hotkey listener thread
        let _hotkey_listener = if config.profile == Profile::Desktop {
            match HotkeyListener::start(config.hotkey.combo, handle.clone()) {
                Ok(listener) => Some(listener),
                Err(e) => {
                    log::warn!("Hotkey listener unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        // 8. Control lines and transcript echo
        tokio::spawn(read_control_lines(handle.clone(), config.clone()));
        tokio::spawn(echo_transcripts(handle.clone()));

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        log::info!("shutting down");
        handle.shutdown();
        if let Err(e) = session_task.await {
            log::error!("session task ended abnormally: {e}");
        }

        #[cfg(feature = "native-engine")]
        voice_dictation::engine::ffi::deinit();

        Ok::<(), anyhow::Error>(())
    })
}

#[cfg(feature = "native-engine")]
fn create_engine(
    config: &AppConfig,
    paths: &AppPaths,
    events: EngineEventSender,
) -> Option<Arc<dyn TranscriptionEngine>> {
    use voice_dictation::engine::{ffi, NativeEngine};

    if let Err(e) = ffi::init() {
        log::error!("engine: {e}");
        return None;
    }
    let domain = paths.config_dir.to_string_lossy();
    match NativeEngine::create(&config.engine, &paths.models_dir, &domain, events) {
        Ok(engine) => {
            let engine: Arc<dyn TranscriptionEngine> = engine;
            Some(engine)
        }
        Err(e) => {
            log::error!("engine: {e}; recording is disabled");
            None
        }
    }
}

#[cfg(not(feature = "native-engine"))]
fn create_engine(
    _config: &AppConfig,
    _paths: &AppPaths,
    _events: EngineEventSender,
) -> Option<Arc<dyn TranscriptionEngine>> {
    log::warn!("engine: built without the native engine; recording is disabled");
    None
}

async fn read_control_lines(handle: SessionHandle, config: AppConfig) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match ControlLine::parse(&line, &config.activation) {
                Ok(Some(command)) => {
                    if !handle.send(command) {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => log::warn!("control: {e}"),
            },
            Ok(None) => break,
            Err(e) => {
                log::warn!("control: cannot read stdin: {e}");
                break;
            }
        }
    }
    log::debug!("control: input closed");
}

/// Print every final transcript on its own line.
async fn echo_transcripts(handle: SessionHandle) {
    let mut views = handle.subscribe();
    let mut last = SessionStatus::Idle;
    while views.changed().await.is_ok() {
        let view = views.borrow_and_update().clone();
        let status = view.session.status().clone();
        if status != last {
            if status == SessionStatus::Ready {
                println!("{}", view.session.transcript());
            }
            last = status;
        }
    }
}

// ---------------------------------------------------------------------------
// keyboard: restricted process
// ---------------------------------------------------------------------------

/// Stdout stands in for the host text field.
struct StdoutSink;

impl TextSink for StdoutSink {
    fn insert_text(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn update_affordance(&mut self, affordance: &Affordance) {
        if affordance.store_unavailable {
            log::warn!("keyboard: shared container unavailable");
        } else {
            log::info!(
                "keyboard: {} (can record: {})",
                affordance.status,
                affordance.can_record
            );
        }
    }
}

fn run_keyboard(config: &AppConfig, interval_ms: Option<u64>) -> Result<()> {
    let paths = config.paths();
    let interval = Duration::from_millis(interval_ms.unwrap_or(config.sync.poll_interval_ms));
    log::info!(
        "keyboard: polling {} every {interval:?}; open {} to record",
        paths.shared_dir.display(),
        activation_url(&config.activation)
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(async move {
        let store = Arc::new(FileStore::at(&paths.shared_dir));
        let poller = TranscriptPoller::new(store, ModelPaths::new(&paths.models_dir));

        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = stop_tx.send(true);
            }
        });

        let mut sink = StdoutSink;
        poller.run(&mut sink, interval, stop_rx).await;
    });
    Ok(())
}

// ---------------------------------------------------------------------------
// status / models
// ---------------------------------------------------------------------------

fn print_status(config: &AppConfig) -> Result<()> {
    let shared_dir = config.paths().shared_dir;
    let store = FileStore::open(&shared_dir)
        .with_context(|| format!("no shared container at {}", shared_dir.display()))?;
    let snapshot = SharedSnapshot::read_from(&store)?;

    let status = SessionStatus::from_code(snapshot.status_code).unwrap_or_default();
    println!("status:       {status}");
    println!("recording:    {}", snapshot.is_recording);
    println!("model loaded: {}", snapshot.is_model_loaded);
    println!(
        "model:        {}",
        snapshot.selected_model_filename.as_deref().unwrap_or("-")
    );
    println!("transcript:   {}", snapshot.transcript_text);
    Ok(())
}

fn print_models(config: &AppConfig) {
    let models_dir = config.paths().models_dir;
    let paths = ModelPaths::new(&models_dir);
    println!("models in {}", models_dir.display());
    for model in ModelSize::ALL {
        let mut marks = Vec::new();
        if paths.is_available(model) {
            marks.push("downloaded");
        }
        if model == config.model.selected {
            marks.push("selected");
        }
        if config.model.default_model == Some(model) {
            marks.push("default");
        }
        println!(
            "  {:<12} {:<26} {:<16} {}",
            model.storage_key(),
            model.filename(),
            model.display_name(),
            marks.join(", ")
        );
    }
}
