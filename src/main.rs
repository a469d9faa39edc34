#![forbid(unsafe_code)]

//! `modweaver`: game client lifecycle daemon.
//!
//! Watches for launcher processes, injects the runtime module into the
//! preclient, and resolves/compiles the loaded modifications whenever a
//! game session starts.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use modweaver::adapters::{
    CommandChainService, CommandInjector, ConfiguredPreclientFactory,
    DirectoryModificationRepository, RetryingInjectionService, StreamingGate,
};
use modweaver::chain::ChainKind;
use modweaver::config::GlobalConfig;
use modweaver::orchestrator::reporter::spawn_event_reporter;
use modweaver::orchestrator::{LifecycleOrchestrator, OrchestratorDeps};
use modweaver::services::SessionService;
use modweaver::session::ProcessSessionService;
use modweaver::watcher::sysinfo_source::SysinfoProcessSource;
use modweaver::watcher::{ProcessSource, ProcessWatcherService};
use modweaver::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "modweaver", about = "Game client lifecycle daemon", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("modweaver bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let config = GlobalConfig::load_from_path(&args.config)?;
    info!(path = %args.config.display(), "configuration loaded");

    // ── Process discovery ───────────────────────────────
    let source = Arc::new(SysinfoProcessSource::new(config.watcher.poll_interval()));
    let watcher = Arc::new(ProcessWatcherService::new(
        Arc::clone(&source) as Arc<dyn ProcessSource>
    ));
    let sessions = Arc::new(ProcessSessionService::new(
        Arc::clone(&watcher),
        config.game.clone(),
    ));

    // ── Orchestrator collaborators ──────────────────────
    let injector = CommandInjector::from_config(&config.injection);
    let deps = OrchestratorDeps {
        preclient_executable: config.game.preclient_executable.clone(),
        watcher: Arc::clone(&watcher),
        sessions: Arc::clone(&sessions) as Arc<dyn SessionService>,
        injection: Arc::new(RetryingInjectionService::new(
            Box::new(injector),
            config.injection.attempts,
            config.injection.retry_delay(),
        )),
        configuration: Arc::new(ConfiguredPreclientFactory::new(&config.injection)),
        repository: Arc::new(DirectoryModificationRepository::new(
            config.modifications.directory.clone(),
        )),
        resolution: Arc::new(CommandChainService::new(
            ChainKind::Resolution,
            &config.resolution,
        )),
        compiler: Arc::new(CommandChainService::new(
            ChainKind::Compilation,
            &config.compilation,
        )),
        streaming: Arc::new(StreamingGate::from_config(&config.streaming)),
    };

    let ct = CancellationToken::new();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let reporter_handle = spawn_event_reporter(event_rx, ct.clone());

    let orchestrator = Arc::new(LifecycleOrchestrator::new(deps, Some(event_tx)));

    // Subscribers first, then start delivering.
    orchestrator.initialize()?;
    sessions.initialize()?;
    watcher.initialize()?;

    info!(
        preclient = config.game.preclient_executable,
        modifications = %config.modifications.directory.display(),
        "modweaver ready"
    );

    // ── Wait for shutdown signal ────────────────────────
    wait_for_termination().await;
    ct.cancel();

    let stop_source = Arc::clone(&source);
    if let Err(err) = tokio::task::spawn_blocking(move || stop_source.stop()).await {
        error!(%err, "failed to stop process source");
    }

    let _ = reporter_handle.await;
    info!("modweaver shut down");

    Ok(())
}

/// Resolve on ctrl-c, or on SIGTERM where the platform has it.
async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                warn!(%err, "SIGTERM unavailable; stop modweaver with ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("ctrl-c received"),
            _ = sigterm.recv() => info!("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "ctrl-c handler failed; shutting down");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_thread_names(true);

    let installed = match log_format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| AppError::Config(format!("cannot install log subscriber: {err}")))
}
