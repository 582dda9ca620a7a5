//! netmon-agent - self-healing monitor for a small fleet of hosts
//!
//! Samples local resources, network reachability and HTTP endpoints on a
//! fixed interval, asks an advisory backend (or the built-in rule engine)
//! what to do about unhealthy results, applies the allowed remediations and
//! exposes a small control API.
//!
//! # Usage
//!
//! ```bash
//! # Run continuously with ./agent_config.toml (or built-in defaults)
//! netmon-agent
//!
//! # One cycle, outcome printed as JSON
//! netmon-agent --once --config /etc/netmon/agent_config.toml
//! ```
//!
//! # Environment Variables
//!
//! - `NETMON_CONFIG`: Path to the config file
//! - `ANTHROPIC_API_KEY` / `OPENAI_API_KEY`: Advisory credentials
//! - `SLACK_WEBHOOK_URL` / `DISCORD_WEBHOOK_URL`: Notification webhooks
//! - `NETMON_CORS_ORIGINS`: Comma-separated origins allowed on the control API
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use netmon_agent::agent::{command_channel, AgentState, ControlHandle, CycleEngine, Scheduler};
use netmon_agent::config::AgentConfig;
use netmon_agent::notifications::{NotificationSink, Notifier};
use netmon_agent::remediation::{RemediationExecutor, SystemHost};
use netmon_agent::advisory::{self, DecisionProvider as _};
use netmon_agent::{api, monitors};

#[derive(Parser, Debug)]
#[command(name = "netmon-agent")]
#[command(about = "Health monitoring with automated remediation")]
struct CliArgs {
    /// Config file (overrides NETMON_CONFIG and ./agent_config.toml)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Control API bind address (overrides server.addr)
    #[arg(long)]
    addr: Option<String>,

    /// Run exactly one cycle, print the outcome as JSON and exit
    #[arg(long)]
    once: bool,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,
}

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    Scheduler,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpServer => write!(f, "HttpServer"),
            Self::Scheduler => write!(f, "Scheduler"),
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Spawn the control API task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: axum::Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!(error = %e, "[HttpServer] Server error");
                Err(anyhow::anyhow!("HTTP server error: {e}"))
            }
        }
    });
}

fn spawn_scheduler(task_set: &mut JoinSet<Result<TaskName>>, scheduler: Scheduler) {
    task_set.spawn(async move {
        scheduler.run().await;
        Ok(TaskName::Scheduler)
    });
}

/// Watch tasks until both have finished.
///
/// The scheduler stops first (it owns the in-flight cycle); only then is the
/// HTTP server told to drain. A failing task cancels everything.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    scheduler_cancel: &CancellationToken,
    http_cancel: &CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring");

    let mut outcome = Ok(());
    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(TaskName::Scheduler)) => {
                info!("Supervisor: scheduler stopped, shutting down control API");
                http_cancel.cancel();
            }
            Ok(Ok(task)) => info!(task = %task, "Supervisor: task completed"),
            Ok(Err(e)) => {
                error!(error = %e, "Supervisor: task failed");
                scheduler_cancel.cancel();
                http_cancel.cancel();
                outcome = Err(e);
            }
            Err(e) => {
                error!(error = %e, "Supervisor: task panicked");
                scheduler_cancel.cancel();
                http_cancel.cancel();
                outcome = Err(anyhow::anyhow!("Task panicked: {e}"));
            }
        }
    }

    info!("Supervisor: all tasks completed");
    outcome
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Ignoring unreadable .env file: {e}");
        }
    }

    let loaded = AgentConfig::load(args.config.as_deref()).context("Failed to load agent config")?;
    init_tracing(args.log_json || loaded.config.logging.json);
    loaded.log();
    let config = loaded.config;

    let addr = args.addr.clone().unwrap_or_else(|| config.server.addr.clone());
    let allowed = config.remediation.allowed_kinds();

    info!("netmon-agent v{}", env!("CARGO_PKG_VERSION"));
    info!(
        interval_secs = config.monitoring.interval_secs,
        provider = %config.advisory.provider,
        auto_fix = config.remediation.auto_fix,
        allowed = ?config.remediation.allowed_actions,
        "Configuration loaded"
    );

    let monitors = monitors::from_config(&config.monitoring).context("Failed to build monitors")?;
    let provider =
        advisory::from_config(&config.advisory).context("Failed to build decision provider")?;
    info!(provider = provider.name(), monitors = monitors.len(), "Collaborators ready");

    let host = SystemHost::new().context("Failed to build remediation host")?;
    let executor = RemediationExecutor::new(Box::new(host), &config.remediation)
        .with_home_assistant(&config.monitoring.home_assistant.instances);
    let notifier: Arc<dyn NotificationSink> =
        Arc::new(Notifier::new(&config.notifications).context("Failed to build notifier")?);
    let state = Arc::new(AgentState::new(
        config.remediation.auto_fix,
        std::time::Instant::now(),
    ));

    let mut engine = CycleEngine::new(
        monitors,
        provider,
        executor,
        Arc::clone(&notifier),
        Arc::clone(&state),
        allowed,
    )
    .with_monitor_timeout(config.monitoring.check_timeout());

    if args.once {
        let outcome = engine.run_cycle().await;
        let json = serde_json::to_string_pretty(&outcome).context("Failed to encode outcome")?;
        println!("{json}");
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind control API on {addr}"))?;
    info!(addr = %addr, "Control API listening");

    notifier.notify_startup().await;

    let scheduler_cancel = CancellationToken::new();
    let http_cancel = CancellationToken::new();

    let signal_token = scheduler_cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Shutdown requested, finishing in-flight cycle");
        signal_token.cancel();
    });

    let (tx, rx) = command_channel();
    let control = ControlHandle::new(state, tx);
    let scheduler = Scheduler::new(
        engine,
        config.monitoring.interval(),
        rx,
        scheduler_cancel.clone(),
    );

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_scheduler(&mut task_set, scheduler);
    spawn_http_server(
        &mut task_set,
        listener,
        api::create_app(control),
        http_cancel.clone(),
    );

    let result = run_supervisor(&mut task_set, &scheduler_cancel, &http_cancel).await;

    notifier.notify_shutdown().await;
    info!("netmon-agent stopped");
    result
}
