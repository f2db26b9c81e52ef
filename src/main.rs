//! Rowing Monitor
//!
//! Turns flywheel impulse timings from an air or magnetic rowing machine
//! into live rowing metrics, served over HTTP and a web socket and encoded
//! as FTMS Rower Data (or Indoor Bike Data) payloads.
//!
//! # Usage
//!
//! ```bash
//! # Built-in simulated session, paced in real time
//! cargo run --release
//!
//! # Noisy simulated session from the generator binary
//! ./impulse-simulation --strokes 200 --realtime | ./rowing-monitor --stdin
//!
//! # Replay a recorded session
//! ./rowing-monitor --replay recordings/session.txt --realtime
//! ```
//!
//! # Environment Variables
//!
//! - `ROWMON_CONFIG`: Path to a monitor TOML config
//! - `ROWMON_SERVER_ADDR`: Override the server bind address
//! - `ROWMON_CORS_ORIGINS`: Comma-separated allowed CORS origins
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use rowing_monitor::api::{create_app, DashboardState, MetricsFeed};
use rowing_monitor::config::{self, defaults, MonitorConfig};
use rowing_monitor::peripherals::{PeripheralMode, TracingNotifier};
use rowing_monitor::pipeline::source::{FileSource, ImpulseSource, StdinSource};
use rowing_monitor::pipeline::{AppState, LoopChannels, ProcessingLoop};
use rowing_monitor::simulation::{FlywheelSimulator, SimulatorConfig};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "rowing-monitor")]
#[command(about = "Rowing machine flywheel monitor with FTMS output")]
#[command(version)]
struct CliArgs {
    /// Read impulse intervals from stdin (one value in seconds per line)
    /// Use with the generator: ./impulse-simulation | ./rowing-monitor --stdin
    #[arg(long, conflicts_with = "replay")]
    stdin: bool,

    /// Replay a recorded session file
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Pace the replay in real time instead of as fast as possible
    #[arg(long)]
    realtime: bool,

    /// Override the server address (default: "0.0.0.0:8080")
    #[arg(short, long, env = "ROWMON_SERVER_ADDR")]
    addr: Option<String>,

    /// FTMS profile to publish
    #[arg(long, value_enum)]
    mode: Option<PeripheralMode>,
}

// ============================================================================
// Task Identification
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    ImpulseProcessor,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::ImpulseProcessor => write!(f, "ImpulseProcessor"),
        }
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// Spawn the HTTP server task into the JoinSet.
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
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Run the supervisor loop: monitor tasks, cancel on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("🔒 Supervisor: All tasks spawned, monitoring...");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("🛑 Supervisor: Shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("🔒 Supervisor: Task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("🔒 Supervisor: Task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("🔒 Supervisor: Task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("🔒 Supervisor: All tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Let the server drain in-flight requests
    while let Some(result) = task_set.join_next().await {
        if let Ok(Ok(task_name)) = result {
            info!("🔒 Supervisor: Task {} stopped", task_name);
        }
    }

    Ok(())
}

/// Run the monitor with any impulse source.
async fn run_monitor<S: ImpulseSource>(
    mut source: S,
    monitor_config: MonitorConfig,
    server_addr: String,
    cancel_token: CancellationToken,
) -> Result<()> {
    let app_state = Arc::new(RwLock::new(AppState::default()));
    let feed = MetricsFeed::new(defaults::FEED_CHANNEL_CAPACITY);
    let (commands_tx, commands) = mpsc::channel(defaults::COMMAND_CHANNEL_CAPACITY);
    let (heart_rate_tx, heart_rate) = mpsc::channel(defaults::COMMAND_CHANNEL_CAPACITY);
    info!("✓ Application state initialized");

    info!("🌐 Starting HTTP server on {}...", server_addr);
    let app = create_app(DashboardState {
        app_state: Arc::clone(&app_state),
        feed: feed.clone(),
        commands: commands_tx,
        heart_rate: heart_rate_tx,
    });
    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", server_addr))?;
    info!("✓ HTTP server listening on {}", server_addr);
    info!("");
    info!("🎯 Live metrics at: http://{}/api/metrics", server_addr);
    info!("🎯 Web socket feed at: ws://{}/ws", server_addr);
    info!("");

    info!("🔒 Supervisor: Initializing task monitoring");
    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    // Task 1: HTTP Server
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());

    // Task 2: Impulse Processor
    let processing_loop = ProcessingLoop::new(
        &monitor_config,
        TracingNotifier,
        Arc::clone(&app_state),
        feed,
        LoopChannels {
            commands,
            heart_rate,
        },
        cancel_token.clone(),
    );
    task_set.spawn(async move {
        info!("[ImpulseProcessor] Task starting");
        let (stats, _) = processing_loop.run(&mut source).await;
        info!("[ImpulseProcessor] {}", stats);
        Ok(TaskName::ImpulseProcessor)
    });

    run_supervisor(&mut task_set, cancel_token).await
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let mut monitor_config = MonitorConfig::load();
    if let Some(mode) = args.mode {
        monitor_config.peripheral.mode = mode;
    }
    info!(
        "Flywheel: I = {:.4} kg·m² | {} impulses/rev | drag {:.0}e-6",
        monitor_config.rower.flywheel_inertia,
        monitor_config.rower.impulses_per_revolution,
        monitor_config.rower.drag_factor * 1e6
    );
    config::init(monitor_config.clone());

    let server_addr = args
        .addr
        .unwrap_or_else(|| monitor_config.server.addr.clone());

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Rowing Monitor v{}", env!("CARGO_PKG_VERSION"));
    info!("  Flywheel impulses → rowing metrics → FTMS");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("");

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    if args.stdin {
        info!("📥 Input: stdin (one impulse interval per line)");
        run_monitor(StdinSource::stdin(), monitor_config, server_addr, cancel_token).await?;
    } else if let Some(path) = args.replay {
        info!("📂 Replaying recording: {}", path.display());
        let source = FileSource::open(&path, args.realtime)
            .await
            .with_context(|| format!("Failed to open recording {}", path.display()))?;
        info!("📊 {} impulses queued for processing", source.remaining());
        run_monitor(source, monitor_config, server_addr, cancel_token).await?;
    } else {
        let simulator = FlywheelSimulator::new(SimulatorConfig {
            inertia: monitor_config.rower.flywheel_inertia,
            impulses_per_revolution: monitor_config.rower.impulses_per_revolution,
            ..SimulatorConfig::default()
        });
        info!(
            "📥 Input: built-in simulator ({} strokes, {:.0} s)",
            simulator.config().strokes,
            simulator.config().session_time()
        );
        let source = FileSource::from_intervals(simulator.impulse_intervals(), true);
        run_monitor(source, monitor_config, server_addr, cancel_token).await?;
    }

    info!("");
    info!("✓ Rowing monitor shutdown complete");
    Ok(())
}
