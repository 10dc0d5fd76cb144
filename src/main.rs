//! Briefcast - staged playback of a dual-AI legal document review
//!
//! Replays pre-scripted analysis steps (OCR, clause extraction, risk
//! assessment) with their simulated durations, so a demo looks like live AI
//! analysis without calling any model.
//!
//! # Usage
//!
//! ```bash
//! # Serve the HTTP/SSE API (default)
//! briefcast serve --addr 127.0.0.1:8080
//!
//! # Play a subject in the terminal, twice as fast
//! briefcast play nda --dual --speed 2
//!
//! # List the sample document library
//! briefcast list
//! ```
//!
//! # Environment Variables
//!
//! - `BRIEFCAST_CONFIG`: Path to a TOML config file
//! - `BRIEFCAST_SERVER_ADDR`: Override the server address
//! - `BRIEFCAST_LOG_JSON`: Emit logs as JSON lines
//! - `RUST_LOG`: Logging level (default: info for `serve`, warn otherwise)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use briefcast::aggregator::RiskBreakdown;
use briefcast::api::{create_app, ApiState};
use briefcast::catalog::CatalogRegistry;
use briefcast::config::{self, defaults, AppConfig};
use briefcast::playback::{
    observer::step_progress, EventBus, EventContext, LoggingObserver, PlaybackMode,
    PlaybackObserver, RealtimePacer, SurfaceRegistry,
};
use briefcast::types::{AnalysisResult, CancelReason, PlaybackOutcome, Step, Timeline};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "briefcast")]
#[command(about = "Staged playback engine for dual-AI legal document review demos")]
#[command(version)]
struct CliArgs {
    /// Override the server address (default: "0.0.0.0:8080")
    #[arg(short, long, global = true)]
    addr: Option<String>,

    /// Path to a TOML config file (skips the normal search order)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Speed multiplier (1 = realtime, 2 = twice as fast, 0 = no delay)
    #[arg(long, global = true)]
    speed: Option<f64>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "BRIEFCAST_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Serve the HTTP API and SSE event stream
    Serve,

    /// Play one subject in the terminal
    Play {
        /// Subject to play (default: `[catalogs] default_subject`)
        subject: Option<String>,
        /// Run the GPT-4 Vision and Claude timelines side by side
        #[arg(long)]
        dual: bool,
    },

    /// List the document library and every playable catalog
    List,
}

// ============================================================================
// Logging
// ============================================================================

fn init_logging(json: bool, default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Load config, apply CLI overrides, re-validate, and install it globally.
fn load_config(args: &CliArgs) -> Result<&'static AppConfig> {
    let mut app_config = match &args.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::load(),
    };

    if let Some(addr) = &args.addr {
        app_config.server.addr.clone_from(addr);
    }
    if let Some(speed) = args.speed {
        app_config.playback.speed = speed;
    }
    app_config
        .validate()
        .context("Invalid configuration after applying CLI overrides")?;

    config::init(app_config);
    Ok(config::get())
}

fn load_catalogs(app_config: &AppConfig) -> Result<Arc<CatalogRegistry>> {
    let registry = match &app_config.catalogs.path {
        Some(path) => CatalogRegistry::builtin_with_file(path)
            .with_context(|| format!("Failed to load catalogs from {}", path.display()))?,
        None => CatalogRegistry::builtin().context("Built-in catalogs failed validation")?,
    };
    info!(
        documents = registry.list_documents().len(),
        catalogs = registry.catalog_ids().len(),
        "📚 Catalogs loaded"
    );
    Ok(Arc::new(registry))
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    Playback,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::Playback => write!(f, "Playback"),
        }
    }
}

/// Run the supervisor loop: monitor tasks, cancel on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("🔒 Supervisor: All tasks spawned, monitoring...");

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
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
                        return Ok(());
                    }
                }
            }
        }
    }

    // Give tasks a moment to observe the token and wind down.
    let drain = async {
        while let Some(result) = task_set.join_next().await {
            match result {
                Ok(Ok(task_name)) => info!("🔒 Supervisor: Task {} stopped", task_name),
                Ok(Err(e)) => warn!("🔒 Supervisor: Task stopped with error: {}", e),
                Err(e) => warn!("🔒 Supervisor: Task panicked during shutdown: {}", e),
            }
        }
    };
    if tokio::time::timeout(Duration::from_secs(5), drain).await.is_err() {
        warn!("🔒 Supervisor: Tasks did not stop within 5s, aborting");
        task_set.abort_all();
    }

    Ok(())
}

// ============================================================================
// Serve
// ============================================================================

async fn run_serve(app_config: &AppConfig, cancel_token: CancellationToken) -> Result<()> {
    let catalogs = load_catalogs(app_config)?;
    let events = EventBus::new(app_config.playback.event_buffer);
    let observers: Vec<Arc<dyn PlaybackObserver>> =
        vec![Arc::new(LoggingObserver), Arc::new(events.clone())];
    let surfaces = Arc::new(SurfaceRegistry::new(
        catalogs,
        Arc::new(RealtimePacer::new(app_config.playback.speed)),
        observers,
        app_config.playback.session_timeout(),
    )
    .with_finished_limit(app_config.playback.finished_surface_limit));

    let app = create_app(ApiState::new(Arc::clone(&surfaces), events));
    let listener = tokio::net::TcpListener::bind(&app_config.server.addr)
        .await
        .with_context(|| format!("Failed to bind {}", app_config.server.addr))?;
    info!("🌐 Listening on http://{}/api/v1", app_config.server.addr);

    info!("🔒 Supervisor: Initializing task monitoring");
    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    let server_cancel = cancel_token.clone();
    let server_surfaces = Arc::clone(&surfaces);
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                server_cancel.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        let interrupted = server_surfaces.shutdown();
        info!("[HttpServer] Tore down {} surface(s)", interrupted);

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

    run_supervisor(&mut task_set, cancel_token).await
}

// ============================================================================
// Play
// ============================================================================

/// Prints step progress to the terminal.
struct TerminalObserver {
    dual: bool,
}

impl TerminalObserver {
    fn prefix(&self, ctx: &EventContext) -> String {
        if self.dual && ctx.timeline != Timeline::Joined {
            format!("[{:<9}] ", ctx.timeline.to_string())
        } else {
            String::new()
        }
    }
}

impl PlaybackObserver for TerminalObserver {
    fn on_start(&self, ctx: &EventContext, total: usize) {
        if ctx.timeline != Timeline::Joined {
            println!("{}▶ {} ({} steps)", self.prefix(ctx), ctx.catalog_id, total);
        }
    }

    fn on_step_start(&self, ctx: &EventContext, step: &Step, index: usize, total: usize) {
        println!(
            "{}  [{}/{}] {} ({})...",
            self.prefix(ctx),
            index + 1,
            total,
            step.label,
            step.agent_tag.model_label()
        );
    }

    fn on_step_complete(
        &self,
        ctx: &EventContext,
        step: &Step,
        index: usize,
        total: usize,
        _partial: &AnalysisResult,
    ) {
        println!(
            "{}  ✓ {} ({:.0}%)",
            self.prefix(ctx),
            step.label,
            step_progress(index, total)
        );
    }

    fn on_cancelled(&self, ctx: &EventContext, reason: CancelReason) {
        if ctx.timeline == Timeline::Joined || !self.dual {
            println!("■ Cancelled: {reason}");
        }
    }
}

fn print_result(result: &AnalysisResult) {
    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if let Some(summary) = &result.summary {
        println!("  {summary}");
    }
    if let Some(confidence) = result.confidence {
        println!("  Confidence: {:.0}%", confidence * 100.0);
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if !result.findings.is_empty() {
        println!("Findings:");
        for finding in &result.findings {
            println!("  • {finding}");
        }
    }

    let breakdown = RiskBreakdown::from_result(result);
    if breakdown.total() > 0 {
        println!("Risks:");
        for risk in breakdown
            .high
            .iter()
            .chain(&breakdown.medium)
            .chain(&breakdown.low)
        {
            println!("  [{}] {}", risk.level, risk.title);
        }
    }

    if !result.recommendations.is_empty() {
        println!("Recommendations:");
        for rec in &result.recommendations {
            println!("  → {}", rec.text);
        }
    }

    if !result.metrics.is_empty() {
        println!("Metrics:");
        for (name, value) in &result.metrics {
            println!("  {name}: {value}");
        }
    }
}

async fn run_play(
    app_config: &AppConfig,
    subject: String,
    mode: PlaybackMode,
    cancel_token: CancellationToken,
) -> Result<()> {
    let catalogs = load_catalogs(app_config)?;
    let observers: Vec<Arc<dyn PlaybackObserver>> = vec![
        Arc::new(LoggingObserver),
        Arc::new(TerminalObserver {
            dual: mode == PlaybackMode::Dual,
        }),
    ];
    let surfaces = Arc::new(SurfaceRegistry::new(
        catalogs,
        Arc::new(RealtimePacer::new(app_config.playback.speed)),
        observers,
        app_config.playback.session_timeout(),
    )
    .with_finished_limit(app_config.playback.finished_surface_limit));

    let handle = surfaces
        .start(defaults::CLI_SURFACE, &subject, mode)
        .with_context(|| format!("Cannot play '{subject}'"))?;

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    let play_cancel = cancel_token.clone();
    task_set.spawn(async move {
        info!("[Playback] Task starting");

        let finished = handle.finished();
        tokio::pin!(finished);
        let outcome = tokio::select! {
            outcome = &mut finished => outcome,
            () = play_cancel.cancelled() => {
                surfaces.teardown(defaults::CLI_SURFACE)?;
                finished.await
            }
        };

        match outcome {
            PlaybackOutcome::Completed(result) => print_result(&result),
            PlaybackOutcome::Cancelled(reason) => info!(reason = %reason, "[Playback] Stopped early"),
        }
        Ok(TaskName::Playback)
    });

    run_supervisor(&mut task_set, cancel_token).await
}

// ============================================================================
// List
// ============================================================================

fn run_list(app_config: &AppConfig) -> Result<()> {
    let catalogs = load_catalogs(app_config)?;

    println!("{:<20} {:<34} {:<18} {:>5}  dual", "SUBJECT", "TITLE", "TYPE", "PAGES");
    for doc in catalogs.list_documents() {
        println!(
            "{:<20} {:<34} {:<18} {:>5}  {}",
            doc.subject_id,
            doc.title,
            doc.document_type,
            doc.pages,
            if doc.has_dual { "yes" } else { "no" }
        );
    }

    println!();
    println!("Catalogs:");
    for id in catalogs.catalog_ids() {
        if let Ok(catalog) = catalogs.get_catalog(id) {
            println!(
                "  {:<32} {:>2} steps  {:>6} ms",
                id,
                catalog.len(),
                catalog.expected_total_duration_ms()
            );
        }
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let serving = matches!(args.command, None | Some(SubCommand::Serve));
    init_logging(args.log_json, if serving { "info" } else { "warn" });

    let app_config = load_config(&args)?;

    if serving {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("  Briefcast - Staged Playback Engine");
        info!("  Dual-AI Legal Document Review Demo");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("");
        info!(
            "⏱️  Speed: {}",
            if app_config.playback.speed > 0.0 {
                format!("{}x", app_config.playback.speed)
            } else {
                "max (no delay)".to_string()
            }
        );
        if let Some(timeout) = app_config.playback.session_timeout() {
            info!("⏳ Session timeout: {}s", timeout.as_secs());
        }
        info!("");
    }

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    match args.command {
        None | Some(SubCommand::Serve) => run_serve(app_config, cancel_token).await?,
        Some(SubCommand::Play { subject, dual }) => {
            let subject = subject.unwrap_or_else(|| app_config.catalogs.default_subject.clone());
            let mode = if dual {
                PlaybackMode::Dual
            } else {
                PlaybackMode::Single
            };
            run_play(app_config, subject, mode, cancel_token).await?;
        }
        Some(SubCommand::List) => run_list(app_config)?,
    }

    if serving {
        info!("");
        info!("✓ Briefcast shutdown complete");
    }
    Ok(())
}
