//! VLA Dispatcher
//!
//! Reads the VLA observation document stream and dispatches position and
//! timing commands to experiments that coordinate observing with the VLA.
//!
//! # Usage
//!
//! ```bash
//! # Listen to the multicast stream and log decisions only
//! vla-dispatcher --intent OBSERVE_TARGET
//!
//! # Dispatch commands for one project into ./incoming.cmd
//! vla-dispatcher --project 19A-123 --intent OBSERVE_TARGET --dispatch
//!
//! # Replay recorded scan records (JSON lines)
//! vla-dispatcher --replay scans.jsonl --speed-ms 100 --dispatch
//! ```
//!
//! # Environment Variables
//!
//! - `VLA_DISPATCHER_CONFIG`: Path to a TOML config file
//! - `RUST_LOG`: Logging filter (overrides `--verbose`)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use vla_dispatcher::config::{defaults, ConfigOrigin, DispatcherConfig, LoggingConfig, QueueFormat, CONFIG_ENV_VAR};
use vla_dispatcher::dispatch::DispatchGate;
use vla_dispatcher::pipeline::source::{MulticastSource, ReplaySource, ScanSource, StdinSource};
use vla_dispatcher::pipeline::{ProcessingLoop, TransitionClassifier};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "vla-dispatcher")]
#[command(about = "Dispatch coordinated observing triggers from the VLA observation stream")]
#[command(version)]
struct CliArgs {
    /// Trigger SESSION on open sessions whose intent contains this substring
    #[arg(short, long)]
    intent: Option<String>,

    /// Trigger only on projects whose id contains this substring
    #[arg(short, long)]
    project: Option<String>,

    /// Actually write commands to the queue; otherwise only listen and log
    #[arg(short, long)]
    dispatch: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,

    /// Path to a TOML config file; must exist (default: ./dispatcher.toml if present)
    #[arg(long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Path of the single-slot command queue file
    #[arg(long, value_name = "PATH")]
    queue_path: Option<PathBuf>,

    /// Seconds to wait for the queue slot before dropping a command (0 = forever)
    #[arg(long, value_name = "SECS")]
    queue_timeout: Option<u64>,

    /// Command file layout
    #[arg(long, value_enum)]
    queue_format: Option<QueueFormat>,

    /// Read JSON scan records from stdin instead of the multicast stream
    #[arg(long, conflicts_with = "replay")]
    stdin: bool,

    /// Replay JSON-lines scan records from a file instead of the multicast stream
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Delay between replayed records (ms)
    #[arg(long, default_value_t = defaults::REPLAY_DELAY_MS)]
    speed_ms: u64,

    /// Override the obsdoc multicast group
    #[arg(long)]
    group: Option<String>,

    /// Override the obsdoc multicast port
    #[arg(long)]
    port: Option<u16>,
}

impl CliArgs {
    /// Command-line values take precedence over the config file.
    fn apply_overrides(&self, config: &mut DispatcherConfig) {
        if let Some(intent) = &self.intent {
            config.filters.intent = intent.clone();
        }
        if let Some(project) = &self.project {
            config.filters.project = project.clone();
        }
        if self.dispatch {
            config.dispatch.enabled = true;
        }
        if let Some(path) = &self.queue_path {
            config.dispatch.queue_path = path.clone();
        }
        if let Some(secs) = self.queue_timeout {
            config.dispatch.wait_timeout_secs = secs;
        }
        if let Some(format) = self.queue_format {
            config.dispatch.format = format;
        }
        if let Some(group) = &self.group {
            config.listener.group = group.clone();
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        config.logging.verbose |= self.verbose;
        config.logging.json |= self.log_json;
    }
}

// ============================================================================
// Logging
// ============================================================================

fn init_logging(logging: &LoggingConfig) {
    let default_level = if logging.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    if logging.json {
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

fn log_banner(config: &DispatcherConfig, source_name: &str) {
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  VLA Dispatcher is now running");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        "  Looking for intent = {:?}, project = {:?}",
        config.filters.intent, config.filters.project
    );
    info!("  Input: {}", source_name);
    if config.dispatch.enabled {
        info!("  Running in dispatch mode. Will dispatch obs commands.");
        info!(
            "  Queue: {} ({:?}, timeout {})",
            config.dispatch.queue_path.display(),
            config.dispatch.format,
            match config.dispatch.wait_timeout() {
                Some(t) => format!("{}s", t.as_secs()),
                None => "none".to_string(),
            }
        );
    } else {
        info!("  Running in listening mode. Will not dispatch obs commands.");
    }
    tracing::debug!("  Running in verbose mode");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

// ============================================================================
// Pipeline Runner
// ============================================================================

async fn run_pipeline<S: ScanSource>(
    mut source: S,
    config: &DispatcherConfig,
    cancel_token: CancellationToken,
) -> Result<()> {
    log_banner(config, source.source_name());

    let classifier = TransitionClassifier::new(config.filters.clone());
    let mut processing_loop = ProcessingLoop::new(classifier, cancel_token);
    if config.dispatch.enabled {
        processing_loop = processing_loop.with_dispatch(DispatchGate::from_config(&config.dispatch));
    }

    let stats = processing_loop.run(&mut source).await?;
    info!("{}", stats);
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let (mut config, origin) = DispatcherConfig::resolve(args.config.as_deref())
        .context("Failed to load dispatcher config")?;
    args.apply_overrides(&mut config);
    init_logging(&config.logging);

    match origin {
        ConfigOrigin::File(path) => info!(path = %path.display(), "Loaded dispatcher config"),
        ConfigOrigin::Defaults => info!("No config file found, using built-in defaults"),
    }
    config.validate().context("Invalid configuration")?;

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, escaping dispatcher...");
        shutdown_token.cancel();
    });

    if let Some(path) = &args.replay {
        info!("📂 Loading scan records from {}", path.display());
        let source = ReplaySource::from_file(path, args.speed_ms)?;
        run_pipeline(source, &config, cancel_token).await?;
    } else if args.stdin {
        run_pipeline(StdinSource::new(), &config, cancel_token).await?;
    } else {
        let source = MulticastSource::bind(&config.listener.group, config.listener.port)
            .context("Failed to join obsdoc multicast stream")?;
        run_pipeline(source, &config, cancel_token).await?;
    }

    info!("✓ VLA Dispatcher shutdown complete");
    Ok(())
}
