//! cloudkeepd: the cloudkeep daemon.
//!
//! Loads `cloudkeep.toml`, opens the embedded store, and re-invokes the
//! reconcile driver on an interval.
//!
//! # Usage
//!
//! ```text
//! cloudkeepd init-config --name rhmi --prefix redhat-rhmi- > cloudkeep.toml
//! cloudkeepd run --config cloudkeep.toml --data-dir /var/lib/cloudkeep
//! cloudkeepd uninstall --config cloudkeep.toml --data-dir /var/lib/cloudkeep
//! ```

mod daemon;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cloudkeep_core::KeeperConfig;
use cloudkeep_reconcile::{Phase, epoch_secs};

use crate::daemon::LoopMode;

const DEFAULT_LOG_FILTER: &str = "info,cloudkeep=debug";

#[derive(Parser)]
#[command(name = "cloudkeepd", about = "cloudkeep daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct LoopArgs {
    /// Path to cloudkeep.toml.
    #[arg(long, default_value = "cloudkeep.toml")]
    config: PathBuf,

    /// Data directory for the embedded store.
    #[arg(long, default_value = "/var/lib/cloudkeep")]
    data_dir: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile the installation toward installed.
    Run {
        #[command(flatten)]
        args: LoopArgs,

        /// Exit after the first completed pass instead of re-checking.
        #[arg(long)]
        once: bool,
    },
    /// Tear the installation's cloud resources down, then exit.
    Uninstall {
        #[command(flatten)]
        args: LoopArgs,
    },
    /// Print a configuration scaffold for a new installation.
    InitConfig {
        /// Installation name.
        #[arg(long)]
        name: String,

        /// Prefix applied to every product namespace.
        #[arg(long, default_value = "")]
        prefix: String,

        /// Installation creation time (unix seconds); defaults to now.
        #[arg(long)]
        created_at: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { args, once } => {
            init_tracing(args.json_logs);
            let mode = if once {
                LoopMode::UntilCompleted
            } else {
                LoopMode::Watch
            };
            run_loop(args, false, mode).await
        }
        Command::Uninstall { args } => {
            init_tracing(args.json_logs);
            run_loop(args, true, LoopMode::UntilCompleted).await
        }
        Command::InitConfig {
            name,
            prefix,
            created_at,
        } => {
            let created_at = created_at.unwrap_or_else(epoch_secs);
            let config = KeeperConfig::scaffold(&name, &prefix, created_at);
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run_loop(args: LoopArgs, uninstall: bool, mode: LoopMode) -> anyhow::Result<()> {
    let config = KeeperConfig::from_file(&args.config)?;
    info!(
        config = ?args.config,
        installation = %config.installation.name,
        "cloudkeep daemon starting"
    );

    let reconciler = Arc::new(daemon::open_reconciler(&config, &args.data_dir)?);

    // ── Shutdown signal ────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!(error = %e, "failed to listen for ctrl-c"),
        }
        let _ = shutdown_tx.send(true);
    });

    let last = daemon::run(
        reconciler,
        config.installation.clone(),
        uninstall,
        mode,
        config.reconcile.interval(),
        shutdown_rx,
    )
    .await?;

    match last {
        Some(Phase::Completed) => info!(uninstall, "installation reconciled"),
        Some(phase) => info!(%phase, "stopped before convergence"),
        None => info!("stopped before the first pass"),
    }
    Ok(())
}
