//! CLI module for Burnwatch
//!
//! - `monitor`: live status with alerting, refreshed on an interval
//! - `record`: record one completed call
//! - `budget`: show, set or clear the monthly budget
//! - `analytics`: model, hourly and daily breakdowns
//! - `alerts`: recently raised alerts
//! - `demo`: seed simulated calls and show the resulting status
//! - `reset`: delete all recorded data

use anyhow::{Context, Result};
use burnwatch_core::{MonitorConfig, UsageMonitor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

pub mod data;
pub mod monitor;
pub mod report;

/// Burnwatch API usage monitor
#[derive(Parser, Debug)]
#[command(name = "burnwatch")]
#[command(about = "Usage, burn rate and quota forecasts for metered LLM APIs")]
#[command(version)]
pub struct Cli {
    /// Extra configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path (overrides configuration)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Scope commands to one API key
    #[arg(long, global = true)]
    pub key: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch usage and raise alerts until Ctrl+C
    Monitor {
        /// Refresh once and exit
        #[arg(long)]
        once: bool,
    },
    /// Record a completed API call
    Record {
        /// Model identifier
        model: String,
        /// Prompt tokens
        prompt: u64,
        /// Completion tokens
        completion: u64,
    },
    /// Show or change the monthly budget
    Budget {
        /// New limit in USD
        limit: Option<f64>,
        /// Remove the limit
        #[arg(long, conflicts_with = "limit")]
        clear: bool,
    },
    /// Usage breakdown over recent days
    Analytics {
        /// Number of days, including today
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Recently raised alerts
    Alerts {
        /// Look-back window in hours
        #[arg(long, default_value_t = 24)]
        hours: u32,
        /// Maximum number of alerts
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Seed simulated calls and show the resulting status
    Demo {
        /// Use a throwaway in-memory database
        #[arg(long)]
        ephemeral: bool,
    },
    /// Delete every recorded call, session, budget and alert
    Reset {
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    let config = crate::config::load_config(cli.config.as_deref())?;
    let key = cli.key.as_deref();

    if let Commands::Demo { ephemeral: true } = command {
        let monitor = UsageMonitor::in_memory(config)
            .await
            .context("Failed to open in-memory store")?;
        return data::demo(&monitor, key).await;
    }

    let monitor = open_monitor(config, cli.db).await?;
    match command {
        Commands::Monitor { once } => monitor::run(&monitor, key, once).await,
        Commands::Record {
            model,
            prompt,
            completion,
        } => data::record(&monitor, key, model, prompt, completion).await,
        Commands::Budget { limit, clear } => data::budget(&monitor, key, limit, clear).await,
        Commands::Analytics { days } => report::analytics(&monitor, key, days).await,
        Commands::Alerts { hours, limit } => report::alerts(&monitor, key, hours, limit).await,
        Commands::Demo { .. } => data::demo(&monitor, key).await,
        Commands::Reset { force } => data::reset(&monitor, force).await,
    }
}

async fn open_monitor(config: MonitorConfig, db: Option<PathBuf>) -> Result<UsageMonitor> {
    let path = crate::config::resolve_db_path(db.as_deref(), &config);
    info!("Opening usage database at {}", path.display());
    UsageMonitor::open(config, &path)
        .await
        .with_context(|| format!("Failed to open usage database at {}", path.display()))
}
