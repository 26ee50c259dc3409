//! CLI commands and handlers
use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::app::{self, AppCfg};
use crate::domain::countdown::format_countdown;

#[derive(Parser, Debug)]
#[command(name = "scantastic")]
#[command(version, about = "Scan-to-sync wallet pairing from the command line")]
pub struct Cli {
    /// Path to config file (optional)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Pairing service base URL (overrides config)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Encryption helper executable (overrides config)
    #[arg(long, global = true)]
    pub encryption_helper: Option<String>,

    /// Log filter, e.g. "info" or "scantastic=debug"
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pair this wallet with a browser extension
    Pair {
        /// Contents of the scanned QR code (scantastic://...)
        uri: String,

        /// Address of the signing account
        #[arg(long)]
        account: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show what a scanned QR code contains
    #[command(name = "parse-uri")]
    ParseUri {
        uri: String,
    },

    /// Print the remaining time until a deadline (RFC 3339 or unix seconds)
    Countdown {
        expires_at: String,
    },
}

pub struct CommandExecutor;

impl CommandExecutor {
    /// Execute the selected command
    pub async fn execute(command: Commands, app_cfg: AppCfg) -> Result<()> {
        match command {
            Commands::Pair { uri, account, yes } => app::run_pairing(app_cfg, &uri, account, yes).await,
            Commands::ParseUri { uri } => app::describe_scan_uri(&uri),
            Commands::Countdown { expires_at } => Self::execute_countdown_command(&expires_at),
        }
    }

    fn execute_countdown_command(expires_at: &str) -> Result<()> {
        let deadline = parse_deadline(expires_at)?;
        info!("⏱️  Deadline: {}", deadline);
        println!("{}", format_countdown(deadline, Utc::now()));
        Ok(())
    }
}

fn parse_deadline(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    let secs: i64 = value
        .parse()
        .map_err(|_| anyhow!("expected RFC 3339 or unix seconds, got '{}'", value))?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| anyhow!("timestamp out of range: {}", secs))
}
