use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use scantastic::app::AppCfg;
use scantastic::application::{Cli, CommandExecutor};
use scantastic::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load base configuration from file if provided
    let base_config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    // Priority: CLI args > Config file > Defaults
    let mut app_cfg = AppCfg::from_config(base_config);
    if let Some(api_url) = cli.api_url {
        app_cfg.api_url = api_url;
    }
    if let Some(helper) = cli.encryption_helper {
        app_cfg.encryption_helper = Some(helper);
    }

    CommandExecutor::execute(cli.command, app_cfg).await
}
