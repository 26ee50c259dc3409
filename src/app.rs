// src/app.rs
use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::application::controller::{
    PairingController, PairingDeps, PairingEvent, PairingScreen, WalletContext,
};
use crate::application::runner::spawn_session_loop;
use crate::config::Config;
use crate::domain::session::PairingStatus;
use crate::infrastructure::encryption::CommandEncryptor;
use crate::infrastructure::pairing_api::HttpPairingApi;
use crate::shared::types::PairingParameters;
use crate::shared::utils::short_address;

#[derive(Debug, Clone)]
pub struct AppCfg {
    pub api_url: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub encryption_helper: Option<String>,
    pub encryption_args: Vec<String>,
}

impl AppCfg {
    pub fn from_config(cfg: Config) -> Self {
        Self {
            api_url: cfg.api.base_url,
            request_timeout: Duration::from_millis(cfg.api.request_timeout_ms),
            poll_interval: Duration::from_millis(cfg.session.poll_interval_ms.max(1)),
            encryption_helper: cfg.encryption.helper,
            encryption_args: cfg.encryption.args,
        }
    }
}

impl Default for AppCfg {
    fn default() -> Self {
        Self::from_config(Config::default())
    }
}

/// Wallet side of a CLI session: a fixed account, events go to the log
pub struct CliWallet {
    account: Option<String>,
    completed: AtomicBool,
}

impl CliWallet {
    pub fn new(account: Option<String>) -> Self {
        Self {
            account,
            completed: AtomicBool::new(false),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }
}

impl WalletContext for CliWallet {
    fn active_account(&self) -> Option<String> {
        self.account.clone()
    }

    fn notify(&self, event: PairingEvent) {
        match event {
            PairingEvent::StatusChanged { from, to } => info!("📣 {} -> {}", from, to),
        }
    }

    fn on_complete(&self) {
        self.completed.store(true, Ordering::SeqCst);
        info!("🎉 Extension onboarding complete");
    }
}

/// Run a full pairing session for a scanned URI
pub async fn run_pairing(app_cfg: AppCfg, scan_uri: &str, account: Option<String>, assume_yes: bool) -> Result<()> {
    info!("Starting pairing session");
    info!("Configuration: {:?}", app_cfg);

    let params = PairingParameters::from_scan_uri(scan_uri).context("parse scan uri")?;
    let helper = app_cfg
        .encryption_helper
        .clone()
        .ok_or_else(|| anyhow!("no encryption helper configured ([encryption] helper or --encryption-helper)"))?;

    let api = Arc::new(HttpPairingApi::new(app_cfg.api_url.clone(), app_cfg.request_timeout)?);
    let encryptor = Arc::new(CommandEncryptor::new(helper, app_cfg.encryption_args.clone()));
    let wallet = Arc::new(CliWallet::new(account));

    let controller = PairingController::initialize(params.clone(), PairingDeps::new(api, encryptor, wallet.clone()))?;
    let mut handle = spawn_session_loop(controller.clone(), app_cfg.poll_interval);

    render(&controller.screen().await);
    if !assume_yes && !ask_confirmation(&params).await? {
        warn!("Pairing declined");
        handle.close().await;
        return Ok(());
    }
    tokio::select! {
        _ = controller.confirm() => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted while confirming, closing session");
            handle.close().await;
            return Err(anyhow!("pairing interrupted"));
        }
    }

    let mut display = tokio::time::interval(app_cfg.poll_interval);
    let mut last_screen = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, closing session");
                handle.close().await;
                break;
            }
            _ = display.tick() => {
                let screen = controller.screen().await;
                if last_screen.as_ref() != Some(&screen) {
                    render(&screen);
                    last_screen = Some(screen);
                }
                if !handle.is_running() {
                    break;
                }
            }
        }
    }
    handle.wait().await;

    let status = controller.status().await;
    if status == PairingStatus::Redeemed && wallet.is_completed() {
        info!("✅ Paired with {}", params.device.summary());
        Ok(())
    } else {
        error!("❌ Pairing ended with status {}", status);
        Err(anyhow!("pairing ended with status {}", status))
    }
}

async fn ask_confirmation(params: &PairingParameters) -> Result<bool> {
    println!("Sync your wallet with {}? [y/N]", params.device.summary());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn render(screen: &PairingScreen) {
    match screen {
        PairingScreen::Confirm { device, pending: false } => println!("🖥  Pair with {}", device),
        PairingScreen::Confirm { device, pending: true } => println!("⏳ Sending to {}...", device),
        PairingScreen::Passcode { code, countdown, .. } => {
            println!("🔢 Enter {} in the extension ({})", code, countdown)
        }
        PairingScreen::Success => println!("🎉 Wallet synced"),
        PairingScreen::Expired => println!("⌛ The code expired, scan again"),
        PairingScreen::IpMismatch => {
            println!("🚫 Your phone and computer must be on the same network")
        }
        PairingScreen::Error { message, .. } => println!("❌ {}", message),
    }
}

/// Print what a scanned code contains
pub fn describe_scan_uri(scan_uri: &str) -> Result<()> {
    let params = PairingParameters::from_scan_uri(scan_uri)?;
    println!("Session:    {}", if params.uuid.is_empty() { "-" } else { params.uuid.as_str() });
    println!("Device:     {}", params.device.summary());
    match &params.public_key {
        Some(key) => println!("Public key: n={} e={}", short_address(&key.n), key.e),
        None => println!("Public key: missing"),
    }
    Ok(())
}
