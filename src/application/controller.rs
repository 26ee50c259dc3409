//! Pairing session controller
//!
//! Drives one scan-to-sync session: confirm (encrypt + submit), poll the
//! passcode state, expire on the wall clock, and derive the screen to show.
//! Network calls never hold the session lock; their results are committed
//! only while the session is still active and of the same generation.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::domain::countdown::{format_countdown, remaining_seconds};
use crate::domain::session::{FailureReason, PairingSession, PairingStatus};
use crate::infrastructure::encryption::Encryptor;
use crate::infrastructure::pairing_api::{OtpState, PairingApi, SubmitOutcome};
use crate::shared::errors::PairingError;
use crate::shared::types::PairingParameters;
use crate::shared::utils::{format_otp, short_address};

/// Source of "now", swappable in tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Notifications pushed to the host application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    StatusChanged { from: PairingStatus, to: PairingStatus },
}

/// Capabilities supplied by the surrounding wallet
pub trait WalletContext: Send + Sync {
    /// Address of the signing account, if one is available
    fn active_account(&self) -> Option<String>;

    fn notify(&self, event: PairingEvent);

    /// Called once when the passcode has been redeemed
    fn on_complete(&self);
}

/// What the presentation layer should render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingScreen {
    /// Shown before and while confirming; `pending` while the network call is out
    Confirm { device: String, pending: bool },
    /// `seconds_left` is the rounded-up time until the passcode expires
    Passcode { code: String, countdown: String, seconds_left: u64 },
    Success,
    Expired,
    IpMismatch,
    Error { reason: FailureReason, message: String },
}

/// Collaborators of a controller
#[derive(Clone)]
pub struct PairingDeps {
    pub api: Arc<dyn PairingApi>,
    pub encryptor: Arc<dyn Encryptor>,
    pub wallet: Arc<dyn WalletContext>,
    pub clock: Arc<dyn Clock>,
}

impl PairingDeps {
    pub fn new(
        api: Arc<dyn PairingApi>,
        encryptor: Arc<dyn Encryptor>,
        wallet: Arc<dyn WalletContext>,
    ) -> Self {
        Self {
            api,
            encryptor,
            wallet,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Controller of a single pairing session. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct PairingController {
    session: Arc<RwLock<PairingSession>>,
    /// Set without the lock so a synchronous drop can detach the session
    disposed: Arc<AtomicBool>,
    account: String,
    deps: PairingDeps,
}

impl PairingController {
    /// Open a session for `params`. Fails if the wallet has no signing account.
    pub fn initialize(params: PairingParameters, deps: PairingDeps) -> Result<Self, PairingError> {
        let account = deps
            .wallet
            .active_account()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| PairingError::Precondition("no active signing account".to_string()))?;

        let session = PairingSession::new(params, deps.clock.now());
        info!(
            uuid = %session.params.uuid,
            account = %short_address(&account),
            device = %session.params.device.summary(),
            "🔗 Pairing session opened, scan window until {}",
            session.expires_at
        );

        Ok(Self {
            session: Arc::new(RwLock::new(session)),
            disposed: Arc::new(AtomicBool::new(false)),
            account,
            deps,
        })
    }

    /// User confirmed the pairing: encrypt, submit and wait for a passcode
    pub async fn confirm(&self) {
        let (generation, uuid, key) = {
            let mut session = self.session.write().await;
            if !self.is_live(&session) || session.status != PairingStatus::AwaitingConfirmation {
                return;
            }
            let Some(key) = session.params.public_key.clone() else {
                debug!(uuid = %session.params.uuid, "confirm() without a public key, ignoring");
                return;
            };
            session.transition(PairingStatus::Encrypting);
            (session.generation, session.params.uuid.clone(), key)
        };
        self.emit(PairingStatus::AwaitingConfirmation, PairingStatus::Encrypting);

        let blob = match self.deps.encryptor.encrypt(&self.account, &key.n, &key.e).await {
            Ok(blob) => blob,
            Err(e) => {
                error!(operation = "encrypt", uuid = %uuid, "❌ {}", e);
                self.commit(generation, |s| {
                    s.fail(FailureReason::Encryption, "Could not encrypt your recovery phrase.")
                })
                .await;
                return;
            }
        };

        let outcome = self.deps.api.submit_blob(&uuid, &blob).await;
        let now = self.deps.clock.now();

        self.commit(generation, |s| match outcome {
            Ok(SubmitOutcome::Accepted { otp: Some(otp) }) => {
                info!(operation = "submit_blob", uuid = %uuid, "✅ Passcode issued");
                s.issue_otp(otp, now)
            }
            Ok(SubmitOutcome::Accepted { otp: None }) => {
                error!(operation = "submit_blob", uuid = %uuid, "❌ Response carried no passcode");
                s.fail(FailureReason::Submission, "The pairing service did not return a code.")
            }
            Ok(SubmitOutcome::IpMismatch) => {
                let err = PairingError::IpMismatch;
                warn!(operation = "submit_blob", uuid = %uuid, "⚠️ {}", err);
                let previous = s.transition(PairingStatus::IpMismatch)?;
                s.last_error = Some(err.to_string());
                Some(previous)
            }
            Ok(SubmitOutcome::Rejected { status, .. }) => {
                error!(operation = "submit_blob", uuid = %uuid, status, "❌ Submission rejected");
                s.fail(FailureReason::Submission, "The pairing service rejected the request.")
            }
            Err(e) => {
                error!(operation = "submit_blob", uuid = %uuid, "❌ {}", e);
                s.fail(FailureReason::Submission, "Could not reach the pairing service.")
            }
        })
        .await;
    }

    /// Ask the service whether the passcode was redeemed or expired
    pub async fn poll(&self) {
        let (generation, uuid) = {
            let session = self.session.read().await;
            if !self.is_live(&session)
                || session.status != PairingStatus::AwaitingRedemption
                || session.otp.is_empty()
                || session.params.uuid.is_empty()
            {
                return;
            }
            (session.generation, session.params.uuid.clone())
        };

        let response = match self.deps.api.poll_status(&uuid).await {
            Ok(response) => response,
            Err(e) => {
                warn!(operation = "poll_status", uuid = %uuid, "⚠️ {}", e);
                return;
            }
        };

        let Some(state) = response.otp else {
            let err = PairingError::Protocol("response has no otp field".to_string());
            error!(operation = "poll_status", uuid = %uuid, "❌ {}", err);
            return;
        };
        let server_expiry = response.expires_at();

        self.commit(generation, |s| {
            if let Some(expires_at) = server_expiry {
                if s.adopt_expiry(expires_at) {
                    debug!(uuid = %uuid, "Adopted server expiry {}", expires_at);
                }
            }
            match state {
                OtpState::Pending => None,
                OtpState::Redeemed => s.transition(PairingStatus::Redeemed),
                OtpState::Expired => s.transition(PairingStatus::Expired),
            }
        })
        .await;
    }

    /// Wall-clock expiry check, independent of polling
    pub async fn tick(&self) {
        let now = self.deps.clock.now();
        let previous = {
            let mut session = self.session.write().await;
            if !self.is_live(&session) || !session.has_expired(now) {
                return;
            }
            session.transition(PairingStatus::Expired)
        };
        if let Some(from) = previous {
            info!("⏰ Pairing session expired");
            self.emit(from, PairingStatus::Expired);
        }
    }

    /// Discard the session; in-flight results are dropped when they land
    pub async fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        let mut session = self.session.write().await;
        if session.active {
            session.dispose();
            debug!(uuid = %session.params.uuid, "Pairing session disposed");
        }
    }

    /// Synchronous `dispose()` for drop paths. If the lock is busy the session
    /// is detached by the next operation that takes it.
    pub fn dispose_now(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        if let Ok(mut session) = self.session.try_write() {
            if session.active {
                session.dispose();
                debug!(uuid = %session.params.uuid, "Pairing session disposed");
            }
        }
    }

    pub async fn status(&self) -> PairingStatus {
        self.session.read().await.status
    }

    pub async fn snapshot(&self) -> PairingSession {
        self.session.read().await.clone()
    }

    /// True once nothing more can happen to this session
    pub async fn is_finished(&self) -> bool {
        let session = self.session.read().await;
        !self.is_live(&session) || session.is_terminal()
    }

    pub async fn screen(&self) -> PairingScreen {
        let now = self.deps.clock.now();
        let session = self.session.read().await;
        derive_screen(&session, now)
    }

    async fn commit<F>(&self, generation: u64, apply: F)
    where
        F: FnOnce(&mut PairingSession) -> Option<PairingStatus>,
    {
        let change = {
            let mut session = self.session.write().await;
            if self.disposed.load(Ordering::SeqCst) && session.active {
                session.dispose();
            }
            if !session.accepts(generation) {
                debug!(uuid = %session.params.uuid, "Dropping result for a discarded session");
                return;
            }
            apply(&mut *session).map(|from| (from, session.status))
        };
        if let Some((from, to)) = change {
            self.emit(from, to);
        }
    }

    fn is_live(&self, session: &PairingSession) -> bool {
        session.active && !self.disposed.load(Ordering::SeqCst)
    }

    fn emit(&self, from: PairingStatus, to: PairingStatus) {
        info!("🔄 Pairing status {} -> {}", from, to);
        self.deps.wallet.notify(PairingEvent::StatusChanged { from, to });
        if to == PairingStatus::Redeemed {
            self.deps.wallet.on_complete();
        }
    }
}

fn derive_screen(session: &PairingSession, now: DateTime<Utc>) -> PairingScreen {
    match session.status {
        PairingStatus::AwaitingConfirmation | PairingStatus::Encrypting => PairingScreen::Confirm {
            device: session.params.device.summary(),
            pending: session.status == PairingStatus::Encrypting,
        },
        PairingStatus::AwaitingRedemption => PairingScreen::Passcode {
            code: format_otp(&session.otp),
            countdown: format_countdown(session.expires_at, now),
            seconds_left: remaining_seconds(session.expires_at, now),
        },
        PairingStatus::Redeemed => PairingScreen::Success,
        PairingStatus::Expired => PairingScreen::Expired,
        PairingStatus::IpMismatch => PairingScreen::IpMismatch,
        PairingStatus::Failed(reason) => PairingScreen::Error {
            reason,
            message: session
                .last_error
                .clone()
                .unwrap_or_else(|| "Something went wrong.".to_string()),
        },
    }
}
