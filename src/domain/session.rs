//! Pairing session entity and its state machine

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::shared::types::PairingParameters;

/// How long the scanned QR code stays usable
pub const SCAN_WINDOW_SECS: i64 = 6 * 60;
/// How long an issued passcode stays redeemable
pub const OTP_WINDOW_SECS: i64 = 2 * 60;

/// Which step of the attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    Encryption,
    Submission,
}

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairingStatus {
    AwaitingConfirmation,
    Encrypting,
    AwaitingRedemption,
    Redeemed,
    Expired,
    IpMismatch,
    Failed(FailureReason),
}

impl PairingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PairingStatus::Redeemed
                | PairingStatus::Expired
                | PairingStatus::IpMismatch
                | PairingStatus::Failed(_)
        )
    }

    /// Allowed edges of the state machine
    pub fn can_transition_to(&self, next: PairingStatus) -> bool {
        use PairingStatus::*;

        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (AwaitingConfirmation, Encrypting) => true,
            (Encrypting, Failed(_)) | (Encrypting, IpMismatch) | (Encrypting, AwaitingRedemption) => true,
            (AwaitingRedemption, Redeemed) => true,
            // Wall-clock expiry may end any live phase
            (_, Expired) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PairingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairingStatus::AwaitingConfirmation => write!(f, "awaiting-confirmation"),
            PairingStatus::Encrypting => write!(f, "encrypting"),
            PairingStatus::AwaitingRedemption => write!(f, "awaiting-redemption"),
            PairingStatus::Redeemed => write!(f, "redeemed"),
            PairingStatus::Expired => write!(f, "expired"),
            PairingStatus::IpMismatch => write!(f, "ip-mismatch"),
            PairingStatus::Failed(FailureReason::Encryption) => write!(f, "failed(encryption)"),
            PairingStatus::Failed(FailureReason::Submission) => write!(f, "failed(submission)"),
        }
    }
}

/// Mutable state of one pairing attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingSession {
    pub params: PairingParameters,
    pub otp: String,
    pub expires_at: DateTime<Utc>,
    pub status: PairingStatus,
    pub last_error: Option<String>,
    pub generation: u64,
    pub active: bool,
}

impl PairingSession {
    pub fn new(params: PairingParameters, now: DateTime<Utc>) -> Self {
        Self {
            params,
            otp: String::new(),
            expires_at: now + Duration::seconds(SCAN_WINDOW_SECS),
            status: PairingStatus::AwaitingConfirmation,
            last_error: None,
            generation: 0,
            active: true,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply `next` if the state machine allows it; returns the previous status on change
    pub fn transition(&mut self, next: PairingStatus) -> Option<PairingStatus> {
        if self.status == next || !self.status.can_transition_to(next) {
            return None;
        }
        let previous = self.status;
        self.status = next;
        Some(previous)
    }

    /// Fail the current attempt, remembering the message for the error screen
    pub fn fail(&mut self, reason: FailureReason, message: impl Into<String>) -> Option<PairingStatus> {
        let previous = self.transition(PairingStatus::Failed(reason))?;
        self.last_error = Some(message.into());
        Some(previous)
    }

    /// Store a freshly issued passcode and open its validity window
    pub fn issue_otp(&mut self, otp: String, now: DateTime<Utc>) -> Option<PairingStatus> {
        let previous = self.transition(PairingStatus::AwaitingRedemption)?;
        self.otp = otp;
        self.expires_at = now + Duration::seconds(OTP_WINDOW_SECS);
        Some(previous)
    }

    /// Replace the deadline with the one reported by the server, earlier or later.
    /// Only the deadline moves; an expired status stays expired.
    pub fn adopt_expiry(&mut self, expires_at: DateTime<Utc>) -> bool {
        if expires_at == self.expires_at {
            return false;
        }
        self.expires_at = expires_at;
        true
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Detach the session; results computed for an older generation are dropped
    pub fn dispose(&mut self) {
        self.active = false;
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn accepts(&self, generation: u64) -> bool {
        self.active && self.generation == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_new_session_opens_scan_window() {
        let session = PairingSession::new(PairingParameters::default(), now());
        assert_eq!(session.status, PairingStatus::AwaitingConfirmation);
        assert_eq!(session.expires_at, now() + Duration::minutes(6));
        assert!(session.otp.is_empty());
    }

    #[test]
    fn test_terminal_states_absorb_transitions() {
        for terminal in [
            PairingStatus::Redeemed,
            PairingStatus::Expired,
            PairingStatus::IpMismatch,
            PairingStatus::Failed(FailureReason::Submission),
        ] {
            let mut session = PairingSession::new(PairingParameters::default(), now());
            session.status = terminal;
            assert!(session.transition(PairingStatus::Expired).is_none());
            assert!(session.transition(PairingStatus::Redeemed).is_none());
            assert!(session.transition(PairingStatus::AwaitingConfirmation).is_none());
            assert_eq!(session.status, terminal);
        }
    }

    #[test]
    fn test_issue_otp_sets_validity_window() {
        let mut session = PairingSession::new(PairingParameters::default(), now());
        session.transition(PairingStatus::Encrypting);
        let at = now() + Duration::seconds(10);

        assert_eq!(session.issue_otp("123456".to_string(), at), Some(PairingStatus::Encrypting));
        assert_eq!(session.otp, "123456");
        assert_eq!(session.expires_at, at + Duration::minutes(2));
    }

    #[test]
    fn test_cannot_skip_confirmation() {
        let mut session = PairingSession::new(PairingParameters::default(), now());
        assert!(session.issue_otp("123456".to_string(), now()).is_none());
        assert!(session.otp.is_empty());
        assert!(session.transition(PairingStatus::Redeemed).is_none());
    }

    #[test]
    fn test_server_expiry_replaces_deadline() {
        let mut session = PairingSession::new(PairingParameters::default(), now());
        let original = session.expires_at;

        assert!(session.adopt_expiry(original - Duration::minutes(5)));
        assert_eq!(session.expires_at, original - Duration::minutes(5));
        assert!(session.adopt_expiry(original + Duration::seconds(1)));
        assert_eq!(session.expires_at, original + Duration::seconds(1));
        assert!(!session.adopt_expiry(original + Duration::seconds(1)));
    }

    #[test]
    fn test_adopting_expiry_never_revives_expired_session() {
        let mut session = PairingSession::new(PairingParameters::default(), now());
        session.transition(PairingStatus::Expired);

        session.adopt_expiry(now() + Duration::hours(1));

        assert_eq!(session.status, PairingStatus::Expired);
        assert!(session.transition(PairingStatus::AwaitingRedemption).is_none());
    }

    #[test]
    fn test_dispose_rejects_old_generation() {
        let mut session = PairingSession::new(PairingParameters::default(), now());
        let generation = session.generation;
        assert!(session.accepts(generation));
        session.dispose();
        assert!(!session.accepts(generation));
        assert!(!session.accepts(session.generation));
    }
}
