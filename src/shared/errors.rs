//! Error handling for the application

use thiserror::Error;

/// Pairing-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PairingError {
    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Blob submission failed: {0}")]
    Submission(String),

    /// The submitting and redeeming devices were seen from different origins
    #[error("IP address mismatch between devices")]
    IpMismatch,

    #[error("Malformed pairing service response: {0}")]
    Protocol(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Invalid scan URI: {0}")]
    InvalidScanUri(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for PairingError {
    fn from(err: reqwest::Error) -> Self {
        PairingError::Transport(err.to_string())
    }
}
