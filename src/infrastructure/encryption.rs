//! Wallet seed encryption collaborator
//!
//! The encryption routine itself lives outside this crate. The controller only
//! relies on the contract `encrypt(address, modulus, exponent) -> blob`.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::shared::errors::PairingError;
use crate::shared::utils::short_address;

#[async_trait]
pub trait Encryptor: Send + Sync {
    /// Encrypt the seed of `address` for the RSA key (`modulus`, `exponent`)
    async fn encrypt(&self, address: &str, modulus: &str, exponent: &str) -> Result<String, PairingError>;
}

/// Runs an external helper: `<program> <args..> <address> <modulus> <exponent>`,
/// the blob is read from its stdout.
pub struct CommandEncryptor {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandEncryptor {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Encryptor for CommandEncryptor {
    async fn encrypt(&self, address: &str, modulus: &str, exponent: &str) -> Result<String, PairingError> {
        debug!(
            "Running encryption helper {} for {}",
            self.program.display(),
            short_address(address)
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(address)
            .arg(modulus)
            .arg(exponent)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PairingError::Encryption(format!("failed to run {}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PairingError::Encryption(format!(
                "helper exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let blob = String::from_utf8(output.stdout)
            .map_err(|_| PairingError::Encryption("helper produced non-UTF-8 output".to_string()))?;
        let blob = blob.trim();
        if blob.is_empty() {
            return Err(PairingError::Encryption("helper produced an empty blob".to_string()));
        }

        Ok(blob.to_string())
    }
}
