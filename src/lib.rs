//! Scantastic - scan-to-sync wallet pairing
//! Built with Domain-Driven Design principles

pub mod app;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod application;
pub mod shared;

// Re-export main types for convenience
pub use application::controller::{PairingController, PairingDeps, WalletContext};
pub use domain::session::{PairingSession, PairingStatus};
pub use infrastructure::{Encryptor, PairingApi};
pub use shared::errors::PairingError;
pub use shared::types::PairingParameters;
