//! Application layer - session controller, its loop, and CLI commands

pub mod commands;
pub mod controller;
pub mod runner;

pub use commands::{Cli, Commands, CommandExecutor};
pub use controller::{PairingController, PairingDeps, PairingEvent, PairingScreen, WalletContext};
pub use runner::{spawn_session_loop, SessionHandle};
