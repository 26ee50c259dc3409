//! Domain layer - pairing session entity and pure helpers

pub mod countdown;
pub mod session;

pub use countdown::{format_countdown, remaining_seconds};
pub use session::{FailureReason, PairingSession, PairingStatus};
