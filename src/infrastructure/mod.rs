//! Infrastructure layer - external service adapters

pub mod encryption;
pub mod pairing_api;

pub use encryption::{CommandEncryptor, Encryptor};
pub use pairing_api::{HttpPairingApi, OtpState, OtpStateResponse, PairingApi, SubmitOutcome};
