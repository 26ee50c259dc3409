//! Common types used across the application

use reqwest::Url;
use serde::Deserialize;
use uuid::Uuid;

use crate::shared::errors::PairingError;

/// URI scheme encoded into the QR code shown by the extension
pub const SCAN_URI_SCHEME: &str = "scantastic";

/// RSA public key of the extension (JWK-style modulus/exponent)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PublicKey {
    #[serde(default)]
    pub n: String,
    #[serde(default)]
    pub e: String,
}

/// Browser/device the extension runs on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub vendor: String,
    pub model: String,
    pub browser: String,
}

impl DeviceDescriptor {
    /// "Chrome on Apple MacBook", skipping whatever is unknown
    pub fn summary(&self) -> String {
        let machine = [self.vendor.trim(), self.model.trim()]
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        let browser = self.browser.trim();

        match (browser.is_empty(), machine.is_empty()) {
            (false, false) => format!("{} on {}", browser, machine),
            (false, true) => browser.to_string(),
            (true, false) => machine,
            (true, true) => "Unknown device".to_string(),
        }
    }
}

/// Parameters delivered by the scanned QR code, fixed for the whole session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairingParameters {
    pub public_key: Option<PublicKey>,
    pub uuid: String,
    pub device: DeviceDescriptor,
}

impl PairingParameters {
    /// Parse `scantastic://?pubKey=<json>&uuid=<uuid>&vendor=..&model=..&browser=..`
    pub fn from_scan_uri(uri: &str) -> Result<Self, PairingError> {
        let url = Url::parse(uri.trim())
            .map_err(|e| PairingError::InvalidScanUri(format!("unparsable uri: {}", e)))?;

        if url.scheme() != SCAN_URI_SCHEME {
            return Err(PairingError::InvalidScanUri(format!(
                "unexpected scheme '{}'",
                url.scheme()
            )));
        }

        let mut params = PairingParameters::default();
        for (key, value) in url.query_pairs() {
            match &*key {
                // Broken key JSON is tolerated here, confirm() will refuse to proceed
                "pubKey" => {
                    params.public_key = serde_json::from_str::<PublicKey>(&value)
                        .ok()
                        .filter(|k| !k.n.is_empty() && !k.e.is_empty());
                }
                "uuid" => params.uuid = value.into_owned(),
                "vendor" => params.device.vendor = value.into_owned(),
                "model" => params.device.model = value.into_owned(),
                "browser" => params.device.browser = value.into_owned(),
                _ => {}
            }
        }

        if !params.uuid.is_empty() && Uuid::parse_str(&params.uuid).is_err() {
            return Err(PairingError::InvalidScanUri(format!(
                "session id is not a uuid: {}",
                params.uuid
            )));
        }

        Ok(params)
    }
}
