//! HTTP client for the remote pairing service

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::shared::errors::PairingError;

/// Тело запроса на загрузку зашифрованного блоба
#[derive(Debug, Serialize)]
struct SubmitBlobRequest<'a> {
    uuid: &'a str,
    blob: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitBlobResponse {
    otp: Option<String>,
}

/// Result of a blob submission as the controller needs to see it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 2xx; the passcode may still be missing from the body
    Accepted { otp: Option<String> },
    /// 401 from the service
    IpMismatch,
    /// Any other non-success status
    Rejected { status: u16, message: String },
}

/// Passcode state reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpState {
    Pending,
    Redeemed,
    Expired,
}

/// Ответ эндпоинта `/otp-state/{uuid}`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OtpStateResponse {
    pub otp: Option<OtpState>,
    #[serde(rename = "expiresAtInSeconds")]
    pub expires_at_in_seconds: Option<f64>,
}

impl OtpStateResponse {
    /// Server-reported deadline, if present and representable
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let secs = self.expires_at_in_seconds?;
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        Utc.timestamp_millis_opt((secs * 1000.0) as i64).single()
    }
}

/// Базовый trait для клиента сервиса сопряжения
#[async_trait]
pub trait PairingApi: Send + Sync {
    /// POST /blob
    async fn submit_blob(&self, uuid: &str, blob: &str) -> Result<SubmitOutcome, PairingError>;

    /// POST /otp-state/{uuid}
    async fn poll_status(&self, uuid: &str) -> Result<OtpStateResponse, PairingError>;
}

/// reqwest-backed pairing service client
pub struct HttpPairingApi {
    http_client: Client,
    base_url: String,
}

impl HttpPairingApi {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, PairingError> {
        let http_client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PairingApi for HttpPairingApi {
    async fn submit_blob(&self, uuid: &str, blob: &str) -> Result<SubmitOutcome, PairingError> {
        let url = format!("{}/blob", self.base_url);
        info!("📤 Submitting encrypted blob for session {}", uuid);

        let response = self
            .http_client
            .post(&url)
            .json(&SubmitBlobRequest { uuid, blob })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("⚠️ Pairing service reported IP mismatch for session {}", uuid);
            return Ok(SubmitOutcome::IpMismatch);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("⚠️ Blob submission for session {} failed with status: {}", uuid, status);
            return Ok(SubmitOutcome::Rejected { status: status.as_u16(), message });
        }

        let body: SubmitBlobResponse = response
            .json()
            .await
            .map_err(|e| PairingError::Submission(format!("malformed response body: {}", e)))?;

        Ok(SubmitOutcome::Accepted { otp: body.otp.filter(|otp| !otp.is_empty()) })
    }

    async fn poll_status(&self, uuid: &str) -> Result<OtpStateResponse, PairingError> {
        let url = format!("{}/otp-state/{}", self.base_url, uuid);
        debug!("🔍 Polling passcode state from: {}", url);

        let response = self.http_client.post(&url).send().await?;
        if !response.status().is_success() {
            return Err(PairingError::Transport(format!(
                "passcode state request failed with status: {}",
                response.status()
            )));
        }

        response
            .json::<OtpStateResponse>()
            .await
            .map_err(|e| PairingError::Protocol(format!("unparsable passcode state: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_state_response_parsing() {
        let body: OtpStateResponse =
            serde_json::from_str(r#"{"otp":"redeemed","expiresAtInSeconds":1714564920}"#).unwrap();
        assert_eq!(body.otp, Some(OtpState::Redeemed));
        assert_eq!(
            body.expires_at(),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 2, 0).unwrap())
        );
    }

    #[test]
    fn test_missing_otp_field_is_kept_as_none() {
        let body: OtpStateResponse = serde_json::from_str(r#"{"expiresAtInSeconds":10}"#).unwrap();
        assert!(body.otp.is_none());
    }

    #[test]
    fn test_unknown_otp_state_is_rejected() {
        assert!(serde_json::from_str::<OtpStateResponse>(r#"{"otp":"maybe"}"#).is_err());
    }

    #[test]
    fn test_invalid_expiry_is_ignored() {
        let body = OtpStateResponse { otp: None, expires_at_in_seconds: Some(-5.0) };
        assert!(body.expires_at().is_none());
        let body = OtpStateResponse { otp: None, expires_at_in_seconds: Some(f64::NAN) };
        assert!(body.expires_at().is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let api = HttpPairingApi::new("https://pairing.example.com/v1/", Duration::from_secs(5)).unwrap();
        assert_eq!(api.base_url(), "https://pairing.example.com/v1");
    }

    mod http {
        //! Exercises the client against a one-shot local HTTP server

        use super::*;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;
        use tokio::task::JoinHandle;

        const SESSION_ID: &str = "5f0c7c8e-3d1a-4b7e-9a51-2f1d7e0c9b44";

        /// Answer exactly one request with `status` and `body`; yields the raw request
        async fn serve_once(status: &'static str, body: &'static str) -> (HttpPairingApi, JoinHandle<String>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();

            let server = tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
                request
            });

            let api = HttpPairingApi {
                http_client: Client::builder()
                    .no_proxy()
                    .timeout(Duration::from_secs(5))
                    .build()
                    .unwrap(),
                base_url: format!("http://{}", addr),
            };
            (api, server)
        }

        async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
            let mut data = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&chunk[..n]);

                let text = String::from_utf8_lossy(&data);
                if let Some(end) = text.find("\r\n\r\n") {
                    let content_length = text[..end]
                        .lines()
                        .filter_map(|line| line.split_once(':'))
                        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if data.len() >= end + 4 + content_length {
                        break;
                    }
                }
            }
            String::from_utf8_lossy(&data).into_owned()
        }

        #[tokio::test]
        async fn test_submit_posts_blob_and_returns_passcode() {
            let (api, server) = serve_once("200 OK", r#"{"otp":"482913"}"#).await;

            let outcome = api.submit_blob(SESSION_ID, "encrypted-blob").await.unwrap();
            let request = server.await.unwrap();

            assert_eq!(outcome, SubmitOutcome::Accepted { otp: Some("482913".to_string()) });
            assert!(request.starts_with("POST /blob "));
            assert!(request.contains(SESSION_ID));
            assert!(request.contains("encrypted-blob"));
        }

        #[tokio::test]
        async fn test_submit_unauthorized_is_ip_mismatch_even_with_otp() {
            let (api, server) = serve_once("401 Unauthorized", r#"{"otp":"123456"}"#).await;

            let outcome = api.submit_blob(SESSION_ID, "encrypted-blob").await.unwrap();
            server.await.unwrap();

            assert_eq!(outcome, SubmitOutcome::IpMismatch);
        }

        #[tokio::test]
        async fn test_submit_other_failure_is_rejected() {
            let (api, server) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;

            let outcome = api.submit_blob(SESSION_ID, "encrypted-blob").await.unwrap();
            server.await.unwrap();

            match outcome {
                SubmitOutcome::Rejected { status, message } => {
                    assert_eq!(status, 500);
                    assert!(message.contains("boom"));
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_submit_malformed_body_is_submission_error() {
            let (api, server) = serve_once("200 OK", "not json").await;

            let err = api.submit_blob(SESSION_ID, "encrypted-blob").await.unwrap_err();
            server.await.unwrap();

            assert!(matches!(err, PairingError::Submission(_)));
        }

        #[tokio::test]
        async fn test_submit_without_passcode_is_accepted_empty() {
            for body in [r#"{"otp":""}"#, "{}"] {
                let (api, server) = serve_once("200 OK", body).await;

                let outcome = api.submit_blob(SESSION_ID, "encrypted-blob").await.unwrap();
                server.await.unwrap();

                assert_eq!(outcome, SubmitOutcome::Accepted { otp: None }, "body {}", body);
            }
        }

        #[tokio::test]
        async fn test_poll_reads_state_and_expiry() {
            let (api, server) =
                serve_once("200 OK", r#"{"otp":"pending","expiresAtInSeconds":1714564920}"#).await;

            let response = api.poll_status(SESSION_ID).await.unwrap();
            let request = server.await.unwrap();

            assert!(request.starts_with(&format!("POST /otp-state/{} ", SESSION_ID)));
            assert_eq!(response.otp, Some(OtpState::Pending));
            assert_eq!(
                response.expires_at(),
                Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 2, 0).unwrap())
            );
        }

        #[tokio::test]
        async fn test_poll_failure_status_is_error() {
            let (api, server) = serve_once("503 Service Unavailable", r#"{"otp":"redeemed"}"#).await;

            let err = api.poll_status(SESSION_ID).await.unwrap_err();
            server.await.unwrap();

            assert!(matches!(err, PairingError::Transport(_)));
        }

        #[tokio::test]
        async fn test_poll_unparsable_body_is_protocol_error() {
            let (api, server) = serve_once("200 OK", r#"{"otp":"maybe"}"#).await;

            let err = api.poll_status(SESSION_ID).await.unwrap_err();
            server.await.unwrap();

            assert!(matches!(err, PairingError::Protocol(_)));
        }
    }
}
