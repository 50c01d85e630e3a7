//! Partner bank-directory API client
//!
//! Fetches the bank directory from the partner API, optionally exchanging a
//! client id/secret pair for a bearer token first, and decodes the body into
//! loosely-typed raw records.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::RawRecord;
use crate::config::{Config, Credentials};

/// Errors that can occur when talking to the partner API
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Network, timeout or HTTP status failure
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// Response body could not be decoded
    #[error("upstream returned malformed content: {0}")]
    Malformed(String),
}

/// Source of raw bank records
#[async_trait]
pub trait UpstreamGateway: Send + Sync {
    /// Fetches the whole bank directory
    async fn fetch_all(&self) -> Result<Vec<RawRecord>, UpstreamError>;
}

/// Token endpoint reply
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Client for the partner bank-directory API
#[derive(Debug, Clone)]
pub struct PartnerClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Bank-directory endpoint
    banks_url: Url,
    /// Token endpoint, used only when credentials are present
    token_url: Url,
    /// Client credentials for the token exchange
    credentials: Option<Credentials>,
}

impl PartnerClient {
    /// Creates a client from validated configuration
    pub fn new(config: &Config) -> Result<Self, UpstreamError> {
        Ok(Self {
            http_client: build_http_client(config.request_timeout)?,
            banks_url: config.upstream_url.clone(),
            token_url: config.token_url.clone(),
            credentials: config.credentials.clone(),
        })
    }

    /// Creates a client against explicit endpoints
    pub fn with_endpoints(
        banks_url: Url,
        token_url: Url,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            banks_url,
            token_url,
            credentials,
        })
    }

    /// Exchanges the client credentials for a bearer token
    async fn obtain_token(&self, credentials: &Credentials) -> Result<String, UpstreamError> {
        let params = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .http_client
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| transport_error("token exchange", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Unavailable(format!(
                "token exchange returned HTTP {}",
                status.as_u16()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| transport_error("token exchange", e))?;
        let token: TokenResponse = serde_json::from_str(&text).map_err(|e| {
            UpstreamError::Malformed(format!("token exchange body is not JSON: {}", e))
        })?;

        token
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                UpstreamError::Malformed("token exchange reply has no access_token".to_string())
            })
    }
}

#[async_trait]
impl UpstreamGateway for PartnerClient {
    async fn fetch_all(&self) -> Result<Vec<RawRecord>, UpstreamError> {
        let mut request = self.http_client.get(self.banks_url.clone());
        if let Some(ref credentials) = self.credentials {
            let token = self.obtain_token(credentials).await?;
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error("bank directory", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Unavailable(format!(
                "bank directory returned HTTP {}",
                status.as_u16()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| transport_error("bank directory", e))?;
        let records = decode_records(&text)?;

        debug!(count = records.len(), "decoded bank directory");
        Ok(records)
    }
}

/// Builds the shared HTTP client with a request timeout
fn build_http_client(timeout: Duration) -> Result<Client, UpstreamError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| UpstreamError::Unavailable(format!("could not build HTTP client: {}", e)))
}

/// Maps a transport-level reqwest failure, keeping URLs out of the message
fn transport_error(operation: &str, error: reqwest::Error) -> UpstreamError {
    let kind = if error.is_timeout() {
        "timed out"
    } else if error.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    UpstreamError::Unavailable(format!("{} {}", operation, kind))
}

/// Decodes a bank-directory body into raw records
///
/// Accepts a bare JSON array or the partner envelope
/// `{"status": .., "message": .., "data": [..]}`. Array entries that are not
/// objects are skipped.
pub fn decode_records(body: &str) -> Result<Vec<RawRecord>, UpstreamError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| UpstreamError::Malformed(format!("bank directory body is not JSON: {}", e)))?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut envelope) => {
            if let Some(Value::String(status)) = envelope.get("status") {
                if status.eq_ignore_ascii_case("error") {
                    let message = envelope
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("no message");
                    return Err(UpstreamError::Unavailable(format!(
                        "bank directory reported an error: {}",
                        message
                    )));
                }
            }
            match envelope.remove("data") {
                Some(Value::Array(entries)) => entries,
                _ => {
                    return Err(UpstreamError::Malformed(
                        "bank directory envelope has no data array".to_string(),
                    ))
                }
            }
        }
        _ => {
            return Err(UpstreamError::Malformed(
                "bank directory body is neither an array nor an envelope".to_string(),
            ))
        }
    };

    let total = entries.len();
    let records: Vec<RawRecord> = entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();

    if records.len() < total {
        warn!(
            skipped = total - records.len(),
            "skipped non-object entries in bank directory"
        );
    }

    Ok(records)
}
