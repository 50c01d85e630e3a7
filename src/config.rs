//! Environment configuration for bankfind
//!
//! Reads the upstream endpoints, optional client credentials, request timeout,
//! store location and persistence queue size, validating them up front so the
//! rest of the crate can assume a usable configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use reqwest::Url;
use thiserror::Error;

/// Default partner bank-directory endpoint
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.flutterwave.com/v3/banks/NG";

/// Default partner token endpoint
pub const DEFAULT_TOKEN_URL: &str =
    "https://idp.flutterwave.com/realms/flutterwave/protocol/openid-connect/token";

/// Default bound on every outbound call, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default capacity of the background persistence queue
pub const DEFAULT_PERSIST_QUEUE: usize = 16;

/// File name of the persisted snapshot
pub const STORE_FILE_NAME: &str = "bankmappings.json";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is absent
    #[error("missing configuration: {0}")]
    Missing(String),

    /// A setting is present but unusable
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Client id/secret pair for the token exchange
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bank-directory endpoint
    pub upstream_url: Url,
    /// Token endpoint
    pub token_url: Url,
    /// Credentials, when the endpoint requires a bearer token
    pub credentials: Option<Credentials>,
    /// Bound on upstream calls and store operations
    pub request_timeout: Duration,
    /// Location of the JSON snapshot
    pub store_path: PathBuf,
    /// Capacity of the persistence queue
    pub persist_queue: usize,
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// A `.env` file in the working directory is read first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let upstream_url = parse_url(
            "BANKFIND_UPSTREAM_URL",
            get("BANKFIND_UPSTREAM_URL").as_deref().unwrap_or(DEFAULT_UPSTREAM_URL),
        )?;
        let token_url = parse_url(
            "BANKFIND_TOKEN_URL",
            get("BANKFIND_TOKEN_URL").as_deref().unwrap_or(DEFAULT_TOKEN_URL),
        )?;

        let credentials = match (get("BANKFIND_CLIENT_ID"), get("BANKFIND_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(Credentials {
                client_id,
                client_secret,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Missing(
                    "BANKFIND_CLIENT_SECRET must be set alongside BANKFIND_CLIENT_ID".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(ConfigError::Missing(
                    "BANKFIND_CLIENT_ID must be set alongside BANKFIND_CLIENT_SECRET".to_string(),
                ))
            }
        };

        let timeout_secs = match get("BANKFIND_TIMEOUT_SECS") {
            Some(raw) => parse_positive("BANKFIND_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let persist_queue = match get("BANKFIND_PERSIST_QUEUE") {
            Some(raw) => parse_positive("BANKFIND_PERSIST_QUEUE", &raw)? as usize,
            None => DEFAULT_PERSIST_QUEUE,
        };

        let store_path = match get("BANKFIND_STORE_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_store_path().ok_or_else(|| {
                ConfigError::Missing(
                    "BANKFIND_STORE_PATH (no platform data directory available)".to_string(),
                )
            })?,
        };

        Ok(Self {
            upstream_url,
            token_url,
            credentials,
            request_timeout: Duration::from_secs(timeout_secs),
            store_path,
            persist_queue,
        })
    }

    /// Overrides the request timeout
    pub fn with_timeout_secs(mut self, secs: u64) -> Result<Self, ConfigError> {
        if secs == 0 {
            return Err(ConfigError::Invalid {
                key: "timeout".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        self.request_timeout = Duration::from_secs(secs);
        Ok(self)
    }

    /// Overrides the store location
    pub fn with_store_path(mut self, path: PathBuf) -> Self {
        self.store_path = path;
        self
    }
}

/// Snapshot path in the platform data directory (`~/.local/share/bankfind/` on Linux)
pub fn default_store_path() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "bankfind")?;
    Some(project_dirs.data_dir().join(STORE_FILE_NAME))
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}
