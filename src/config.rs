//! Client configuration parsed from environment variables.

use std::time::Duration;

use crate::error::ApiError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub poll_interval: Duration,
    pub timeouts: HttpTimeouts,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            token: None,
            user_id: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timeouts: HttpTimeouts::default(),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `RENTCONNECT_BASE_URL`: backend origin (default `http://127.0.0.1:8000`)
    /// - `RENTCONNECT_TOKEN`: bearer credential issued by the auth service
    /// - `RENTCONNECT_USER_ID`: id of the signed-in user
    /// - `RENTCONNECT_POLL_INTERVAL_MS`: default 3000
    /// - `RENTCONNECT_REQUEST_TIMEOUT_SECS`: default 30
    /// - `RENTCONNECT_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the base URL is not an http(s) origin.
    pub fn from_env() -> Result<Self, ApiError> {
        let base_url = normalize_base_url(
            &std::env::var("RENTCONNECT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned()),
        )?;
        let token = non_empty_env("RENTCONNECT_TOKEN");
        let user_id = non_empty_env("RENTCONNECT_USER_ID");
        let poll_interval = Duration::from_millis(
            env_parse_u64("RENTCONNECT_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS).max(1),
        );
        let timeouts = HttpTimeouts {
            request_secs: env_parse_u64("RENTCONNECT_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("RENTCONNECT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { base_url, token, user_id, poll_interval, timeouts })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

pub(crate) fn normalize_base_url(raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = reqwest::Url::parse(trimmed)
        .map_err(|e| ApiError::Config(format!("unsupported base URL '{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::Config(format!("unsupported base URL '{raw}' (expected http:// or https://)")));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ApiError::Config(format!("unsupported base URL '{raw}' (missing host)")));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
