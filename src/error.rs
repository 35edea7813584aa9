//! Error taxonomy for gateway and store operations.
//!
//! DESIGN
//! ======
//! Every gateway call resolves to an `ApiError`. Stores roll back their own
//! optimistic mutations and hand the same error to the caller, so the shell
//! can decide between a retry affordance, a sign-in redirect, or a plain
//! message from `retryable()` and the variant alone.

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for user-facing error rendering.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// API ERROR
// =============================================================================

/// Errors produced by the API gateway and surfaced unchanged by the stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Transport failure or timeout before a response was received.
    #[error("network error: {0}")]
    Network(String),

    /// The credential is missing, expired, or not allowed to see the resource.
    #[error("not authenticated (status {status})")]
    Auth { status: u16 },

    /// The request was rejected because of its input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced resource does not exist or is not visible to the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// The resource already exists. For conversations the backend may name
    /// the existing thread so the caller can route to it.
    #[error("conflict: {message}")]
    Conflict { message: String, existing_conversation_id: Option<String> },

    /// The backend answered with a server-side failure.
    #[error("server error: status {status}")]
    Server { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// A configuration value was rejected.
    #[error("config error: {0}")]
    Config(String),
}

impl ApiError {
    /// Map a non-success HTTP status and its body to a typed error.
    ///
    /// FastAPI-style bodies carry the human message under `detail`; a
    /// conflicting conversation create may also carry `conversation_id`.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
        let detail = parsed
            .as_ref()
            .and_then(|v| v.get("detail"))
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| body.trim().to_owned(), str::to_owned);

        match status {
            401 | 403 => Self::Auth { status },
            404 => Self::NotFound(detail),
            409 => Self::Conflict {
                message: detail,
                existing_conversation_id: parsed
                    .as_ref()
                    .and_then(|v| v.get("conversation_id"))
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_owned),
            },
            400 | 422 => Self::Validation(detail),
            _ => Self::Server { status, body: body.to_owned() },
        }
    }

    /// True when the shell should send the user back through sign-in.
    #[must_use]
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

impl ErrorCode for ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Network(_) => "E_NETWORK",
            Self::Auth { .. } => "E_AUTH",
            Self::Validation(_) => "E_VALIDATION",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Conflict { .. } => "E_CONFLICT",
            Self::Server { .. } => "E_SERVER",
            Self::Decode(_) => "E_DECODE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::Config(_) => "E_CONFIG",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { status: 429 | 500..=599, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

// =============================================================================
// SEND FAILURE
// =============================================================================

/// A failed send. Carries the original text back so the composer can restore it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("message not sent: {error}")]
pub struct SendFailure {
    /// The text the user typed, untrimmed.
    pub content: String,
    #[source]
    pub error: ApiError,
}

impl ErrorCode for SendFailure {
    fn error_code(&self) -> &'static str {
        self.error.error_code()
    }

    fn retryable(&self) -> bool {
        self.error.retryable()
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
