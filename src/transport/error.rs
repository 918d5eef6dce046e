//! Transport error types

use thiserror::Error;

/// Chat API error with classification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    /// HTTP status when the server answered
    pub status: Option<u16>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Network, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, message).with_status(404)
    }

    pub fn missing_body() -> Self {
        Self::new(ApiErrorKind::MissingBody, "No response body")
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Decode, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Unknown, message)
    }

    /// Classify a non-2xx response. The server reports failures as
    /// `{"detail": "..."}`; anything else is kept verbatim.
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = ApiErrorKind::from_status(status);
        let message = match detail_of(body) {
            Some(detail) => format!("API Error: {detail}"),
            None if body.trim().is_empty() => format!("HTTP {status}: empty response body"),
            None => format!("HTTP {status}: {}", body.trim()),
        };
        Self::new(kind, message).with_status(status)
    }

    /// Session (or other resource) does not exist on the server
    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Connection failed, timed out, or the body stream broke
    Network,
    /// 404 - stale session ids are discarded on this
    NotFound,
    /// 401, 403
    Auth,
    /// 429
    RateLimit,
    /// 5xx
    ServerError,
    /// 400, 422
    InvalidRequest,
    /// Streaming endpoint answered without a body
    MissingBody,
    /// Successful status but the payload did not parse
    Decode,
    Unknown,
}

impl ApiErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            401 | 403 => Self::Auth,
            429 => Self::RateLimit,
            400 | 422 => Self::InvalidRequest,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

fn detail_of(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        // FastAPI validation errors carry a list here
        other => Some(other.to_string()),
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::network(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            ApiError::network(format!("Connection failed: {e}"))
        } else if e.is_decode() {
            ApiError::decode(format!("Failed to parse response: {e}"))
        } else if e.is_body() {
            ApiError::network(format!("Failed to read response: {e}"))
        } else {
            ApiError::unknown(format!("Request failed: {e}"))
        }
    }
}
