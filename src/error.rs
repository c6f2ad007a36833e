//! Provider error taxonomy + message classification for user-facing toasts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything a provider call (or request validation) can fail with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("validation failed: {0} is required")]
    Validation(String),

    /// Provider is not configured (e.g. no API key). Never reaches the network.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Network(_) | ProviderError::Unavailable(_) => ErrorKind::NetworkFailure,
            ProviderError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            ProviderError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            ProviderError::Validation(_) => ErrorKind::ValidationFailure,
        }
    }
}

/// The request URL is stripped before the message is kept: error text travels into
/// logs and HTTP error bodies.
impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_decode() {
            ProviderError::MalformedResponse(e.to_string())
        } else if e.status().map(|s| s.as_u16()) == Some(429) {
            ProviderError::QuotaExceeded(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

/// Coarse classification used to pick the toast shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NetworkFailure,
    QuotaExceeded,
    MalformedResponse,
    ValidationFailure,
}

impl ErrorKind {
    pub fn toast(self) -> &'static str {
        match self {
            ErrorKind::NetworkFailure => {
                "Could not reach the AI service. Check your connection and try again."
            }
            ErrorKind::QuotaExceeded => {
                "AI usage limit reached. Please wait a few minutes before trying again."
            }
            ErrorKind::MalformedResponse => {
                "The AI returned an unexpected response. Please try generating again."
            }
            ErrorKind::ValidationFailure => "Please fill in all required fields.",
        }
    }
}

/// Classify a raw error message by substring matching (case-insensitive).
/// Order matters: quota beats parse beats validation; anything else is a network failure.
pub fn classify_message(message: &str) -> ErrorKind {
    let m = message.to_ascii_lowercase();
    const QUOTA: &[&str] = &["quota", "429", "rate limit", "resource_exhausted"];
    const MALFORMED: &[&str] = &["json", "parse", "unexpected", "malformed"];
    const VALIDATION: &[&str] = &["required", "missing", "validation"];

    if QUOTA.iter().any(|p| m.contains(p)) {
        ErrorKind::QuotaExceeded
    } else if MALFORMED.iter().any(|p| m.contains(p)) {
        ErrorKind::MalformedResponse
    } else if VALIDATION.iter().any(|p| m.contains(p)) {
        ErrorKind::ValidationFailure
    } else {
        ErrorKind::NetworkFailure
    }
}
