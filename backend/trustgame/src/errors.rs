//! Client-wide error types.
//!
//! Caller-input failures (`InvalidAddress`, `Range`, `Precision`,
//! `InvalidInput`) are always raised before any network call is attempted.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Range error: {0}")]
    Range(String),

    #[error("Precision error: {0}")]
    Precision(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The upstream endpoint rejected the payload. `body` is the upstream
    /// response verbatim.
    #[error("Submission rejected with HTTP {status}: {body}")]
    Submission { status: u16, body: String },

    /// A read endpoint (params, lookup, history) answered non-2xx.
    #[error("Upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The upstream answered, but with something we cannot understand.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transaction encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

impl ClientError {
    /// `true` for a submission the upstream failed to process (5xx).
    /// 4xx rejections need the caller to fix the transaction first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Submission { status, .. } if *status >= 500)
    }

    /// `true` when the failure was detected locally, before any I/O.
    pub fn is_caller_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress(_) | Self::Range(_) | Self::Precision(_) | Self::InvalidInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
