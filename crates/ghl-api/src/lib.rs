//! GHL API - GoHighLevel v2 REST client
//!
//! Provides the request layer of the `ghl` CLI:
//! - Two-window client-side rate limiting (burst and daily quotas)
//! - Retry with exponential backoff, driven by an explicit attempt state
//! - Cursor pagination with record accumulation
//! - Thin resource clients (contacts, opportunities, calendars, ...)
//!
//! ## Modules
//!
//! - [`rate_limit`] - Burst/daily admission control and server limit headers
//! - [`retry`] - Retry policy, attempt states and response classification
//! - [`transport`] - The HTTP port and its `reqwest` adapter
//! - [`client`] - The request engine ([`client::GhlClient`])
//! - [`pagination`] - Cursor extraction and record collection
//! - [`models`] - Typed records returned by the resource clients
//! - [`resources`] - Per-resource API facades

pub mod client;
pub mod models;
pub mod pagination;
pub mod rate_limit;
pub mod resources;
pub mod retry;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

use thiserror::Error;

pub use client::{ApiRequest, ApiResponse, ClientContext, GhlClient, LocationParam};

/// Why a logical operation gave up after retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The last response had this status and body
    Status { status: u16, body: String },
    /// The last send failed at the transport level
    Transport(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { status, body } if body.is_empty() => write!(f, "HTTP {status}"),
            Self::Status { status, body } => write!(f, "HTTP {status}: {body}"),
            Self::Transport(msg) => write!(f, "{msg}"),
        }
    }
}

/// Errors surfaced by the request engine and the resource clients
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid configuration; nothing was sent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The server kept answering 429 beyond the retry budget
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// Transient failures exhausted, or a server error that is not retried
    #[error("Request failed after {attempts} attempt(s): {cause}")]
    OperationFailed { attempts: u32, cause: FailureCause },

    /// The server rejected the request (4xx other than 429)
    #[error("HTTP {status}: {message}")]
    ClientError {
        status: u16,
        message: String,
        body: String,
    },

    /// A write was sent but its result is unknown; it may or may not have
    /// been applied
    #[error("Outcome unknown for {method} {path}: the request was sent but no response was received")]
    UnknownOutcome { method: String, path: String },

    /// Interrupted before anything was sent
    #[error("Cancelled")]
    Cancelled,

    /// The response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// HTTP status, when the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ClientError { status, .. } => Some(*status),
            Self::OperationFailed {
                cause: FailureCause::Status { status, .. },
                ..
            } => Some(*status),
            _ => None,
        }
    }

    /// True when the operation was interrupted (Ctrl-C).
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled | Self::UnknownOutcome { .. })
    }
}

impl From<ghl_core::credentials::CredentialError> for ApiError {
    fn from(err: ghl_core::credentials::CredentialError) -> Self {
        Self::Configuration(err.to_string())
    }
}
