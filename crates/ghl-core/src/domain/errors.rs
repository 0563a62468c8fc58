//! Domain error types
//!
//! Validation failures for the newtypes and lookups against the local
//! profile store.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// API token is empty or contains whitespace
    #[error("Invalid API token: {0}")]
    InvalidToken(String),

    /// Location (sub-account) id is empty or malformed
    #[error("Invalid location ID: {0}")]
    InvalidLocationId(String),

    /// Profile name is empty or malformed
    #[error("Invalid profile name: {0}")]
    InvalidProfileName(String),

    /// The named profile does not exist
    #[error("Profile '{0}' does not exist")]
    ProfileNotFound(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
