//! Retry policy and attempt bookkeeping
//!
//! A logical operation moves through explicit [`AttemptState`]s:
//!
//! ```text
//! Pending --admit--> Admitted --send--> Sent --+--> Success
//!    ^                                         +--> RateLimitedRetry --sleep--+
//!    |                                         +--> TransientRetry  --sleep--+
//!    +-----------------------------------------+--> Fatal                    |
//!    +-----------------------------------------------------------------------+
//! ```
//!
//! The engine in [`crate::client`] drives the transitions; this module holds
//! the policy knobs, the per-operation [`RequestAttempt`] record, and the
//! pure classification of responses and transport failures.

use std::time::Duration;

use ghl_core::config::RetryConfig;
use reqwest::Method;

use crate::transport::TransportError;

/// Knobs for retrying a single logical operation
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total sends allowed for transient failures, first try included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub growth_factor: f64,
    pub max_delay: Duration,
    /// 5xx statuses treated as transient
    pub retryable_statuses: Vec<u16>,
    /// 429 responses tolerated before giving up
    pub max_rate_limit_retries: u32,
    /// Retry writes on a retryable 5xx
    pub retry_writes_on_server_error: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            growth_factor: config.growth_factor,
            max_delay: Duration::from_millis(config.max_delay_ms),
            retryable_statuses: config.retryable_statuses.clone(),
            max_rate_limit_retries: config.max_rate_limit_retries,
            retry_writes_on_server_error: config.retry_writes_on_server_error,
        }
    }

    /// Delay before retry number `attempt` (1-based):
    /// `base_delay * growth_factor^(attempt - 1)`, capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let factor = if self.growth_factor.is_finite() && self.growth_factor > 0.0 {
            self.growth_factor.powi(exponent)
        } else {
            1.0
        };
        let millis = self.base_delay.as_secs_f64() * 1000.0 * factor;
        let cap = self.max_delay.as_secs_f64() * 1000.0;
        if !millis.is_finite() || millis >= cap {
            self.max_delay
        } else {
            Duration::from_secs_f64(millis / 1000.0)
        }
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

/// Methods that change server state. Read-only POST searches opt out via
/// [`RequestAttempt::read_only`].
pub fn is_write(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

// ============================================================================
// States and outcomes
// ============================================================================

/// Where a logical operation currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Waiting for rate limiter admission
    Pending,
    /// Admitted; about to send
    Admitted,
    /// Handed to the transport; awaiting the response
    Sent,
    Success,
    /// Got a 429; sleeping before re-admission
    RateLimitedRetry,
    /// Got a transient failure; sleeping before re-admission
    TransientRetry,
    Fatal,
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Fatal)
    }
}

/// Result of one send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success { status: u16 },
    RateLimited { wait: Duration },
    TransientFailure { reason: String },
    FatalFailure { reason: String },
}

/// Book-keeping for one logical operation across its retries
#[derive(Debug, Clone)]
pub struct RequestAttempt {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Current transient attempt number, starting at 1
    pub attempt: u32,
    /// 429 responses received so far
    pub rate_limited: u32,
    /// Remaining 429 retries
    rate_limit_budget: u32,
    write: bool,
    state: AttemptState,
    outcomes: Vec<AttemptOutcome>,
}

impl RequestAttempt {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        query: Vec<(String, String)>,
        body: Option<serde_json::Value>,
        policy: &RetryPolicy,
    ) -> Self {
        let write = is_write(&method);
        Self {
            method,
            path: path.into(),
            query,
            body,
            attempt: 1,
            rate_limited: 0,
            rate_limit_budget: policy.max_rate_limit_retries,
            write,
            state: AttemptState::Pending,
            outcomes: Vec::new(),
        }
    }

    /// Marks the operation as free of side effects whatever its method.
    pub fn read_only(mut self) -> Self {
        self.write = false;
        self
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn transition(&mut self, next: AttemptState) {
        tracing::trace!(path = %self.path, from = ?self.state, to = ?next, "Attempt state");
        self.state = next;
    }

    pub fn record(&mut self, outcome: AttemptOutcome) {
        self.outcomes.push(outcome);
    }

    /// Outcome of every send so far, in order.
    pub fn outcomes(&self) -> &[AttemptOutcome] {
        &self.outcomes
    }

    /// Number of sends made so far.
    pub fn sends(&self) -> u32 {
        self.outcomes.len() as u32
    }

    /// Spend one 429 retry. Returns `false` when the budget is exhausted,
    /// leaving it at zero.
    pub fn consume_rate_limit_retry(&mut self) -> bool {
        self.rate_limited += 1;
        match self.rate_limit_budget.checked_sub(1) {
            Some(left) => {
                self.rate_limit_budget = left;
                true
            }
            None => false,
        }
    }

    pub fn rate_limit_budget(&self) -> u32 {
        self.rate_limit_budget
    }

    pub fn is_write(&self) -> bool {
        self.write
    }
}

// ============================================================================
// Classification
// ============================================================================

/// What a response status means for the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    RateLimited,
    /// Retry with backoff
    Transient,
    /// Surface as a client error
    ClientError,
    /// Surface as a failed operation without retrying
    ServerError,
}

/// Classifies an HTTP status under `policy`; `write` is true when the
/// operation changes server state.
pub fn classify_status(write: bool, status: u16, policy: &RetryPolicy) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        429 => StatusClass::RateLimited,
        500..=599 if policy.is_retryable_status(status) => {
            if write && !policy.retry_writes_on_server_error {
                StatusClass::ServerError
            } else {
                StatusClass::Transient
            }
        }
        500..=599 => StatusClass::ServerError,
        _ => StatusClass::ClientError,
    }
}

/// What a transport failure means for the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportClass {
    /// Safe to retry
    Transient,
    /// A write may have been applied; do not retry
    UnknownOutcome,
}

/// Classifies a transport failure; `write` as for [`classify_status`].
///
/// A connect failure is always safe to retry. A timeout or dropped
/// connection is transient for reads and an unknown outcome for writes.
pub fn classify_transport(write: bool, error: &TransportError) -> TransportClass {
    if error.is_before_send() || !write {
        TransportClass::Transient
    } else {
        TransportClass::UnknownOutcome
    }
}
