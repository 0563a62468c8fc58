//! GoHighLevel API request engine
//!
//! [`GhlClient`] turns an [`ApiRequest`] into one or more HTTP sends:
//! it injects authentication and the location id, gates every send on the
//! [`RateLimiter`], retries 429s and transient failures according to the
//! [`RetryPolicy`], and follows pagination cursors.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ghl_api::client::{ApiRequest, ClientContext, GhlClient};
//! use ghl_core::domain::ApiToken;
//!
//! # async fn example() -> Result<(), ghl_api::ApiError> {
//! let ctx = ClientContext::new(ApiToken::new("pit-123").unwrap());
//! let client = GhlClient::new(ctx)?;
//! let response = client
//!     .execute(ApiRequest::get("/contacts/").query("limit", 20).paginate("contacts"))
//!     .await?;
//! println!("{} contacts", response.records("contacts").len());
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ghl_core::config::{Config, DEFAULT_API_VERSION, DEFAULT_BASE_URL};
use ghl_core::credentials::Credentials;
use ghl_core::domain::{ApiToken, LocationId};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::pagination::{collect_records, extract_cursor, Cursor};
use crate::rate_limit::{parse_retry_after, Admission, RateLimiter, RateUsage, ServerRateLimit};
use crate::retry::{
    classify_status, classify_transport, AttemptOutcome, AttemptState, RequestAttempt,
    RetryPolicy, StatusClass, TransportClass,
};
use crate::transport::{OutboundRequest, RawResponse, ReqwestTransport, Transport};
use crate::{ApiError, FailureCause};

/// Query key used by most endpoints for the location id
pub const LOCATION_ID: &str = "locationId";
/// Query key used by `/opportunities/search`
pub const LOCATION_ID_SNAKE: &str = "location_id";

/// Added on top of a server-suggested 429 wait
const RATE_LIMIT_BUFFER: Duration = Duration::from_millis(100);

// ============================================================================
// ClientContext
// ============================================================================

/// Everything the engine needs, resolved up front
///
/// The engine never reads environment variables or files; the CLI resolves
/// credentials and configuration and passes them in here.
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub token: ApiToken,
    pub location_id: Option<LocationId>,
    pub base_url: String,
    pub api_version: String,
    pub timeout: Duration,
    pub max_pages: u32,
    pub retry: RetryPolicy,
    pub low_remaining_threshold: u64,
    pub low_remaining_pause: Duration,
}

impl ClientContext {
    /// Context with default settings and no location
    pub fn new(token: ApiToken) -> Self {
        Self {
            token,
            location_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(30),
            max_pages: 50,
            retry: RetryPolicy::default(),
            low_remaining_threshold: 5,
            low_remaining_pause: Duration::from_millis(500),
        }
    }

    /// Context from the config file and resolved credentials
    pub fn from_config(config: &Config, credentials: &Credentials) -> Self {
        Self {
            token: credentials.token.clone(),
            location_id: credentials.location_id.clone(),
            base_url: config.api.base_url.clone(),
            api_version: config.api.version.clone(),
            timeout: Duration::from_secs(config.api.timeout_secs.max(1)),
            max_pages: config.api.max_pages.max(1),
            retry: RetryPolicy::from_config(&config.retry),
            low_remaining_threshold: config.rate_limiting.low_remaining_threshold.into(),
            low_remaining_pause: Duration::from_millis(config.rate_limiting.low_remaining_pause_ms),
        }
    }

    pub fn with_location(mut self, location: Option<LocationId>) -> Self {
        self.location_id = location;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_max_pages(mut self, pages: u32) -> Self {
        self.max_pages = pages.max(1);
        self
    }
}

// ============================================================================
// ApiRequest
// ============================================================================

/// How the location id is attached to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationParam {
    /// Not attached (nested routes, or the id is in the path or body)
    None,
    /// Added as this query parameter unless the caller already set it
    Query(&'static str),
}

/// One logical API operation
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, Option<String>)>,
    body: Option<Value>,
    paginate: bool,
    collection: Option<String>,
    location: LocationParam,
    read_only: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            paginate: false,
            collection: None,
            location: LocationParam::Query(LOCATION_ID),
            read_only: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Adds a query parameter.
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), Some(value.to_string())));
        self
    }

    /// Adds a query parameter; `None` values are dropped when sending.
    pub fn query_opt<T: ToString>(mut self, key: &str, value: Option<T>) -> Self {
        self.query
            .push((key.to_string(), value.map(|v| v.to_string())));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Follow cursors and accumulate the records of `collection`.
    pub fn paginate(mut self, collection: &str) -> Self {
        self.paginate = true;
        self.collection = Some(collection.to_string());
        self
    }

    pub fn location(mut self, location: LocationParam) -> Self {
        self.location = location;
        self
    }

    pub fn without_location(self) -> Self {
        self.location(LocationParam::None)
    }

    /// Marks a POST that only reads, such as a search. Timeouts and 5xx
    /// responses are then retried like a GET.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn is_paginated(&self) -> bool {
        self.paginate
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

// ============================================================================
// ApiResponse
// ============================================================================

/// Parsed response body
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Object(Map<String, Value>),
    /// Accumulated records of a paginated operation, or a top-level array
    Records(Vec<Value>),
}

/// Result of a logical operation
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    status: u16,
    body: ResponseBody,
    cursor: Option<Cursor>,
}

impl ApiResponse {
    /// Parses a 2xx response.
    ///
    /// A 204 or an empty body becomes an empty object; a body that is not
    /// JSON becomes `{"text": <body>}`.
    pub fn from_raw(raw: &RawResponse) -> Self {
        let body = if raw.status == 204 || raw.body.trim().is_empty() {
            ResponseBody::Object(Map::new())
        } else {
            match serde_json::from_str::<Value>(&raw.body) {
                Ok(Value::Object(map)) => ResponseBody::Object(map),
                Ok(Value::Array(items)) => ResponseBody::Records(items),
                Ok(other) => {
                    let mut map = Map::new();
                    map.insert("value".to_string(), other);
                    ResponseBody::Object(map)
                }
                Err(_) => {
                    let mut map = Map::new();
                    map.insert("text".to_string(), Value::String(raw.body.clone()));
                    ResponseBody::Object(map)
                }
            }
        };
        let cursor = match &body {
            ResponseBody::Object(map) => extract_cursor(map),
            ResponseBody::Records(_) => None,
        };
        Self {
            status: raw.status,
            body,
            cursor,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Cursor of the next page not yet fetched
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match &self.body {
            ResponseBody::Object(map) => Some(map),
            ResponseBody::Records(_) => None,
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Records under `key`, or the accumulated records of a paginated call.
    pub fn records(&self, key: &str) -> Vec<Value> {
        match &self.body {
            ResponseBody::Records(items) => items.clone(),
            ResponseBody::Object(map) => collect_records(map, Some(key)),
        }
    }

    fn page_records(&self, collection: Option<&str>) -> Vec<Value> {
        match &self.body {
            ResponseBody::Records(items) => items.clone(),
            ResponseBody::Object(map) => collect_records(map, collection),
        }
    }

    pub fn into_value(self) -> Value {
        match self.body {
            ResponseBody::Object(map) => Value::Object(map),
            ResponseBody::Records(items) => Value::Array(items),
        }
    }

    /// The object under `key`, or the whole body when the envelope is absent.
    pub fn unwrap_envelope(&self, key: &str) -> Value {
        match self.field(key) {
            Some(value) if !value.is_null() => value.clone(),
            _ => self.clone().into_value(),
        }
    }

    /// Decodes the object under `key` (or the whole body) into `T`.
    pub fn decode<T: DeserializeOwned>(&self, key: &str) -> Result<T, ApiError> {
        serde_json::from_value(self.unwrap_envelope(key))
            .map_err(|e| ApiError::InvalidResponse(format!("'{key}': {e}")))
    }

    /// Decodes the records under `key` into `Vec<T>`.
    pub fn decode_records<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, ApiError> {
        self.records(key)
            .into_iter()
            .map(|record| {
                serde_json::from_value(record)
                    .map_err(|e| ApiError::InvalidResponse(format!("'{key}' record: {e}")))
            })
            .collect()
    }
}

/// Message of an error body: `message`, else `error`, else the raw text.
pub fn error_message(status: u16, body: &str) -> String {
    let text = |v: &Value| match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    };
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(message) = map.get("message").and_then(text) {
            return message;
        }
        if let Some(error) = map.get("error").and_then(text) {
            return error;
        }
    }
    if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        body.trim().to_string()
    }
}

// ============================================================================
// GhlClient
// ============================================================================

/// Rate-limited, retrying GoHighLevel API client
pub struct GhlClient {
    ctx: ClientContext,
    base_url: Url,
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    cancel: CancellationToken,
    server_limit: Mutex<Option<ServerRateLimit>>,
}

impl std::fmt::Debug for GhlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GhlClient")
            .field("base_url", &self.base_url.as_str())
            .field("location_id", &self.ctx.location_id)
            .finish()
    }
}

impl Drop for GhlClient {
    fn drop(&mut self) {
        if let Some(summary) = self.rate_summary() {
            info!("{summary}");
        }
    }
}

impl GhlClient {
    /// Creates a client that sends over HTTPS with `reqwest`.
    pub fn new(ctx: ClientContext) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(ctx.timeout)
            .map_err(|e| ApiError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Self::with_transport(ctx, Arc::new(transport))
    }

    /// Creates a client over a custom transport.
    pub fn with_transport(ctx: ClientContext, transport: Arc<dyn Transport>) -> Result<Self, ApiError> {
        let base_url = Url::parse(&ctx.base_url)
            .map_err(|e| ApiError::Configuration(format!("invalid base URL '{}': {e}", ctx.base_url)))?;
        Ok(Self {
            ctx,
            base_url,
            transport,
            limiter: Arc::new(RateLimiter::default()),
            cancel: CancellationToken::new(),
            server_limit: Mutex::new(None),
        })
    }

    /// Shares a rate limiter (e.g. one built from config) with this client.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Token whose cancellation interrupts in-flight operations.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn context(&self) -> &ClientContext {
        &self.ctx
    }

    pub fn location_id(&self) -> Option<&LocationId> {
        self.ctx.location_id.as_ref()
    }

    /// The location id, or a configuration error when none is set.
    pub fn require_location(&self) -> Result<&LocationId, ApiError> {
        self.ctx.location_id.as_ref().ok_or_else(|| {
            ApiError::Configuration(
                "No location ID configured. Set GHL_LOCATION_ID or run `ghl config set-location <id>`"
                    .to_string(),
            )
        })
    }

    /// Latest quota reported by the server, if any response carried one.
    pub fn server_rate_limit(&self) -> Option<ServerRateLimit> {
        self.server_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn rate_usage(&self) -> RateUsage {
        self.limiter.usage()
    }

    /// One-line account of local window usage and the last server quota.
    /// `None` before the first request.
    pub fn rate_summary(&self) -> Option<String> {
        let usage = self.rate_usage();
        if usage.daily == 0 {
            return None;
        }
        let mut summary = format!(
            "Rate limit: burst {}/{}, daily {}/{}",
            usage.burst, usage.burst_limit, usage.daily, usage.daily_limit
        );
        if let Some(ServerRateLimit {
            remaining: Some(remaining),
            limit,
            ..
        }) = self.server_rate_limit()
        {
            match limit {
                Some(limit) => summary.push_str(&format!("; server {remaining}/{limit} remaining")),
                None => summary.push_str(&format!("; server {remaining} remaining")),
            }
        }
        Some(summary)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    // ------------------------------------------------------------------
    // Convenience wrappers
    // ------------------------------------------------------------------

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::post(path).json(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::put(path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::delete(path)).await
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Runs a logical operation to completion.
    ///
    /// For paginated requests every page goes through the full admission
    /// and retry cycle; records are accumulated in page order until no
    /// cursor remains or `max_pages` pages were fetched.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let query = self.build_query(&request);
        let first = self
            .send_with_retry(&request, &query)
            .await?;
        if !request.paginate {
            return Ok(first);
        }

        let collection = request.collection.as_deref();
        let mut records = first.page_records(collection);
        let mut cursor = first.cursor.clone();
        let mut pages: u32 = 1;

        while let Some(next) = cursor.take() {
            if pages >= self.ctx.max_pages {
                warn!(
                    path = %request.path,
                    pages,
                    "Stopped paginating at max_pages; results are truncated"
                );
                cursor = Some(next);
                break;
            }
            let page_query = next.apply(&query);
            let page = self
                .send_with_retry(&request, &page_query)
                .await?;
            pages += 1;
            let page_records = page.page_records(collection);
            debug!(path = %request.path, page = pages, records = page_records.len(), "Fetched page");
            records.extend(page_records);
            cursor = page.cursor;
        }

        Ok(ApiResponse {
            status: first.status,
            body: ResponseBody::Records(records),
            cursor,
        })
    }

    /// Drops `None` params and injects the location id.
    fn build_query(&self, request: &ApiRequest) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = request
            .query
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
            .collect();
        if let (LocationParam::Query(key), Some(location)) = (request.location, &self.ctx.location_id) {
            if !query.iter().any(|(k, _)| k == key) {
                query.push((key.to_string(), location.to_string()));
            }
        }
        query
    }

    fn build_url(&self, path: &str, query: &[(String, String)]) -> Result<Url, ApiError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}{path}"))
            .map_err(|e| ApiError::Configuration(format!("invalid request path '{path}': {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }
        Ok(url)
    }

    fn outbound(&self, method: &Method, url: Url, body: Option<&Value>) -> OutboundRequest {
        OutboundRequest {
            method: method.clone(),
            url,
            headers: vec![
                (
                    "Authorization".to_string(),
                    format!("Bearer {}", self.ctx.token.expose()),
                ),
                ("Version".to_string(), self.ctx.api_version.clone()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
            body: body.cloned(),
        }
    }

    /// Sleeps unless cancelled first.
    async fn sleep(&self, duration: Duration) -> Result<(), ApiError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ApiError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Polls the limiter until admitted.
    async fn wait_for_admission(&self, path: &str) -> Result<(), ApiError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }
            match self.limiter.admit() {
                Admission::Proceed => return Ok(()),
                Admission::WaitFor(wait) => {
                    debug!(path, wait_ms = wait.as_millis() as u64, "Waiting for rate limit window");
                    self.sleep(wait).await?;
                }
            }
        }
    }

    fn observe_server_limit(&self, raw: &RawResponse) {
        if let Some(limit) = ServerRateLimit::from_headers(&raw.headers) {
            *self
                .server_limit
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(limit);
        }
    }

    /// Wait after a 429: `Retry-After`, else the server's window, else backoff.
    fn rate_limit_wait(&self, raw: &RawResponse, rate_limited: u32) -> Duration {
        if let Some(wait) = raw.header("retry-after").and_then(parse_retry_after) {
            return wait;
        }
        if let Some(wait) = ServerRateLimit::from_headers(&raw.headers)
            .or_else(|| self.server_rate_limit())
            .and_then(|limit| limit.suggested_wait())
        {
            return wait + RATE_LIMIT_BUFFER;
        }
        self.ctx.retry.backoff_delay(rate_limited)
    }

    /// Slows down when the response says the server window is almost used up.
    async fn pause_if_low(&self, raw: &RawResponse) {
        let remaining = ServerRateLimit::from_headers(&raw.headers).and_then(|limit| limit.remaining);
        if let Some(remaining) = remaining {
            if remaining < self.ctx.low_remaining_threshold {
                debug!(remaining, "Server quota nearly exhausted, pausing");
                // The response is already in hand; cancellation only cuts the pause short.
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.ctx.low_remaining_pause) => {}
                }
            }
        }
    }

    /// Drives one request through admission, send and retry.
    async fn send_with_retry(
        &self,
        request: &ApiRequest,
        query: &[(String, String)],
    ) -> Result<ApiResponse, ApiError> {
        let (method, path, body) = (&request.method, request.path.as_str(), request.body.as_ref());
        let policy = &self.ctx.retry;
        let url = self.build_url(path, query)?;
        let mut attempt = RequestAttempt::new(method.clone(), path, query.to_vec(), body.cloned(), policy);
        if request.read_only {
            attempt = attempt.read_only();
        }
        let mut retry_wait = Duration::ZERO;

        loop {
            match attempt.state() {
                AttemptState::Pending => {
                    self.wait_for_admission(path).await?;
                    attempt.transition(AttemptState::Admitted);
                }

                AttemptState::RateLimitedRetry | AttemptState::TransientRetry => {
                    self.sleep(retry_wait).await?;
                    attempt.transition(AttemptState::Pending);
                }

                AttemptState::Admitted => {
                    let outbound = self.outbound(method, url.clone(), body);
                    attempt.transition(AttemptState::Sent);
                    debug!(%method, path, attempt = attempt.attempt, "Sending request");

                    let result = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            attempt.transition(AttemptState::Fatal);
                            warn!(%method, path, "Interrupted while waiting for a response");
                            return Err(ApiError::UnknownOutcome {
                                method: method.to_string(),
                                path: path.to_string(),
                            });
                        }
                        result = self.transport.send(outbound) => result,
                    };

                    let raw = match result {
                        Ok(raw) => raw,
                        Err(error) => match classify_transport(attempt.is_write(), &error) {
                            TransportClass::UnknownOutcome => {
                                attempt.record(AttemptOutcome::FatalFailure {
                                    reason: error.to_string(),
                                });
                                attempt.transition(AttemptState::Fatal);
                                warn!(%method, path, %error, "Write interrupted after send");
                                return Err(ApiError::UnknownOutcome {
                                    method: method.to_string(),
                                    path: path.to_string(),
                                });
                            }
                            TransportClass::Transient => {
                                attempt.record(AttemptOutcome::TransientFailure {
                                    reason: error.to_string(),
                                });
                                if attempt.attempt >= policy.max_attempts {
                                    attempt.transition(AttemptState::Fatal);
                                    return Err(ApiError::OperationFailed {
                                        attempts: attempt.attempt,
                                        cause: FailureCause::Transport(error.to_string()),
                                    });
                                }
                                retry_wait = policy.backoff_delay(attempt.attempt);
                                info!(
                                    path,
                                    attempt = attempt.attempt,
                                    delay_ms = retry_wait.as_millis() as u64,
                                    %error,
                                    "Transport failure, retrying"
                                );
                                attempt.attempt += 1;
                                attempt.transition(AttemptState::TransientRetry);
                                continue;
                            }
                        },
                    };

                    self.observe_server_limit(&raw);

                    match classify_status(attempt.is_write(), raw.status, policy) {
                        StatusClass::Success => {
                            attempt.record(AttemptOutcome::Success { status: raw.status });
                            attempt.transition(AttemptState::Success);
                            if attempt.sends() > 1 {
                                info!(path, sends = attempt.sends(), "Request succeeded after retry");
                            }
                            self.pause_if_low(&raw).await;
                            return Ok(ApiResponse::from_raw(&raw));
                        }

                        StatusClass::RateLimited => {
                            let wait = self.rate_limit_wait(&raw, attempt.rate_limited + 1);
                            attempt.record(AttemptOutcome::RateLimited { wait });
                            if !attempt.consume_rate_limit_retry() {
                                attempt.transition(AttemptState::Fatal);
                                warn!(path, sends = attempt.sends(), "429 retry limit exhausted");
                                return Err(ApiError::RateLimitExceeded {
                                    attempts: attempt.sends(),
                                });
                            }
                            info!(
                                path,
                                rate_limited = attempt.rate_limited,
                                retry_after_ms = wait.as_millis() as u64,
                                "Received 429, backing off"
                            );
                            retry_wait = wait;
                            attempt.transition(AttemptState::RateLimitedRetry);
                        }

                        StatusClass::Transient => {
                            attempt.record(AttemptOutcome::TransientFailure {
                                reason: format!("HTTP {}", raw.status),
                            });
                            if attempt.attempt >= policy.max_attempts {
                                attempt.transition(AttemptState::Fatal);
                                return Err(ApiError::OperationFailed {
                                    attempts: attempt.attempt,
                                    cause: FailureCause::Status {
                                        status: raw.status,
                                        body: raw.body,
                                    },
                                });
                            }
                            retry_wait = policy.backoff_delay(attempt.attempt);
                            info!(
                                path,
                                status = raw.status,
                                attempt = attempt.attempt,
                                delay_ms = retry_wait.as_millis() as u64,
                                "Server error, retrying"
                            );
                            attempt.attempt += 1;
                            attempt.transition(AttemptState::TransientRetry);
                        }

                        StatusClass::ServerError => {
                            attempt.record(AttemptOutcome::FatalFailure {
                                reason: format!("HTTP {}", raw.status),
                            });
                            attempt.transition(AttemptState::Fatal);
                            return Err(ApiError::OperationFailed {
                                attempts: attempt.attempt,
                                cause: FailureCause::Status {
                                    status: raw.status,
                                    body: raw.body,
                                },
                            });
                        }

                        StatusClass::ClientError => {
                            attempt.record(AttemptOutcome::FatalFailure {
                                reason: format!("HTTP {}", raw.status),
                            });
                            attempt.transition(AttemptState::Fatal);
                            debug!(path, status = raw.status, "Client error");
                            return Err(ApiError::ClientError {
                                status: raw.status,
                                message: error_message(raw.status, &raw.body),
                                body: raw.body,
                            });
                        }
                    }
                }

                state @ (AttemptState::Sent | AttemptState::Success | AttemptState::Fatal) => {
                    return Err(ApiError::InvalidResponse(format!(
                        "request to {path} left in state {state:?}"
                    )));
                }
            }
        }
    }
}

// ============================================================================
// Unit tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::rate_limit::RateWindow;
    use crate::testing::{client, context as ctx, ok, status, FakeTransport, Scripted};
    use crate::transport::TransportError;

    // ====================================================================
    // Request building
    // ====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_headers_and_location_injection() {
        let transport = FakeTransport::new(vec![ok(json!({"contacts": []}))]);
        let client = client(transport.clone());

        client
            .execute(ApiRequest::get("/contacts/").query("limit", 20).query_opt::<String>("query", None))
            .await
            .unwrap();

        let sent = transport.sent();
        let request = &sent[0];
        assert_eq!(
            request.url.as_str(),
            "https://api.example.test/contacts/?limit=20&locationId=loc1"
        );
        let header = |name: &str| {
            request
                .headers
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(header("Authorization").as_deref(), Some("Bearer pit-test"));
        assert_eq!(header("Version").as_deref(), Some("2021-07-28"));
        assert_eq!(header("Accept").as_deref(), Some("application/json"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_location_param_variants() {
        let transport = FakeTransport::new(vec![ok(json!({})), ok(json!({})), ok(json!({}))]);
        let client = client(transport.clone());

        client
            .execute(ApiRequest::get("/opportunities/search").location(LocationParam::Query(LOCATION_ID_SNAKE)))
            .await
            .unwrap();
        client
            .execute(ApiRequest::get("/contacts/c1/notes").without_location())
            .await
            .unwrap();
        client
            .execute(ApiRequest::get("/users/").query("locationId", "other"))
            .await
            .unwrap();

        let urls: Vec<String> = transport.sent().iter().map(|r| r.url.to_string()).collect();
        assert!(urls[0].ends_with("/opportunities/search?location_id=loc1"));
        assert!(urls[1].ends_with("/contacts/c1/notes"));
        assert!(urls[2].ends_with("/users/?locationId=other"));
    }

    // ====================================================================
    // Response parsing
    // ====================================================================

    #[test]
    fn test_from_raw_handles_empty_and_non_json_bodies() {
        let empty = ApiResponse::from_raw(&RawResponse::new(204, ""));
        assert_eq!(empty.into_value(), json!({}));

        let text = ApiResponse::from_raw(&RawResponse::new(200, "OK"));
        assert_eq!(text.into_value(), json!({"text": "OK"}));

        let array = ApiResponse::from_raw(&RawResponse::new(200, "[1,2]"));
        assert_eq!(array.records("anything").len(), 2);
    }

    #[test]
    fn test_unwrap_envelope_and_decode() {
        #[derive(serde::Deserialize)]
        struct Named {
            name: String,
        }

        let wrapped = ApiResponse::from_raw(&RawResponse::new(200, r#"{"contact":{"name":"Ada"}}"#));
        let bare = ApiResponse::from_raw(&RawResponse::new(200, r#"{"name":"Bob"}"#));

        assert_eq!(wrapped.decode::<Named>("contact").unwrap().name, "Ada");
        assert_eq!(bare.decode::<Named>("contact").unwrap().name, "Bob");
        assert!(matches!(
            bare.decode::<Vec<Named>>("contact"),
            Err(ApiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(400, r#"{"message":"Bad email"}"#), "Bad email");
        assert_eq!(
            error_message(422, r#"{"message":["a is required","b is invalid"]}"#),
            "a is required; b is invalid"
        );
        assert_eq!(error_message(401, r#"{"error":"Unauthorized"}"#), "Unauthorized");
        assert_eq!(error_message(404, "Not Found"), "Not Found");
        assert_eq!(error_message(403, ""), "HTTP 403");
    }

    // ====================================================================
    // Retry state machine
    // ====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_then_success() {
        let transport = FakeTransport::new(vec![
            status(503),
            status(502),
            status(500),
            ok(json!({"contact": {"id": "c1"}})),
        ]);
        let client = client(transport.clone());
        let start = Instant::now();

        let response = client.get("/contacts/c1").await.unwrap();

        assert_eq!(transport.sends(), 4);
        assert_eq!(response.status(), 200);
        assert_eq!(response.field("contact"), Some(&json!({"id": "c1"})));
        // 500ms + 1000ms + 2000ms of backoff
        assert_eq!(start.elapsed(), Duration::from_millis(3500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_exhausted() {
        let transport = FakeTransport::new(vec![status(503), status(503), status(503), status(503)]);
        let client = client(transport.clone());

        let err = client.get("/contacts/").await.unwrap_err();

        assert_eq!(transport.sends(), 4);
        match err {
            ApiError::OperationFailed {
                attempts,
                cause: FailureCause::Status { status, .. },
            } => {
                assert_eq!(attempts, 4);
                assert_eq!(status, 503);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_fatal_after_one_send() {
        let transport = FakeTransport::new(vec![Scripted::Respond(RawResponse::new(
            422,
            r#"{"message":"email is invalid"}"#,
        ))]);
        let client = client(transport.clone());

        let err = client.post("/contacts/", json!({"email": "x"})).await.unwrap_err();

        assert_eq!(transport.sends(), 1);
        assert_eq!(client.rate_usage().burst, 1);
        match err {
            ApiError::ClientError { status, message, body } => {
                assert_eq!(status, 422);
                assert_eq!(message, "email is invalid");
                assert_eq!(body, r#"{"message":"email is invalid"}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_server_error_fails_immediately() {
        let transport = FakeTransport::new(vec![status(501)]);
        let client = client(transport.clone());

        let err = client.get("/contacts/").await.unwrap_err();
        assert_eq!(transport.sends(), 1);
        assert!(matches!(err, ApiError::OperationFailed { attempts: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_429_is_one_readmission() {
        let transport = FakeTransport::new(vec![
            Scripted::Respond(RawResponse::new(429, "").with_header("Retry-After", "2")),
            Scripted::Respond(RawResponse::new(429, "").with_header("Retry-After", "2")),
            ok(json!({"users": []})),
        ]);
        let client = client(transport.clone());
        let start = Instant::now();

        client.get("/users/").await.unwrap();

        assert_eq!(transport.sends(), 3);
        assert_eq!(client.rate_usage().burst, 3);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_budget_exhaustion() {
        let script = (0..6)
            .map(|_| Scripted::Respond(RawResponse::new(429, "").with_header("Retry-After", "1")))
            .collect();
        let transport = FakeTransport::new(script);
        let client = client(transport.clone());

        let err = client.get("/users/").await.unwrap_err();

        assert_eq!(transport.sends(), 6);
        assert!(matches!(err, ApiError::RateLimitExceeded { attempts: 6 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_uses_server_interval_without_retry_after() {
        let transport = FakeTransport::new(vec![
            Scripted::Respond(
                RawResponse::new(429, "")
                    .with_header("X-RateLimit-Remaining", "0")
                    .with_header("X-RateLimit-Interval-Milliseconds", "3000"),
            ),
            ok(json!({})),
        ]);
        let client = client(transport.clone());
        let start = Instant::now();

        client.get("/users/").await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_on_write_is_retried() {
        let transport = FakeTransport::new(vec![
            Scripted::Respond(RawResponse::new(429, "").with_header("Retry-After", "1")),
            ok(json!({"contact": {"id": "new"}})),
        ]);
        let client = client(transport.clone());

        client.post("/contacts/", json!({"email": "a@b.c"})).await.unwrap();
        assert_eq!(transport.sends(), 2);
    }

    // ====================================================================
    // Write safety
    // ====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_write_not_retried_on_server_error_by_default() {
        let transport = FakeTransport::new(vec![status(503)]);
        let client = client(transport.clone());

        let err = client.post("/contacts/", json!({})).await.unwrap_err();
        assert_eq!(transport.sends(), 1);
        assert!(matches!(err, ApiError::OperationFailed { attempts: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_retried_on_server_error_when_enabled() {
        let transport = FakeTransport::new(vec![status(503), ok(json!({}))]);
        let policy = RetryPolicy {
            retry_writes_on_server_error: true,
            ..RetryPolicy::default()
        };
        let client = GhlClient::with_transport(ctx().with_retry_policy(policy), transport.clone()).unwrap();

        client.put("/contacts/c1", json!({})).await.unwrap();
        assert_eq!(transport.sends(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_timeout_is_unknown_outcome() {
        let transport = FakeTransport::new(vec![Scripted::Fail(TransportError::Timeout("30s".into()))]);
        let client = client(transport.clone());

        let err = client.post("/contacts/", json!({})).await.unwrap_err();
        assert_eq!(transport.sends(), 1);
        assert!(matches!(err, ApiError::UnknownOutcome { ref method, .. } if method == "POST"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_connect_failure_is_retried() {
        let transport = FakeTransport::new(vec![
            Scripted::Fail(TransportError::Connect("refused".into())),
            ok(json!({})),
        ]);
        let client = client(transport.clone());

        client.delete("/contacts/c1").await.unwrap();
        assert_eq!(transport.sends(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout_is_transient() {
        let transport = FakeTransport::new(vec![
            Scripted::Fail(TransportError::Timeout("30s".into())),
            Scripted::Fail(TransportError::Disconnected("reset".into())),
            ok(json!({})),
        ]);
        let client = client(transport.clone());

        client.get("/contacts/").await.unwrap();
        assert_eq!(transport.sends(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_only_post_retries_timeout_and_server_error() {
        let transport = FakeTransport::new(vec![
            Scripted::Fail(TransportError::Timeout("30s".into())),
            status(503),
            ok(json!({"contacts": []})),
        ]);
        let client = client(transport.clone());

        let request = ApiRequest::post("/contacts/search")
            .json(json!({"page": 1}))
            .read_only();
        assert!(request.is_read_only());
        client.execute(request).await.unwrap();
        assert_eq!(transport.sends(), 3);
    }

    // ====================================================================
    // Cancellation
    // ====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_send_is_unknown_outcome() {
        let transport = FakeTransport::new(vec![Scripted::Hang]);
        let cancel = CancellationToken::new();
        let client = client(transport.clone()).with_cancellation(cancel.clone());

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let err = client.post("/contacts/", json!({})).await.unwrap_err();
        assert_eq!(transport.sends(), 1);
        assert!(matches!(err, ApiError::UnknownOutcome { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_sends_nothing_more() {
        let transport = FakeTransport::new(vec![status(503)]);
        let cancel = CancellationToken::new();
        let client = client(transport.clone()).with_cancellation(cancel.clone());

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let err = client.get("/contacts/").await.unwrap_err();
        assert_eq!(transport.sends(), 1);
        assert!(matches!(err, ApiError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_start_sends_nothing() {
        let transport = FakeTransport::new(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let client = client(transport.clone()).with_cancellation(cancel);

        let err = client.get("/contacts/").await.unwrap_err();
        assert_eq!(transport.sends(), 0);
        assert!(matches!(err, ApiError::Cancelled));
    }

    // ====================================================================
    // Rate limiting
    // ====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_burst_window_delays_third_request() {
        let transport = FakeTransport::new(vec![ok(json!({})), ok(json!({})), ok(json!({}))]);
        let limiter = Arc::new(RateLimiter::new(
            RateWindow::new(2, Duration::from_secs(10)),
            RateWindow::new(100, Duration::from_secs(86_400)),
        ));
        let client = client(transport.clone()).with_rate_limiter(limiter);
        let start = Instant::now();

        client.get("/a").await.unwrap();
        client.get("/b").await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        client.get("/c").await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(transport.sends(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_limit_is_kept_and_low_remaining_pauses() {
        let transport = FakeTransport::new(vec![
            Scripted::Respond(
                RawResponse::new(200, "{}")
                    .with_header("X-RateLimit-Max", "100")
                    .with_header("X-RateLimit-Remaining", "2"),
            ),
            ok(json!({})),
        ]);
        let client = client(transport.clone());
        assert!(client.server_rate_limit().is_none());

        let start = Instant::now();
        client.get("/a").await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(500));

        // A response without headers keeps the last observation
        client.get("/b").await.unwrap();
        let limit = client.server_rate_limit().unwrap();
        assert_eq!(limit.remaining, Some(2));
        assert_eq!(limit.limit, Some(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_summary_reports_usage_and_server_quota() {
        let transport = FakeTransport::new(vec![
            ok(json!({})),
            Scripted::Respond(
                RawResponse::new(200, "{}")
                    .with_header("X-RateLimit-Max", "100")
                    .with_header("X-RateLimit-Remaining", "97"),
            ),
        ]);
        let client = client(transport.clone());
        assert_eq!(client.rate_summary(), None);

        client.get("/a").await.unwrap();
        assert_eq!(
            client.rate_summary().unwrap(),
            "Rate limit: burst 1/100, daily 1/200000"
        );

        client.get("/b").await.unwrap();
        assert_eq!(
            client.rate_summary().unwrap(),
            "Rate limit: burst 2/100, daily 2/200000; server 97/100 remaining"
        );
    }

    // ====================================================================
    // Pagination
    // ====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_pagination_follows_cursors_and_concatenates() {
        let transport = FakeTransport::new(vec![
            ok(json!({"contacts": [{"id": "1"}, {"id": "2"}], "meta": {"startAfterId": "A", "startAfter": 10}})),
            ok(json!({"contacts": [{"id": "3"}], "meta": {"startAfterId": "B", "startAfter": 20}})),
            ok(json!({"contacts": [{"id": "4"}], "meta": {"startAfterId": null, "nextPageUrl": null}})),
        ]);
        let client = client(transport.clone());

        let response = client
            .execute(ApiRequest::get("/contacts/").query("limit", 2).paginate("contacts"))
            .await
            .unwrap();

        assert_eq!(transport.sends(), 3);
        let ids: Vec<_> = response
            .records("contacts")
            .iter()
            .map(|c| c["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert!(response.cursor().is_none());

        let urls: Vec<String> = transport.sent().iter().map(|r| r.url.to_string()).collect();
        assert!(urls[1].contains("startAfterId=A"));
        assert!(urls[1].contains("startAfter=10"));
        assert!(urls[1].contains("limit=2"));
        assert!(urls[2].contains("startAfterId=B"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pagination_stops_at_max_pages() {
        let page = |cursor: &str| ok(json!({"items": [{"id": cursor}], "meta": {"startAfterId": cursor}}));
        let transport = FakeTransport::new(vec![page("a"), page("b"), page("c")]);
        let client = GhlClient::with_transport(ctx().with_max_pages(2), transport.clone()).unwrap();

        let response = client
            .execute(ApiRequest::get("/items").paginate("items"))
            .await
            .unwrap();

        assert_eq!(transport.sends(), 2);
        assert_eq!(response.records("items").len(), 2);
        assert!(response.cursor().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unpaginated_request_keeps_cursor() {
        let transport = FakeTransport::new(vec![ok(
            json!({"contacts": [], "meta": {"nextPageUrl": "https://x/contacts/?startAfterId=z"}}),
        )]);
        let client = client(transport.clone());

        let response = client.get("/contacts/").await.unwrap();
        assert_eq!(transport.sends(), 1);
        assert!(response.cursor().is_some());
    }

    #[test]
    fn test_invalid_base_url_is_configuration_error() {
        let transport = FakeTransport::new(vec![]);
        let err = GhlClient::with_transport(ctx().with_base_url("not a url"), transport).unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
    }

    #[test]
    fn test_require_location() {
        let transport = FakeTransport::new(vec![]);
        let client = GhlClient::with_transport(ctx().with_location(None), transport).unwrap();
        assert!(matches!(client.require_location(), Err(ApiError::Configuration(_))));
    }
}
