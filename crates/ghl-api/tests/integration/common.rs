//! Shared helpers for GoHighLevel API integration tests
//!
//! Each test starts its own mock server and builds a client pointed at it,
//! with short retry delays so retry paths finish quickly in real time.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ghl_api::client::{ClientContext, GhlClient};
use ghl_api::retry::RetryPolicy;
use ghl_core::domain::{ApiToken, LocationId};

pub const TOKEN: &str = "pit-integration-token";
pub const LOCATION: &str = "loc-test";

/// Retry policy with millisecond delays.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        ..RetryPolicy::default()
    }
}

pub fn context_for(server: &MockServer) -> ClientContext {
    ClientContext::new(ApiToken::new(TOKEN).expect("valid token"))
        .with_location(Some(LocationId::new(LOCATION).expect("valid location")))
        .with_base_url(server.uri())
        .with_retry_policy(fast_policy())
}

/// Starts a mock server and returns it with a client pointed at it.
pub async fn setup_ghl_mock() -> (MockServer, GhlClient) {
    let server = MockServer::start().await;
    let client = GhlClient::new(context_for(&server)).expect("client builds");
    (server, client)
}

/// Same as [`setup_ghl_mock`] but with a custom per-request timeout.
pub async fn setup_ghl_mock_with_timeout(timeout: Duration) -> (MockServer, GhlClient) {
    let server = MockServer::start().await;
    let mut ctx = context_for(&server);
    ctx.timeout = timeout;
    let client = GhlClient::new(ctx).expect("client builds");
    (server, client)
}

/// Mounts a JSON response for `verb path`.
pub async fn mount_json(server: &MockServer, verb: &str, route: &str, status: u16, body: serde_json::Value) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}
