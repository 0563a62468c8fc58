//! Request engine over HTTP: headers, retries, 429 handling and write safety

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use ghl_api::client::{ApiRequest, GhlClient};
use ghl_api::{ApiError, FailureCause};

use crate::common;

#[tokio::test]
async fn test_sends_auth_version_and_location() {
    let (server, client) = common::setup_ghl_mock().await;

    Mock::given(method("GET"))
        .and(path("/contacts/"))
        .and(header("Authorization", format!("Bearer {}", common::TOKEN).as_str()))
        .and(header("Version", "2021-07-28"))
        .and(header("Accept", "application/json"))
        .and(query_param("locationId", common::LOCATION))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"contacts": []})))
        .expect(1)
        .mount(&server)
        .await;

    let response = client
        .execute(ApiRequest::get("/contacts/").query("limit", 5))
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    assert!(response.records("contacts").is_empty());
}

#[tokio::test]
async fn test_retries_503_then_succeeds() {
    let (server, client) = common::setup_ghl_mock().await;

    Mock::given(method("GET"))
        .and(path("/users/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    common::mount_json(&server, "GET", "/users/", 200, json!({"users": [{"id": "u1"}]})).await;

    let response = client.get("/users/").await.expect("retried to success");

    assert_eq!(response.records("users").len(), 1);
}

#[tokio::test]
async fn test_persistent_503_exhausts_attempts() {
    let (server, client) = common::setup_ghl_mock().await;
    let attempts = client.context().retry.max_attempts;

    Mock::given(method("GET"))
        .and(path("/users/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .expect(u64::from(attempts))
        .mount(&server)
        .await;

    let err = client.get("/users/").await.unwrap_err();

    match err {
        ApiError::OperationFailed { attempts: sent, cause } => {
            assert_eq!(sent, attempts);
            assert_eq!(
                cause,
                FailureCause::Status {
                    status: 503,
                    body: "down".into()
                }
            );
        }
        other => panic!("expected OperationFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_429_with_retry_after_is_retried() {
    let (server, client) = common::setup_ghl_mock().await;

    Mock::given(method("GET"))
        .and(path("/calendars/"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    common::mount_json(&server, "GET", "/calendars/", 200, json!({"calendars": [{"id": "c1", "name": "Sales"}]})).await;

    let calendars = client.calendars().list().await.expect("429 then success");

    assert_eq!(calendars[0].name, "Sales");
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let (server, client) = common::setup_ghl_mock().await;

    Mock::given(method("GET"))
        .and(path("/contacts/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Contact not found"})))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.contacts().get("missing").await.unwrap_err();

    match err {
        ApiError::ClientError { status, message, .. } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Contact not found");
        }
        other => panic!("expected ClientError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_write_server_error_sent_once() {
    let (server, client) = common::setup_ghl_mock().await;

    Mock::given(method("POST"))
        .and(path("/contacts/"))
        .and(body_json(json!({"email": "a@example.com", "locationId": common::LOCATION})))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .contacts()
        .create(&ghl_api::resources::NewContact {
            email: Some("a@example.com".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn test_write_timeout_is_unknown_outcome() {
    let (server, client) = common::setup_ghl_mock_with_timeout(Duration::from_millis(200)).await;

    Mock::given(method("POST"))
        .and(path("/opportunities/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"opportunity": {"id": "o1"}}))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .post("/opportunities/", json!({"name": "Deal"}))
        .await
        .unwrap_err();

    match err {
        ApiError::UnknownOutcome { method, path } => {
            assert_eq!(method, "POST");
            assert_eq!(path, "/opportunities/");
        }
        other => panic!("expected UnknownOutcome, got {other:?}"),
    }
}

#[tokio::test]
async fn test_read_timeout_is_retried() {
    let (server, client) = common::setup_ghl_mock_with_timeout(Duration::from_millis(200)).await;

    Mock::given(method("GET"))
        .and(path("/pipelines/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    common::mount_json(&server, "GET", "/pipelines/", 200, json!({"pipelines": [{"id": "p1"}]})).await;

    let response = client.get("/pipelines/").await.expect("timeout then success");

    assert_eq!(response.records("pipelines").len(), 1);
}

#[tokio::test]
async fn test_connection_refused_is_retried_then_fails() {
    let ctx = ghl_api::ClientContext::new(ghl_core::domain::ApiToken::new(common::TOKEN).unwrap())
        .with_base_url("http://127.0.0.1:9")
        .with_retry_policy(common::fast_policy());
    let attempts = ctx.retry.max_attempts;
    let client = GhlClient::new(ctx).unwrap();

    let err = client.post("/contacts/", json!({"email": "a@example.com"})).await.unwrap_err();

    // Nothing reached a server, so even a write is retried and fails cleanly.
    match err {
        ApiError::OperationFailed { attempts: sent, cause } => {
            assert_eq!(sent, attempts);
            assert!(matches!(cause, FailureCause::Transport(_)));
        }
        other => panic!("expected OperationFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_rate_limit_headers_are_recorded() {
    let (server, client) = common::setup_ghl_mock().await;

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-RateLimit-Max", "100")
                .insert_header("X-RateLimit-Remaining", "87")
                .insert_header("X-RateLimit-Interval-Milliseconds", "10000")
                .set_body_json(json!({"id": "u1", "name": "Ada"})),
        )
        .mount(&server)
        .await;

    assert!(client.server_rate_limit().is_none());
    client.get("/users/me").await.unwrap();

    let limit = client.server_rate_limit().expect("headers parsed");
    assert_eq!(limit.limit, Some(100));
    assert_eq!(limit.remaining, Some(87));
    assert_eq!(limit.interval, Some(Duration::from_secs(10)));
    assert_eq!(client.rate_usage().burst, 1);
}

#[tokio::test]
async fn test_no_content_response_is_empty_object() {
    let (server, client) = common::setup_ghl_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/contacts/c1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.contacts().delete("c1").await.expect("204 accepted");
}
