//! Cursor pagination against a mock server

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use ghl_api::client::{ApiRequest, GhlClient};
use ghl_api::resources::{ContactQuery, OpportunityFilter};

use crate::common;

#[tokio::test]
async fn test_follows_start_after_id_cursor() {
    let (server, client) = common::setup_ghl_mock().await;

    Mock::given(method("GET"))
        .and(path("/contacts/"))
        .and(query_param("startAfterId", "c2"))
        .and(query_param("startAfter", "1700000000000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contacts": [{"id": "c3"}],
            "meta": {"startAfterId": null, "total": 3}
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/contacts/"))
        .and(query_param("locationId", common::LOCATION))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contacts": [{"id": "c1"}, {"id": "c2"}],
            "meta": {"startAfterId": "c2", "startAfter": 1700000000000_u64, "total": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let contacts = client
        .contacts()
        .list(&ContactQuery {
            limit: 2,
            all: true,
            ..ContactQuery::default()
        })
        .await
        .unwrap();

    let ids: Vec<&str> = contacts.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["c1", "c2", "c3"]);
}

#[tokio::test]
async fn test_follows_next_page_url() {
    let (server, client) = common::setup_ghl_mock().await;
    let next = format!("{}/opportunities/search?location_id={}&page=2", server.uri(), common::LOCATION);

    Mock::given(method("GET"))
        .and(path("/opportunities/search"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "opportunities": [{"id": "o3", "name": "Third", "status": "won"}],
            "meta": {"nextPageUrl": null}
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/opportunities/search"))
        .and(query_param("location_id", common::LOCATION))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "opportunities": [
                {"id": "o1", "name": "First", "status": "open"},
                {"id": "o2", "name": "Second", "status": "won"}
            ],
            "meta": {"nextPageUrl": next}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let won = client
        .opportunities()
        .search(&OpportunityFilter {
            status: Some("WON".into()),
            all: true,
            ..OpportunityFilter::default()
        })
        .await
        .unwrap();

    let ids: Vec<&str> = won.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, ["o2", "o3"]);
}

#[tokio::test]
async fn test_max_pages_truncates_and_keeps_cursor() {
    let server = wiremock::MockServer::start().await;
    let client = GhlClient::new(common::context_for(&server).with_max_pages(2)).unwrap();

    Mock::given(method("GET"))
        .and(path("/contacts/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contacts": [{"id": "again"}],
            "meta": {"startAfterId": "again"}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let response = client
        .execute(ApiRequest::get("/contacts/").paginate("contacts"))
        .await
        .unwrap();

    assert_eq!(response.records("contacts").len(), 2);
    assert!(response.cursor().is_some());
}
