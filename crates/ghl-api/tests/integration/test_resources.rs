//! Resource clients end to end: routes, bodies and envelope decoding

use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use ghl_api::resources::{ContactSearch, MessageChannel, NewTask, OutboundMessage, TaskSearch};

use crate::common;

#[tokio::test]
async fn test_contact_search_sends_filters_in_body() {
    let (server, client) = common::setup_ghl_mock().await;

    Mock::given(method("POST"))
        .and(path("/contacts/search"))
        .and(body_json(json!({
            "locationId": common::LOCATION,
            "page": 1,
            "pageLimit": 50,
            "query": "smith",
            "filters": [{"group": "AND", "filters": [
                {"field": "tags", "operator": "contains", "value": "vip"}
            ]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contacts": [{"id": "c1", "firstName": "Jane", "lastName": "Smith", "tags": ["vip"]}],
            "total": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let contacts = client
        .contacts()
        .search(&ContactSearch {
            query: Some("smith".into()),
            tags: vec!["vip".into()],
            ..ContactSearch::default()
        })
        .await
        .unwrap();

    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].display_name(), "Jane Smith");
}

#[tokio::test]
async fn test_add_tags_merges_with_existing() {
    let (server, client) = common::setup_ghl_mock().await;

    common::mount_json(
        &server,
        "GET",
        "/contacts/c1",
        200,
        json!({"contact": {"id": "c1", "tags": ["lead"]}}),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/contacts/c1"))
        .and(body_json(json!({"tags": ["lead", "vip"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contact": {"id": "c1", "tags": ["lead", "vip"]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let contact = client.contacts().add_tags("c1", &["vip".into(), "lead".into()]).await.unwrap();

    assert_eq!(contact.tags, ["lead", "vip"]);
}

#[tokio::test]
async fn test_create_task_for_contact() {
    let (server, client) = common::setup_ghl_mock().await;

    Mock::given(method("POST"))
        .and(path("/contacts/c1/tasks"))
        .and(body_partial_json(json!({"title": "Call back", "completed": false})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "task": {"id": "t1", "title": "Call back", "contactId": "c1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let task = client
        .contacts()
        .create_task(
            "c1",
            &NewTask {
                title: "Call back".into(),
                ..NewTask::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(task.id, "t1");
    assert_eq!(task.contact_id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn test_location_task_search() {
    let (server, client) = common::setup_ghl_mock().await;

    Mock::given(method("POST"))
        .and(path(format!("/locations/{}/tasks/search", common::LOCATION)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tasks": [{"_id": "t9", "title": "Follow up", "completed": false}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tasks = client.tasks().search(&TaskSearch::default()).await.unwrap();

    assert_eq!(tasks[0].id, "t9");
}

#[tokio::test]
async fn test_opportunity_status_update() {
    let (server, client) = common::setup_ghl_mock().await;

    Mock::given(method("PUT"))
        .and(path("/opportunities/o1/status"))
        .and(query_param("locationId", common::LOCATION))
        .and(body_json(json!({"status": "won"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"succeded": true})))
        .expect(1)
        .mount(&server)
        .await;

    client.opportunities().mark_won("o1").await.unwrap();
}

#[tokio::test]
async fn test_pipeline_stages() {
    let (server, client) = common::setup_ghl_mock().await;

    Mock::given(method("GET"))
        .and(path("/opportunities/pipelines/p1"))
        .and(query_param("locationId", common::LOCATION))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pipeline": {
                "id": "p1",
                "name": "Sales",
                "stages": [{"id": "s1", "name": "New"}, {"id": "s2", "name": "Won"}]
            }
        })))
        .mount(&server)
        .await;

    let stages = client.pipelines().stages("p1").await.unwrap();

    assert_eq!(stages.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), ["New", "Won"]);
}

#[tokio::test]
async fn test_send_sms() {
    let (server, client) = common::setup_ghl_mock().await;

    Mock::given(method("POST"))
        .and(path("/conversations/messages"))
        .and(body_json(json!({"type": "SMS", "contactId": "c1", "message": "Hi"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "conversationId": "conv1",
            "messageId": "m1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sent = client
        .conversations()
        .send(&OutboundMessage {
            channel: MessageChannel::Sms,
            contact_id: "c1".into(),
            message: "Hi".into(),
            subject: None,
        })
        .await
        .unwrap();

    assert_eq!(sent["messageId"], "m1");
}

#[tokio::test]
async fn test_workflow_enrollment() {
    let (server, client) = common::setup_ghl_mock().await;

    Mock::given(method("POST"))
        .and(path("/contacts/c1/workflow/wf1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"succeded": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/contacts/c1/workflow/wf1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"succeded": true})))
        .expect(1)
        .mount(&server)
        .await;

    client.workflows().enroll("c1", "wf1").await.unwrap();
    client.workflows().unenroll("c1", "wf1").await.unwrap();
}
