//! Contacts, their notes and their tasks

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{segment, to_object, Collection};
use crate::client::{ApiRequest, GhlClient, LocationParam, LOCATION_ID};
use crate::models::{Contact, Note, Task};
use crate::ApiError;

pub const CONTACTS: Collection = Collection {
    list_path: "/contacts/",
    item_base: "/contacts",
    singular: "contact",
    plural: "contacts",
    location: LocationParam::Query(LOCATION_ID),
};

/// Fields for a new contact; at least an email or a phone is expected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Only the fields that are `Some` are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// `{ id, key, field_value }` entries
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<Value>,
}

impl ContactUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// `GET /contacts/` parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactQuery {
    pub limit: u32,
    pub query: Option<String>,
    /// Follow cursors instead of returning the first page
    pub all: bool,
}

impl Default for ContactQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            query: None,
            all: false,
        }
    }
}

/// `POST /contacts/search` filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactSearch {
    pub page: u32,
    pub page_limit: u32,
    pub query: Option<String>,
    /// Every tag must be present
    pub tags: Vec<String>,
    pub assigned_to: Option<String>,
}

impl Default for ContactSearch {
    fn default() -> Self {
        Self {
            page: 1,
            page_limit: 50,
            query: None,
            tags: Vec::new(),
            assigned_to: None,
        }
    }
}

impl ContactSearch {
    /// Request body; filters are ANDed.
    pub fn to_body(&self, location_id: &str) -> Value {
        let mut filters = Vec::new();
        if let Some(user) = self.assigned_to.as_deref().filter(|u| !u.trim().is_empty()) {
            filters.push(json!({"field": "assignedTo", "operator": "eq", "value": user}));
        }
        for tag in self.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            filters.push(json!({"field": "tags", "operator": "contains", "value": tag}));
        }

        let mut body = json!({
            "locationId": location_id,
            "page": self.page,
            "pageLimit": self.page_limit,
        });
        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            body["query"] = json!(query);
        }
        if !filters.is_empty() {
            body["filters"] = json!([{"group": "AND", "filters": filters}]);
        }
        body
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// ISO 8601; defaults to seven days from now at 12:00 UTC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

/// Seven days from now at noon UTC.
pub fn default_due_date() -> String {
    (Utc::now() + ChronoDuration::days(7))
        .format("%Y-%m-%dT12:00:00Z")
        .to_string()
}

pub struct Contacts<'a> {
    client: &'a GhlClient,
}

impl<'a> Contacts<'a> {
    pub fn new(client: &'a GhlClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, query: &ContactQuery) -> Result<Vec<Contact>, ApiError> {
        let mut request = CONTACTS
            .list_request()
            .query("limit", query.limit)
            .query_opt("query", query.query.as_deref().filter(|q| !q.is_empty()));
        if query.all {
            request = request.paginate(CONTACTS.plural);
        }
        CONTACTS.list(self.client, request).await
    }

    /// Filtered search; the location id goes in the body.
    pub async fn search(&self, search: &ContactSearch) -> Result<Vec<Contact>, ApiError> {
        let location = self.client.require_location()?;
        let request = ApiRequest::post("/contacts/search")
            .json(search.to_body(location.as_str()))
            .without_location()
            .read_only();
        self.client.execute(request).await?.decode_records(CONTACTS.plural)
    }

    pub async fn get(&self, id: &str) -> Result<Contact, ApiError> {
        CONTACTS.get(self.client, id).await
    }

    pub async fn create(&self, contact: &NewContact) -> Result<Contact, ApiError> {
        let location = self.client.require_location()?;
        let mut body = to_object(contact)?;
        body.insert("locationId".to_string(), json!(location.as_str()));
        CONTACTS.create(self.client, Value::Object(body)).await
    }

    pub async fn update(&self, id: &str, update: &ContactUpdate) -> Result<Contact, ApiError> {
        CONTACTS
            .update(self.client, id, Value::Object(to_object(update)?))
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        CONTACTS.delete(self.client, id).await
    }

    /// Adds tags, keeping the existing ones.
    pub async fn add_tags(&self, id: &str, tags: &[String]) -> Result<Contact, ApiError> {
        let contact = self.get(id).await?;
        let mut merged = contact.tags;
        for tag in tags {
            if !merged.contains(tag) {
                merged.push(tag.clone());
            }
        }
        debug!(contact = id, tags = merged.len(), "Writing merged tags");
        CONTACTS.update(self.client, id, json!({ "tags": merged })).await
    }

    pub async fn remove_tags(&self, id: &str, tags: &[String]) -> Result<Contact, ApiError> {
        let contact = self.get(id).await?;
        let remaining: Vec<String> = contact.tags.into_iter().filter(|t| !tags.contains(t)).collect();
        CONTACTS.update(self.client, id, json!({ "tags": remaining })).await
    }

    // ------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------

    pub async fn notes(&self, id: &str) -> Result<Vec<Note>, ApiError> {
        let path = format!("/contacts/{}/notes", segment(id));
        self.client
            .execute(ApiRequest::get(path).without_location())
            .await?
            .decode_records("notes")
    }

    pub async fn add_note(&self, id: &str, body: &str) -> Result<Note, ApiError> {
        let path = format!("/contacts/{}/notes", segment(id));
        self.client
            .execute(ApiRequest::post(path).json(json!({ "body": body })).without_location())
            .await?
            .decode("note")
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    fn task_path(contact_id: &str, task_id: Option<&str>) -> String {
        match task_id {
            Some(task) => format!("/contacts/{}/tasks/{}", segment(contact_id), segment(task)),
            None => format!("/contacts/{}/tasks", segment(contact_id)),
        }
    }

    pub async fn tasks(&self, id: &str) -> Result<Vec<Task>, ApiError> {
        self.client
            .execute(ApiRequest::get(Self::task_path(id, None)).without_location())
            .await?
            .decode_records("tasks")
    }

    pub async fn task(&self, id: &str, task_id: &str) -> Result<Task, ApiError> {
        self.client
            .execute(ApiRequest::get(Self::task_path(id, Some(task_id))).without_location())
            .await?
            .decode("task")
    }

    pub async fn create_task(&self, id: &str, task: &NewTask) -> Result<Task, ApiError> {
        let mut task = task.clone();
        if task.due_date.as_deref().map_or(true, |d| d.trim().is_empty()) {
            task.due_date = Some(default_due_date());
        }
        let body = Value::Object(to_object(&task)?);
        self.client
            .execute(ApiRequest::post(Self::task_path(id, None)).json(body).without_location())
            .await?
            .decode("task")
    }

    /// Sends only the given fields; with none given, returns the task as is.
    pub async fn update_task(&self, id: &str, task_id: &str, update: &TaskUpdate) -> Result<Task, ApiError> {
        let body = to_object(update)?;
        if body.is_empty() {
            return self.task(id, task_id).await;
        }
        self.client
            .execute(
                ApiRequest::put(Self::task_path(id, Some(task_id)))
                    .json(Value::Object(body))
                    .without_location(),
            )
            .await?
            .decode("task")
    }

    pub async fn delete_task(&self, id: &str, task_id: &str) -> Result<(), ApiError> {
        self.client
            .execute(ApiRequest::delete(Self::task_path(id, Some(task_id))).without_location())
            .await?;
        Ok(())
    }

    pub async fn complete_task(&self, id: &str, task_id: &str, completed: bool) -> Result<Task, ApiError> {
        let path = format!("{}/completed", Self::task_path(id, Some(task_id)));
        self.client
            .execute(
                ApiRequest::put(path)
                    .json(json!({ "completed": completed }))
                    .without_location(),
            )
            .await?
            .decode("task")
    }
}
