//! Location-wide task search

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Map, Value};

use super::segment;
use crate::client::{ApiRequest, GhlClient};
use crate::models::Task;
use crate::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "open" => Ok(Self::Pending),
            "completed" | "done" => Ok(Self::Completed),
            other => Err(format!("unknown task status '{other}' (expected pending or completed)")),
        }
    }
}

/// `POST /locations/{id}/tasks/search` filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSearch {
    pub assignee_id: Option<String>,
    /// `None` returns both pending and completed tasks
    pub status: Option<TaskStatus>,
    pub query: Option<String>,
    pub contact_ids: Vec<String>,
    pub limit: Option<u32>,
    pub skip: Option<u32>,
}

impl TaskSearch {
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        if let Some(assignee) = self.assignee_id.as_deref().filter(|a| !a.is_empty()) {
            body.insert("assignedTo".into(), json!([assignee]));
        }
        if let Some(status) = self.status {
            body.insert("completed".into(), json!(status == TaskStatus::Completed));
        }
        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            body.insert("query".into(), json!(query));
        }
        if !self.contact_ids.is_empty() {
            body.insert("contactId".into(), json!(self.contact_ids));
        }
        if let Some(limit) = self.limit {
            body.insert("limit".into(), json!(limit));
        }
        if let Some(skip) = self.skip {
            body.insert("skip".into(), json!(skip));
        }
        Value::Object(body)
    }
}

fn full_name(details: Option<&Value>) -> Option<String> {
    let details = details?.as_object()?;
    let part = |key: &str| {
        details
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("")
            .to_string()
    };
    let name = format!("{} {}", part("firstName"), part("lastName"))
        .trim()
        .to_string();
    (!name.is_empty()).then_some(name)
}

/// Copies `_id` to `id` and flattens the contact and assignee names.
fn normalize(record: Value) -> Option<Value> {
    let Value::Object(mut task) = record else {
        return None;
    };
    if !task.contains_key("id") {
        if let Some(id) = task.get("_id").cloned() {
            task.insert("id".into(), id);
        }
    }
    if let Some(name) = full_name(task.get("contactDetails")) {
        task.insert("contactName".into(), json!(name));
    }
    if let Some(name) = full_name(task.get("assignedToUserDetails")) {
        task.insert("assigneeName".into(), json!(name));
    }
    Some(Value::Object(task))
}

pub struct Tasks<'a> {
    client: &'a GhlClient,
}

impl<'a> Tasks<'a> {
    pub fn new(client: &'a GhlClient) -> Self {
        Self { client }
    }

    pub async fn search(&self, search: &TaskSearch) -> Result<Vec<Task>, ApiError> {
        let location = self.client.require_location()?;
        let path = format!("/locations/{}/tasks/search", segment(location.as_str()));
        let response = self
            .client
            .execute(
                ApiRequest::post(path)
                    .json(search.to_body())
                    .without_location()
                    .read_only(),
            )
            .await?;

        let key = if response.field("tasks").is_some() { "tasks" } else { "task" };
        response
            .records(key)
            .into_iter()
            .filter_map(normalize)
            .map(|task| {
                serde_json::from_value(task)
                    .map_err(|e| ApiError::InvalidResponse(format!("'tasks' record: {e}")))
            })
            .collect()
    }
}
