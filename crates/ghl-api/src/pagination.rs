//! Cursor pagination
//!
//! GoHighLevel list endpoints report further pages in a `meta` object:
//!
//! 1. **`meta.nextPageUrl`**: a URL whose query parameters select the next
//!    page. An explicit `null` means this is the last page.
//! 2. **`meta.startAfterId` / `meta.startAfter`**: keyset cursor values that
//!    are sent back as query parameters of the same name.
//!
//! [`extract_cursor`] turns either form into a [`Cursor`] (a list of query
//! parameters) and [`collect_records`] pulls the record array out of a page.
//! The request engine follows cursors and accumulates records.

use serde_json::{Map, Value};
use tracing::trace;

/// Query parameters that select the next page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    params: Vec<(String, String)>,
}

impl Cursor {
    pub fn new(params: Vec<(String, String)>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// `query` with the cursor parameters replacing any of the same name.
    pub fn apply(&self, query: &[(String, String)]) -> Vec<(String, String)> {
        let mut merged: Vec<(String, String)> = query
            .iter()
            .filter(|(key, _)| !self.params.iter().any(|(k, _)| k == key))
            .cloned()
            .collect();
        merged.extend(self.params.iter().cloned());
        merged
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn params_from_url(raw: &str) -> Vec<(String, String)> {
    let parsed = url::Url::parse(raw).or_else(|_| {
        url::Url::parse("http://localhost/").and_then(|base| base.join(raw))
    });
    match parsed {
        Ok(url) => url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// The cursor for the page after `body`, if any.
pub fn extract_cursor(body: &Map<String, Value>) -> Option<Cursor> {
    let meta = body.get("meta")?.as_object()?;

    match meta.get("nextPageUrl") {
        Some(Value::String(url)) if !url.trim().is_empty() => {
            let params = params_from_url(url);
            if !params.is_empty() {
                trace!(?params, "Cursor from nextPageUrl");
                return Some(Cursor::new(params));
            }
        }
        Some(Value::Null) => return None,
        _ => {}
    }

    let start_after_id = meta.get("startAfterId").and_then(scalar_to_string)?;
    let mut params = vec![("startAfterId".to_string(), start_after_id)];
    if let Some(start_after) = meta.get("startAfter").and_then(scalar_to_string) {
        params.push(("startAfter".to_string(), start_after));
    }
    Some(Cursor::new(params))
}

/// The records of one page.
///
/// Uses the `collection` field when given, otherwise the first array-valued
/// field of the object.
pub fn collect_records(body: &Map<String, Value>, collection: Option<&str>) -> Vec<Value> {
    let field = match collection {
        Some(key) => body.get(key),
        None => body.values().find(|v| v.is_array()),
    };
    match field {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other.clone()],
    }
}
