//! Custom field definitions and location custom values

use serde_json::json;

use super::segment;
use crate::client::{ApiRequest, ApiResponse, GhlClient};
use crate::models::{CustomField, CustomValue};
use crate::ApiError;

/// Field keys kept out of listings; contact notes have their own commands.
const HIDDEN_FIELD_KEYS: [&str; 1] = ["contact.notes"];
const HIDDEN_FIELD_NAMES: [&str; 1] = ["notes"];

fn is_hidden(field: &CustomField) -> bool {
    let key = field.field_key.as_deref().unwrap_or("").trim().to_lowercase();
    let name = field.name.trim().to_lowercase();
    HIDDEN_FIELD_KEYS.contains(&key.as_str()) || HIDDEN_FIELD_NAMES.contains(&name.as_str())
}

/// The first of `keys` present in the response, else the first key.
fn envelope_key(response: &ApiResponse, keys: [&'static str; 2]) -> &'static str {
    keys.into_iter()
        .find(|key| response.field(key).is_some())
        .unwrap_or(keys[0])
}

pub struct CustomFields<'a> {
    client: &'a GhlClient,
}

impl<'a> CustomFields<'a> {
    pub fn new(client: &'a GhlClient) -> Self {
        Self { client }
    }

    fn location_path(&self, suffix: &str) -> Result<String, ApiError> {
        let location = self.client.require_location()?;
        Ok(format!("/locations/{}/{suffix}", segment(location.as_str())))
    }

    /// Contact field definitions, without hidden fields.
    pub async fn list(&self) -> Result<Vec<CustomField>, ApiError> {
        let response = self
            .client
            .execute(ApiRequest::get(self.location_path("customFields")?).without_location())
            .await?;
        let key = envelope_key(&response, ["customFields", "fields"]);
        let fields: Vec<CustomField> = response.decode_records(key)?;
        Ok(fields
            .into_iter()
            .filter(|f| f.entity() == "contact" && !is_hidden(f))
            .collect())
    }

    pub async fn values(&self) -> Result<Vec<CustomValue>, ApiError> {
        let response = self
            .client
            .execute(ApiRequest::get(self.location_path("customValues")?).without_location())
            .await?;
        let key = envelope_key(&response, ["customValues", "values"]);
        response.decode_records(key)
    }

    /// Updates a location custom value.
    pub async fn set_value(&self, id: &str, value: &str) -> Result<CustomValue, ApiError> {
        let path = self.location_path(&format!("customValues/{}", segment(id)))?;
        self.client
            .execute(ApiRequest::put(path).json(json!({ "value": value })).without_location())
            .await?
            .decode("customValue")
    }
}
