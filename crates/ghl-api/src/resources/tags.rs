//! Location tags

use serde_json::json;

use super::segment;
use crate::client::{ApiRequest, GhlClient};
use crate::models::Tag;
use crate::ApiError;

pub struct Tags<'a> {
    client: &'a GhlClient,
}

impl<'a> Tags<'a> {
    pub fn new(client: &'a GhlClient) -> Self {
        Self { client }
    }

    fn base(&self) -> Result<String, ApiError> {
        let location = self.client.require_location()?;
        Ok(format!("/locations/{}/tags", segment(location.as_str())))
    }

    pub async fn list(&self) -> Result<Vec<Tag>, ApiError> {
        self.client
            .execute(ApiRequest::get(self.base()?).without_location())
            .await?
            .decode_records("tags")
    }

    pub async fn get(&self, id: &str) -> Result<Tag, ApiError> {
        let path = format!("{}/{}", self.base()?, segment(id));
        self.client
            .execute(ApiRequest::get(path).without_location())
            .await?
            .decode("tag")
    }

    pub async fn create(&self, name: &str) -> Result<Tag, ApiError> {
        self.client
            .execute(
                ApiRequest::post(self.base()?)
                    .json(json!({ "name": name }))
                    .without_location(),
            )
            .await?
            .decode("tag")
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("{}/{}", self.base()?, segment(id));
        self.client
            .execute(ApiRequest::delete(path).without_location())
            .await?;
        Ok(())
    }
}
