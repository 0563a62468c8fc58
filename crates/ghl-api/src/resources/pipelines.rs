//! Opportunity pipelines and their stages

use super::Collection;
use crate::client::{GhlClient, LocationParam, LOCATION_ID};
use crate::models::{Pipeline, Stage};
use crate::ApiError;

pub const PIPELINES: Collection = Collection {
    list_path: "/opportunities/pipelines",
    item_base: "/opportunities/pipelines",
    singular: "pipeline",
    plural: "pipelines",
    location: LocationParam::Query(LOCATION_ID),
};

pub struct Pipelines<'a> {
    client: &'a GhlClient,
}

impl<'a> Pipelines<'a> {
    pub fn new(client: &'a GhlClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Pipeline>, ApiError> {
        PIPELINES.list(self.client, PIPELINES.list_request()).await
    }

    pub async fn get(&self, id: &str) -> Result<Pipeline, ApiError> {
        PIPELINES.get(self.client, id).await
    }

    pub async fn stages(&self, id: &str) -> Result<Vec<Stage>, ApiError> {
        Ok(self.get(id).await?.stages)
    }
}
