//! Workflows and contact enrollment

use serde_json::json;

use super::{segment, Collection};
use crate::client::{ApiRequest, GhlClient, LocationParam, LOCATION_ID};
use crate::models::Workflow;
use crate::ApiError;

pub const WORKFLOWS: Collection = Collection {
    list_path: "/workflows/",
    item_base: "/workflows",
    singular: "workflow",
    plural: "workflows",
    location: LocationParam::Query(LOCATION_ID),
};

pub struct Workflows<'a> {
    client: &'a GhlClient,
}

impl<'a> Workflows<'a> {
    pub fn new(client: &'a GhlClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Workflow>, ApiError> {
        WORKFLOWS.list(self.client, WORKFLOWS.list_request()).await
    }

    fn enrollment_path(contact_id: &str, workflow_id: &str) -> String {
        format!("/contacts/{}/workflow/{}", segment(contact_id), segment(workflow_id))
    }

    pub async fn enroll(&self, contact_id: &str, workflow_id: &str) -> Result<(), ApiError> {
        self.client
            .execute(
                ApiRequest::post(Self::enrollment_path(contact_id, workflow_id))
                    .json(json!({}))
                    .without_location(),
            )
            .await?;
        Ok(())
    }

    pub async fn unenroll(&self, contact_id: &str, workflow_id: &str) -> Result<(), ApiError> {
        self.client
            .execute(ApiRequest::delete(Self::enrollment_path(contact_id, workflow_id)).without_location())
            .await?;
        Ok(())
    }
}
