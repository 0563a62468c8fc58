//! Locations (sub-accounts)

use super::Collection;
use crate::client::{ApiRequest, GhlClient, LocationParam};
use crate::models::Location;
use crate::ApiError;

pub const LOCATIONS: Collection = Collection {
    list_path: "/locations/search",
    item_base: "/locations",
    singular: "location",
    plural: "locations",
    location: LocationParam::None,
};

pub struct Locations<'a> {
    client: &'a GhlClient,
}

impl<'a> Locations<'a> {
    pub fn new(client: &'a GhlClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str) -> Result<Location, ApiError> {
        LOCATIONS.get(self.client, id).await
    }

    /// The location the client is scoped to.
    pub async fn current(&self) -> Result<Location, ApiError> {
        let id = self.client.require_location()?.to_string();
        self.get(&id).await
    }

    /// Agency-level search; location tokens usually get a 401 here.
    pub async fn search(&self, limit: u32, skip: u32) -> Result<Vec<Location>, ApiError> {
        let request = ApiRequest::get(LOCATIONS.list_path)
            .without_location()
            .query("limit", limit)
            .query("skip", skip);
        LOCATIONS.list(self.client, request).await
    }
}
