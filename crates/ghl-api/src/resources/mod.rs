//! Per-resource API facades
//!
//! Each facade borrows a [`GhlClient`] and maps its operations onto fixed
//! path templates. Facades only unwrap response envelopes and apply the
//! few client-side filters the API does not support; retries, rate limiting
//! and pagination all live in the engine.
//!
//! ```rust,no_run
//! # async fn example(client: &ghl_api::GhlClient) -> Result<(), ghl_api::ApiError> {
//! let contact = client.contacts().get("contact-123").await?;
//! let pipelines = client.pipelines().list().await?;
//! # Ok(())
//! # }
//! ```

pub mod calendars;
pub mod contacts;
pub mod conversations;
pub mod custom_fields;
pub mod locations;
pub mod opportunities;
pub mod pipelines;
pub mod tags;
pub mod tasks;
pub mod users;
pub mod workflows;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::client::{ApiRequest, GhlClient, LocationParam};
use crate::ApiError;

pub use calendars::{AppointmentUpdate, Calendars, EventQuery, NewAppointment};
pub use contacts::{ContactQuery, ContactSearch, ContactUpdate, Contacts, NewContact, NewTask, TaskUpdate};
pub use conversations::{Conversations, MessageChannel, OutboundMessage};
pub use custom_fields::CustomFields;
pub use locations::Locations;
pub use opportunities::{NewOpportunity, OpportunityFilter, OpportunityUpdate, Opportunities};
pub use pipelines::Pipelines;
pub use tags::Tags;
pub use tasks::{TaskSearch, TaskStatus, Tasks};
pub use users::Users;
pub use workflows::Workflows;

/// Percent-encodes an id for use as one path segment.
pub(crate) fn segment(id: &str) -> String {
    form_urlencoded::byte_serialize(id.as_bytes()).collect()
}

/// Serializes an input struct into a JSON object.
pub(crate) fn to_object<T: serde::Serialize>(input: &T) -> Result<Map<String, Value>, ApiError> {
    match serde_json::to_value(input) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ApiError::InvalidResponse(format!(
            "request body must be an object, got {other}"
        ))),
        Err(e) => Err(ApiError::InvalidResponse(format!("request body: {e}"))),
    }
}

// ============================================================================
// Collection descriptor
// ============================================================================

/// A REST collection with the usual list/get/create/update/delete routes
///
/// `list_path` is used for list and create (`GET|POST /contacts/`),
/// `item_base` + `/{id}` for the rest. `singular`/`plural` are the envelope
/// keys of item and list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    pub list_path: &'static str,
    pub item_base: &'static str,
    pub singular: &'static str,
    pub plural: &'static str,
    pub location: LocationParam,
}

impl Collection {
    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.item_base, segment(id))
    }

    pub fn list_request(&self) -> ApiRequest {
        ApiRequest::get(self.list_path).location(self.location)
    }

    /// One page, or every page when `request` is paginated.
    pub async fn list<T: DeserializeOwned>(
        &self,
        client: &GhlClient,
        request: ApiRequest,
    ) -> Result<Vec<T>, ApiError> {
        client.execute(request).await?.decode_records(self.plural)
    }

    pub async fn get<T: DeserializeOwned>(&self, client: &GhlClient, id: &str) -> Result<T, ApiError> {
        client
            .execute(ApiRequest::get(self.item_path(id)).location(self.location))
            .await?
            .decode(self.singular)
    }

    pub async fn create<T: DeserializeOwned>(&self, client: &GhlClient, body: Value) -> Result<T, ApiError> {
        client
            .execute(ApiRequest::post(self.list_path).json(body).location(self.location))
            .await?
            .decode(self.singular)
    }

    pub async fn update<T: DeserializeOwned>(
        &self,
        client: &GhlClient,
        id: &str,
        body: Value,
    ) -> Result<T, ApiError> {
        client
            .execute(ApiRequest::put(self.item_path(id)).json(body).location(self.location))
            .await?
            .decode(self.singular)
    }

    pub async fn delete(&self, client: &GhlClient, id: &str) -> Result<(), ApiError> {
        client
            .execute(ApiRequest::delete(self.item_path(id)).location(self.location))
            .await?;
        Ok(())
    }
}

// ============================================================================
// Facade accessors
// ============================================================================

impl GhlClient {
    pub fn contacts(&self) -> Contacts<'_> {
        Contacts::new(self)
    }

    pub fn tasks(&self) -> Tasks<'_> {
        Tasks::new(self)
    }

    pub fn opportunities(&self) -> Opportunities<'_> {
        Opportunities::new(self)
    }

    pub fn pipelines(&self) -> Pipelines<'_> {
        Pipelines::new(self)
    }

    pub fn users(&self) -> Users<'_> {
        Users::new(self)
    }

    pub fn locations(&self) -> Locations<'_> {
        Locations::new(self)
    }

    pub fn calendars(&self) -> Calendars<'_> {
        Calendars::new(self)
    }

    pub fn conversations(&self) -> Conversations<'_> {
        Conversations::new(self)
    }

    pub fn workflows(&self) -> Workflows<'_> {
        Workflows::new(self)
    }

    pub fn tags(&self) -> Tags<'_> {
        Tags::new(self)
    }

    pub fn custom_fields(&self) -> CustomFields<'_> {
        CustomFields::new(self)
    }
}
