//! Calendars, free slots and appointments

use serde::Serialize;
use serde_json::{json, Value};

use super::{segment, to_object, Collection};
use crate::client::{ApiRequest, GhlClient, LocationParam, LOCATION_ID};
use crate::models::{Appointment, Calendar};
use crate::ApiError;

pub const CALENDARS: Collection = Collection {
    list_path: "/calendars/",
    item_base: "/calendars",
    singular: "calendar",
    plural: "calendars",
    location: LocationParam::Query(LOCATION_ID),
};

pub const APPOINTMENTS: Collection = Collection {
    list_path: "/calendars/events/appointments",
    item_base: "/calendars/events/appointments",
    singular: "appointment",
    plural: "appointments",
    location: LocationParam::None,
};

/// `GET /calendars/events` window; times are epoch milliseconds or ISO
/// strings, passed through as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub calendar_id: Option<String>,
    pub user_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub calendar_id: String,
    pub contact_id: String,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_status: Option<String>,
}

/// Slots of a free-slots response.
///
/// The API answers either `{"slots": [...]}` or one object per date:
/// `{"2024-01-20": {"slots": [...]}, "traceId": "..."}`; dates come out in
/// order.
pub fn collect_slots(body: &Value) -> Vec<Value> {
    let Some(map) = body.as_object() else {
        return Vec::new();
    };
    if let Some(Value::Array(slots)) = map.get("slots") {
        return slots.clone();
    }
    let mut days: Vec<(&String, &Vec<Value>)> = map
        .iter()
        .filter_map(|(date, day)| day.get("slots").and_then(Value::as_array).map(|s| (date, s)))
        .collect();
    days.sort_by(|a, b| a.0.cmp(b.0));
    days.into_iter().flat_map(|(_, slots)| slots.iter().cloned()).collect()
}

pub struct Calendars<'a> {
    client: &'a GhlClient,
}

impl<'a> Calendars<'a> {
    pub fn new(client: &'a GhlClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Calendar>, ApiError> {
        CALENDARS.list(self.client, CALENDARS.list_request()).await
    }

    pub async fn get(&self, id: &str) -> Result<Calendar, ApiError> {
        CALENDARS.get(self.client, id).await
    }

    pub async fn free_slots(&self, id: &str, start_date: &str, end_date: Option<&str>) -> Result<Vec<Value>, ApiError> {
        let path = format!("/calendars/{}/free-slots", segment(id));
        let response = self
            .client
            .execute(
                ApiRequest::get(path)
                    .without_location()
                    .query("startDate", start_date)
                    .query_opt("endDate", end_date.or(Some(start_date))),
            )
            .await?;
        Ok(collect_slots(&response.into_value()))
    }

    pub async fn events(&self, query: &EventQuery) -> Result<Vec<Appointment>, ApiError> {
        let request = ApiRequest::get("/calendars/events")
            .query_opt("calendarId", query.calendar_id.as_deref())
            .query_opt("userId", query.user_id.as_deref())
            .query_opt("startTime", query.start_time.as_deref())
            .query_opt("endTime", query.end_time.as_deref());
        self.client.execute(request).await?.decode_records("events")
    }

    pub async fn appointment(&self, id: &str) -> Result<Appointment, ApiError> {
        APPOINTMENTS.get(self.client, id).await
    }

    pub async fn create_appointment(&self, appointment: &NewAppointment) -> Result<Appointment, ApiError> {
        let location = self.client.require_location()?;
        let mut body = to_object(appointment)?;
        body.insert("locationId".into(), json!(location.as_str()));
        APPOINTMENTS.create(self.client, Value::Object(body)).await
    }

    pub async fn update_appointment(&self, id: &str, update: &AppointmentUpdate) -> Result<Appointment, ApiError> {
        APPOINTMENTS
            .update(self.client, id, Value::Object(to_object(update)?))
            .await
    }

    pub async fn delete_appointment(&self, id: &str) -> Result<(), ApiError> {
        APPOINTMENTS.delete(self.client, id).await
    }
}
