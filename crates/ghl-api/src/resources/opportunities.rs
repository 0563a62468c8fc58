//! Opportunities (pipeline deals)

use serde::Serialize;
use serde_json::{json, Value};

use super::{segment, to_object, Collection};
use crate::client::{ApiRequest, GhlClient, LocationParam, LOCATION_ID, LOCATION_ID_SNAKE};
use crate::models::Opportunity;
use crate::ApiError;

pub const OPPORTUNITIES: Collection = Collection {
    list_path: "/opportunities/",
    item_base: "/opportunities",
    singular: "opportunity",
    plural: "opportunities",
    location: LocationParam::Query(LOCATION_ID),
};

/// Filters applied after fetching, since `/opportunities/search` only
/// accepts the location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpportunityFilter {
    pub contact_id: Option<String>,
    pub pipeline_id: Option<String>,
    pub stage_id: Option<String>,
    /// Compared case-insensitively
    pub status: Option<String>,
    pub limit: usize,
    pub skip: usize,
    /// Fetch every page before filtering
    pub all: bool,
}

impl Default for OpportunityFilter {
    fn default() -> Self {
        Self {
            contact_id: None,
            pipeline_id: None,
            stage_id: None,
            status: None,
            limit: 20,
            skip: 0,
            all: false,
        }
    }
}

impl OpportunityFilter {
    pub fn matches(&self, opportunity: &Opportunity) -> bool {
        let eq = |wanted: &Option<String>, actual: &Option<String>| match wanted {
            Some(w) => actual.as_deref() == Some(w.as_str()),
            None => true,
        };
        eq(&self.contact_id, &opportunity.contact_id)
            && eq(&self.pipeline_id, &opportunity.pipeline_id)
            && eq(&self.stage_id, &opportunity.pipeline_stage_id)
            && self.status.as_deref().map_or(true, |wanted| {
                opportunity
                    .status
                    .as_deref()
                    .unwrap_or("")
                    .eq_ignore_ascii_case(wanted)
            })
    }

    /// Filters, then keeps the `skip..skip + limit` window.
    pub fn apply(&self, opportunities: Vec<Opportunity>) -> Vec<Opportunity> {
        opportunities
            .into_iter()
            .filter(|o| self.matches(o))
            .skip(self.skip)
            .take(self.limit)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOpportunity {
    pub contact_id: String,
    pub pipeline_id: String,
    #[serde(rename = "pipelineStageId")]
    pub stage_id: String,
    pub name: String,
    /// `open` when empty
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monetary_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monetary_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

pub struct Opportunities<'a> {
    client: &'a GhlClient,
}

impl<'a> Opportunities<'a> {
    pub fn new(client: &'a GhlClient) -> Self {
        Self { client }
    }

    pub async fn search(&self, filter: &OpportunityFilter) -> Result<Vec<Opportunity>, ApiError> {
        let mut request = ApiRequest::get("/opportunities/search")
            .location(LocationParam::Query(LOCATION_ID_SNAKE));
        if filter.all {
            request = request.query("limit", 100).paginate(OPPORTUNITIES.plural);
        }
        let all: Vec<Opportunity> = OPPORTUNITIES.list(self.client, request).await?;
        Ok(filter.apply(all))
    }

    pub async fn get(&self, id: &str) -> Result<Opportunity, ApiError> {
        OPPORTUNITIES.get(self.client, id).await
    }

    pub async fn create(&self, opportunity: &NewOpportunity) -> Result<Opportunity, ApiError> {
        let location = self.client.require_location()?;
        let mut body = to_object(opportunity)?;
        if opportunity.status.trim().is_empty() {
            body.insert("status".into(), json!("open"));
        }
        body.insert("locationId".into(), json!(location.as_str()));
        OPPORTUNITIES.create(self.client, Value::Object(body)).await
    }

    pub async fn update(&self, id: &str, update: &OpportunityUpdate) -> Result<Opportunity, ApiError> {
        OPPORTUNITIES
            .update(self.client, id, Value::Object(to_object(update)?))
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        OPPORTUNITIES.delete(self.client, id).await
    }

    /// Moves the deal to another stage of its pipeline.
    pub async fn move_stage(&self, id: &str, stage_id: &str) -> Result<Opportunity, ApiError> {
        OPPORTUNITIES
            .update(self.client, id, json!({ "pipelineStageId": stage_id }))
            .await
    }

    pub async fn mark_won(&self, id: &str) -> Result<(), ApiError> {
        self.set_status(id, "won").await
    }

    pub async fn mark_lost(&self, id: &str) -> Result<(), ApiError> {
        self.set_status(id, "lost").await
    }

    async fn set_status(&self, id: &str, status: &str) -> Result<(), ApiError> {
        let path = format!("/opportunities/{}/status", segment(id));
        self.client
            .execute(ApiRequest::put(path).json(json!({ "status": status })))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client, ok, FakeTransport};

    fn opp(id: &str, contact: &str, stage: &str, status: &str) -> Value {
        json!({"id": id, "name": id, "contactId": contact, "pipelineId": "p1", "pipelineStageId": stage, "status": status})
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_uses_snake_case_location_and_filters_locally() {
        let transport = FakeTransport::new(vec![ok(json!({"opportunities": [
            opp("o1", "c1", "s1", "open"),
            opp("o2", "c2", "s1", "OPEN"),
            opp("o3", "c1", "s2", "won"),
            opp("o4", "c1", "s1", "open"),
        ]}))]);
        let client = client(transport.clone());

        let filter = OpportunityFilter {
            contact_id: Some("c1".into()),
            status: Some("open".into()),
            ..OpportunityFilter::default()
        };
        let found = client.opportunities().search(&filter).await.unwrap();

        assert_eq!(transport.request_line(0), "GET /opportunities/search?location_id=loc1");
        assert_eq!(found.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(), ["o1", "o4"]);
    }

    #[test]
    fn test_filter_window_applies_after_matching() {
        let all: Vec<Opportunity> = (0..5)
            .map(|i| serde_json::from_value(opp(&format!("o{i}"), "c1", "s1", "open")).unwrap())
            .collect();
        let filter = OpportunityFilter {
            skip: 1,
            limit: 2,
            ..OpportunityFilter::default()
        };
        let window = filter.apply(all);
        assert_eq!(window.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(), ["o1", "o2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_defaults_status_and_adds_location() {
        let transport = FakeTransport::new(vec![ok(json!({"opportunity": {"id": "o9", "name": "Deal"}}))]);
        let client = client(transport.clone());

        client
            .opportunities()
            .create(&NewOpportunity {
                contact_id: "c1".into(),
                pipeline_id: "p1".into(),
                stage_id: "s1".into(),
                name: "Deal".into(),
                monetary_value: Some(1000.0),
                ..NewOpportunity::default()
            })
            .await
            .unwrap();

        assert_eq!(
            transport.body(0),
            Some(json!({
                "contactId": "c1", "pipelineId": "p1", "pipelineStageId": "s1",
                "name": "Deal", "status": "open", "monetaryValue": 1000.0, "locationId": "loc1"
            }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_and_mark_won() {
        let transport = FakeTransport::new(vec![ok(json!({"opportunity": opp("o1", "c1", "s2", "open")})), ok(json!({}))]);
        let client = client(transport.clone());

        let moved = client.opportunities().move_stage("o1", "s2").await.unwrap();
        client.opportunities().mark_won("o1").await.unwrap();

        assert_eq!(moved.pipeline_stage_id.as_deref(), Some("s2"));
        assert_eq!(transport.body(0), Some(json!({"pipelineStageId": "s2"})));
        assert_eq!(transport.request_line(1), "PUT /opportunities/o1/status?locationId=loc1");
        assert_eq!(transport.body(1), Some(json!({"status": "won"})));
    }
}
