//! Conversations and messages

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use super::{segment, Collection};
use crate::client::{ApiRequest, GhlClient, LocationParam, LOCATION_ID};
use crate::models::{Conversation, Message};
use crate::ApiError;

pub const CONVERSATIONS: Collection = Collection {
    list_path: "/conversations/search",
    item_base: "/conversations",
    singular: "conversation",
    plural: "conversations",
    location: LocationParam::Query(LOCATION_ID),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageChannel {
    Sms,
    Email,
}

impl MessageChannel {
    /// Value of the `type` field
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Sms => "SMS",
            Self::Email => "Email",
        }
    }
}

impl fmt::Display for MessageChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

impl FromStr for MessageChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sms" => Ok(Self::Sms),
            "email" => Ok(Self::Email),
            other => Err(format!("unknown message type '{other}' (expected sms or email)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub contact_id: String,
    pub channel: MessageChannel,
    pub message: String,
    /// Email only
    pub subject: Option<String>,
}

impl OutboundMessage {
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "type": self.channel.as_api_str(),
            "contactId": self.contact_id,
            "message": self.message,
        });
        if self.channel == MessageChannel::Email {
            if let Some(subject) = &self.subject {
                body["subject"] = json!(subject);
                body["html"] = json!(self.message);
            }
        }
        body
    }
}

pub struct Conversations<'a> {
    client: &'a GhlClient,
}

impl<'a> Conversations<'a> {
    pub fn new(client: &'a GhlClient) -> Self {
        Self { client }
    }

    pub async fn search(
        &self,
        contact_id: Option<&str>,
        query: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Conversation>, ApiError> {
        let request = CONVERSATIONS
            .list_request()
            .query_opt("contactId", contact_id)
            .query_opt("q", query.map(str::trim).filter(|q| !q.is_empty()))
            .query("limit", limit);
        CONVERSATIONS.list(self.client, request).await
    }

    pub async fn get(&self, id: &str) -> Result<Conversation, ApiError> {
        CONVERSATIONS.get(self.client, id).await
    }

    /// Messages of a conversation, newest first as the API orders them.
    pub async fn messages(&self, id: &str, limit: u32) -> Result<Vec<Message>, ApiError> {
        let path = format!("/conversations/{}/messages", segment(id));
        let response = self
            .client
            .execute(ApiRequest::get(path).without_location().query("limit", limit))
            .await?;
        // Newer API versions nest the page: {"messages": {"messages": [...], "nextPage": ..}}
        if let Some(Value::Object(page)) = response.field("messages") {
            let records = page.get("messages").cloned().unwrap_or(Value::Null);
            return serde_json::from_value::<Option<Vec<Message>>>(records)
                .map(Option::unwrap_or_default)
                .map_err(|e| ApiError::InvalidResponse(format!("'messages' record: {e}")));
        }
        response.decode_records("messages")
    }

    /// Sends an SMS or email; returns the raw response (message and
    /// conversation ids).
    pub async fn send(&self, message: &OutboundMessage) -> Result<Value, ApiError> {
        let response = self
            .client
            .execute(
                ApiRequest::post("/conversations/messages")
                    .json(message.to_body())
                    .without_location(),
            )
            .await?;
        Ok(response.into_value())
    }
}
