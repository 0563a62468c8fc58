//! Scripted transport for unit tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ghl_core::domain::{ApiToken, LocationId};
use serde_json::Value;

use crate::client::{ClientContext, GhlClient};
use crate::transport::{OutboundRequest, RawResponse, Transport, TransportError};

pub(crate) enum Scripted {
    Respond(RawResponse),
    Fail(TransportError),
    /// Never completes
    Hang,
}

/// Replays scripted results and records every request it receives.
#[derive(Default)]
pub(crate) struct FakeTransport {
    script: Mutex<VecDeque<Scripted>>,
    sent: Mutex<Vec<OutboundRequest>>,
}

impl FakeTransport {
    pub(crate) fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn sends(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Method and path-with-query of the `index`th request.
    pub(crate) fn request_line(&self, index: usize) -> String {
        let sent = self.sent();
        let request = &sent[index];
        let mut line = format!("{} {}", request.method, request.url.path());
        if let Some(query) = request.url.query() {
            line.push('?');
            line.push_str(query);
        }
        line
    }

    pub(crate) fn body(&self, index: usize) -> Option<Value> {
        self.sent()[index].body.clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: OutboundRequest) -> Result<RawResponse, TransportError> {
        self.sent.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Respond(raw)) => Ok(raw),
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Hang) => std::future::pending().await,
            None => panic!("FakeTransport script exhausted"),
        }
    }
}

pub(crate) fn ok(body: Value) -> Scripted {
    Scripted::Respond(RawResponse::new(200, body.to_string()))
}

pub(crate) fn status(code: u16) -> Scripted {
    Scripted::Respond(RawResponse::new(code, "{\"message\":\"boom\"}"))
}

pub(crate) fn context() -> ClientContext {
    ClientContext::new(ApiToken::new("pit-test").unwrap())
        .with_location(Some(LocationId::new("loc1").unwrap()))
        .with_base_url("https://api.example.test")
}

pub(crate) fn client(transport: Arc<FakeTransport>) -> GhlClient {
    GhlClient::with_transport(context(), transport).unwrap()
}
