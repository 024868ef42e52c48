use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};

use serde_json::Value;

use crate::adapters::{HttpRequest, HttpResponse, Transport, TransportError};

/// Replays queued responses and records every request it receives.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    responses: RefCell<VecDeque<HttpResponse>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: impl Into<String>) -> Self {
        self.responses.borrow_mut().push_back(HttpResponse {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        });
        self
    }

    pub fn respond_json(self, body: &Value) -> Self {
        self.respond(200, body.to_string())
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(request.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| TransportError::Parse(format!("no response queued for {}", request.url)))
    }
}
