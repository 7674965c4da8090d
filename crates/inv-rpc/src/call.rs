//! Server-side processing of one request document.

use std::sync::Arc;

use inv_jsonrpc::{parse_request, ParsedRequest, RejectedRequest, Response, SingleRequest, SingleResponse};
use inv_object::Caller;

use crate::dispatch::Dispatcher;
use crate::session::ServerSession;

/// One validated call.
#[derive(Clone, Debug)]
pub struct SingleCall {
    request: SingleRequest,
}

impl SingleCall {
    pub fn new(request: SingleRequest) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &SingleRequest {
        &self.request
    }

    /// Run the call. Notifications run like any other call but yield no
    /// response.
    pub fn complete(&self, dispatcher: &Dispatcher, caller: &Caller) -> Option<SingleResponse> {
        let result = dispatcher.dispatch(&self.request, caller);
        if self.request.is_notification() {
            match result {
                Ok(_) => tracing::debug!(method = %self.request.method, "notification handled"),
                Err(err) => {
                    tracing::warn!(method = %self.request.method, error = %err, "notification failed; no response sent")
                }
            }
            return None;
        }
        let id = self.request.id.clone();
        Some(match result {
            Ok(value) => SingleResponse::success(id, value),
            Err(err) => {
                tracing::debug!(method = %self.request.method, error = %err, "call failed");
                err.to_response(id)
            }
        })
    }
}

/// A batch document. Each entry succeeds or fails on its own.
#[derive(Clone, Debug)]
pub struct BatchCall {
    entries: Vec<Result<SingleRequest, RejectedRequest>>,
}

impl BatchCall {
    pub fn new(entries: Vec<Result<SingleRequest, RejectedRequest>>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every entry in order. Entries that failed validation are answered
    /// with their error; notifications leave no entry. A batch of nothing
    /// but notifications yields no document at all.
    pub fn complete(&self, dispatcher: &Dispatcher, caller: &Caller) -> Option<Response> {
        let responses: Vec<SingleResponse> = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                Ok(request) => SingleCall::new(request.clone()).complete(dispatcher, caller),
                Err(rejected) => Some(rejected.to_response()),
            })
            .collect();
        if responses.is_empty() {
            None
        } else {
            Some(Response::Batch(responses))
        }
    }
}

/// Parse `body` and run it. `None` means nothing must be sent back.
pub fn respond(dispatcher: &Dispatcher, body: &str, caller: &Caller) -> Option<Response> {
    match parse_request(body) {
        Ok(ParsedRequest::Single(request)) => SingleCall::new(request)
            .complete(dispatcher, caller)
            .map(Response::Single),
        Ok(ParsedRequest::Batch(entries)) => BatchCall::new(entries).complete(dispatcher, caller),
        Err(err) => {
            tracing::debug!(error = %err, "rejected request document");
            Some(Response::Single(SingleResponse::from_error(None, &err)))
        }
    }
}

/// An inbound request document bound to the session that must answer it.
pub struct ServerRequest {
    body: String,
    session: Arc<dyn ServerSession>,
}

impl ServerRequest {
    pub fn new(body: impl Into<String>, session: Arc<dyn ServerSession>) -> Self {
        Self {
            body: body.into(),
            session,
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Run the document and hand whatever answer it has to the session.
    pub fn complete(&self, dispatcher: &Dispatcher) {
        let caller = dispatcher.caller(self.session.handle());
        let response = respond(dispatcher, &self.body, &caller);
        self.session.reply_async(response);
    }
}
