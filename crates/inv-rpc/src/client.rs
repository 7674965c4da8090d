//! Client-side request lifecycle.
//!
//! A [`ClientRequest`] goes `Created → InFlight → Completed` exactly once,
//! either blocking ([`complete`](ClientRequest::complete)) or on a worker
//! thread ([`complete_async`](ClientRequest::complete_async)). On
//! completion the response handler runs first, then the completion
//! callbacks in registration order, then waiters are released.
//!
//! Asynchronous completions only hold weak references. If the request or
//! the object it was issued for is gone when the reply arrives, the reply
//! is dropped without error. There is no cancel call: dropping is
//! cancelling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};

use inv_jsonrpc::{JsonRpcError, Outcome, Request, RequestId, Response, SingleRequest, SingleResponse};
use inv_object::Object;

use crate::error::{RpcError, RpcResult};
use crate::session::ClientSession;

/// Runs on the response of a request before any completion callback.
pub type ResponseHandler = Box<dyn FnOnce(&Response) -> RpcResult<()> + Send>;

/// Runs once a request has completed, successfully or not.
pub type CompleteCallback = Box<dyn FnOnce() + Send>;

/// Handler for one entry of a batch.
pub type EntryHandler = Box<dyn FnOnce(SingleResponse) -> RpcResult<()> + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    Created,
    InFlight,
    Completed,
}

struct Progress {
    state: RequestState,
    outcome: Option<RpcResult<Response>>,
}

struct Inner {
    session: Weak<dyn ClientSession>,
    request: Request,
    handler: Mutex<Option<ResponseHandler>>,
    // `None` once the callbacks have run.
    complete_cbs: Mutex<Option<Vec<CompleteCallback>>>,
    progress: Mutex<Progress>,
    done: Condvar,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    fn finish(&self, outcome: RpcResult<Response>) {
        let outcome = match outcome {
            Ok(response) => {
                let handled = match lock(&self.handler).take() {
                    Some(handler) => handler(&response),
                    None => Ok(()),
                };
                handled.and_then(|()| error_response_as_err(response))
            }
            Err(err) => Err(err),
        };
        if let Err(err) = &outcome {
            tracing::debug!(error = %err, "client request failed");
        }

        let callbacks = lock(&self.complete_cbs).take().unwrap_or_default();
        for callback in callbacks {
            callback();
        }

        let mut progress = lock(&self.progress);
        progress.state = RequestState::Completed;
        progress.outcome = Some(outcome);
        self.done.notify_all();
    }
}

/// A single error response becomes an `Err`; batches are returned whole.
fn error_response_as_err(response: Response) -> RpcResult<Response> {
    match response {
        Response::Single(SingleResponse {
            outcome: Outcome::Error(err),
            ..
        }) => Err(JsonRpcError::Remote {
            code: err.ec,
            message: err.message,
        }
        .into()),
        other => Ok(other),
    }
}

/// One request document on its way through a [`ClientSession`].
#[derive(Clone)]
pub struct ClientRequest {
    inner: Arc<Inner>,
}

impl ClientRequest {
    pub fn new(session: &Arc<dyn ClientSession>, request: impl Into<Request>) -> Self {
        Self {
            inner: Arc::new(Inner {
                session: Arc::downgrade(session),
                request: request.into(),
                handler: Mutex::new(None),
                complete_cbs: Mutex::new(Some(Vec::new())),
                progress: Mutex::new(Progress {
                    state: RequestState::Created,
                    outcome: None,
                }),
                done: Condvar::new(),
            }),
        }
    }

    pub fn with_handler<F>(self, handler: F) -> Self
    where
        F: FnOnce(&Response) -> RpcResult<()> + Send + 'static,
    {
        *lock(&self.inner.handler) = Some(Box::new(handler));
        self
    }

    /// Register a side effect to run after the response handler. Runs
    /// immediately if the request has already completed.
    pub fn push_complete_cb<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut cbs = lock(&self.inner.complete_cbs);
        if let Some(pending) = cbs.as_mut() {
            pending.push(Box::new(callback));
            return;
        }
        drop(cbs);
        callback();
    }

    pub fn request(&self) -> &Request {
        &self.inner.request
    }

    pub fn state(&self) -> RequestState {
        lock(&self.inner.progress).state
    }

    pub fn is_completed(&self) -> bool {
        self.state() == RequestState::Completed
    }

    fn start(&self) -> RpcResult<()> {
        let mut progress = lock(&self.inner.progress);
        if progress.state != RequestState::Created {
            return Err(RpcError::InvalidUse("request was already sent".into()));
        }
        progress.state = RequestState::InFlight;
        Ok(())
    }

    /// Send and block until the response has been handled.
    ///
    /// An error response is returned as [`JsonRpcError::Remote`].
    pub fn complete(&self) -> RpcResult<Response> {
        self.start()?;
        let outcome = match self.inner.session.upgrade() {
            Some(session) => session.call(&self.inner.request),
            None => Err(RpcError::SessionClosed),
        };
        self.inner.finish(outcome);
        self.wait()
    }

    /// Queue the request and return at once. Use [`wait`](Self::wait) or a
    /// completion callback to learn the outcome.
    pub fn complete_async(&self) -> RpcResult<()> {
        self.start()?;
        let Some(session) = self.inner.session.upgrade() else {
            self.inner.finish(Err(RpcError::SessionClosed));
            return Err(RpcError::SessionClosed);
        };
        let weak = Arc::downgrade(&self.inner);
        let sent = session.call_async(
            self.inner.request.clone(),
            Box::new(move |outcome| match weak.upgrade() {
                Some(inner) => inner.finish(outcome),
                None => tracing::debug!("reply dropped: client request no longer exists"),
            }),
        );
        if let Err(err) = sent {
            self.inner.finish(Err(RpcError::Transport(err.to_string())));
            return Err(err);
        }
        Ok(())
    }

    /// Block until completion and take the outcome. The outcome can be taken
    /// once.
    pub fn wait(&self) -> RpcResult<Response> {
        let mut progress = lock(&self.inner.progress);
        if progress.state == RequestState::Created {
            return Err(RpcError::InvalidUse("request was never sent".into()));
        }
        while progress.state != RequestState::Completed {
            progress = self
                .inner
                .done
                .wait(progress)
                .unwrap_or_else(PoisonError::into_inner);
        }
        progress
            .outcome
            .take()
            .unwrap_or_else(|| Err(RpcError::InvalidUse("outcome was already taken".into())))
    }
}

/// Several calls sent as one batch document, each with its own handler.
pub struct BatchClientRequest {
    session: Weak<dyn ClientSession>,
    requests: Vec<SingleRequest>,
    handlers: HashMap<RequestId, EntryHandler>,
}

impl BatchClientRequest {
    pub fn new(session: &Arc<dyn ClientSession>) -> Self {
        Self {
            session: Arc::downgrade(session),
            requests: Vec::new(),
            handlers: HashMap::new(),
        }
    }

    /// Add a call. Its id must be unique within the batch.
    pub fn push<F>(&mut self, request: SingleRequest, handler: F) -> RpcResult<()>
    where
        F: FnOnce(SingleResponse) -> RpcResult<()> + Send + 'static,
    {
        let Some(id) = request.id.clone() else {
            return Err(RpcError::InvalidUse("batch calls need an id; use push_notification".into()));
        };
        if self.handlers.contains_key(&id) {
            return Err(RpcError::InvalidUse(format!("duplicate request id {id} in batch")));
        }
        self.handlers.insert(id, Box::new(handler));
        self.requests.push(request);
        Ok(())
    }

    pub fn push_notification(&mut self, request: SingleRequest) {
        self.requests.push(SingleRequest { id: None, ..request });
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Turn the batch into a request whose handler hands each entry of the
    /// response to the handler registered under its id. A failing entry
    /// handler does not stop the others; the first failure is reported.
    pub fn build(self) -> RpcResult<ClientRequest> {
        if self.requests.is_empty() {
            return Err(RpcError::InvalidUse("empty batch".into()));
        }
        let session = self.session.upgrade().ok_or(RpcError::SessionClosed)?;
        let mut handlers = self.handlers;
        let request = ClientRequest::new(&session, Request::Batch(self.requests)).with_handler(
            move |response| {
                let mut first_err = None;
                for entry in response.clone().into_responses() {
                    let handler = entry.id.as_ref().and_then(|id| handlers.remove(id));
                    let Some(handler) = handler else {
                        tracing::warn!(id = ?entry.id, "batch response entry matches no request");
                        continue;
                    };
                    if let Err(err) = handler(entry) {
                        first_err.get_or_insert(err);
                    }
                }
                for id in handlers.keys() {
                    tracing::warn!(id = %id, "no response for batch entry");
                }
                first_err.map_or(Ok(()), Err)
            },
        );
        Ok(request)
    }
}

/// A value shared between its owner and in-flight async replies.
///
/// Replies hold a [`WeakShared`]. Dropping every `Shared` handle, or calling
/// [`invalidate`](Shared::invalidate), turns replies still in flight into
/// no-ops.
pub struct Shared<T> {
    value: Arc<Mutex<T>>,
    epoch: Arc<AtomicU64>,
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            epoch: self.epoch.clone(),
        }
    }
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(Mutex::new(value)),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        lock(&self.value)
    }

    pub fn downgrade(&self) -> WeakShared<T> {
        WeakShared {
            value: Arc::downgrade(&self.value),
            epoch: self.epoch.clone(),
            seen: self.epoch.load(Ordering::Acquire),
        }
    }

    /// Disown every reply issued so far.
    pub fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

/// Reply-side handle to a [`Shared`] value.
pub struct WeakShared<T> {
    value: Weak<Mutex<T>>,
    epoch: Arc<AtomicU64>,
    seen: u64,
}

impl<T> WeakShared<T> {
    /// The value, unless it was dropped or invalidated since this handle was
    /// taken.
    pub fn upgrade(&self) -> Option<Shared<T>> {
        if self.epoch.load(Ordering::Acquire) != self.seen {
            return None;
        }
        self.value.upgrade().map(|value| Shared {
            value,
            epoch: self.epoch.clone(),
        })
    }
}

fn apply_get_reply(target: &WeakShared<Object>, response: SingleResponse) -> RpcResult<()> {
    let repr = response.into_result()?;
    match target.upgrade() {
        Some(object) => Ok(object.lock().apply_repr_response(&repr)?),
        None => {
            tracing::debug!("reply dropped: object no longer exists");
            Ok(())
        }
    }
}

impl Shared<Object> {
    /// Fetch the object's stored state and fold it in when the reply
    /// arrives. Keep the returned request alive until it completes.
    pub fn get_async(&self, session: &Arc<dyn ClientSession>) -> RpcResult<ClientRequest> {
        let request = self.lock().build_get_request()?;
        let target = self.downgrade();
        let client = ClientRequest::new(session, request).with_handler(move |response| {
            match response {
                Response::Single(single) => apply_get_reply(&target, single.clone()),
                Response::Batch(_) => {
                    Err(JsonRpcError::InvalidResponse("batch reply to a single call".into()).into())
                }
            }
        });
        client.complete_async()?;
        Ok(client)
    }

    /// Blocking [`get_async`](Self::get_async).
    pub fn get(&self, session: &Arc<dyn ClientSession>) -> RpcResult<()> {
        self.get_async(session)?.wait().map(|_| ())
    }
}

/// Several shared objects fetched with one batch.
pub struct SharedVec<T> {
    items: Vec<Shared<T>>,
}

impl<T> Default for SharedVec<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> SharedVec<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: Shared<T>) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[Shared<T>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> FromIterator<Shared<T>> for SharedVec<T> {
    fn from_iter<I: IntoIterator<Item = Shared<T>>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl SharedVec<Object> {
    /// Fetch every object in one batch; each reply lands in its own object.
    pub fn get_async(&self, session: &Arc<dyn ClientSession>) -> RpcResult<ClientRequest> {
        let mut batch = BatchClientRequest::new(session);
        for item in &self.items {
            let request = item.lock().build_get_request()?;
            let target = item.downgrade();
            batch.push(request, move |response| apply_get_reply(&target, response))?;
        }
        let client = batch.build()?;
        client.complete_async()?;
        Ok(client)
    }
}
