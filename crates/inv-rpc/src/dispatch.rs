//! Top-level routing of calls to namespace handlers.
//!
//! The first segment of a method name picks a handler; the handler sees the
//! rest of the path. `object.attribute.set` reaches the [`ObjectHandler`]
//! with `attribute.set` left to route.

use std::collections::BTreeMap;
use std::sync::Arc;

use inv_jsonrpc::{JsonRpcError, Namespace, SingleRequest};
use inv_object::{Caller, Datamodel, ObjectError, OBJECT_NAMESPACE};
use inv_store::StoreContext;
use inv_types::Right;
use serde_json::{json, Value};

use crate::error::{RpcError, RpcResult};

/// Namespace listing types and their method rosters.
pub const DATAMODEL_NAMESPACE: &str = "datamodel";

/// Everything a handler may touch while serving one call.
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
    pub store: &'a StoreContext,
    pub model: &'a Datamodel,
    pub caller: &'a Caller,
}

/// Serves the calls below one top-level namespace.
pub trait NamespaceHandler: Send + Sync {
    fn complete(&self, call: CallContext<'_>, ns: &mut Namespace, params: &Value) -> RpcResult<Value>;
}

/// `object.*`: builds an object of `params.type` and lets it route the rest.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectHandler;

impl NamespaceHandler for ObjectHandler {
    fn complete(&self, call: CallContext<'_>, ns: &mut Namespace, params: &Value) -> RpcResult<Value> {
        let type_name = params
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::InvalidParams("missing \"type\"".into()))?;
        let mut object = call.model.create(type_name)?;
        Ok(object.rpc_call(call.store, ns, params, call.caller)?)
    }
}

/// `datamodel.types` and `datamodel.methods`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DatamodelHandler;

impl NamespaceHandler for DatamodelHandler {
    fn complete(&self, call: CallContext<'_>, ns: &mut Namespace, params: &Value) -> RpcResult<Value> {
        match ns.path().as_str() {
            "types" => Ok(json!(call.model.type_list())),
            "methods" => {
                let type_name = params
                    .get("type")
                    .and_then(Value::as_str)
                    .ok_or_else(|| JsonRpcError::InvalidParams("missing \"type\"".into()))?;
                let methods: Vec<Value> = call
                    .model
                    .methods(type_name)?
                    .into_iter()
                    .map(|(name, spec)| {
                        json!({
                            "name": name,
                            "right": right_name(spec.right),
                            "needs_object": spec.needs_object,
                        })
                    })
                    .collect();
                Ok(Value::Array(methods))
            }
            _ => Err(ObjectError::NoSuchMethod(ns.full_path()).into()),
        }
    }
}

fn right_name(right: Right) -> &'static str {
    match right {
        Right::Read => "read",
        Right::Write => "write",
        Right::List => "list",
    }
}

/// Routes validated requests to namespace handlers.
pub struct Dispatcher {
    store: Arc<StoreContext>,
    model: Arc<Datamodel>,
    handlers: BTreeMap<String, Arc<dyn NamespaceHandler>>,
    fallback: Option<Arc<dyn NamespaceHandler>>,
    enforce_acl: bool,
}

impl Dispatcher {
    /// Dispatcher serving the `object` and `datamodel` namespaces.
    pub fn new(store: Arc<StoreContext>, model: Arc<Datamodel>) -> Self {
        let mut handlers: BTreeMap<String, Arc<dyn NamespaceHandler>> = BTreeMap::new();
        handlers.insert(OBJECT_NAMESPACE.to_string(), Arc::new(ObjectHandler));
        handlers.insert(DATAMODEL_NAMESPACE.to_string(), Arc::new(DatamodelHandler));
        Self {
            store,
            model,
            handlers,
            fallback: None,
            enforce_acl: false,
        }
    }

    pub fn with_handler(mut self, namespace: impl Into<String>, handler: Arc<dyn NamespaceHandler>) -> Self {
        self.handlers.insert(namespace.into(), handler);
        self
    }

    /// Handler that gets the full, rewound method path when routing misses.
    pub fn with_fallback(mut self, handler: Arc<dyn NamespaceHandler>) -> Self {
        self.fallback = Some(handler);
        self
    }

    pub fn with_enforce_acl(mut self, enforce: bool) -> Self {
        self.enforce_acl = enforce;
        self
    }

    pub fn store(&self) -> &Arc<StoreContext> {
        &self.store
    }

    pub fn model(&self) -> &Arc<Datamodel> {
        &self.model
    }

    pub fn namespaces(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Caller record for a session identified by `handle`.
    pub fn caller(&self, handle: Option<&str>) -> Caller {
        Caller {
            handle: handle.map(str::to_string),
            enforce: self.enforce_acl,
        }
    }

    /// Run one call and return its result value.
    pub fn dispatch(&self, request: &SingleRequest, caller: &Caller) -> RpcResult<Value> {
        let call = CallContext {
            store: &self.store,
            model: &self.model,
            caller,
        };
        let mut ns = Namespace::new(&request.method);
        let Some(first) = ns.pop() else {
            return Err(JsonRpcError::InvalidRequest("empty method".into()).into());
        };
        tracing::debug!(method = %request.method, namespace = %first, "dispatching");

        let routed = match self.handlers.get(&first) {
            Some(handler) => handler.complete(call, &mut ns, &request.params),
            None => Err(RpcError::NoSuchNamespace(first)),
        };
        match (routed, &self.fallback) {
            (Err(err), Some(fallback)) if is_routing_miss(&err) => {
                tracing::debug!(method = %request.method, "retrying with fallback handler");
                ns.rewind();
                fallback.complete(call, &mut ns, &request.params)
            }
            (routed, _) => routed,
        }
    }
}

fn is_routing_miss(err: &RpcError) -> bool {
    matches!(
        err,
        RpcError::NoSuchNamespace(_) | RpcError::Object(ObjectError::NoSuchMethod(_))
    )
}
