//! Client-side request builders.
//!
//! A remote copy of an object is kept in sync by sending `object.*` calls.
//! Updates carry only the staged deltas of each capability, one request per
//! modified capability.

use inv_jsonrpc::{RequestId, SingleRequest};
use inv_types::Key;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{ObjectError, ObjectResult};
use crate::mixin::Mixin;
use crate::object::Object;

/// Top-level RPC namespace serving objects.
pub const OBJECT_NAMESPACE: &str = "object";

impl Object {
    /// Fresh request id of the form `<object-id>:<uuid>`.
    pub fn request_id(&self) -> RequestId {
        let owner = self.id().unwrap_or(self.type_name());
        RequestId::String(format!("{owner}:{}", Uuid::new_v4()))
    }

    fn object_params(&self) -> Value {
        json!({ "type": self.type_name(), "id": self.id().unwrap_or("") })
    }

    fn object_request(&self, method: &str, params: Value) -> SingleRequest {
        SingleRequest::new(
            self.request_id(),
            format!("{OBJECT_NAMESPACE}.{method}"),
            params,
        )
    }

    pub fn build_get_request(&self) -> ObjectResult<SingleRequest> {
        self.path()?;
        Ok(self.object_request("repr.get", self.object_params()))
    }

    pub fn build_create_request(&self) -> SingleRequest {
        self.object_request(
            "repr.create",
            json!({ "type": self.type_name(), "repr": self.repr() }),
        )
    }

    pub fn build_remove_request(&self) -> ObjectResult<SingleRequest> {
        self.path()?;
        Ok(self.object_request("remove", self.object_params()))
    }

    /// One `<namespace>.update` request per capability with staged deltas.
    pub fn build_update_requests(&self) -> ObjectResult<Vec<SingleRequest>> {
        let path = self.path()?;
        let rosters = std::iter::once(self.modes() as &dyn Mixin).chain(self.mixins());
        let mut requests = Vec::new();
        for mixin in rosters {
            let Some(mut delta) = mixin.delta() else { continue };
            if let Some(params) = delta.as_object_mut() {
                params.insert("type".into(), Value::from(path.type_part()));
                params.insert("id".into(), Value::from(path.id_part()));
            }
            requests.push(self.object_request(&format!("{}.update", mixin.namespace()), delta));
        }
        tracing::debug!(path = %path.path(), count = requests.len(), "update requests built");
        Ok(requests)
    }

    /// Replace the in-memory state with a `repr.get` result.
    pub fn apply_repr_response(&mut self, repr: &Value) -> ObjectResult<()> {
        let mut fresh = Object::new(self.schema().clone());
        fresh.from_repr(repr)?;
        if fresh.id().is_none() {
            return Err(ObjectError::InvalidRepr("response repr has no id".into()));
        }
        fresh.settle();
        *self = fresh;
        Ok(())
    }
}
