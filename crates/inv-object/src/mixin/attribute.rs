use std::collections::{BTreeMap, BTreeSet};

use inv_store::{LockDomain, StoreContext};
use inv_types::{validate_token, AttributeKey, IndexKey, Key};
use serde_json::{json, Map, Value};

use crate::error::{ObjectError, ObjectResult};
use crate::mixin::{no_such_method, ok, MethodSpec, Mixin, Target};
use crate::params::{required_str, str_list};

const METHODS: &[MethodSpec] = &[
    MethodSpec::list("list"),
    MethodSpec::read("get"),
    MethodSpec::write("set"),
    MethodSpec::write("remove"),
    MethodSpec::write("update"),
    MethodSpec::read("repr.get"),
];

/// String-keyed, string-valued attributes (`kv`).
///
/// A missing attribute reads as the empty string. Commits apply removals
/// before writes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeStore {
    values: BTreeMap<String, String>,
    changed: BTreeSet<String>,
    removed: BTreeSet<String>,
}

impl AttributeStore {
    pub fn attribute(&self, name: &str) -> &str {
        self.values.get(name).map_or("", String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> ObjectResult<()> {
        let name = name.into();
        validate_token(&name)?;
        self.removed.remove(&name);
        self.changed.insert(name.clone());
        self.values.insert(name, value.into());
        Ok(())
    }

    pub fn remove(&mut self, name: &str) {
        self.values.remove(name);
        self.changed.remove(name);
        self.removed.insert(name.to_string());
    }

    /// Apply a `{set: {..}, remove: [..]}` delta, removals first.
    pub fn apply_update(&mut self, params: &Value) -> ObjectResult<()> {
        for name in str_list(params, "remove")? {
            self.remove(&name);
        }
        match params.get("set") {
            None | Some(Value::Null) => {}
            Some(Value::Object(pairs)) => {
                for (name, value) in pairs {
                    let value = value.as_str().ok_or_else(|| {
                        ObjectError::InvalidParams(format!("attribute {name:?} is not a string"))
                    })?;
                    self.set(name.as_str(), value)?;
                }
            }
            Some(_) => return Err(ObjectError::InvalidParams("\"set\" must be an object".into())),
        }
        Ok(())
    }
}

impl Mixin for AttributeStore {
    fn mixin_type(&self) -> &'static str {
        "kv"
    }

    fn namespace(&self) -> &'static str {
        "attribute"
    }

    fn methods(&self) -> &'static [MethodSpec] {
        METHODS
    }

    fn get(&mut self, ctx: &StoreContext, path: &IndexKey) -> ObjectResult<()> {
        let _lock = ctx.shared(LockDomain::Attributes)?;
        self.values.clear();
        for (key, value) in ctx.scan(&AttributeKey::prefix_for(path))? {
            match AttributeKey::parse(&key) {
                Ok(attr) if attr.container_part() == path => {
                    self.values.insert(attr.attribute_part().to_string(), value);
                }
                _ => break,
            }
        }
        self.settle();
        Ok(())
    }

    fn commit(&mut self, ctx: &StoreContext, path: &IndexKey) -> ObjectResult<()> {
        let _lock = ctx.exclusive(LockDomain::Attributes)?;
        for name in &self.removed {
            ctx.delete(&AttributeKey::new(path, name.as_str())?.path())?;
        }
        for name in &self.changed {
            if let Some(value) = self.values.get(name) {
                ctx.put(&AttributeKey::new(path, name.as_str())?.path(), value)?;
            }
        }
        self.settle();
        Ok(())
    }

    fn clear(&mut self) {
        let names: Vec<String> = self.values.keys().cloned().collect();
        for name in names {
            self.remove(&name);
        }
    }

    fn modified(&self) -> bool {
        !self.changed.is_empty() || !self.removed.is_empty()
    }

    fn settle(&mut self) {
        self.changed.clear();
        self.removed.clear();
    }

    fn repr(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                .collect::<Map<_, _>>(),
        )
    }

    fn from_repr(&mut self, fragment: &Value) -> ObjectResult<()> {
        let pairs = fragment
            .as_object()
            .ok_or_else(|| ObjectError::InvalidRepr("kv member is not an object".into()))?;
        for (name, value) in pairs {
            let value = value
                .as_str()
                .ok_or_else(|| ObjectError::InvalidRepr(format!("kv value of {name:?} is not a string")))?;
            self.set(name.as_str(), value)
                .map_err(|e| ObjectError::InvalidRepr(e.to_string()))?;
        }
        Ok(())
    }

    fn delta(&self) -> Option<Value> {
        if !self.modified() {
            return None;
        }
        let set: Map<String, Value> = self
            .changed
            .iter()
            .filter_map(|k| self.values.get(k).map(|v| (k.clone(), Value::from(v.as_str()))))
            .collect();
        Some(json!({ "set": set, "remove": self.removed }))
    }

    fn rpc_call(
        &mut self,
        ctx: &StoreContext,
        target: Target<'_>,
        method: &str,
        params: &Value,
    ) -> ObjectResult<Value> {
        let path = target.path()?;
        match method {
            "list" => Ok(json!(self.values.keys().collect::<Vec<_>>())),
            "get" => Ok(Value::from(self.attribute(required_str(params, "key")?))),
            "set" => {
                let name = required_str(params, "key")?;
                let value = required_str(params, "value")?;
                self.set(name, value)?;
                self.commit(ctx, path)?;
                Ok(ok())
            }
            "remove" => {
                self.remove(required_str(params, "key")?);
                self.commit(ctx, path)?;
                Ok(ok())
            }
            "update" => {
                self.apply_update(params)?;
                self.commit(ctx, path)?;
                Ok(ok())
            }
            "repr.get" => Ok(self.repr()),
            other => Err(no_such_method(self.namespace(), other)),
        }
    }
}
