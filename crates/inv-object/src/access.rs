//! Per-object access control.
//!
//! Each object carries a map from caller handle to [`Mode`]. A handle's own
//! entry is tested in the user class; the [`ANY_HANDLE`] entry stands for
//! everybody and is tested in the other class.
//!
//! Callers carry no group membership, so the group class is stored and
//! round-trips through `mode.update` and `repr` but never grants access.

use std::collections::{BTreeMap, BTreeSet};

use inv_store::{LockDomain, StoreContext};
use inv_types::{validate_handle, IndexKey, Key, Mode, ModeKey, Ownership, Right};
use serde_json::{json, Value};

use crate::error::{ObjectError, ObjectResult};
use crate::mixin::{no_such_method, ok, MethodSpec, Mixin, Target};
use crate::params::{required_str, str_list};

/// Handle whose entry applies to every caller.
pub const ANY_HANDLE: &str = "*";

const METHODS: &[MethodSpec] = &[MethodSpec::write("update"), MethodSpec::read("list")];

/// Who is calling, as seen by the object layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Caller {
    pub handle: Option<String>,
    /// When false every call is allowed.
    pub enforce: bool,
}

impl Caller {
    /// A trusted in-process caller.
    pub fn local() -> Self {
        Self::default()
    }

    pub fn with_handle(handle: impl Into<String>, enforce: bool) -> Self {
        Self {
            handle: Some(handle.into()),
            enforce,
        }
    }
}

/// Handle to mode map of one object (`modes`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessControl {
    entries: BTreeMap<String, Mode>,
    changed: BTreeSet<String>,
    removed: BTreeSet<String>,
}

impl AccessControl {
    pub fn mode(&self, handle: &str) -> Option<Mode> {
        self.entries.get(handle).copied()
    }

    pub fn entries(&self) -> &BTreeMap<String, Mode> {
        &self.entries
    }

    pub fn set_mode(&mut self, handle: impl Into<String>, mode: Mode) -> ObjectResult<()> {
        let handle = handle.into();
        validate_handle(&handle)?;
        self.removed.remove(&handle);
        self.changed.insert(handle.clone());
        self.entries.insert(handle, mode);
        Ok(())
    }

    pub fn remove_mode(&mut self, handle: &str) {
        self.entries.remove(handle);
        self.changed.remove(handle);
        self.removed.insert(handle.to_string());
    }

    /// Test one right for `handle`. An absent entry denies.
    pub fn access(&self, handle: &str, owner: Ownership, right: Right) -> bool {
        self.mode(handle).is_some_and(|m| m.access(owner, right))
    }

    /// Whether `caller` may exercise `right` on this object.
    pub fn permits(&self, caller: &Caller, right: Right) -> bool {
        if !caller.enforce {
            return true;
        }
        let own = caller
            .handle
            .as_deref()
            .is_some_and(|h| self.access(h, Ownership::User, right));
        own || self.access(ANY_HANDLE, Ownership::Other, right)
    }

    pub fn authorize(&self, caller: &Caller, path: &str, right: Right) -> ObjectResult<()> {
        if self.permits(caller, right) {
            Ok(())
        } else {
            tracing::debug!(path, ?right, handle = ?caller.handle, "access denied");
            Err(ObjectError::AccessDenied {
                path: path.to_string(),
                right,
            })
        }
    }

    /// Apply an `{add: [{handle, mode}], remove: [handle]}` delta, removals
    /// first.
    pub fn apply_update(&mut self, params: &Value) -> ObjectResult<()> {
        for handle in str_list(params, "remove")? {
            self.remove_mode(&handle);
        }
        match params.get("add") {
            None | Some(Value::Null) => {}
            Some(Value::Array(entries)) => {
                for entry in entries {
                    let handle = required_str(entry, "handle")?;
                    let mode = required_str(entry, "mode")?
                        .parse::<Mode>()
                        .map_err(|e| ObjectError::InvalidParams(e.to_string()))?;
                    self.set_mode(handle, mode)?;
                }
            }
            Some(_) => return Err(ObjectError::InvalidParams("\"add\" must be an array".into())),
        }
        Ok(())
    }
}

impl Mixin for AccessControl {
    fn mixin_type(&self) -> &'static str {
        "modes"
    }

    fn namespace(&self) -> &'static str {
        "mode"
    }

    fn methods(&self) -> &'static [MethodSpec] {
        METHODS
    }

    fn get(&mut self, ctx: &StoreContext, path: &IndexKey) -> ObjectResult<()> {
        let _lock = ctx.shared(LockDomain::Modes)?;
        self.entries.clear();
        for (key, value) in ctx.scan(&ModeKey::prefix_for(path))? {
            let Ok(entry) = ModeKey::parse(&key) else { break };
            if entry.object_part() != path {
                break;
            }
            let mode = Mode::from_stored(&value)?;
            self.entries.insert(entry.handle_part().to_string(), mode);
        }
        self.settle();
        Ok(())
    }

    fn commit(&mut self, ctx: &StoreContext, path: &IndexKey) -> ObjectResult<()> {
        let _lock = ctx.exclusive(LockDomain::Modes)?;
        for handle in &self.removed {
            ctx.delete(&ModeKey::new(path, handle.as_str())?.path())?;
        }
        for handle in &self.changed {
            if let Some(mode) = self.entries.get(handle) {
                ctx.put(&ModeKey::new(path, handle.as_str())?.path(), &mode.to_stored())?;
            }
        }
        self.settle();
        Ok(())
    }

    fn clear(&mut self) {
        let handles: Vec<String> = self.entries.keys().cloned().collect();
        for handle in handles {
            self.remove_mode(&handle);
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
        Value::Array(
            self.entries
                .iter()
                .map(|(handle, mode)| json!({ "handle": handle, "mode": mode }))
                .collect(),
        )
    }

    fn from_repr(&mut self, fragment: &Value) -> ObjectResult<()> {
        let entries = fragment
            .as_array()
            .ok_or_else(|| ObjectError::InvalidRepr("modes member is not an array".into()))?;
        for entry in entries {
            let handle = entry
                .get("handle")
                .and_then(Value::as_str)
                .ok_or_else(|| ObjectError::InvalidRepr("mode entry without handle".into()))?;
            let mode = entry
                .get("mode")
                .and_then(Value::as_str)
                .ok_or_else(|| ObjectError::InvalidRepr("mode entry without mode".into()))?
                .parse::<Mode>()
                .map_err(|e| ObjectError::InvalidRepr(e.to_string()))?;
            self.set_mode(handle, mode)
                .map_err(|e| ObjectError::InvalidRepr(e.to_string()))?;
        }
        Ok(())
    }

    fn delta(&self) -> Option<Value> {
        if !self.modified() {
            return None;
        }
        let add: Vec<Value> = self
            .changed
            .iter()
            .filter_map(|h| self.entries.get(h).map(|m| json!({ "handle": h, "mode": m })))
            .collect();
        Some(json!({ "add": add, "remove": self.removed }))
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
            "update" => {
                self.apply_update(params)?;
                self.commit(ctx, path)?;
                Ok(ok())
            }
            "list" => Ok(self.repr()),
            other => Err(no_such_method(self.namespace(), other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> IndexKey {
        IndexKey::new("Item", "1").unwrap()
    }

    #[test]
    fn absent_handle_is_denied() {
        let acl = AccessControl::default();
        assert!(!acl.access("alice", Ownership::User, Right::Read));
    }

    #[test]
    fn enforcement_uses_user_and_other_classes() {
        let mut acl = AccessControl::default();
        acl.set_mode("alice", "700".parse().unwrap()).unwrap();
        acl.set_mode(ANY_HANDLE, "004".parse().unwrap()).unwrap();

        let alice = Caller::with_handle("alice", true);
        let bob = Caller::with_handle("bob", true);
        let anonymous = Caller { handle: None, enforce: true };

        assert!(acl.permits(&alice, Right::Write));
        assert!(acl.permits(&bob, Right::Read));
        assert!(!acl.permits(&bob, Right::Write));
        assert!(acl.permits(&anonymous, Right::Read));
        assert!(!acl.permits(&anonymous, Right::List));
        assert!(acl.permits(&Caller::local(), Right::Write));
        assert!(matches!(
            acl.authorize(&bob, "Item:1", Right::Write),
            Err(ObjectError::AccessDenied { right: Right::Write, .. })
        ));
    }

    #[test]
    fn group_class_grants_nothing() {
        let mut acl = AccessControl::default();
        acl.set_mode("alice", "070".parse().unwrap()).unwrap();
        acl.set_mode(ANY_HANDLE, "070".parse().unwrap()).unwrap();
        let alice = Caller::with_handle("alice", true);
        for right in [Right::Read, Right::Write, Right::List] {
            assert!(!acl.permits(&alice, right));
        }
        assert!(acl.access("alice", Ownership::Group, Right::Read));
        assert_eq!(acl.repr()[0]["mode"], json!("070"));
    }

    #[test]
    fn commit_then_get() {
        let ctx = StoreContext::in_memory();
        let mut acl = AccessControl::default();
        acl.set_mode("CN=alice,O=shop.example", Mode::OWNER).unwrap();
        acl.commit(&ctx, &item()).unwrap();
        assert_eq!(ctx.get_str("Item:1|CN=alice,O=shop.example").unwrap().as_deref(), Some("7"));

        let mut loaded = AccessControl::default();
        loaded.get(&ctx, &item()).unwrap();
        assert_eq!(loaded.mode("CN=alice,O=shop.example"), Some(Mode::OWNER));
    }

    #[test]
    fn removals_apply_before_additions() {
        let ctx = StoreContext::in_memory();
        let mut acl = AccessControl::default();
        acl.set_mode("alice", Mode::OWNER).unwrap();
        acl.commit(&ctx, &item()).unwrap();
        acl.apply_update(&json!({
            "remove": ["alice"],
            "add": [{"handle": "alice", "mode": "740"}]
        }))
        .unwrap();
        acl.commit(&ctx, &item()).unwrap();
        assert_eq!(ctx.get_str("Item:1|alice").unwrap().as_deref(), Some("39"));
    }

    #[test]
    fn handles_reject_mode_separator() {
        let mut acl = AccessControl::default();
        assert!(acl.set_mode("a|b", Mode::OWNER).is_err());
        assert!(acl.set_mode("", Mode::OWNER).is_err());
    }

    #[test]
    fn repr_and_delta() {
        let mut acl = AccessControl::default();
        acl.set_mode("alice", "740".parse().unwrap()).unwrap();
        assert_eq!(acl.repr(), json!([{"handle": "alice", "mode": "740"}]));
        assert_eq!(
            acl.delta().unwrap(),
            json!({"add": [{"handle": "alice", "mode": "740"}], "remove": []})
        );
        let mut copy = AccessControl::default();
        copy.from_repr(&acl.repr()).unwrap();
        assert_eq!(copy.entries(), acl.entries());
        assert!(copy.from_repr(&json!([{"handle": "x", "mode": "9"}])).is_err());
    }
}
