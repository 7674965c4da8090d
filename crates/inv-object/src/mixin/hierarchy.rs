use std::collections::BTreeSet;

use inv_store::{LockDomain, StoreContext};
use inv_types::{HierarchyDownKey, HierarchyUpKey, IndexKey, Key};
use serde_json::{json, Value};

use crate::delta::DeltaSet;
use crate::error::{ObjectError, ObjectResult};
use crate::mixin::{no_such_method, ok, MethodSpec, Mixin, Target};
use crate::params::path_list;

const METHODS: &[MethodSpec] = &[MethodSpec::write("update"), MethodSpec::list("list")];

/// Parent/child tree (`hierarchical`).
///
/// A node has at most one parent, stored under its up key, and any number
/// of children, each stored as a down key under the parent. Re-parenting a
/// child leaves a stale down key under the old parent; those are collected
/// in a dangling set and deleted last in the commit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Hierarchy {
    up: Option<IndexKey>,
    up_dirty: bool,
    down: DeltaSet<IndexKey>,
    dangling: BTreeSet<HierarchyDownKey>,
}

impl Hierarchy {
    pub fn up_id(&self) -> Option<&IndexKey> {
        self.up.as_ref()
    }

    /// Point this node at a new parent, returning the previous one.
    pub fn set_up(&mut self, parent: Option<IndexKey>) -> Option<IndexKey> {
        self.up_dirty = true;
        std::mem::replace(&mut self.up, parent)
    }

    pub fn clear_up(&mut self) {
        self.set_up(None);
    }

    /// Stage removal of every child.
    pub fn clear_down(&mut self) {
        self.down.clear();
    }

    pub fn down_ids(&self) -> &BTreeSet<IndexKey> {
        self.down.items()
    }

    pub fn add_down(&mut self, child: IndexKey) {
        self.down.insert(child);
    }

    pub fn remove_down(&mut self, child: &IndexKey) {
        self.down.remove(child);
    }

    /// Queue deletion of a down key this node does not own.
    pub fn stage_dangling(&mut self, key: HierarchyDownKey) {
        self.dangling.insert(key);
    }

    /// Apply an `{up?, add: [..], remove: [..]}` delta, removals first.
    pub fn apply_update(&mut self, own: Option<&IndexKey>, params: &Value) -> ObjectResult<()> {
        let remove = path_list(params, "remove")?;
        let add = path_list(params, "add")?;
        let up = match params.get("up") {
            None => None,
            Some(Value::Null) => Some(None),
            Some(Value::String(p)) => Some(Some(IndexKey::parse(p)?)),
            Some(_) => return Err(ObjectError::InvalidParams("\"up\" must be a path or null".into())),
        };
        if let Some(own) = own {
            if add.contains(own) || up.as_ref().is_some_and(|u| u.as_ref() == Some(own)) {
                return Err(ObjectError::InvalidParams(format!("{own} cannot be its own parent")));
            }
        }
        if let Some(parent) = up {
            self.set_up(parent);
        }
        for child in &remove {
            self.remove_down(child);
        }
        for child in add {
            self.add_down(child);
        }
        Ok(())
    }

    fn stored_up(ctx: &StoreContext, child: &IndexKey) -> ObjectResult<Option<IndexKey>> {
        match ctx.get_str(&HierarchyUpKey::new(child).path())? {
            Some(parent) if !parent.is_empty() => Ok(Some(IndexKey::parse(&parent)?)),
            _ => Ok(None),
        }
    }

    fn commit_up(&mut self, ctx: &StoreContext, path: &IndexKey) -> ObjectResult<()> {
        let previous = Self::stored_up(ctx, path)?;
        if previous != self.up {
            if let Some(old) = &previous {
                self.dangling.insert(HierarchyDownKey::new(old, path));
            }
            if let Some(new) = &self.up {
                ctx.put(&HierarchyDownKey::new(new, path).path(), "")?;
            }
        }
        let up_key = HierarchyUpKey::new(path).path();
        match &self.up {
            Some(parent) => {
                if let Err(err) = ctx.put(&up_key, &parent.path()) {
                    if previous != self.up {
                        ctx.delete(&HierarchyDownKey::new(parent, path).path())?;
                    }
                    return Err(err.into());
                }
            }
            None => {
                ctx.delete(&up_key)?;
            }
        }
        Ok(())
    }

    /// Write both keys of a parent/child edge. If the down key is declined
    /// the child's up key is put back to `previous`.
    fn link_child(
        ctx: &StoreContext,
        parent: &IndexKey,
        child: &IndexKey,
        previous: Option<&IndexKey>,
    ) -> ObjectResult<()> {
        let up_key = HierarchyUpKey::new(child).path();
        ctx.put(&up_key, &parent.path())?;
        if let Err(err) = ctx.put(&HierarchyDownKey::new(parent, child).path(), "") {
            match previous {
                Some(old) => ctx.put(&up_key, &old.path())?,
                None => {
                    ctx.delete(&up_key)?;
                }
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn representation(&self) -> Value {
        json!({
            "up_id": self.up,
            "down_ids": self.down.items(),
        })
    }
}

impl Mixin for Hierarchy {
    fn mixin_type(&self) -> &'static str {
        "hierarchical"
    }

    fn namespace(&self) -> &'static str {
        "hierarchy"
    }

    fn methods(&self) -> &'static [MethodSpec] {
        METHODS
    }

    fn get(&mut self, ctx: &StoreContext, path: &IndexKey) -> ObjectResult<()> {
        let _lock = ctx.shared(LockDomain::Hierarchy)?;
        self.up = Self::stored_up(ctx, path)?;
        let mut children = Vec::new();
        for (key, _) in ctx.scan(&HierarchyDownKey::prefix_for(path))? {
            match HierarchyDownKey::parse(&key) {
                Ok(down) if down.parent_part() == path => children.push(down.child_part().clone()),
                _ => break,
            }
        }
        self.down.load(children);
        self.settle();
        Ok(())
    }

    fn commit(&mut self, ctx: &StoreContext, path: &IndexKey) -> ObjectResult<()> {
        let _lock = ctx.exclusive(LockDomain::Hierarchy)?;
        if self.up_dirty {
            self.commit_up(ctx, path)?;
        }

        for child in self.down.added() {
            let previous = Self::stored_up(ctx, child)?;
            if let Some(old) = &previous {
                if old != path {
                    self.dangling.insert(HierarchyDownKey::new(old, child));
                }
            }
            Self::link_child(ctx, path, child, previous.as_ref())?;
        }

        for child in self.down.removed() {
            ctx.delete(&HierarchyDownKey::new(path, child).path())?;
            if Self::stored_up(ctx, child)?.as_ref() == Some(path) {
                ctx.delete(&HierarchyUpKey::new(child).path())?;
            }
        }

        for key in &self.dangling {
            ctx.delete(&key.path())?;
        }
        self.settle();
        Ok(())
    }

    fn clear(&mut self) {
        self.clear_up();
        self.clear_down();
    }

    fn modified(&self) -> bool {
        self.up_dirty || self.down.modified() || !self.dangling.is_empty()
    }

    fn settle(&mut self) {
        self.up_dirty = false;
        self.down.settle();
        self.dangling.clear();
    }

    fn repr(&self) -> Value {
        self.representation()
    }

    fn from_repr(&mut self, fragment: &Value) -> ObjectResult<()> {
        let obj = fragment
            .as_object()
            .ok_or_else(|| ObjectError::InvalidRepr("hierarchical member is not an object".into()))?;
        let bad = |e: inv_types::KeyError| ObjectError::InvalidRepr(e.to_string());
        match obj.get("up_id") {
            None | Some(Value::Null) => {}
            Some(Value::String(p)) => {
                self.set_up(Some(IndexKey::parse(p).map_err(bad)?));
            }
            Some(_) => return Err(ObjectError::InvalidRepr("up_id is not a string".into())),
        }
        match obj.get("down_ids") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for item in items {
                    let p = item
                        .as_str()
                        .ok_or_else(|| ObjectError::InvalidRepr("down id is not a string".into()))?;
                    self.add_down(IndexKey::parse(p).map_err(bad)?);
                }
            }
            Some(_) => return Err(ObjectError::InvalidRepr("down_ids is not an array".into())),
        }
        Ok(())
    }

    fn delta(&self) -> Option<Value> {
        if !self.modified() {
            return None;
        }
        let mut delta = json!({ "add": self.down.added(), "remove": self.down.removed() });
        if self.up_dirty {
            delta["up"] = json!(self.up);
        }
        Some(delta)
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
                self.apply_update(Some(path), params)?;
                self.commit(ctx, path)?;
                Ok(ok())
            }
            "list" => Ok(self.representation()),
            other => Err(no_such_method(self.namespace(), other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::WriteBudget;

    fn key(kind: &str, id: &str) -> IndexKey {
        IndexKey::new(kind, id).unwrap()
    }

    fn loaded(ctx: &StoreContext, path: &IndexKey) -> Hierarchy {
        let mut h = Hierarchy::default();
        h.get(ctx, path).unwrap();
        h
    }

    #[test]
    fn add_child_writes_both_keys() {
        let ctx = StoreContext::in_memory();
        let parent = key("Category", "c1");
        let child = key("Item", "i1");
        let mut h = Hierarchy::default();
        h.add_down(child.clone());
        h.commit(&ctx, &parent).unwrap();

        assert!(ctx.exists("Category:c1>Item:i1").unwrap());
        assert_eq!(ctx.get_str("Item:i1<up").unwrap().as_deref(), Some("Category:c1"));
        assert_eq!(loaded(&ctx, &child).up_id(), Some(&parent));
        assert!(loaded(&ctx, &parent).down_ids().contains(&child));
    }

    #[test]
    fn declined_down_key_rolls_back_up_key() {
        let ctx = WriteBudget::context(1);
        let parent = key("Category", "c1");
        let child = key("Item", "i1");
        let mut h = Hierarchy::default();
        h.add_down(child.clone());
        assert!(h.commit(&ctx, &parent).is_err());
        assert!(!ctx.exists("Item:i1<up").unwrap());
        assert!(!ctx.exists("Category:c1>Item:i1").unwrap());
    }

    #[test]
    fn declined_up_key_rolls_back_down_key() {
        let ctx = WriteBudget::context(1);
        let parent = key("Category", "c1");
        let child = key("Item", "i1");
        let mut h = Hierarchy::default();
        h.set_up(Some(parent));
        assert!(h.commit(&ctx, &child).is_err());
        assert!(!ctx.exists("Category:c1>Item:i1").unwrap());
        assert!(!ctx.exists("Item:i1<up").unwrap());
        assert!(h.modified());
    }

    #[test]
    fn reparenting_leaves_a_single_down_key() {
        let ctx = StoreContext::in_memory();
        let p1 = key("Category", "p1");
        let p2 = key("Category", "p2");
        let child = key("Item", "c");

        let mut h1 = Hierarchy::default();
        h1.add_down(child.clone());
        h1.commit(&ctx, &p1).unwrap();

        let mut h2 = Hierarchy::default();
        h2.add_down(child.clone());
        h2.commit(&ctx, &p2).unwrap();

        assert_eq!(loaded(&ctx, &child).up_id(), Some(&p2));
        assert!(!loaded(&ctx, &p1).down_ids().contains(&child));
        assert!(loaded(&ctx, &p2).down_ids().contains(&child));
    }

    #[test]
    fn remove_child_clears_up_pointer() {
        let ctx = StoreContext::in_memory();
        let parent = key("Category", "c1");
        let child = key("Item", "i1");
        let mut h = Hierarchy::default();
        h.add_down(child.clone());
        h.commit(&ctx, &parent).unwrap();
        h.remove_down(&child);
        h.commit(&ctx, &parent).unwrap();
        assert!(ctx.scan("").unwrap().is_empty());
    }

    #[test]
    fn child_side_up_change_moves_down_key() {
        let ctx = StoreContext::in_memory();
        let p1 = key("Category", "p1");
        let p2 = key("Category", "p2");
        let child = key("Item", "c");

        let mut c = Hierarchy::default();
        c.set_up(Some(p1.clone()));
        c.commit(&ctx, &child).unwrap();
        assert!(loaded(&ctx, &p1).down_ids().contains(&child));

        c.set_up(Some(p2.clone()));
        c.commit(&ctx, &child).unwrap();
        assert!(loaded(&ctx, &p1).down_ids().is_empty());
        assert!(loaded(&ctx, &p2).down_ids().contains(&child));

        c.clear_up();
        c.commit(&ctx, &child).unwrap();
        assert!(ctx.scan("").unwrap().is_empty());
    }

    #[test]
    fn repr_roundtrip_and_validation() {
        let mut h = Hierarchy::default();
        h.set_up(Some(key("Category", "c")));
        h.add_down(key("Item", "1"));
        assert_eq!(h.repr(), json!({"up_id": "Category:c", "down_ids": ["Item:1"]}));
        let mut copy = Hierarchy::default();
        copy.from_repr(&h.repr()).unwrap();
        assert_eq!(copy.repr(), h.repr());
        assert!(copy.from_repr(&json!({"up_id": 3})).is_err());
        assert!(copy.from_repr(&json!([])).is_err());
    }

    #[test]
    fn rpc_update_rejects_self_parenting() {
        let ctx = StoreContext::in_memory();
        let node = key("Category", "c");
        let target = Target { type_name: "Category", path: Some(&node) };
        let mut h = Hierarchy::default();
        let err = h.rpc_call(&ctx, target, "update", &json!({"add": ["Category:c"]}));
        assert!(matches!(err, Err(ObjectError::InvalidParams(_))));
        let err = h.rpc_call(&ctx, target, "update", &json!({"up": "Category:c"}));
        assert!(matches!(err, Err(ObjectError::InvalidParams(_))));
    }

    #[test]
    fn delta_includes_up_only_when_changed() {
        let mut h = Hierarchy::default();
        h.add_down(key("Item", "1"));
        assert!(h.delta().unwrap().get("up").is_none());
        h.clear_up();
        assert_eq!(h.delta().unwrap()["up"], Value::Null);
        assert!(h.delta().unwrap().as_object().unwrap().contains_key("up"));
    }
}
