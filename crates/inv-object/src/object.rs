use std::sync::Arc;

use inv_jsonrpc::Namespace;
use inv_store::{LockDomain, StoreContext};
use inv_types::{HierarchyDownKey, IndexKey, Key, Mode, Right};
use serde_json::{Map, Value};

use crate::access::{AccessControl, Caller};
use crate::datamodel::Datamodel;
use crate::error::{ObjectError, ObjectResult};
use crate::id::generate_unique;
use crate::mixin::{
    ok, Association, AttributeStore, Capability, Hierarchy, MethodSpec, Mixin, MixinSlot, Target,
};
use crate::params::optional_str;
use crate::schema::{Kind, Schema};

/// Methods every object answers before any capability is consulted.
pub const OBJECT_METHODS: &[MethodSpec] = &[
    MethodSpec::read("repr.get"),
    MethodSpec::unbound("repr.create", Right::Write),
    MethodSpec::write("remove"),
    MethodSpec::write("clear"),
];

/// One record: an identity plus the capabilities its [`Schema`] declares.
///
/// Nothing touches storage until [`Object::get`], [`Object::commit`],
/// [`Object::create`] or [`Object::remove`] is called; in between, every
/// capability accumulates deltas in memory.
#[derive(Clone, Debug)]
pub struct Object {
    schema: Arc<Schema>,
    id: Option<String>,
    generated: bool,
    persisted: bool,
    modes: AccessControl,
    mixins: Vec<MixinSlot>,
}

impl Object {
    pub fn new(schema: Arc<Schema>) -> Self {
        let mixins = schema.capabilities().iter().map(|c| c.instantiate()).collect();
        Self {
            schema,
            id: None,
            generated: false,
            persisted: false,
            modes: AccessControl::default(),
            mixins,
        }
    }

    /// Fresh, unsaved instance of a compile-time kind.
    pub fn of<K: Kind>() -> Self {
        Self::new(K::schema())
    }

    /// Load an object that must already exist.
    pub fn fetch(schema: Arc<Schema>, ctx: &StoreContext, id: &str) -> ObjectResult<Self> {
        let mut object = Self::new(schema);
        object.assign_id(id)?;
        if !object.exists(ctx)? {
            return Err(object.no_such_object());
        }
        object.reload(ctx)?;
        Ok(object)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn type_name(&self) -> &str {
        self.schema.type_name()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Whether the current id was minted rather than assigned.
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    /// Use a caller-chosen id.
    pub fn assign_id(&mut self, id: &str) -> ObjectResult<()> {
        self.schema.ids().validate(id)?;
        self.id = Some(id.to_string());
        self.generated = false;
        self.persisted = false;
        Ok(())
    }

    /// Mint an id without consulting storage.
    pub fn generate_id(&mut self) -> &str {
        let id = self.schema.ids().generate(self.schema.type_name());
        self.generated = true;
        self.persisted = false;
        self.id.insert(id).as_str()
    }

    /// Mint an id not yet present in storage.
    pub fn generate_unique_id(&mut self, ctx: &StoreContext) -> ObjectResult<&str> {
        let id = generate_unique(self.schema.ids(), ctx, self.schema.type_name())?;
        self.generated = true;
        self.persisted = false;
        Ok(self.id.insert(id).as_str())
    }

    pub fn index_key(&self) -> Option<IndexKey> {
        let id = self.id.as_deref()?;
        IndexKey::new(self.schema.type_name(), id).ok()
    }

    pub fn path(&self) -> ObjectResult<IndexKey> {
        let id = self.id.as_deref().ok_or_else(|| self.missing_id())?;
        Ok(IndexKey::new(self.schema.type_name(), id)?)
    }

    pub fn exists(&self, ctx: &StoreContext) -> ObjectResult<bool> {
        let path = self.path()?;
        let _index = ctx.shared(LockDomain::Index)?;
        Ok(ctx.exists(&path.path())?)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Assign `id` and load every capability from storage.
    pub fn get(&mut self, ctx: &StoreContext, id: &str) -> ObjectResult<()> {
        self.assign_id(id)?;
        self.reload(ctx)
    }

    /// Reload every capability for the current id, dropping deltas.
    pub fn reload(&mut self, ctx: &StoreContext) -> ObjectResult<()> {
        let path = self.path()?;
        self.persisted = self.exists(ctx)?;
        self.modes.get(ctx, &path)?;
        for slot in &mut self.mixins {
            slot.as_mixin_mut().get(ctx, &path)?;
        }
        Ok(())
    }

    /// Write the index key if this object was never saved, then every
    /// capability's deltas.
    pub fn commit(&mut self, ctx: &StoreContext) -> ObjectResult<()> {
        let path = self.path()?;
        if !self.persisted {
            let _index = ctx.exclusive(LockDomain::Index)?;
            ctx.put(&path.path(), "")?;
            self.persisted = true;
        }
        self.commit_capabilities(ctx, &path)
    }

    /// Save a new object, minting an id first if none is set.
    pub fn create(&mut self, ctx: &StoreContext) -> ObjectResult<()> {
        if self.id.is_none() {
            self.generate_unique_id(ctx)?;
        }
        let path = self.path()?;
        {
            let _index = ctx.exclusive(LockDomain::Index)?;
            if ctx.exists(&path.path())? {
                return Err(ObjectError::ObjectExists {
                    type_name: path.type_part().to_string(),
                    id: path.id_part().to_string(),
                });
            }
            ctx.put(&path.path(), "")?;
        }
        self.persisted = true;
        tracing::debug!(%path, generated = self.generated, "object created");
        self.commit_capabilities(ctx, &path)
    }

    /// Delete everything the object holds, then its index key.
    pub fn remove(&mut self, ctx: &StoreContext) -> ObjectResult<()> {
        let path = self.path()?;
        self.clear();
        self.commit_capabilities(ctx, &path)?;
        let _index = ctx.exclusive(LockDomain::Index)?;
        ctx.delete(&path.path())?;
        self.persisted = false;
        tracing::debug!(%path, "object removed");
        Ok(())
    }

    /// Stage removal of all capability state.
    pub fn clear(&mut self) {
        self.modes.clear();
        for slot in &mut self.mixins {
            slot.as_mixin_mut().clear();
        }
    }

    pub fn modified(&self) -> bool {
        self.modes.modified() || self.mixins.iter().any(|s| s.as_mixin().modified())
    }

    /// Treat the in-memory state as committed.
    pub fn settle(&mut self) {
        self.modes.settle();
        for slot in &mut self.mixins {
            slot.as_mixin_mut().settle();
        }
    }

    fn commit_capabilities(&mut self, ctx: &StoreContext, path: &IndexKey) -> ObjectResult<()> {
        self.modes.commit(ctx, path)?;
        for slot in &mut self.mixins {
            slot.as_mixin_mut().commit(ctx, path)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Repr
    // -----------------------------------------------------------------------

    pub fn repr(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("id".into(), Value::from(self.id.as_deref().unwrap_or("")));
        doc.insert("type".into(), Value::from(self.schema.type_name()));
        doc.insert(self.modes.mixin_type().into(), self.modes.repr());
        for slot in &self.mixins {
            let mixin = slot.as_mixin();
            doc.insert(mixin.mixin_type().into(), mixin.repr());
        }
        Value::Object(doc)
    }

    /// Apply a document produced by [`Object::repr`]. An empty id leaves the
    /// id unset.
    pub fn from_repr(&mut self, doc: &Value) -> ObjectResult<()> {
        let doc = doc
            .as_object()
            .ok_or_else(|| ObjectError::InvalidRepr("repr is not an object".into()))?;

        let id = match doc.get("id") {
            Some(Value::String(id)) => id,
            Some(_) => return Err(ObjectError::InvalidRepr("id is not a string".into())),
            None => return Err(ObjectError::InvalidRepr("repr lacks \"id\" member".into())),
        };
        match doc.get("type") {
            Some(Value::String(t)) if t == self.schema.type_name() => {}
            Some(Value::String(t)) => {
                return Err(ObjectError::InvalidRepr(format!(
                    "cannot initialize {} from a {t} repr",
                    self.schema.type_name()
                )))
            }
            Some(_) => return Err(ObjectError::InvalidRepr("type is not a string".into())),
            None => return Err(ObjectError::InvalidRepr("repr lacks \"type\" member".into())),
        }
        if !id.is_empty() {
            self.assign_id(id)
                .map_err(|e| ObjectError::InvalidRepr(e.to_string()))?;
        }

        if let Some(modes) = doc.get(self.modes.mixin_type()) {
            self.modes.from_repr(modes)?;
        }
        for slot in &mut self.mixins {
            let mixin = slot.as_mixin_mut();
            match doc.get(mixin.mixin_type()) {
                Some(fragment) => mixin.from_repr(fragment)?,
                None if mixin.repr().is_null() => {}
                None => {
                    return Err(ObjectError::InvalidRepr(format!(
                        "no \"{}\" member in repr",
                        mixin.mixin_type()
                    )))
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Capability access
    // -----------------------------------------------------------------------

    pub fn modes(&self) -> &AccessControl {
        &self.modes
    }

    pub fn modes_mut(&mut self) -> &mut AccessControl {
        &mut self.modes
    }

    pub fn attributes(&self) -> ObjectResult<&AttributeStore> {
        self.mixins
            .iter()
            .find_map(|s| match s {
                MixinSlot::Attributes(m) => Some(m),
                _ => None,
            })
            .ok_or_else(|| self.missing(Capability::Attributes))
    }

    pub fn attributes_mut(&mut self) -> ObjectResult<&mut AttributeStore> {
        let err = self.missing(Capability::Attributes);
        self.mixins
            .iter_mut()
            .find_map(|s| match s {
                MixinSlot::Attributes(m) => Some(m),
                _ => None,
            })
            .ok_or(err)
    }

    pub fn association(&self) -> ObjectResult<&Association> {
        self.mixins
            .iter()
            .find_map(|s| match s {
                MixinSlot::Association(m) => Some(m),
                _ => None,
            })
            .ok_or_else(|| self.missing(Capability::Association))
    }

    pub fn association_mut(&mut self) -> ObjectResult<&mut Association> {
        let err = self.missing(Capability::Association);
        self.mixins
            .iter_mut()
            .find_map(|s| match s {
                MixinSlot::Association(m) => Some(m),
                _ => None,
            })
            .ok_or(err)
    }

    pub fn hierarchy(&self) -> ObjectResult<&Hierarchy> {
        self.mixins
            .iter()
            .find_map(|s| match s {
                MixinSlot::Hierarchy(m) => Some(m),
                _ => None,
            })
            .ok_or_else(|| self.missing(Capability::Hierarchy))
    }

    pub fn hierarchy_mut(&mut self) -> ObjectResult<&mut Hierarchy> {
        let err = self.missing(Capability::Hierarchy);
        self.mixins
            .iter_mut()
            .find_map(|s| match s {
                MixinSlot::Hierarchy(m) => Some(m),
                _ => None,
            })
            .ok_or(err)
    }

    /// Capability instances in declaration order.
    pub fn mixins(&self) -> impl Iterator<Item = &dyn Mixin> {
        self.mixins.iter().map(MixinSlot::as_mixin)
    }

    // -----------------------------------------------------------------------
    // Relationships
    // -----------------------------------------------------------------------

    /// Link two objects in memory; each side must be committed.
    pub fn associate(&mut self, other: &mut Object) -> ObjectResult<()> {
        let (own, remote) = (self.path()?, other.path()?);
        if own == remote {
            return Err(ObjectError::InvalidParams(format!("cannot associate {own} with itself")));
        }
        self.association_mut()?.insert(remote);
        other.association_mut()?.insert(own);
        Ok(())
    }

    pub fn disassociate(&mut self, other: &mut Object) -> ObjectResult<()> {
        let (own, remote) = (self.path()?, other.path()?);
        self.association_mut()?.remove(&remote);
        other.association_mut()?.remove(&own);
        Ok(())
    }

    /// Make `child` a child of this object, detaching it from any previous
    /// parent on commit.
    pub fn adopt(&mut self, child: &mut Object) -> ObjectResult<()> {
        let (own, child_path) = (self.path()?, child.path()?);
        if own == child_path {
            return Err(ObjectError::InvalidParams(format!("{own} cannot be its own parent")));
        }
        let previous = child.hierarchy_mut()?.set_up(Some(own.clone()));
        let hierarchy = self.hierarchy_mut()?;
        hierarchy.add_down(child_path.clone());
        if let Some(old) = previous.filter(|old| old != &own) {
            hierarchy.stage_dangling(HierarchyDownKey::new(&old, &child_path));
        }
        Ok(())
    }

    pub fn orphan(&mut self, child: &mut Object) -> ObjectResult<()> {
        let (own, child_path) = (self.path()?, child.path()?);
        self.hierarchy_mut()?.remove_down(&child_path);
        let child_hierarchy = child.hierarchy_mut()?;
        if child_hierarchy.up_id() == Some(&own) {
            child_hierarchy.clear_up();
        }
        Ok(())
    }

    /// Load every associated object of kind `K`.
    pub fn get_assoc_objects<K: Kind>(&self, ctx: &StoreContext) -> ObjectResult<Vec<Object>> {
        let schema = K::schema();
        self.association()?
            .assoc_ids_of(schema.type_name())
            .map(|path| -> ObjectResult<Object> {
                let mut object = Object::new(schema.clone());
                object.get(ctx, path.id_part())?;
                Ok(object)
            })
            .collect()
    }

    /// Load the parent, resolving its type through `model`.
    pub fn up(&self, ctx: &StoreContext, model: &Datamodel) -> ObjectResult<Option<Object>> {
        self.hierarchy()?
            .up_id()
            .map(|path| model.load(ctx, path))
            .transpose()
    }

    /// Load every child, resolving their types through `model`.
    pub fn down(&self, ctx: &StoreContext, model: &Datamodel) -> ObjectResult<Vec<Object>> {
        self.hierarchy()?
            .down_ids()
            .iter()
            .map(|path| model.load(ctx, path))
            .collect()
    }

    // -----------------------------------------------------------------------
    // RPC
    // -----------------------------------------------------------------------

    /// Serve one call routed to this type. `ns` holds the method path below
    /// the type, e.g. `attribute.set`.
    pub fn rpc_call(
        &mut self,
        ctx: &StoreContext,
        ns: &mut Namespace,
        params: &Value,
        caller: &Caller,
    ) -> ObjectResult<Value> {
        if let Some(id) = optional_str(params, "id")?.filter(|id| !id.is_empty()) {
            self.assign_id(id)?;
            if !self.exists(ctx)? {
                return Err(self.no_such_object());
            }
            self.reload(ctx)?;
        }

        let method = ns.path();
        if let Some(spec) = OBJECT_METHODS.iter().find(|m| m.name == method) {
            self.authorize(spec, caller)?;
            return self.object_call(ctx, spec.name, params, caller);
        }

        let Some(segment) = ns.pop() else {
            return Err(ObjectError::NoSuchMethod(method));
        };
        let rest = ns.path();
        let path = self.index_key();
        let target = Target {
            type_name: self.schema.type_name(),
            path: path.as_ref(),
        };

        if segment == self.modes.namespace() {
            if let Some(spec) = self.modes.method(&rest) {
                check(&self.modes, spec, caller, target)?;
                return self.modes.rpc_call(ctx, target, &rest, params);
            }
        }
        for slot in &mut self.mixins {
            let mixin = slot.as_mixin_mut();
            if mixin.namespace() != segment {
                continue;
            }
            if let Some(spec) = mixin.method(&rest) {
                check(&self.modes, spec, caller, target)?;
                tracing::debug!(type_name = target.type_name, method = %method, "capability call");
                return mixin.rpc_call(ctx, target, &rest, params);
            }
        }

        ns.push();
        Err(ObjectError::NoSuchMethod(method))
    }

    fn authorize(&self, spec: &MethodSpec, caller: &Caller) -> ObjectResult<()> {
        let path = self.index_key();
        let target = Target {
            type_name: self.schema.type_name(),
            path: path.as_ref(),
        };
        check(&self.modes, spec, caller, target)
    }

    fn object_call(
        &mut self,
        ctx: &StoreContext,
        method: &str,
        params: &Value,
        caller: &Caller,
    ) -> ObjectResult<Value> {
        match method {
            "repr.get" => Ok(self.repr()),
            "repr.create" => {
                let doc = params
                    .get("repr")
                    .ok_or_else(|| ObjectError::InvalidParams("missing \"repr\"".into()))?;
                let mut fresh = Object::new(self.schema.clone());
                fresh.from_repr(doc)?;
                if let (true, Some(handle)) = (caller.enforce, caller.handle.as_deref()) {
                    fresh.modes.set_mode(handle, Mode::OWNER)?;
                }
                fresh.create(ctx)?;
                *self = fresh;
                Ok(Value::from(self.id.as_deref().unwrap_or_default()))
            }
            "remove" => {
                self.remove(ctx)?;
                Ok(ok())
            }
            "clear" => {
                self.clear();
                self.commit(ctx)?;
                Ok(ok())
            }
            other => Err(ObjectError::NoSuchMethod(other.to_string())),
        }
    }

    fn missing(&self, capability: Capability) -> ObjectError {
        ObjectError::MissingCapability {
            type_name: self.schema.type_name().to_string(),
            capability: capability.name(),
        }
    }

    fn missing_id(&self) -> ObjectError {
        ObjectError::MissingId(self.schema.type_name().to_string())
    }

    fn no_such_object(&self) -> ObjectError {
        ObjectError::NoSuchObject {
            type_name: self.schema.type_name().to_string(),
            id: self.id.clone().unwrap_or_default(),
        }
    }
}

/// Gate one method: object-bound methods need an id and the caller's right.
fn check(
    modes: &AccessControl,
    spec: &MethodSpec,
    caller: &Caller,
    target: Target<'_>,
) -> ObjectResult<()> {
    if !spec.needs_object {
        return Ok(());
    }
    let path = target.path()?;
    modes.authorize(caller, &path.path(), spec.right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::{Category, Item, Owner, Picture};
    use proptest::prelude::*;
    use serde_json::json;

    fn call(
        object: &mut Object,
        ctx: &StoreContext,
        method: &str,
        params: Value,
    ) -> ObjectResult<Value> {
        object.rpc_call(ctx, &mut Namespace::new(method), &params, &Caller::local())
    }

    fn created<K: Kind>(ctx: &StoreContext) -> Object {
        let mut object = Object::of::<K>();
        object.create(ctx).unwrap();
        object
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn create_get_remove() {
        let ctx = StoreContext::in_memory();
        let mut item = Object::of::<Item>();
        item.attributes_mut().unwrap().set("color", "red").unwrap();
        item.create(&ctx).unwrap();
        assert!(item.is_generated());
        assert!(!item.modified());

        let id = item.id().unwrap().to_string();
        let loaded = Object::fetch(Item::schema(), &ctx, &id).unwrap();
        assert_eq!(loaded.attributes().unwrap().attribute("color"), "red");

        item.remove(&ctx).unwrap();
        assert!(ctx.scan("").unwrap().is_empty());
        assert!(matches!(
            Object::fetch(Item::schema(), &ctx, &id),
            Err(ObjectError::NoSuchObject { .. })
        ));
    }

    #[test]
    fn create_rejects_existing_id() {
        let ctx = StoreContext::in_memory();
        let mut first = Object::of::<Owner>();
        first.assign_id("alice").unwrap();
        first.create(&ctx).unwrap();
        let mut second = Object::of::<Owner>();
        second.assign_id("alice").unwrap();
        assert!(!second.is_generated());
        assert!(matches!(second.create(&ctx), Err(ObjectError::ObjectExists { .. })));
    }

    #[test]
    fn invalid_ids_are_rejected() {
        let mut item = Object::of::<Item>();
        assert!(matches!(item.assign_id("not-a-uuid"), Err(ObjectError::InvalidId { .. })));
        let mut owner = Object::of::<Owner>();
        assert!(owner.assign_id("a:b").is_err());
        assert!(matches!(owner.path(), Err(ObjectError::MissingId(_))));
    }

    #[test]
    fn missing_capability_is_reported() {
        let mut picture = Object::of::<Picture>();
        assert!(matches!(
            picture.hierarchy_mut(),
            Err(ObjectError::MissingCapability { capability: "hierarchy", .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Repr
    // -----------------------------------------------------------------------

    #[test]
    fn repr_is_tagged_by_mixin_type() {
        let mut owner = Object::of::<Owner>();
        owner.assign_id("alice").unwrap();
        owner.attributes_mut().unwrap().set("name", "Alice").unwrap();
        let doc = owner.repr();
        assert_eq!(doc["id"], "alice");
        assert_eq!(doc["type"], "Owner");
        assert_eq!(doc["kv"], json!({"name": "Alice"}));
        assert_eq!(doc["associative"], json!([]));
        assert_eq!(doc["hierarchical"], json!({"up_id": null, "down_ids": []}));
        assert_eq!(doc["modes"], json!([]));
        assert!(doc["global"].is_null());
    }

    #[test]
    fn from_repr_is_strict() {
        let mut item = Object::of::<Item>();
        let mut doc = Object::of::<Item>().repr();
        doc["type"] = json!("Owner");
        assert!(matches!(item.from_repr(&doc), Err(ObjectError::InvalidRepr(_))));

        let mut doc = Object::of::<Item>().repr();
        doc.as_object_mut().unwrap().remove("kv");
        assert!(matches!(item.from_repr(&doc), Err(ObjectError::InvalidRepr(_))));

        let mut doc = Object::of::<Item>().repr();
        doc.as_object_mut().unwrap().remove("id");
        assert!(matches!(item.from_repr(&doc), Err(ObjectError::InvalidRepr(_))));

        assert!(item.from_repr(&json!("Item")).is_err());
        item.from_repr(&Object::of::<Item>().repr()).unwrap();
        assert_eq!(item.id(), None);
    }

    #[test]
    fn global_member_may_be_omitted() {
        let mut doc = Object::of::<Category>().repr();
        doc.as_object_mut().unwrap().remove("global");
        Object::of::<Category>().from_repr(&doc).unwrap();
    }

    fn arb_token() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_-]{1,8}"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn repr_round_trips(
            id in arb_token(),
            attrs in prop::collection::btree_map(arb_token(), "[ -~]{0,12}", 0..5),
            links in prop::collection::btree_set(arb_token(), 0..4),
            children in prop::collection::btree_set(arb_token(), 0..4),
            parent in prop::option::of(arb_token()),
            handles in prop::collection::btree_map(arb_token(), 0u16..0o777, 0..3),
        ) {
            let mut owner = Object::of::<Owner>();
            owner.assign_id(&id).unwrap();
            for (k, v) in &attrs {
                owner.attributes_mut().unwrap().set(k.as_str(), v.as_str()).unwrap();
            }
            for l in &links {
                owner.association_mut().unwrap().insert(IndexKey::new("Item", l.as_str()).unwrap());
            }
            let hierarchy = owner.hierarchy_mut().unwrap();
            for c in &children {
                hierarchy.add_down(IndexKey::new("Owner", format!("c{c}")).unwrap());
            }
            hierarchy.set_up(parent.map(|p| IndexKey::new("Owner", format!("p{p}")).unwrap()));
            for (h, bits) in &handles {
                owner.modes_mut().set_mode(h.as_str(), Mode::from_bits(*bits)).unwrap();
            }

            let doc = owner.repr();
            let mut copy = Object::of::<Owner>();
            copy.from_repr(&doc).unwrap();
            prop_assert_eq!(copy.repr(), doc);
        }
    }

    // -----------------------------------------------------------------------
    // Relationships
    // -----------------------------------------------------------------------

    #[test]
    fn association_is_symmetric() {
        let ctx = StoreContext::in_memory();
        let mut owner = created::<Owner>(&ctx);
        let mut item = created::<Item>(&ctx);

        owner.associate(&mut item).unwrap();
        owner.commit(&ctx).unwrap();
        item.commit(&ctx).unwrap();

        let reloaded = Object::fetch(Owner::schema(), &ctx, owner.id().unwrap()).unwrap();
        let items = reloaded.get_assoc_objects::<Item>(&ctx).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id(), item.id());
        let owners = Object::fetch(Item::schema(), &ctx, item.id().unwrap())
            .unwrap()
            .get_assoc_objects::<Owner>(&ctx)
            .unwrap();
        assert_eq!(owners[0].id(), owner.id());

        owner.disassociate(&mut item).unwrap();
        owner.commit(&ctx).unwrap();
        item.commit(&ctx).unwrap();
        let reloaded = Object::fetch(Owner::schema(), &ctx, owner.id().unwrap()).unwrap();
        assert!(reloaded.get_assoc_objects::<Item>(&ctx).unwrap().is_empty());
        let reloaded = Object::fetch(Item::schema(), &ctx, item.id().unwrap()).unwrap();
        assert!(reloaded.get_assoc_objects::<Owner>(&ctx).unwrap().is_empty());
    }

    #[test]
    fn child_has_a_single_parent() {
        let ctx = StoreContext::in_memory();
        let model = Datamodel::standard();
        let mut p1 = created::<Category>(&ctx);
        let mut p2 = created::<Category>(&ctx);
        let mut child = created::<Item>(&ctx);

        p1.adopt(&mut child).unwrap();
        p1.commit(&ctx).unwrap();
        child.commit(&ctx).unwrap();

        p2.adopt(&mut child).unwrap();
        p2.commit(&ctx).unwrap();
        child.commit(&ctx).unwrap();

        let child = Object::fetch(Item::schema(), &ctx, child.id().unwrap()).unwrap();
        assert_eq!(child.hierarchy().unwrap().up_id(), Some(&p2.path().unwrap()));
        let parent = child.up(&ctx, &model).unwrap().unwrap();
        assert_eq!(parent.id(), p2.id());

        let p1 = Object::fetch(Category::schema(), &ctx, p1.id().unwrap()).unwrap();
        assert!(!p1.hierarchy().unwrap().down_ids().contains(&child.path().unwrap()));
        let kids = p2.down(&ctx, &model).unwrap();
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0].type_name(), "Item");
    }

    #[test]
    fn orphan_detaches_both_sides() {
        let ctx = StoreContext::in_memory();
        let mut parent = created::<Category>(&ctx);
        let mut child = created::<Category>(&ctx);
        parent.adopt(&mut child).unwrap();
        parent.commit(&ctx).unwrap();
        child.commit(&ctx).unwrap();
        parent.orphan(&mut child).unwrap();
        parent.commit(&ctx).unwrap();
        child.commit(&ctx).unwrap();
        let child = Object::fetch(Category::schema(), &ctx, child.id().unwrap()).unwrap();
        assert_eq!(child.hierarchy().unwrap().up_id(), None);
        assert!(ctx.scan(&HierarchyDownKey::prefix_for(&parent.path().unwrap())).unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // RPC
    // -----------------------------------------------------------------------

    #[test]
    fn item_scenario_over_rpc() {
        let ctx = StoreContext::in_memory();
        let mut creator = Object::of::<Item>();
        let repr = Object::of::<Item>().repr();
        let id = call(&mut creator, &ctx, "repr.create", json!({"type": "Item", "repr": repr})).unwrap();
        let id = id.as_str().unwrap().to_string();

        let mut item = Object::of::<Item>();
        call(&mut item, &ctx, "attribute.set", json!({"id": id, "key": "color", "value": "red"}))
            .unwrap();
        let mut item = Object::of::<Item>();
        let color = call(&mut item, &ctx, "attribute.get", json!({"id": id, "key": "color"})).unwrap();
        assert_eq!(color, "red");

        let doc = call(&mut Object::of::<Item>(), &ctx, "repr.get", json!({"id": id})).unwrap();
        assert_eq!(doc["type"], "Item");
        assert_eq!(doc["kv"], json!({"color": "red"}));

        call(&mut Object::of::<Item>(), &ctx, "remove", json!({"id": id})).unwrap();
        let gone = call(&mut Object::of::<Item>(), &ctx, "repr.get", json!({"id": id}));
        assert!(matches!(gone, Err(ObjectError::NoSuchObject { .. })));
    }

    #[test]
    fn unknown_methods_restore_the_namespace() {
        let ctx = StoreContext::in_memory();
        let mut owner = created::<Owner>(&ctx);
        let mut ns = Namespace::new("attribute.explode");
        let params = json!({"id": owner.id().unwrap()});
        let err = owner.rpc_call(&ctx, &mut ns, &params, &Caller::local()).unwrap_err();
        assert!(matches!(err, ObjectError::NoSuchMethod(_)));
        assert_eq!(ns.path(), "attribute.explode");

        let err = call(&mut owner, &ctx, "hierarchy.nope", params.clone()).unwrap_err();
        assert!(matches!(err, ObjectError::NoSuchMethod(_)));
    }

    #[test]
    fn object_methods_need_an_id() {
        let ctx = StoreContext::in_memory();
        let err = call(&mut Object::of::<Owner>(), &ctx, "attribute.list", json!({})).unwrap_err();
        assert!(matches!(err, ObjectError::MissingId(_)));
        let listed = call(&mut Object::of::<Owner>(), &ctx, "global.index", json!({})).unwrap();
        assert_eq!(listed, json!([]));
    }

    #[test]
    fn create_with_explicit_id_conflicts() {
        let ctx = StoreContext::in_memory();
        let mut doc = Object::of::<Owner>().repr();
        doc["id"] = json!("bob");
        call(&mut Object::of::<Owner>(), &ctx, "repr.create", json!({"repr": doc.clone()})).unwrap();
        let again = call(&mut Object::of::<Owner>(), &ctx, "repr.create", json!({"repr": doc}));
        assert!(matches!(again, Err(ObjectError::ObjectExists { .. })));
    }

    #[test]
    fn access_modes_gate_calls() {
        let ctx = StoreContext::in_memory();
        let alice = Caller::with_handle("alice", true);
        let bob = Caller::with_handle("bob", true);

        let repr = Object::of::<Owner>().repr();
        let id = Object::of::<Owner>()
            .rpc_call(&ctx, &mut Namespace::new("repr.create"), &json!({"repr": repr}), &alice)
            .unwrap();
        let params = json!({"id": id, "key": "k", "value": "v"});

        Object::of::<Owner>()
            .rpc_call(&ctx, &mut Namespace::new("attribute.set"), &params, &alice)
            .unwrap();
        let denied = Object::of::<Owner>().rpc_call(
            &ctx,
            &mut Namespace::new("attribute.set"),
            &params,
            &bob,
        );
        assert!(matches!(denied, Err(ObjectError::AccessDenied { right: Right::Write, .. })));

        let grant = json!({"id": id, "add": [{"handle": "bob", "mode": "600"}]});
        Object::of::<Owner>()
            .rpc_call(&ctx, &mut Namespace::new("mode.update"), &grant, &alice)
            .unwrap();
        Object::of::<Owner>()
            .rpc_call(&ctx, &mut Namespace::new("attribute.set"), &params, &bob)
            .unwrap();
    }
}
