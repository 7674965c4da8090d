use inv_store::{LockDomain, StoreContext};
use inv_types::{IndexKey, Key, LinkKey};
use serde_json::{json, Value};

use crate::delta::DeltaSet;
use crate::error::{ObjectError, ObjectResult};
use crate::mixin::{no_such_method, ok, MethodSpec, Mixin, Target};
use crate::params::{optional_str, path_list};

const METHODS: &[MethodSpec] = &[MethodSpec::write("update"), MethodSpec::list("list")];

/// Symmetric many-to-many links (`associative`).
///
/// Every edge is stored as two link keys, `a*b` and `b*a`, written and
/// removed together under the association lock.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Association {
    links: DeltaSet<IndexKey>,
}

impl Association {
    pub fn insert(&mut self, remote: IndexKey) {
        self.links.insert(remote);
    }

    pub fn remove(&mut self, remote: &IndexKey) {
        self.links.remove(remote);
    }

    pub fn contains(&self, remote: &IndexKey) -> bool {
        self.links.contains(remote)
    }

    /// Paths of every associated object.
    pub fn assoc_ids(&self) -> impl Iterator<Item = &IndexKey> {
        self.links.items().iter()
    }

    /// Paths of associated objects of one type.
    pub fn assoc_ids_of<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a IndexKey> + 'a {
        self.assoc_ids().filter(move |k| k.type_part() == type_name)
    }

    /// Apply an `{add: [..], remove: [..]}` delta, removals first.
    pub fn apply_update(&mut self, own: Option<&IndexKey>, params: &Value) -> ObjectResult<()> {
        let remove = path_list(params, "remove")?;
        let add = path_list(params, "add")?;
        if let Some(own) = own {
            if add.contains(own) {
                return Err(ObjectError::InvalidParams(format!(
                    "cannot associate {own} with itself"
                )));
            }
        }
        for remote in &remove {
            self.remove(remote);
        }
        for remote in add {
            self.insert(remote);
        }
        Ok(())
    }

    fn write_edge(ctx: &StoreContext, link: &LinkKey) -> ObjectResult<()> {
        ctx.put(&link.path(), "")?;
        if let Err(err) = ctx.put(&link.inverted().path(), "") {
            // Leave no single-direction edge behind.
            ctx.delete(&link.path())?;
            return Err(err.into());
        }
        Ok(())
    }
}

impl Mixin for Association {
    fn mixin_type(&self) -> &'static str {
        "associative"
    }

    fn namespace(&self) -> &'static str {
        "link"
    }

    fn methods(&self) -> &'static [MethodSpec] {
        METHODS
    }

    fn get(&mut self, ctx: &StoreContext, path: &IndexKey) -> ObjectResult<()> {
        let _lock = ctx.shared(LockDomain::Association)?;
        let mut remotes = Vec::new();
        for (key, _) in ctx.scan(&LinkKey::prefix_for(path))? {
            match LinkKey::parse(&key) {
                Ok(link) if link.local_part() == path => remotes.push(link.remote_part().clone()),
                _ => break,
            }
        }
        self.links.load(remotes);
        Ok(())
    }

    fn commit(&mut self, ctx: &StoreContext, path: &IndexKey) -> ObjectResult<()> {
        let _lock = ctx.exclusive(LockDomain::Association)?;
        for remote in self.links.removed() {
            let link = LinkKey::new(path, remote);
            ctx.delete(&link.path())?;
            ctx.delete(&link.inverted().path())?;
        }
        for remote in self.links.added() {
            Self::write_edge(ctx, &LinkKey::new(path, remote))?;
        }
        self.links.settle();
        Ok(())
    }

    fn clear(&mut self) {
        self.links.clear();
    }

    fn modified(&self) -> bool {
        self.links.modified()
    }

    fn settle(&mut self) {
        self.links.settle();
    }

    fn repr(&self) -> Value {
        json!(self.links.items())
    }

    fn from_repr(&mut self, fragment: &Value) -> ObjectResult<()> {
        let items = fragment
            .as_array()
            .ok_or_else(|| ObjectError::InvalidRepr("associative member is not an array".into()))?;
        for item in items {
            let path = item
                .as_str()
                .ok_or_else(|| ObjectError::InvalidRepr("association entry is not a string".into()))?;
            let key = IndexKey::parse(path).map_err(|e| ObjectError::InvalidRepr(e.to_string()))?;
            self.insert(key);
        }
        Ok(())
    }

    fn delta(&self) -> Option<Value> {
        self.modified()
            .then(|| json!({ "add": self.links.added(), "remove": self.links.removed() }))
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
            "list" => {
                let ids: Vec<&IndexKey> = match optional_str(params, "target_type")? {
                    Some(kind) => self.assoc_ids_of(kind).collect(),
                    None => self.assoc_ids().collect(),
                };
                Ok(json!(ids))
            }
            other => Err(no_such_method(self.namespace(), other)),
        }
    }
}
