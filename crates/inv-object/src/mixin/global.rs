use std::collections::BTreeSet;

use inv_store::{LockDomain, StoreContext, StoreError};
use inv_types::{IndexKey, Key, Right};
use serde_json::Value;

use crate::error::{ObjectError, ObjectResult};
use crate::mixin::{no_such_method, MethodSpec, Mixin, Target};

const METHODS: &[MethodSpec] = &[MethodSpec::unbound("index", Right::List)];

/// Type-wide roster of every instance (`global`).
///
/// The roster is a JSON array of paths stored under the bare type name. An
/// object joins it on its first commit and leaves it when cleared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlobalIndex {
    listed: bool,
    pending: Option<bool>,
}

impl GlobalIndex {
    /// Every path currently on the roster of `type_name`.
    pub fn index(ctx: &StoreContext, type_name: &str) -> ObjectResult<BTreeSet<IndexKey>> {
        let _lock = ctx.shared(LockDomain::Global)?;
        Self::read(ctx, type_name)
    }

    pub fn is_listed(&self) -> bool {
        self.pending.unwrap_or(self.listed)
    }

    fn read(ctx: &StoreContext, type_name: &str) -> ObjectResult<BTreeSet<IndexKey>> {
        let Some(raw) = ctx.get_str(type_name)? else {
            return Ok(BTreeSet::new());
        };
        let corrupt = |reason: String| StoreError::Corrupt {
            key: type_name.to_string(),
            reason,
        };
        let paths: Vec<String> = serde_json::from_str(&raw).map_err(|e| corrupt(e.to_string()))?;
        paths
            .iter()
            .map(|p| IndexKey::parse(p).map_err(|e| ObjectError::from(corrupt(e.to_string()))))
            .collect()
    }

    fn write(ctx: &StoreContext, type_name: &str, roster: &BTreeSet<IndexKey>) -> ObjectResult<()> {
        if roster.is_empty() {
            ctx.delete(type_name)?;
            return Ok(());
        }
        let raw = serde_json::to_string(roster)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        ctx.put(type_name, &raw)?;
        Ok(())
    }
}

impl Mixin for GlobalIndex {
    fn mixin_type(&self) -> &'static str {
        "global"
    }

    fn namespace(&self) -> &'static str {
        "global"
    }

    fn methods(&self) -> &'static [MethodSpec] {
        METHODS
    }

    fn get(&mut self, ctx: &StoreContext, path: &IndexKey) -> ObjectResult<()> {
        self.listed = Self::index(ctx, path.type_part())?.contains(path);
        self.pending = None;
        Ok(())
    }

    fn commit(&mut self, ctx: &StoreContext, path: &IndexKey) -> ObjectResult<()> {
        let wanted = self.pending.unwrap_or(true);
        let _lock = ctx.exclusive(LockDomain::Global)?;
        let mut roster = Self::read(ctx, path.type_part())?;
        let changed = if wanted {
            roster.insert(path.clone())
        } else {
            roster.remove(path)
        };
        if changed {
            Self::write(ctx, path.type_part(), &roster)?;
            tracing::debug!(%path, listed = wanted, "global roster updated");
        }
        self.listed = wanted;
        self.pending = None;
        Ok(())
    }

    fn clear(&mut self) {
        self.pending = Some(false);
    }

    fn modified(&self) -> bool {
        self.pending.is_some_and(|p| p != self.listed)
    }

    fn settle(&mut self) {
        self.pending = None;
    }

    fn repr(&self) -> Value {
        Value::Null
    }

    fn from_repr(&mut self, _fragment: &Value) -> ObjectResult<()> {
        Ok(())
    }

    fn delta(&self) -> Option<Value> {
        None
    }

    fn rpc_call(
        &mut self,
        ctx: &StoreContext,
        target: Target<'_>,
        method: &str,
        _params: &Value,
    ) -> ObjectResult<Value> {
        match method {
            "index" => Ok(serde_json::json!(Self::index(ctx, target.type_name)?)),
            other => Err(no_such_method(self.namespace(), other)),
        }
    }
}
