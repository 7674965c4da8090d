//! Capabilities an object type can be composed from.
//!
//! Each capability persists its own relation under its own key kind and
//! keeps in-memory deltas between a load and a commit. The set of
//! capabilities is fixed per type by its [`crate::Schema`].

use std::fmt;

use inv_store::StoreContext;
use inv_types::{IndexKey, Right};
use serde_json::Value;

use crate::error::{ObjectError, ObjectResult};

pub mod association;
pub mod attribute;
pub mod global;
pub mod hierarchy;

pub use association::Association;
pub use attribute::AttributeStore;
pub use global::GlobalIndex;
pub use hierarchy::Hierarchy;

/// One entry of a method roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MethodSpec {
    /// Path below the roster's namespace, e.g. `set` or `repr.get`.
    pub name: &'static str,
    /// Permission checked against the caller's handle.
    pub right: Right,
    /// Whether the call must name an existing object.
    pub needs_object: bool,
}

impl MethodSpec {
    pub const fn read(name: &'static str) -> Self {
        Self { name, right: Right::Read, needs_object: true }
    }

    pub const fn write(name: &'static str) -> Self {
        Self { name, right: Right::Write, needs_object: true }
    }

    pub const fn list(name: &'static str) -> Self {
        Self { name, right: Right::List, needs_object: true }
    }

    /// A type-wide method that runs without an object id.
    pub const fn unbound(name: &'static str, right: Right) -> Self {
        Self { name, right, needs_object: false }
    }
}

/// What an RPC call is aimed at.
#[derive(Clone, Copy, Debug)]
pub struct Target<'a> {
    pub type_name: &'a str,
    pub path: Option<&'a IndexKey>,
}

impl<'a> Target<'a> {
    pub fn path(&self) -> ObjectResult<&'a IndexKey> {
        self.path
            .ok_or_else(|| ObjectError::MissingId(self.type_name.to_string()))
    }
}

/// Common contract of every capability.
pub trait Mixin: Send + Sync + fmt::Debug {
    /// Member name of this capability's fragment in an object repr.
    fn mixin_type(&self) -> &'static str;

    /// RPC namespace segment routed to this capability.
    fn namespace(&self) -> &'static str;

    /// Methods reachable under [`Mixin::namespace`].
    fn methods(&self) -> &'static [MethodSpec];

    /// Load committed state for `path`, discarding any deltas.
    fn get(&mut self, ctx: &StoreContext, path: &IndexKey) -> ObjectResult<()>;

    /// Write staged deltas for `path` and clear them.
    fn commit(&mut self, ctx: &StoreContext, path: &IndexKey) -> ObjectResult<()>;

    /// Stage removal of everything this capability holds.
    fn clear(&mut self);

    fn modified(&self) -> bool;

    /// Drop staged deltas, treating the in-memory view as committed.
    fn settle(&mut self);

    fn repr(&self) -> Value;

    fn from_repr(&mut self, fragment: &Value) -> ObjectResult<()>;

    /// Params of a `<namespace>.update` call carrying the staged deltas, or
    /// `None` when there is nothing to send.
    fn delta(&self) -> Option<Value>;

    fn rpc_call(
        &mut self,
        ctx: &StoreContext,
        target: Target<'_>,
        method: &str,
        params: &Value,
    ) -> ObjectResult<Value>;

    fn method(&self, name: &str) -> Option<&'static MethodSpec> {
        self.methods().iter().find(|m| m.name == name)
    }
}

/// Capability tags used to declare a type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Attributes,
    Association,
    Hierarchy,
    Global,
}

impl Capability {
    pub fn name(self) -> &'static str {
        match self {
            Self::Attributes => "attributes",
            Self::Association => "association",
            Self::Hierarchy => "hierarchy",
            Self::Global => "global",
        }
    }

    pub fn instantiate(self) -> MixinSlot {
        match self {
            Self::Attributes => MixinSlot::Attributes(AttributeStore::default()),
            Self::Association => MixinSlot::Association(Association::default()),
            Self::Hierarchy => MixinSlot::Hierarchy(Hierarchy::default()),
            Self::Global => MixinSlot::Global(GlobalIndex::default()),
        }
    }
}

/// A concrete capability instance owned by an object.
#[derive(Clone, Debug)]
pub enum MixinSlot {
    Attributes(AttributeStore),
    Association(Association),
    Hierarchy(Hierarchy),
    Global(GlobalIndex),
}

impl MixinSlot {
    pub fn as_mixin(&self) -> &dyn Mixin {
        match self {
            Self::Attributes(m) => m,
            Self::Association(m) => m,
            Self::Hierarchy(m) => m,
            Self::Global(m) => m,
        }
    }

    pub fn as_mixin_mut(&mut self) -> &mut dyn Mixin {
        match self {
            Self::Attributes(m) => m,
            Self::Association(m) => m,
            Self::Hierarchy(m) => m,
            Self::Global(m) => m,
        }
    }
}

pub(crate) fn ok() -> Value {
    Value::from("OK")
}

pub(crate) fn no_such_method(namespace: &str, method: &str) -> ObjectError {
    ObjectError::NoSuchMethod(format!("{namespace}.{method}"))
}
