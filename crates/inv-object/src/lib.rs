//! Capability-composed objects over a flat key-value store.
//!
//! A record type is a [`Schema`]: an id strategy plus an ordered list of
//! capabilities. Each capability persists one relation under its own key
//! kind and keeps deltas in memory between a load and a commit.
//!
//! # Capabilities
//!
//! - [`AttributeStore`] (`kv`) -- string attributes, RPC namespace `attribute`
//! - [`Association`] (`associative`) -- symmetric links, RPC namespace `link`
//! - [`Hierarchy`] (`hierarchical`) -- single parent, many children,
//!   RPC namespace `hierarchy`
//! - [`GlobalIndex`] (`global`) -- per-type roster, RPC namespace `global`
//!
//! Every object also carries an [`AccessControl`] map (`modes`, RPC
//! namespace `mode`).
//!
//! # Example
//!
//! ```
//! use inv_object::{Datamodel, Object};
//! use inv_store::StoreContext;
//!
//! let ctx = StoreContext::in_memory();
//! let model = Datamodel::standard();
//! let mut item = model.create("Item").unwrap();
//! item.attributes_mut().unwrap().set("color", "red").unwrap();
//! item.create(&ctx).unwrap();
//!
//! let loaded = model.load(&ctx, &item.path().unwrap()).unwrap();
//! assert_eq!(loaded.attributes().unwrap().attribute("color"), "red");
//! ```

pub mod access;
pub mod datamodel;
pub mod delta;
pub mod error;
pub mod id;
pub mod mixin;
pub mod object;
pub mod params;
pub mod request;
pub mod schema;

#[cfg(test)]
mod testing;

pub use access::{AccessControl, Caller, ANY_HANDLE};
pub use datamodel::{Category, Datamodel, Gtin, Isbn, Item, Owner, Picture, Sticker};
pub use delta::DeltaSet;
pub use error::{ObjectError, ObjectResult};
pub use id::{generate_unique, Base64Id, IdStrategy, OpaqueId, UuidId, MAX_ID_ATTEMPTS};
pub use mixin::{
    Association, AttributeStore, Capability, GlobalIndex, Hierarchy, MethodSpec, Mixin, MixinSlot,
    Target,
};
pub use object::{Object, OBJECT_METHODS};
pub use request::OBJECT_NAMESPACE;
pub use schema::{Kind, Schema};
