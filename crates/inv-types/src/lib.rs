//! Foundation types for the inventory object store.
//!
//! Every relation the object layer persists lives in one flat key-value
//! namespace. This crate owns the textual key scheme that keeps those
//! relations apart, plus the permission triple stored by the access-control
//! capability.
//!
//! # Key Types
//!
//! - [`IndexKey`] -- `type:id`, the canonical path of an object
//! - [`AttributeKey`] -- `type:id.name`, one scalar attribute
//! - [`LinkKey`] -- `a*b`, one direction of a symmetric association
//! - [`HierarchyDownKey`] -- `parent>child`, one child under a parent
//! - [`HierarchyUpKey`] -- `child<up`, the single parent pointer of a child
//! - [`ModeKey`] -- `type:id|handle`, one access-control entry
//! - [`Mode`] -- packed user/group/other permission triple

pub mod error;
pub mod key;
pub mod mode;

pub use error::{KeyError, KeyResult};
pub use key::{
    decode, encode, prefix_of, validate_handle, validate_token, AttributeKey, HierarchyDownKey,
    HierarchyUpKey, IndexKey, Key, LinkKey, ModeKey, RESERVED_SEPARATORS, UP_MARKER,
};
pub use mode::{Mode, Ownership, Right};
