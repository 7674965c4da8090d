//! Registry of the record types a store knows about.
//!
//! RPC calls name their type as a string; the [`Datamodel`] turns that name
//! into a fresh [`Object`] of the right [`Schema`]. The standard inventory
//! types are declared here as [`Kind`]s.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use inv_store::StoreContext;
use inv_types::IndexKey;

use crate::error::{ObjectError, ObjectResult};
use crate::id::{Base64Id, OpaqueId, UuidId};
use crate::mixin::{Capability, MethodSpec};
use crate::object::Object;
use crate::schema::{Kind, Schema};

/// Named set of schemas.
#[derive(Clone, Debug, Default)]
pub struct Datamodel {
    types: BTreeMap<String, Arc<Schema>>,
}

impl Datamodel {
    pub fn new() -> Self {
        Self::default()
    }

    /// The inventory types: Category, Sticker, Picture, Item, GTIN, ISBN
    /// and Owner.
    pub fn standard() -> Self {
        let mut model = Self::new();
        for schema in [
            Category::schema(),
            Sticker::schema(),
            Picture::schema(),
            Item::schema(),
            Gtin::schema(),
            Isbn::schema(),
            Owner::schema(),
        ] {
            model.types.insert(schema.type_name().to_string(), schema);
        }
        model
    }

    /// Add a type. Type names are unique within a model.
    pub fn register(&mut self, schema: Arc<Schema>) -> ObjectResult<()> {
        schema.validate()?;
        if self.types.contains_key(schema.type_name()) {
            return Err(ObjectError::InvalidParams(format!(
                "type {} is already registered",
                schema.type_name()
            )));
        }
        tracing::debug!(type_name = schema.type_name(), "type registered");
        self.types.insert(schema.type_name().to_string(), schema);
        Ok(())
    }

    pub fn with<K: Kind>(mut self) -> ObjectResult<Self> {
        self.register(K::schema())?;
        Ok(self)
    }

    pub fn schema(&self, type_name: &str) -> ObjectResult<&Arc<Schema>> {
        self.types
            .get(type_name)
            .ok_or_else(|| ObjectError::NoSuchType(type_name.to_string()))
    }

    /// Fresh, unsaved object of the named type.
    pub fn create(&self, type_name: &str) -> ObjectResult<Object> {
        Ok(Object::new(self.schema(type_name)?.clone()))
    }

    /// Load the object at `path`, whatever its registered type.
    pub fn load(&self, ctx: &StoreContext, path: &IndexKey) -> ObjectResult<Object> {
        let mut object = self.create(path.type_part())?;
        object.get(ctx, path.id_part())?;
        Ok(object)
    }

    pub fn type_list(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    pub fn type_exists(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn methods(&self, type_name: &str) -> ObjectResult<Vec<(String, MethodSpec)>> {
        Ok(self.schema(type_name)?.methods())
    }
}

macro_rules! standard_kind {
    ($(#[$meta:meta])* $kind:ident, $name:literal, $ids:expr, [$($cap:ident),+ $(,)?]) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug)]
        pub struct $kind;

        impl Kind for $kind {
            fn schema() -> Arc<Schema> {
                static SCHEMA: OnceLock<Arc<Schema>> = OnceLock::new();
                SCHEMA
                    .get_or_init(|| Arc::new(Schema::new($name, $ids, &[$(Capability::$cap),+])))
                    .clone()
            }
        }
    };
}

standard_kind!(
    /// A grouping node; categories nest and are globally listed.
    Category, "Category", OpaqueId, [Association, Attributes, Hierarchy, Global]
);
standard_kind!(
    /// A printed label attached to things.
    Sticker, "Sticker", Base64Id::default(), [Association, Attributes]
);
standard_kind!(Picture, "Picture", UuidId, [Association, Attributes]);
standard_kind!(
    /// A physical thing in the inventory.
    Item, "Item", UuidId, [Association, Attributes, Hierarchy]
);
standard_kind!(Gtin, "GTIN", OpaqueId, [Association, Attributes]);
standard_kind!(Isbn, "ISBN", OpaqueId, [Association, Attributes]);
standard_kind!(
    /// A person or organisation things belong to.
    Owner, "Owner", OpaqueId, [Association, Attributes, Hierarchy, Global]
);
