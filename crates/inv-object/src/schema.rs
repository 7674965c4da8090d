use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use inv_types::validate_token;

use crate::access::AccessControl;
use crate::error::{ObjectError, ObjectResult};
use crate::id::IdStrategy;
use crate::mixin::{Capability, MethodSpec, Mixin};
use crate::object::OBJECT_METHODS;

/// Static description of a record type: its name, how it mints ids and
/// which capabilities it is composed from, in declaration order.
pub struct Schema {
    type_name: String,
    ids: Arc<dyn IdStrategy>,
    capabilities: Vec<Capability>,
}

impl Schema {
    pub fn new(
        type_name: impl Into<String>,
        ids: impl IdStrategy + 'static,
        capabilities: &[Capability],
    ) -> Self {
        Self {
            type_name: type_name.into(),
            ids: Arc::new(ids),
            capabilities: capabilities.to_vec(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn ids(&self) -> &dyn IdStrategy {
        self.ids.as_ref()
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Reject unusable type names and repeated capabilities.
    pub fn validate(&self) -> ObjectResult<()> {
        validate_token(&self.type_name)?;
        let mut seen = HashSet::new();
        for cap in &self.capabilities {
            if !seen.insert(cap) {
                return Err(ObjectError::InvalidParams(format!(
                    "{} declares the {} capability twice",
                    self.type_name,
                    cap.name()
                )));
            }
        }
        Ok(())
    }

    /// Full method roster of the type: object methods, then access modes,
    /// then each capability in declaration order.
    pub fn methods(&self) -> Vec<(String, MethodSpec)> {
        let modes = AccessControl::default();
        let mut roster: Vec<(String, MethodSpec)> =
            OBJECT_METHODS.iter().map(|m| (m.name.to_string(), *m)).collect();
        let mut push = |namespace: &str, methods: &[MethodSpec]| {
            roster.extend(methods.iter().map(|m| (format!("{namespace}.{}", m.name), *m)));
        };
        push(modes.namespace(), modes.methods());
        for cap in &self.capabilities {
            let slot = cap.instantiate();
            let mixin = slot.as_mixin();
            push(mixin.namespace(), mixin.methods());
        }
        roster
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("type_name", &self.type_name)
            .field("ids", &self.ids.name())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// A record type known at compile time.
pub trait Kind {
    fn schema() -> Arc<Schema>;
}
