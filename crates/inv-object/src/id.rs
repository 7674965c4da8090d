//! Object id strategies.
//!
//! A strategy mints candidate ids without touching storage. Uniqueness comes
//! from [`generate_unique`], which checks the index key of each candidate
//! and retries on collision, giving up after [`MAX_ID_ATTEMPTS`].

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use inv_store::{LockDomain, StoreContext};
use inv_types::{validate_token, IndexKey, Key};
use rand::{Rng, RngCore};
use uuid::Uuid;

use crate::error::{ObjectError, ObjectResult};

/// Candidates tried by [`generate_unique`] before failing.
pub const MAX_ID_ATTEMPTS: usize = 64;

/// How a record type names its instances.
pub trait IdStrategy: Send + Sync + fmt::Debug {
    /// Short name of the strategy, for logs and introspection.
    fn name(&self) -> &'static str;

    /// Mint a candidate id. Pure: performs no I/O and does not check for
    /// collisions.
    fn generate(&self, type_name: &str) -> String;

    /// Check a caller-supplied id.
    fn validate(&self, id: &str) -> ObjectResult<()> {
        validate_token(id).map_err(|e| ObjectError::InvalidId {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }
}

/// `type` followed by a random decimal suffix, e.g. `Category48213`.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpaqueId;

impl IdStrategy for OpaqueId {
    fn name(&self) -> &'static str {
        "opaque"
    }

    fn generate(&self, type_name: &str) -> String {
        let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
        format!("{type_name}{suffix}")
    }
}

/// Six random bytes, base64 encoded, with an optional fixed prefix.
#[derive(Clone, Debug, Default)]
pub struct Base64Id {
    prefix: String,
}

impl Base64Id {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl IdStrategy for Base64Id {
    fn name(&self) -> &'static str {
        "base64"
    }

    fn generate(&self, _type_name: &str) -> String {
        let mut bytes = [0u8; 6];
        rand::thread_rng().fill_bytes(&mut bytes);
        format!("{}{}", self.prefix, STANDARD.encode(bytes))
    }
}

/// Random (v4) UUID in hyphenated form.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidId;

impl IdStrategy for UuidId {
    fn name(&self) -> &'static str {
        "uuid"
    }

    fn generate(&self, _type_name: &str) -> String {
        Uuid::new_v4().to_string()
    }

    fn validate(&self, id: &str) -> ObjectResult<()> {
        Uuid::parse_str(id)
            .map(|_| ())
            .map_err(|e| ObjectError::InvalidId {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Mint an id whose index key is not present in the store.
pub fn generate_unique(
    strategy: &dyn IdStrategy,
    ctx: &StoreContext,
    type_name: &str,
) -> ObjectResult<String> {
    let _index = ctx.shared(LockDomain::Index)?;
    for attempt in 1..=MAX_ID_ATTEMPTS {
        let candidate = strategy.generate(type_name);
        let key = IndexKey::new(type_name, candidate.as_str())?;
        if !ctx.exists(&key.path())? {
            return Ok(candidate);
        }
        tracing::debug!(%key, attempt, "id collision, retrying");
    }
    Err(ObjectError::StorageExhausted {
        type_name: type_name.to_string(),
        attempts: MAX_ID_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    /// Always proposes the same id.
    #[derive(Debug)]
    struct Fixed;

    impl IdStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn generate(&self, _type_name: &str) -> String {
            "same".into()
        }
    }

    /// Draws from a tiny space so collisions are the norm.
    #[derive(Debug)]
    struct Narrow(u32);

    impl IdStrategy for Narrow {
        fn name(&self) -> &'static str {
            "narrow"
        }
        fn generate(&self, type_name: &str) -> String {
            format!("{type_name}{}", rand::thread_rng().gen_range(0..self.0))
        }
    }

    #[test]
    fn opaque_ids_start_with_type() {
        let id = OpaqueId.generate("Category");
        assert!(id.starts_with("Category"));
        assert!(OpaqueId.validate(&id).is_ok());
    }

    #[test]
    fn base64_ids_are_eight_chars_plus_prefix() {
        let id = Base64Id::default().generate("Sticker");
        assert_eq!(id.len(), 8);
        assert!(Base64Id::default().validate(&id).is_ok());
        let id = Base64Id::with_prefix("st-").generate("Sticker");
        assert!(id.starts_with("st-"));
        assert_eq!(id.len(), 11);
    }

    #[test]
    fn uuid_validation() {
        let id = UuidId.generate("Item");
        assert!(UuidId.validate(&id).is_ok());
        assert!(matches!(UuidId.validate("not-a-uuid"), Err(ObjectError::InvalidId { .. })));
    }

    #[test]
    fn reserved_characters_are_rejected() {
        assert!(OpaqueId.validate("a:b").is_err());
        assert!(OpaqueId.validate("").is_err());
    }

    #[test]
    fn exhausted_retry_budget_fails() {
        let ctx = StoreContext::in_memory();
        ctx.put("Item:same", "").unwrap();
        let err = generate_unique(&Fixed, &ctx, "Item").unwrap_err();
        assert!(matches!(err, ObjectError::StorageExhausted { attempts: MAX_ID_ATTEMPTS, .. }));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn regenerated_ids_never_collide(seeded in 0usize..10, wanted in 1usize..10) {
            let ctx = StoreContext::in_memory();
            let strategy = Narrow(40);
            let mut seen = HashSet::new();
            for n in 0..seeded {
                let id = format!("Item{n}");
                ctx.put(&format!("Item:{id}"), "").unwrap();
                seen.insert(id);
            }
            for _ in 0..wanted {
                let id = generate_unique(&strategy, &ctx, "Item").unwrap();
                prop_assert!(seen.insert(id.clone()), "duplicate id {}", id);
                ctx.put(&format!("Item:{id}"), "").unwrap();
            }
        }
    }
}
