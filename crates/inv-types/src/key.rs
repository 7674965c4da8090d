//! Composite path keys.
//!
//! A key is a short sequence of string tokens joined by a separator that is
//! private to one relation kind. Because every relation uses its own
//! separator, and no path token may contain any of them, two keys of
//! different kinds built from the same object path never share a scan
//! prefix:
//!
//! | relation        | separator | example                  |
//! |-----------------|-----------|--------------------------|
//! | index           | `:`       | `Item:8f14`              |
//! | attribute       | `.`       | `Item:8f14.color`        |
//! | link            | `*`       | `Item:8f14*Owner:alice1` |
//! | hierarchy down  | `>`       | `Category:c7>Item:8f14`  |
//! | hierarchy up    | `<`       | `Item:8f14<up`           |
//! | access mode     | `\|`      | `Item:8f14\|CN=alice`    |

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{KeyError, KeyResult};

pub const INDEX_SEPARATOR: char = ':';
pub const ATTRIBUTE_SEPARATOR: char = '.';
pub const LINK_SEPARATOR: char = '*';
pub const HIERARCHY_DOWN_SEPARATOR: char = '>';
pub const HIERARCHY_UP_SEPARATOR: char = '<';
pub const MODE_SEPARATOR: char = '|';

/// Separators that may never appear inside a type, id or attribute name.
pub const RESERVED_SEPARATORS: &[char] = &[
    INDEX_SEPARATOR,
    ATTRIBUTE_SEPARATOR,
    LINK_SEPARATOR,
    HIERARCHY_DOWN_SEPARATOR,
    HIERARCHY_UP_SEPARATOR,
    MODE_SEPARATOR,
];

/// Synthetic trailing token of every [`HierarchyUpKey`].
pub const UP_MARKER: &str = "up";

/// Join tokens with `separator`.
pub fn encode<S: AsRef<str>>(tokens: &[S], separator: char) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            out.push(separator);
        }
        out.push_str(token.as_ref());
    }
    out
}

/// Split `path` on `separator`, dropping empty tokens.
pub fn decode(path: &str, separator: char) -> Vec<String> {
    path.split(separator)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Scan prefix covering every key that starts with `partial`.
pub fn prefix_of<S: AsRef<str>>(partial: &[S], separator: char) -> String {
    let mut prefix = encode(partial, separator);
    prefix.push(separator);
    prefix
}

/// Check a path token (object type, object id, attribute name).
pub fn validate_token(token: &str) -> KeyResult<()> {
    if token.is_empty() {
        return Err(KeyError::EmptyToken);
    }
    if let Some(separator) = token.chars().find(|c| RESERVED_SEPARATORS.contains(c)) {
        return Err(KeyError::ReservedSeparator {
            token: token.to_string(),
            separator,
        });
    }
    Ok(())
}

/// Check an access-control handle. Only the mode separator is excluded.
pub fn validate_handle(handle: &str) -> KeyResult<()> {
    validate_leaf(handle, MODE_SEPARATOR)
}

fn validate_leaf(token: &str, separator: char) -> KeyResult<()> {
    if token.is_empty() {
        return Err(KeyError::EmptyToken);
    }
    if token.contains(separator) {
        return Err(KeyError::ReservedSeparator {
            token: token.to_string(),
            separator,
        });
    }
    Ok(())
}

/// Behaviour shared by every composite key kind.
pub trait Key: Sized {
    /// Separator private to this relation.
    const SEPARATOR: char;

    /// Number of tokens in a well-formed key.
    const ARITY: usize = 2;

    /// Tokens in positional order.
    fn tokens(&self) -> Vec<String>;

    /// Build from exactly [`Key::ARITY`] tokens.
    fn from_tokens(tokens: Vec<String>) -> KeyResult<Self>;

    /// Encoded path string.
    fn path(&self) -> String {
        encode(&self.tokens(), Self::SEPARATOR)
    }

    /// Scan prefix shared by all keys with the same leading tokens.
    fn prefix(&self) -> String {
        let tokens = self.tokens();
        prefix_of(&tokens[..Self::ARITY - 1], Self::SEPARATOR)
    }

    /// Decode and arity-check an encoded path.
    fn parse(path: &str) -> KeyResult<Self> {
        let tokens = decode(path, Self::SEPARATOR);
        if tokens.len() != Self::ARITY {
            return Err(KeyError::Malformed {
                path: path.to_string(),
                expected: Self::ARITY,
                found: tokens.len(),
            });
        }
        Self::from_tokens(tokens)
    }

    /// `true` if `path` decodes to a well-formed key of this kind.
    fn is_well_formed(path: &str) -> bool {
        Self::parse(path).is_ok()
    }
}

// ---------------------------------------------------------------------------
// Index key
// ---------------------------------------------------------------------------

/// Canonical `(type, id)` path of an object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey {
    kind: String,
    id: String,
}

impl IndexKey {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> KeyResult<Self> {
        let kind = kind.into();
        let id = id.into();
        validate_token(&kind)?;
        validate_token(&id)?;
        Ok(Self { kind, id })
    }

    pub fn type_part(&self) -> &str {
        &self.kind
    }

    pub fn id_part(&self) -> &str {
        &self.id
    }
}

impl Key for IndexKey {
    const SEPARATOR: char = INDEX_SEPARATOR;

    fn tokens(&self) -> Vec<String> {
        vec![self.kind.clone(), self.id.clone()]
    }

    fn from_tokens(mut tokens: Vec<String>) -> KeyResult<Self> {
        let id = tokens.pop().unwrap_or_default();
        let kind = tokens.pop().unwrap_or_default();
        Self::new(kind, id)
    }
}

impl Serialize for IndexKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path())
    }
}

impl<'de> Deserialize<'de> for IndexKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let path = String::deserialize(deserializer)?;
        IndexKey::parse(&path).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Attribute key
// ---------------------------------------------------------------------------

/// One scalar attribute of an object: `container.name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeKey {
    container: IndexKey,
    name: String,
}

impl AttributeKey {
    pub fn new(container: &IndexKey, name: impl Into<String>) -> KeyResult<Self> {
        let name = name.into();
        validate_token(&name)?;
        Ok(Self {
            container: container.clone(),
            name,
        })
    }

    /// Prefix covering every attribute of `container`.
    pub fn prefix_for(container: &IndexKey) -> String {
        prefix_of(&[container.path()], ATTRIBUTE_SEPARATOR)
    }

    pub fn container_part(&self) -> &IndexKey {
        &self.container
    }

    pub fn attribute_part(&self) -> &str {
        &self.name
    }
}

impl Key for AttributeKey {
    const SEPARATOR: char = ATTRIBUTE_SEPARATOR;

    fn tokens(&self) -> Vec<String> {
        vec![self.container.path(), self.name.clone()]
    }

    fn from_tokens(mut tokens: Vec<String>) -> KeyResult<Self> {
        let name = tokens.pop().unwrap_or_default();
        let container = IndexKey::parse(&tokens.pop().unwrap_or_default())?;
        Self::new(&container, name)
    }
}

// ---------------------------------------------------------------------------
// Link key
// ---------------------------------------------------------------------------

/// One direction of a symmetric association: `local*remote`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkKey {
    local: IndexKey,
    remote: IndexKey,
}

impl LinkKey {
    pub fn new(local: &IndexKey, remote: &IndexKey) -> Self {
        Self {
            local: local.clone(),
            remote: remote.clone(),
        }
    }

    /// Prefix covering every link whose local part is `local`.
    pub fn prefix_for(local: &IndexKey) -> String {
        prefix_of(&[local.path()], LINK_SEPARATOR)
    }

    pub fn local_part(&self) -> &IndexKey {
        &self.local
    }

    pub fn remote_part(&self) -> &IndexKey {
        &self.remote
    }

    /// The opposite direction of the same edge.
    pub fn inverted(&self) -> Self {
        Self {
            local: self.remote.clone(),
            remote: self.local.clone(),
        }
    }
}

impl Key for LinkKey {
    const SEPARATOR: char = LINK_SEPARATOR;

    fn tokens(&self) -> Vec<String> {
        vec![self.local.path(), self.remote.path()]
    }

    fn from_tokens(mut tokens: Vec<String>) -> KeyResult<Self> {
        let remote = IndexKey::parse(&tokens.pop().unwrap_or_default())?;
        let local = IndexKey::parse(&tokens.pop().unwrap_or_default())?;
        Ok(Self { local, remote })
    }
}

// ---------------------------------------------------------------------------
// Hierarchy keys
// ---------------------------------------------------------------------------

/// One child registered under a parent: `parent>child`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HierarchyDownKey {
    parent: IndexKey,
    child: IndexKey,
}

impl HierarchyDownKey {
    pub fn new(parent: &IndexKey, child: &IndexKey) -> Self {
        Self {
            parent: parent.clone(),
            child: child.clone(),
        }
    }

    /// Prefix covering every child of `parent`.
    pub fn prefix_for(parent: &IndexKey) -> String {
        prefix_of(&[parent.path()], HIERARCHY_DOWN_SEPARATOR)
    }

    pub fn parent_part(&self) -> &IndexKey {
        &self.parent
    }

    pub fn child_part(&self) -> &IndexKey {
        &self.child
    }
}

impl Key for HierarchyDownKey {
    const SEPARATOR: char = HIERARCHY_DOWN_SEPARATOR;

    fn tokens(&self) -> Vec<String> {
        vec![self.parent.path(), self.child.path()]
    }

    fn from_tokens(mut tokens: Vec<String>) -> KeyResult<Self> {
        let child = IndexKey::parse(&tokens.pop().unwrap_or_default())?;
        let parent = IndexKey::parse(&tokens.pop().unwrap_or_default())?;
        Ok(Self { parent, child })
    }
}

/// Parent pointer of a child: `child<up`. The stored value is the parent's
/// index path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HierarchyUpKey {
    child: IndexKey,
}

impl HierarchyUpKey {
    pub fn new(child: &IndexKey) -> Self {
        Self {
            child: child.clone(),
        }
    }

    pub fn child_part(&self) -> &IndexKey {
        &self.child
    }
}

impl Key for HierarchyUpKey {
    const SEPARATOR: char = HIERARCHY_UP_SEPARATOR;

    fn tokens(&self) -> Vec<String> {
        vec![self.child.path(), UP_MARKER.to_string()]
    }

    fn from_tokens(tokens: Vec<String>) -> KeyResult<Self> {
        if tokens.get(1).map(String::as_str) != Some(UP_MARKER) {
            return Err(KeyError::Malformed {
                path: encode(&tokens, HIERARCHY_UP_SEPARATOR),
                expected: Self::ARITY,
                found: tokens.len(),
            });
        }
        let child = IndexKey::parse(&tokens[0])?;
        Ok(Self { child })
    }
}

// ---------------------------------------------------------------------------
// Mode key
// ---------------------------------------------------------------------------

/// One access-control entry: `object|handle`. The stored value is a packed
/// [`crate::Mode`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModeKey {
    object: IndexKey,
    handle: String,
}

impl ModeKey {
    /// Handles may contain anything but the mode separator; certificate
    /// subjects routinely carry `.` and `=`.
    pub fn new(object: &IndexKey, handle: impl Into<String>) -> KeyResult<Self> {
        let handle = handle.into();
        validate_leaf(&handle, MODE_SEPARATOR)?;
        Ok(Self {
            object: object.clone(),
            handle,
        })
    }

    /// Prefix covering every entry of `object`.
    pub fn prefix_for(object: &IndexKey) -> String {
        prefix_of(&[object.path()], MODE_SEPARATOR)
    }

    pub fn object_part(&self) -> &IndexKey {
        &self.object
    }

    pub fn handle_part(&self) -> &str {
        &self.handle
    }
}

impl Key for ModeKey {
    const SEPARATOR: char = MODE_SEPARATOR;

    fn tokens(&self) -> Vec<String> {
        vec![self.object.path(), self.handle.clone()]
    }

    fn from_tokens(mut tokens: Vec<String>) -> KeyResult<Self> {
        let handle = tokens.pop().unwrap_or_default();
        let object = IndexKey::parse(&tokens.pop().unwrap_or_default())?;
        Self::new(&object, handle)
    }
}

macro_rules! display_and_parse {
    ($($name:ident),* $(,)?) => {
        $(
            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.path())
                }
            }

            impl FromStr for $name {
                type Err = KeyError;

                fn from_str(s: &str) -> KeyResult<Self> {
                    <$name as Key>::parse(s)
                }
            }
        )*
    };
}

display_and_parse!(
    IndexKey,
    AttributeKey,
    LinkKey,
    HierarchyDownKey,
    HierarchyUpKey,
    ModeKey,
);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(id: &str) -> IndexKey {
        IndexKey::new("Item", id).unwrap()
    }

    // -----------------------------------------------------------------------
    // Tokenizer
    // -----------------------------------------------------------------------

    #[test]
    fn encode_joins_tokens() {
        assert_eq!(encode(&["a", "b", "c"], ':'), "a:b:c");
        assert_eq!(encode::<&str>(&[], ':'), "");
    }

    #[test]
    fn decode_drops_empty_tokens() {
        assert_eq!(decode("::a::b:", ':'), vec!["a", "b"]);
        assert!(decode("", ':').is_empty());
    }

    #[test]
    fn prefix_has_trailing_separator() {
        assert_eq!(prefix_of(&["Item:1"], '.'), "Item:1.");
    }

    #[test]
    fn tokens_reject_reserved_separators() {
        for sep in RESERVED_SEPARATORS {
            let token = format!("a{sep}b");
            assert!(matches!(
                validate_token(&token),
                Err(KeyError::ReservedSeparator { .. })
            ));
        }
        assert_eq!(validate_token(""), Err(KeyError::EmptyToken));
        assert!(validate_token("abc-123_+/=").is_ok());
    }

    // -----------------------------------------------------------------------
    // Typed keys
    // -----------------------------------------------------------------------

    #[test]
    fn index_key_parts() {
        let key = item("8f14");
        assert_eq!(key.path(), "Item:8f14");
        assert_eq!(key.type_part(), "Item");
        assert_eq!(key.id_part(), "8f14");
        assert_eq!("Item:8f14".parse::<IndexKey>().unwrap(), key);
    }

    #[test]
    fn index_key_wrong_arity_is_malformed() {
        let err = IndexKey::parse("Item").unwrap_err();
        assert!(matches!(err, KeyError::Malformed { found: 1, .. }));
        assert!(!IndexKey::is_well_formed("a:b:c"));
    }

    #[test]
    fn attribute_key_layout() {
        let key = AttributeKey::new(&item("1"), "color").unwrap();
        assert_eq!(key.path(), "Item:1.color");
        assert_eq!(key.prefix(), "Item:1.");
        assert_eq!(AttributeKey::prefix_for(&item("1")), "Item:1.");
        let parsed = AttributeKey::parse("Item:1.color").unwrap();
        assert_eq!(parsed.attribute_part(), "color");
        assert_eq!(parsed.container_part(), &item("1"));
    }

    #[test]
    fn attribute_name_with_separator_is_rejected() {
        assert!(AttributeKey::new(&item("1"), "a.b").is_err());
        assert!(!AttributeKey::is_well_formed("Item:1.a.b"));
    }

    #[test]
    fn link_key_inverts() {
        let owner = IndexKey::new("Owner", "alice1").unwrap();
        let key = LinkKey::new(&item("1"), &owner);
        assert_eq!(key.path(), "Item:1*Owner:alice1");
        assert_eq!(key.inverted().path(), "Owner:alice1*Item:1");
        assert_eq!(key.inverted().inverted(), key);
        assert_eq!(LinkKey::parse(&key.path()).unwrap(), key);
    }

    #[test]
    fn hierarchy_keys() {
        let parent = IndexKey::new("Category", "c1").unwrap();
        let down = HierarchyDownKey::new(&parent, &item("1"));
        assert_eq!(down.path(), "Category:c1>Item:1");
        assert_eq!(down.prefix(), "Category:c1>");

        let up = HierarchyUpKey::new(&item("1"));
        assert_eq!(up.path(), "Item:1<up");
        assert_eq!(HierarchyUpKey::parse("Item:1<up").unwrap(), up);
        assert!(HierarchyUpKey::parse("Item:1<down").is_err());
    }

    #[test]
    fn mode_key_accepts_dotted_handles() {
        let key = ModeKey::new(&item("1"), "CN=alice.example.com").unwrap();
        assert_eq!(key.path(), "Item:1|CN=alice.example.com");
        assert_eq!(ModeKey::parse(&key.path()).unwrap(), key);
        assert!(ModeKey::new(&item("1"), "a|b").is_err());
    }

    #[test]
    fn index_key_serializes_as_path() {
        let json = serde_json::to_string(&item("x")).unwrap();
        assert_eq!(json, "\"Item:x\"");
        let back: IndexKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item("x"));
        assert!(serde_json::from_str::<IndexKey>("\"nope\"").is_err());
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn index_paths_parse_back(kind in "[A-Za-z][A-Za-z0-9_-]{0,11}", id in "[A-Za-z0-9+/=_-]{1,16}") {
            let key = IndexKey::new(kind, id).unwrap();
            prop_assert_eq!(IndexKey::parse(&key.path()).unwrap(), key);
        }

        #[test]
        fn relation_prefixes_never_overlap(
            id in "[A-Za-z0-9_-]{1,12}",
            other in "[A-Za-z0-9_-]{1,12}",
            name in "[A-Za-z0-9_-]{1,12}",
        ) {
            let obj = item(&id);
            let attr = AttributeKey::new(&obj, name.clone()).unwrap().path();
            let link = LinkKey::new(&obj, &item(&other)).path();
            let mode = ModeKey::new(&obj, name).unwrap().path();
            let down = HierarchyDownKey::new(&obj, &item(&other)).path();
            let up = HierarchyUpKey::new(&obj).path();

            let prefixes = [
                AttributeKey::prefix_for(&obj),
                LinkKey::prefix_for(&obj),
                ModeKey::prefix_for(&obj),
                HierarchyDownKey::prefix_for(&obj),
            ];
            let keys = [&attr, &link, &mode, &down];
            for (i, prefix) in prefixes.iter().enumerate() {
                for (j, key) in keys.iter().enumerate() {
                    prop_assert_eq!(key.starts_with(prefix.as_str()), i == j);
                }
                prop_assert!(!up.starts_with(prefix.as_str()));
            }
        }
    }
}
