use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KeyError, KeyResult};

/// Owner class a permission applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ownership {
    User = 0,
    /// Stored and parsed like the other classes. The object layer has no
    /// notion of group membership and never tests it.
    Group = 1,
    Other = 2,
}

impl Ownership {
    fn shift(self) -> u16 {
        self as u16 * 3
    }
}

/// Single permission bit within an owner class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Right {
    Read = 4,
    Write = 2,
    List = 1,
}

/// Packed permission triple: three 3-bit fields, one per [`Ownership`].
///
/// The textual form is three octal digits ordered user, group, other, so
/// `"740"` grants the user everything, the group read, and others nothing.
/// The default mode denies all access.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Mode(u16);

impl Mode {
    pub const NONE: Mode = Mode(0);

    /// Full access for the user class only.
    pub const OWNER: Mode = Mode(0o7);

    pub fn from_bits(bits: u16) -> Self {
        Self(bits & 0o777)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    /// The 3-bit field of one owner class.
    pub fn class(self, owner: Ownership) -> u8 {
        ((self.0 >> owner.shift()) & 0o7) as u8
    }

    pub fn with_class(self, owner: Ownership, bits: u8) -> Self {
        let shift = owner.shift();
        let cleared = self.0 & !(0o7 << shift);
        Self(cleared | ((bits as u16 & 0o7) << shift))
    }

    pub fn grant(self, owner: Ownership, right: Right) -> Self {
        Self(self.0 | ((right as u16) << owner.shift()))
    }

    pub fn revoke(self, owner: Ownership, right: Right) -> Self {
        Self(self.0 & !((right as u16) << owner.shift()))
    }

    pub fn access(self, owner: Ownership, right: Right) -> bool {
        self.0 & ((right as u16) << owner.shift()) != 0
    }

    /// Value stored under a mode key.
    pub fn to_stored(self) -> String {
        self.0.to_string()
    }

    pub fn from_stored(value: &str) -> KeyResult<Self> {
        value
            .parse::<u16>()
            .ok()
            .filter(|bits| *bits <= 0o777)
            .map(Self)
            .ok_or_else(|| KeyError::InvalidMode(value.to_string()))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.class(Ownership::User),
            self.class(Ownership::Group),
            self.class(Ownership::Other)
        )
    }
}

impl FromStr for Mode {
    type Err = KeyError;

    fn from_str(s: &str) -> KeyResult<Self> {
        let digits: Vec<u8> = s
            .chars()
            .map(|c| c.to_digit(8).map(|d| d as u8))
            .collect::<Option<_>>()
            .ok_or_else(|| KeyError::InvalidMode(s.to_string()))?;
        if digits.len() != 3 {
            return Err(KeyError::InvalidMode(s.to_string()));
        }
        Ok(Mode::NONE
            .with_class(Ownership::User, digits[0])
            .with_class(Ownership::Group, digits[1])
            .with_class(Ownership::Other, digits[2]))
    }
}

impl Serialize for Mode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
