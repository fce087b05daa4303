//! Value identifiers used as keys throughout the score model.

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Primary key of a table row in the cabinet database.
///
/// The cabinet reports these as integers, older documents store them as
/// strings; both decode to the same value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CabinetId(String);

impl CabinetId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CabinetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CabinetId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<i64> for CabinetId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for CabinetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CabinetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CabinetIdVisitor;

        impl<'de> Visitor<'de> for CabinetIdVisitor {
            type Value = CabinetId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a cabinet table id as string or integer")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<CabinetId, E> {
                Ok(CabinetId::new(value))
            }

            fn visit_string<E: de::Error>(self, value: String) -> Result<CabinetId, E> {
                Ok(CabinetId(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<CabinetId, E> {
                Ok(CabinetId::from(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<CabinetId, E> {
                Ok(CabinetId(value.to_string()))
            }
        }

        deserializer.deserialize_any(CabinetIdVisitor)
    }
}

/// Identifier of a table design in the community catalog.
///
/// Several cabinet tables (versions, mods, VR variants) may share one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WebTableId(String);

impl WebTableId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WebTableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WebTableId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Where a high score list physically lives: a rom/file name plus an offset.
///
/// Offset `-1` marks a manual score list with no backing store. Offset `0`
/// matches every positive offset under the same name, since some storage
/// formats carry no offset at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScoreId {
    /// Rom, high score file or (for manual lists) web id.
    pub name: String,
    /// Storage offset.
    pub offset: i64,
}

impl ScoreId {
    /// Offset used for score lists with no physical store.
    pub const MANUAL_OFFSET: i64 = -1;

    /// Build an identifier.
    pub fn new(name: impl Into<String>, offset: i64) -> Self {
        Self {
            name: name.into(),
            offset,
        }
    }

    /// Manual score list keyed by a table design.
    pub fn manual(web_id: &WebTableId) -> Self {
        Self::new(web_id.as_str(), Self::MANUAL_OFFSET)
    }

    /// True when the scores were entered by hand.
    pub fn is_manual(&self) -> bool {
        self.offset == Self::MANUAL_OFFSET
    }

    /// True for the offset-less form that matches every offset of its name.
    pub fn is_wildcard(&self) -> bool {
        self.offset == 0
    }

    /// Same name with another offset.
    pub fn with_offset(&self, offset: i64) -> Self {
        Self::new(self.name.clone(), offset)
    }

    /// Whether two identifiers can refer to the same physical store.
    pub fn is_compatible(&self, other: &ScoreId) -> bool {
        if self.name != other.name {
            return false;
        }
        self.offset == other.offset
            || (self.is_wildcard() && other.offset > 0)
            || (other.is_wildcard() && self.offset > 0)
    }

    /// String form used as a document key, `name:offset`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.name, self.offset)
    }
}

impl Ord for ScoreId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .to_lowercase()
            .cmp(&other.name.to_lowercase())
            .then(self.offset.cmp(&other.offset))
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for ScoreId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ScoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.offset == 0 || self.is_manual() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}:{}", self.name, self.offset)
        }
    }
}

/// Failure to parse a [`ScoreId`] key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid score id key '{0}'")]
pub struct ParseScoreIdError(String);

impl FromStr for ScoreId {
    type Err = ParseScoreIdError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let (name, offset) = key
            .rsplit_once(':')
            .ok_or_else(|| ParseScoreIdError(key.to_string()))?;
        let offset = offset
            .parse::<i64>()
            .map_err(|_| ParseScoreIdError(key.to_string()))?;
        Ok(Self::new(name, offset))
    }
}

impl Serialize for ScoreId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

impl<'de> Deserialize<'de> for ScoreId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
