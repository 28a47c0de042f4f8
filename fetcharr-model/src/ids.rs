use std::fmt;

use serde::{Deserialize, Serialize};

/// Internal integer primary key, assigned by the Item Store on first insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InternalId(pub i64);

impl InternalId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for InternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for InternalId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// External-catalog-stable identifier, unique within a `MediaKind`.
///
/// For items created from a request source this is usually the IMDb id;
/// library-scan-discovered items may key off a different stable string.
/// Never reused across variants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Third-party catalog identifiers carried on every item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIds {
    pub imdb_id: Option<String>,
    pub tvdb_id: Option<i64>,
    pub tmdb_id: Option<i64>,
}

impl ExternalIds {
    pub fn is_empty(&self) -> bool {
        self.imdb_id.is_none() && self.tvdb_id.is_none() && self.tmdb_id.is_none()
    }
}
