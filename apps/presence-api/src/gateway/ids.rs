//! Identifiers for gateway connections and the events viewers attend.

use std::fmt;

use presence_common::id::{prefix, PrefixedId};
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque identifier for one live transport connection.
///
/// Allocated at connect time as a `conn_` prefixed ULID, so an id is never
/// handed out twice for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl PrefixedId for ConnectionId {
    const PREFIX: &'static str = prefix::CONNECTION;
}

impl ConnectionId {
    /// Allocate a fresh identifier for a newly accepted connection.
    pub fn allocate() -> Self {
        Self(<Self as PrefixedId>::generate())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// External event identifier.
///
/// Clients may send either a string or a number. Integral numbers are
/// normalized to their integer form, so `42`, `42.0` and `"42"` name the same
/// event. The id is never
/// checked against the event catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawEventId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawEventId::deserialize(deserializer)? {
            RawEventId::Text(s) => Self(s),
            RawEventId::Number(n) => Self(normalize_number(&n)),
        })
    }
}

/// Render a JSON number as the event key. Integral values use their plain
/// integer form whether they were written as `100`, `100.0` or `1e2`.
fn normalize_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        // Beyond 2^53 floats no longer map to distinct integers.
        Some(f) if f.fract() == 0.0 && f.abs() <= 9_007_199_254_740_992.0 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EventId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
