use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, KEY_SEPARATOR};

/// Identifies one reconciliation run in logs and temp-file names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// First path segment of a bucket object key.
///
/// The same token names the cluster in the management service and names its
/// pending marker on disk, so it must be a single valid file-name component
/// that is not hidden (dot-files in the pending dir are scratch files).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClusterId(String);

impl ClusterId {
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let id = s.into();
        let reason = if id.is_empty() {
            Some("empty")
        } else if id.starts_with('.') {
            Some("starts with a dot")
        } else if id.contains(KEY_SEPARATOR) || id.contains('\\') {
            Some("contains a path separator")
        } else if id.chars().any(char::is_control) {
            Some("contains control characters")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(CoreError::InvalidClusterId { id, reason }),
            None => Ok(Self(id)),
        }
    }

    /// Cluster id implied by an object key, or `None` for keys that are not
    /// cluster-scoped (no separator, or an invalid leading segment).
    pub fn from_object_key(key: &str) -> Option<Self> {
        let (segment, _rest) = key.split_once(KEY_SEPARATOR)?;
        Self::parse(segment).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClusterId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ClusterId> for String {
    fn from(id: ClusterId) -> Self {
        id.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
