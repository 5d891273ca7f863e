use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::CoreError;

pub const KEY_SEPARATOR: char = '/';

/// Top-level fields of a `list-objects-v2` response. A document made only of
/// these is an empty bucket listing, not a map of object keys.
const LIST_OBJECTS_FIELDS: &[&str] = &[
    "Contents",
    "CommonPrefixes",
    "ContinuationToken",
    "Delimiter",
    "EncodingType",
    "IsTruncated",
    "KeyCount",
    "MaxKeys",
    "Name",
    "NextContinuationToken",
    "Prefix",
    "RequestCharged",
    "StartAfter",
];

/// Point-in-time enumeration of the log bucket: object key -> opaque metadata.
///
/// Only key presence matters to the differ; metadata (size, etag, ...) is
/// carried through to disk untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ListingSnapshot {
    objects: BTreeMap<String, Value>,
}

impl ListingSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, metadata: Value) {
        self.objects.insert(key.into(), metadata);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Decode a snapshot file.
    ///
    /// Accepts the canonical `{"<key>": {...}}` map as well as the raw
    /// `{"Contents": [{"Key": ...}]}` list-objects shape. Blank input and a
    /// list-objects envelope without `Contents` are empty snapshots. In the
    /// map shape every entry is a key, whatever its metadata.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Object(map) = value else {
            return Err(CoreError::UnexpectedSnapshotShape(json_kind(&value)));
        };
        if let Some(Value::Array(contents)) = map.get("Contents") {
            return Ok(Self::from_list_objects(contents));
        }
        if !map.is_empty() && map.keys().all(|k| LIST_OBJECTS_FIELDS.contains(&k.as_str())) {
            return Ok(Self::default());
        }
        Ok(Self { objects: map.into_iter().collect() })
    }

    /// Build a snapshot from the `Contents` array of a list-objects response.
    /// Entries without a string `Key` are skipped.
    pub fn from_list_objects(contents: &[Value]) -> Self {
        let mut snapshot = Self::default();
        for entry in contents {
            let Some(fields) = entry.as_object() else { continue };
            let Some(key) = fields.get("Key").and_then(Value::as_str) else { continue };
            let metadata: Map<String, Value> = fields
                .iter()
                .filter(|(name, _)| name.as_str() != "Key")
                .map(|(name, v)| (name.clone(), v.clone()))
                .collect();
            snapshot.insert(key, Value::Object(metadata));
        }
        snapshot
    }

    pub fn to_json_vec_pretty(&self) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

impl FromIterator<(String, Value)> for ListingSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self { objects: iter.into_iter().collect() }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
