//! Free-form metadata bags attached to schools, units and memberships.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{DomainError, DomainResult};

/// String-keyed bag of JSON values.
///
/// Entities hand out clones from their `metadata()` getters, so a caller
/// mutating the returned value never touches the entity.
///
/// # Examples
///
/// ```
/// use campus_org::Metadata;
/// use serde_json::json;
///
/// let mut meta = Metadata::new();
/// meta.insert("room", json!("B12")).unwrap();
/// assert_eq!(meta.get("room"), Some(&json!("B12")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(HashMap<String, serde_json::Value>);

impl Metadata {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Insert or replace a value. Keys must not be blank.
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) -> DomainResult<()> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(DomainError::validation("metadata key cannot be empty"));
        }
        self.0.insert(key, value);
        Ok(())
    }

    /// Remove a value, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.0.remove(key)
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Check if a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    /// Serialize to a JSON object string for storage.
    pub fn to_json(&self) -> String {
        serde_json::Value::Object(self.0.clone().into_iter().collect()).to_string()
    }

    /// Parse a JSON object string produced by [`Metadata::to_json`].
    pub fn from_json(raw: &str) -> DomainResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| DomainError::validation(format!("invalid metadata json: {}", e)))
    }
}

impl From<HashMap<String, serde_json::Value>> for Metadata {
    fn from(map: HashMap<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

impl From<Metadata> for HashMap<String, serde_json::Value> {
    fn from(meta: Metadata) -> Self {
        meta.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_and_remove() {
        let mut meta = Metadata::new();
        meta.insert("capacity", json!(30)).unwrap();
        assert!(meta.contains_key("capacity"));
        assert_eq!(meta.len(), 1);

        assert_eq!(meta.remove("capacity"), Some(json!(30)));
        assert!(meta.is_empty());
    }

    #[test]
    fn test_blank_key_rejected() {
        let mut meta = Metadata::new();
        assert!(meta.insert("  ", json!(1)).is_err());
        assert!(meta.is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let mut meta = Metadata::new();
        meta.insert("room", json!("B12")).unwrap();
        meta.insert("tags", json!(["stem", "lab"])).unwrap();

        let parsed = Metadata::from_json(&meta.to_json()).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(Metadata::from_json("[1, 2]").is_err());
        assert!(Metadata::from_json("{oops").is_err());
    }
}
