//! Cache Entry Module
//!
//! Defines the entry codec: one named value serialized as a self-describing
//! JSON payload. Backend-independent.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CacheError, Result};

// == Entry ==
/// A mapping from cache key to the value stored under it.
///
/// The map is ordered so that encoding is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entry(BTreeMap<String, Value>);

impl Entry {
    // == Constructor ==
    /// Creates a single-key entry from any serializable value.
    ///
    /// Fails with `Encode` when the value has no JSON representation
    /// (for example a map keyed by something other than strings).
    pub fn new<T>(key: &str, value: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value)
            .map_err(|e| CacheError::Encode(format!("value for '{}': {}", key, e)))?;

        let mut map = BTreeMap::new();
        map.insert(key.to_string(), value);
        Ok(Self(map))
    }

    /// Raw value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // == Take ==
    /// Consumes the entry and deserializes the value stored under `key`.
    ///
    /// A missing key or a value of the wrong shape is reported as
    /// `CorruptPayload`: the stored bytes do not hold what the caller set.
    pub fn take<T>(mut self, key: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let value = self.0.remove(key).ok_or_else(|| {
            CacheError::CorruptPayload(format!("payload has no value for '{}'", key))
        })?;

        serde_json::from_value(value)
            .map_err(|e| CacheError::CorruptPayload(format!("value for '{}': {}", key, e)))
    }
}

// == Codec ==
/// Serializes an entry into its byte payload.
pub fn encode(entry: &Entry) -> Result<Vec<u8>> {
    serde_json::to_vec(entry).map_err(|e| CacheError::Encode(e.to_string()))
}

/// Inverse of [`encode`]. Bytes that are not an encoded entry are `CorruptPayload`.
pub fn decode(bytes: &[u8]) -> Result<Entry> {
    serde_json::from_slice(bytes).map_err(|e| CacheError::CorruptPayload(e.to_string()))
}

/// Builds and encodes a single-key entry in one step.
pub fn encode_value<T>(key: &str, value: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    encode(&Entry::new(key, value)?)
}

/// Decodes a payload and extracts the typed value stored under `key`.
pub fn decode_value<T>(key: &str, bytes: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    decode(bytes)?.take(key)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        visits: u32,
        tags: Vec<String>,
    }

    #[test]
    fn test_string_value_roundtrip() {
        let bytes = encode_value("foo", "bar").unwrap();
        let value: String = decode_value("foo", &bytes).unwrap();
        assert_eq!(value, "bar");
    }

    #[test]
    fn test_struct_value_roundtrip() {
        let profile = Profile {
            name: "ada".to_string(),
            visits: 3,
            tags: vec!["admin".to_string()],
        };

        let bytes = encode_value("user:1", &profile).unwrap();
        let back: Profile = decode_value("user:1", &bytes).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn test_entry_decode_inverse_of_encode() {
        let entry = Entry::new("k", &vec![1, 2, 3]).unwrap();
        let decoded = decode(&encode(&entry).unwrap()).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let mut map = HashMap::new();
        map.insert("b".to_string(), 2);
        map.insert("a".to_string(), 1);
        map.insert("c".to_string(), 3);

        let first = encode_value("m", &map).unwrap();
        let second = encode_value("m", &map).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_decode_garbage_is_corrupt() {
        let result = decode(b"\x00\x01not json");
        assert!(matches!(result, Err(CacheError::CorruptPayload(_))));
    }

    #[test]
    fn test_decode_missing_key_is_corrupt() {
        let bytes = encode_value("foo", "bar").unwrap();
        let result: Result<String> = decode_value("other", &bytes);
        assert!(matches!(result, Err(CacheError::CorruptPayload(_))));
    }

    #[test]
    fn test_decode_wrong_type_is_corrupt() {
        let bytes = encode_value("foo", "bar").unwrap();
        let result: Result<u64> = decode_value("foo", &bytes);
        assert!(matches!(result, Err(CacheError::CorruptPayload(_))));
    }

    #[test]
    fn test_non_string_map_keys_fail_to_encode() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], "x");

        let result = encode_value("bad", &map);
        assert!(matches!(result, Err(CacheError::Encode(_))));
    }
}
