//! Encode/decode pair for persisted entity lists.

use crate::error::{Result, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialization format used when writing to a key-value store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Codec {
    /// Textual JSON.
    #[default]
    Json,
    MessagePack,
}

impl Codec {
    pub fn encode<V: Serialize>(&self, value: &V) -> Result<Vec<u8>> {
        match self {
            Codec::Json => Ok(serde_json::to_vec(value)?),
            Codec::MessagePack => Ok(rmp_serde::to_vec_named(value)?),
        }
    }

    pub fn decode<V: DeserializeOwned>(&self, bytes: &[u8]) -> Result<V> {
        match self {
            Codec::Json => {
                serde_json::from_slice(bytes).map_err(|e| StoreError::Deserialization(e.to_string()))
            }
            Codec::MessagePack => Ok(rmp_serde::from_slice(bytes)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_json_is_textual() {
        let bytes = Codec::Json.encode(&vec![json!({"id": "1"})]).unwrap();
        assert_eq!(std::str::from_utf8(&bytes).unwrap(), r#"[{"id":"1"}]"#);
    }

    #[test]
    fn test_messagepack_keeps_field_names() {
        let items = vec![json!({"id": "1", "score": 10})];
        let bytes = Codec::MessagePack.encode(&items).unwrap();
        let decoded: Vec<Value> = Codec::MessagePack.decode(&bytes).unwrap();
        assert_eq!(decoded, items);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result: Result<Vec<Value>> = Codec::Json.decode(b"not json");
        assert!(matches!(result, Err(StoreError::Deserialization(_))));
    }
}
