//! JSON payload codec.

use crate::error::CodecError;
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Encode a value as JSON bytes.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes, CodecError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(CodecError::Encode)
}

/// Decode JSON bytes into a structured value.
///
/// An empty payload decodes to `null`.
pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(CodecError::Decode)
}

/// Decode JSON bytes into a concrete type.
pub fn decode_as<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_roundtrip_representative_values() {
        let values = [
            json!({ "order": 17, "items": ["a", "b"], "paid": true }),
            json!([1, "two", null, { "three": 3.5 }]),
            json!("plain string"),
            json!(42),
            Value::Null,
        ];
        for value in values {
            let bytes = encode(&value).unwrap();
            assert_eq!(decode(&bytes).unwrap(), value);
        }
    }

    #[test]
    fn test_empty_payload_is_null() {
        assert_eq!(decode(b"").unwrap(), Value::Null);
    }

    #[test]
    fn test_invalid_json_is_decode_error() {
        let err = decode(b"{not json").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn test_decode_as_typed() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Ping {
            seq: u32,
        }
        let ping: Ping = decode_as(br#"{"seq":3}"#).unwrap();
        assert_eq!(ping, Ping { seq: 3 });
    }
}
