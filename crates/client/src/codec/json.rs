use crate::codec::{Codec, CodecError, JSON};
use bytes::Bytes;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &str {
        JSON
    }

    fn content_type(&self) -> &str {
        "application/json; charset=utf-8"
    }

    fn marshal(&self, value: &Value) -> Result<Bytes, CodecError> {
        serde_json::to_vec(value).map(Bytes::from).map_err(|e| CodecError::marshal(JSON, e))
    }

    fn unmarshal(&self, data: &[u8]) -> Result<Value, CodecError> {
        serde_json::from_slice(data).map_err(|e| CodecError::unmarshal(JSON, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_malformed() {
        let err = JsonCodec.unmarshal(b"{\"a\":").unwrap_err();
        assert!(matches!(err, CodecError::Unmarshal { .. }));
    }

    #[test]
    fn test_value() {
        let value = JsonCodec.unmarshal(br#"{"a":[1,2]}"#).unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
    }
}
