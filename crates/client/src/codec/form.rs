use crate::codec::{Codec, CodecError, FORM};
use bytes::Bytes;
use serde_json::{Map, Value};

/// `application/x-www-form-urlencoded` bodies.
///
/// Only flat objects of scalar values can be marshalled. Unmarshalling yields an
/// object of strings, a key repeated on the wire becomes an array.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormCodec;

impl Codec for FormCodec {
    fn name(&self) -> &str {
        FORM
    }

    fn content_type(&self) -> &str {
        mime::APPLICATION_WWW_FORM_URLENCODED.as_ref()
    }

    fn marshal(&self, value: &Value) -> Result<Bytes, CodecError> {
        serde_urlencoded::to_string(value).map(Bytes::from).map_err(|e| CodecError::marshal(FORM, e))
    }

    fn unmarshal(&self, data: &[u8]) -> Result<Value, CodecError> {
        let pairs = serde_urlencoded::from_bytes::<Vec<(String, String)>>(data).map_err(|e| CodecError::unmarshal(FORM, e))?;

        let mut map = Map::new();
        for (key, value) in pairs {
            match map.get_mut(&key) {
                Some(Value::Array(values)) => values.push(Value::String(value)),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value)]);
                }
                None => {
                    map.insert(key, Value::String(value));
                }
            }
        }
        Ok(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_marshal_flat_object() {
        let bytes = FormCodec.marshal(&json!({"name": "li si", "age": 18})).unwrap();
        assert_eq!(bytes, Bytes::from_static(b"age=18&name=li+si"));
    }

    #[test]
    fn test_marshal_nested_fails() {
        assert!(FormCodec.marshal(&json!({"a": {"b": 1}})).is_err());
    }

    #[test]
    fn test_unmarshal_repeated_keys() {
        let value = FormCodec.unmarshal(b"a=1&b=x&a=2&a=3").unwrap();
        assert_eq!(value, json!({"a": ["1", "2", "3"], "b": "x"}));
    }
}
