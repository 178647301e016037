//! Named marshal/unmarshal capabilities.
//!
//! A [`Codec`] works on [`serde_json::Value`] so that it stays object safe and
//! can be stored in the [`Codecs`] registry behind an `Arc<dyn Codec>`. The
//! typed entry points are [`Codecs::marshal`] and [`Codecs::unmarshal`], which
//! go through the value tree on the way in and out.
//!
//! Lookups are by exact, case sensitive name. Registering a codec under a name
//! that is already taken replaces the previous one.

mod form;
mod json;
mod xml;

pub use form::FormCodec;
pub use json::JsonCodec;
pub use xml::XmlCodec;

use bytes::Bytes;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub const JSON: &str = "json";
pub const XML: &str = "xml";
pub const FORM: &str = "form";

static DEFAULT_CODECS: Lazy<Arc<Codecs>> = Lazy::new(|| Arc::new(Codecs::default()));

pub trait Codec: Send + Sync {
    fn name(&self) -> &str;

    /// The `Content-Type` a request body produced by this codec is sent with.
    fn content_type(&self) -> &str;

    fn marshal(&self, value: &Value) -> Result<Bytes, CodecError>;

    fn unmarshal(&self, data: &[u8]) -> Result<Value, CodecError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("codec: no codec named {name}")]
    NoCodec { name: String },

    #[error("codec {codec}: marshal error: {reason}")]
    Marshal { codec: String, reason: String },

    #[error("codec {codec}: unmarshal error: {reason}")]
    Unmarshal { codec: String, reason: String },
}

impl CodecError {
    pub fn no_codec<S: ToString>(name: S) -> Self {
        Self::NoCodec { name: name.to_string() }
    }

    pub fn marshal<C: ToString, S: ToString>(codec: C, reason: S) -> Self {
        Self::Marshal { codec: codec.to_string(), reason: reason.to_string() }
    }

    pub fn unmarshal<C: ToString, S: ToString>(codec: C, reason: S) -> Self {
        Self::Unmarshal { codec: codec.to_string(), reason: reason.to_string() }
    }

    pub fn is_no_codec(&self) -> bool {
        matches!(self, Self::NoCodec { .. })
    }
}

/// The codec registry.
#[derive(Clone)]
pub struct Codecs {
    inner: HashMap<String, Arc<dyn Codec>>,
}

impl Codecs {
    /// Creates an empty registry, without the built-in codecs.
    pub fn new() -> Self {
        Self { inner: HashMap::new() }
    }

    /// The registry shared by requests that are not bound to a client.
    pub fn shared_default() -> Arc<Codecs> {
        Arc::clone(&DEFAULT_CODECS)
    }

    pub fn register<C: Codec + 'static>(&mut self, codec: C) {
        self.register_arc(Arc::new(codec));
    }

    pub fn register_arc(&mut self, codec: Arc<dyn Codec>) {
        self.inner.insert(codec.name().to_owned(), codec);
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn Codec>, CodecError> {
        self.inner.get(name).ok_or_else(|| CodecError::no_codec(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    pub fn marshal<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<Bytes, CodecError> {
        let codec = self.get(name)?;
        let value = serde_json::to_value(value).map_err(|e| CodecError::marshal(name, e))?;
        codec.marshal(&value)
    }

    pub fn unmarshal<T: DeserializeOwned>(&self, name: &str, data: &[u8]) -> Result<T, CodecError> {
        let codec = self.get(name)?;
        let value = codec.unmarshal(data)?;
        serde_json::from_value(value).map_err(|e| CodecError::unmarshal(name, e))
    }
}

impl Default for Codecs {
    fn default() -> Self {
        let mut codecs = Self::new();
        codecs.register(JsonCodec);
        codecs.register(XmlCodec::new());
        codecs.register(FormCodec);
        codecs
    }
}

impl fmt::Debug for Codecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.names().collect::<Vec<_>>();
        names.sort_unstable();
        f.debug_struct("Codecs").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct User {
        name: String,
        age: u32,
    }

    struct Upper;

    impl Codec for Upper {
        fn name(&self) -> &str {
            JSON
        }

        fn content_type(&self) -> &str {
            "text/plain"
        }

        fn marshal(&self, value: &Value) -> Result<Bytes, CodecError> {
            Ok(Bytes::from(value.to_string().to_uppercase()))
        }

        fn unmarshal(&self, _data: &[u8]) -> Result<Value, CodecError> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_unknown_name_is_no_codec() {
        let codecs = Codecs::default();

        let err = codecs.unmarshal::<User>("yaml", b"name: zhangsan").unwrap_err();
        assert!(err.is_no_codec());
        assert_eq!(err, CodecError::no_codec("yaml"));

        let err = codecs.marshal(JSON.to_uppercase().as_str(), &1).unwrap_err();
        assert!(err.is_no_codec());
    }

    #[test]
    fn test_typed_json() {
        let codecs = Codecs::default();
        let user = User { name: "zhangsan".into(), age: 18 };

        let bytes = codecs.marshal(JSON, &user).unwrap();
        assert_eq!(bytes, Bytes::from_static(br#"{"age":18,"name":"zhangsan"}"#));
        assert_eq!(codecs.unmarshal::<User>(JSON, &bytes).unwrap(), user);
    }

    #[test]
    fn test_register_replaces() {
        let mut codecs = Codecs::default();
        codecs.register(Upper);

        assert_eq!(codecs.get(JSON).unwrap().content_type(), "text/plain");
        assert_eq!(codecs.marshal(JSON, "abc").unwrap(), Bytes::from_static(b"\"ABC\""));
    }

    #[test]
    fn test_empty_registry() {
        let codecs = Codecs::new();
        assert!(!codecs.contains(JSON));
        assert!(Codecs::shared_default().contains(FORM));
        assert!(Codecs::shared_default().contains(XML));
    }
}
