use crate::codec::{Codec, CodecError, XML};
use bytes::Bytes;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};
use std::borrow::Cow;

const DEFAULT_ROOT: &str = "xml";
const TEXT_KEY: &str = "$text";

/// `application/xml` bodies.
///
/// Marshalling wraps the value in a root element, `<xml>` unless configured
/// otherwise. Unmarshalling drops the root element and maps its content:
/// leaf elements become strings, attributes become `@name` keys and repeated
/// elements become arrays. Leaves stay strings, so typed targets want string
/// fields.
#[derive(Debug, Clone)]
pub struct XmlCodec {
    root: Cow<'static, str>,
}

impl XmlCodec {
    pub fn new() -> Self {
        Self { root: Cow::Borrowed(DEFAULT_ROOT) }
    }

    pub fn with_root<S: Into<Cow<'static, str>>>(mut self, root: S) -> Self {
        self.root = root.into();
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }
}

impl Default for XmlCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for XmlCodec {
    fn name(&self) -> &str {
        XML
    }

    fn content_type(&self) -> &str {
        "application/xml; charset=utf-8"
    }

    fn marshal(&self, value: &Value) -> Result<Bytes, CodecError> {
        quick_xml::se::to_string_with_root(&self.root, value).map(Bytes::from).map_err(|e| CodecError::marshal(XML, e))
    }

    fn unmarshal(&self, data: &[u8]) -> Result<Value, CodecError> {
        let xml = std::str::from_utf8(data).map_err(|e| CodecError::unmarshal(XML, e))?;
        parse(xml).map_err(|e| CodecError::unmarshal(XML, e))
    }
}

struct Node {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Node {
    fn open(start: &BytesStart<'_>) -> Result<Self, String> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut fields = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
            let value = attr.unescape_value().map_err(|e| e.to_string())?;
            fields.insert(key, Value::String(value.into_owned()));
        }
        Ok(Self { name, fields, text: String::new() })
    }

    fn close(mut self) -> (String, Value) {
        let value = if self.fields.is_empty() {
            Value::String(self.text)
        } else {
            if !self.text.is_empty() {
                self.fields.insert(TEXT_KEY.to_owned(), Value::String(self.text));
            }
            Value::Object(self.fields)
        };
        (self.name, value)
    }
}

fn attach(fields: &mut Map<String, Value>, name: String, value: Value) {
    match fields.get_mut(&name) {
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            fields.insert(name, value);
        }
    }
}

fn parse(xml: &str) -> Result<Value, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root = None;

    loop {
        let closed = match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(start) => {
                stack.push(Node::open(&start)?);
                None
            }
            Event::Empty(start) => Some(Node::open(&start)?.close()),
            Event::End(_) => stack.pop().map(Node::close),
            Event::Text(text) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text.unescape().map_err(|e| e.to_string())?);
                }
                None
            }
            Event::CData(data) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
                None
            }
            Event::Eof => break,
            _ => None,
        };

        if let Some((name, value)) = closed {
            match stack.last_mut() {
                Some(parent) => attach(&mut parent.fields, name, value),
                None if root.is_none() => root = Some(value),
                None => return Err(format!("unexpected second root element <{name}>")),
            }
        }
    }

    if let Some(node) = stack.last() {
        return Err(format!("unclosed element <{}>", node.name));
    }
    root.ok_or_else(|| "no root element".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codecs;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Address {
        name: String,
        city: String,
    }

    #[test]
    fn test_typed_round_trip() {
        let codecs = Codecs::default();
        let address = Address { name: "zhangsan".into(), city: "Hangzhou".into() };

        let bytes = codecs.marshal(XML, &address).unwrap();
        assert_eq!(bytes, Bytes::from_static(b"<xml><city>Hangzhou</city><name>zhangsan</name></xml>"));
        assert_eq!(codecs.unmarshal::<Address>(XML, &bytes).unwrap(), address);
    }

    #[test]
    fn test_custom_root() {
        let codec = XmlCodec::new().with_root("user");
        assert_eq!(codec.marshal(&json!({"name": "lisi"})).unwrap(), Bytes::from_static(b"<user><name>lisi</name></user>"));
    }

    #[test]
    fn test_attributes_and_repeated_elements() {
        let xml = br#"<?xml version="1.0"?>
            <user id="7">
                <tag>a</tag>
                <tag>b &amp; c</tag>
                <note lang="en">hi</note>
                <empty/>
            </user>"#;

        let value = XmlCodec::new().unmarshal(xml).unwrap();
        assert_eq!(value, json!({"@id": "7", "tag": ["a", "b & c"], "note": {"@lang": "en", "$text": "hi"}, "empty": ""}));
    }

    #[test]
    fn test_malformed() {
        assert!(XmlCodec::new().unmarshal(b"<a><b></a>").is_err());
        assert!(XmlCodec::new().unmarshal(b"<a>").is_err());
        assert!(XmlCodec::new().unmarshal(b"").is_err());
    }
}
