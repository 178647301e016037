use crate::error::Error;
use serde::Serialize;
use std::collections::BTreeMap;

/// Query or form parameters.
///
/// Keys are kept sorted so the encoded form is stable. Values of a repeated key
/// keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    inner: BTreeMap<String, Vec<String>>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flattens a serializable value into parameters, nested fields use the
    /// `a[b]` bracket notation.
    pub fn from_struct<T: Serialize>(value: &T) -> Result<Self, Error> {
        let encoded = serde_qs::to_string(value).map_err(Error::parse_struct)?;
        let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(&encoded).map_err(Error::parse_struct)?;

        let mut params = Self::new();
        params.add_all(pairs);
        Ok(params)
    }

    /// Replaces all values of `key`.
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.inner.insert(key.into(), vec![value.into()]);
    }

    /// Appends a value to `key`.
    pub fn add<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.inner.entry(key.into()).or_default().push(value.into());
    }

    pub fn set_all<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in pairs {
            self.set(key, value);
        }
    }

    pub fn add_all<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in pairs {
            self.add(key, value);
        }
    }

    /// Merges every value of `other` into `self`.
    pub fn extend(&mut self, other: Params) {
        for (key, values) in other.inner {
            self.inner.entry(key).or_default().extend(values);
        }
    }

    /// Returns the first value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).and_then(|values| values.first()).map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.inner.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.inner.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Iterates `(key, value)` pairs in encoding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().flat_map(|(key, values)| values.iter().map(move |value| (key.as_str(), value.as_str())))
    }

    /// Url encodes the parameters as `a=1&b=2&b=3`.
    pub fn encode(&self) -> Result<String, Error> {
        let pairs = self.iter().collect::<Vec<_>>();
        serde_urlencoded::to_string(pairs).map_err(Error::parse_struct)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        params.add_all(iter);
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Page {
        size: u32,
        q: String,
        filter: Filter,
    }

    #[derive(Serialize)]
    struct Filter {
        tag: String,
    }

    #[test]
    fn test_encode_sorted_keys() {
        let mut params = Params::new();
        params.add("b", "2");
        params.add("a", "1");
        params.add("b", "1");
        params.add("c", "x y&z");

        assert_eq!(params.encode().unwrap(), "a=1&b=2&b=1&c=x+y%26z");
    }

    #[test]
    fn test_set_replaces() {
        let mut params: Params = [("k", "1"), ("k", "2")].into_iter().collect();
        assert_eq!(params.get_all("k"), ["1", "2"]);

        params.set("k", "3");
        assert_eq!(params.get("k"), Some("3"));
        assert_eq!(params.get_all("k").len(), 1);
        assert!(params.get_all("missing").is_empty());
    }

    #[test]
    fn test_from_struct() {
        let page = Page { size: 10, q: "rust lang".into(), filter: Filter { tag: "http".into() } };

        let params = Params::from_struct(&page).unwrap();
        assert_eq!(params.get("size"), Some("10"));
        assert_eq!(params.get("q"), Some("rust lang"));
        assert_eq!(params.get("filter[tag]"), Some("http"));
    }

    #[test]
    fn test_from_struct_rejects_scalars() {
        let err = Params::from_struct(&42).unwrap_err();
        assert!(matches!(err, Error::ParseStruct { .. }));
    }
}
