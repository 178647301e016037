use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Uri};
use micro_req_transport::TransportRequest;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use tracing::trace;

/// Remembers cookies set by responses, per host, and sends them back.
///
/// Only the name and value of a `Set-Cookie` are kept. An empty value or
/// `Max-Age=0` removes the cookie.
#[derive(Debug, Default)]
pub struct CookieStore {
    hosts: Mutex<HashMap<String, BTreeMap<String, String>>>,
}

impl CookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the `Set-Cookie` headers of a response from `uri`.
    pub fn store(&self, uri: &Uri, headers: &HeaderMap) {
        let Some(host) = uri.host() else {
            return;
        };

        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        for value in headers.get_all(SET_COOKIE) {
            let Some((name, value, expired)) = value.to_str().ok().and_then(parse_set_cookie) else {
                continue;
            };

            let cookies = hosts.entry(host.to_owned()).or_default();
            if expired || value.is_empty() {
                trace!(host, name, "cookie removed");
                cookies.remove(name);
            } else {
                trace!(host, name, "cookie stored");
                cookies.insert(name.to_owned(), value.to_owned());
            }
        }
    }

    /// Appends the stored cookies of the request host to its `Cookie` header.
    /// Cookies the request already carries are left as they are.
    pub fn apply(&self, request: &mut TransportRequest) {
        let Some(host) = request.uri().host() else {
            return;
        };

        let hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(cookies) = hosts.get(host).filter(|cookies| !cookies.is_empty()) else {
            return;
        };

        let mut cookie = request.headers().get(COOKIE).and_then(|value| value.to_str().ok()).unwrap_or_default().to_owned();
        let present = cookie.split(';').filter_map(|pair| pair.split_once('=')).map(|(name, _)| name.trim().to_owned()).collect::<Vec<_>>();

        for (name, value) in cookies {
            if present.iter().any(|present| present == name) {
                continue;
            }
            if !cookie.is_empty() {
                cookie.push_str("; ");
            }
            cookie.push_str(name);
            cookie.push('=');
            cookie.push_str(value);
        }
        drop(hosts);

        if let Ok(value) = HeaderValue::from_str(&cookie) {
            request.headers_mut().insert(COOKIE, value);
        }
    }

    pub fn get(&self, host: &str, name: &str) -> Option<String> {
        let hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        hosts.get(host).and_then(|cookies| cookies.get(name)).cloned()
    }

    pub fn clear(&self) {
        self.hosts.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Returns name, value and whether the cookie is already expired.
fn parse_set_cookie(header: &str) -> Option<(&str, &str, bool)> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let expired = parts.filter_map(|attribute| attribute.split_once('=')).any(|(key, value)| {
        key.trim().eq_ignore_ascii_case("max-age") && value.trim().parse::<i64>().is_ok_and(|age| age <= 0)
    });
    Some((name, value.trim().trim_matches('"'), expired))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn request(uri: &str) -> TransportRequest {
        let mut request = TransportRequest::new(Bytes::new());
        *request.uri_mut() = uri.parse().unwrap();
        request
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse_set_cookie("sid=abc; Path=/; HttpOnly"), Some(("sid", "abc", false)));
        assert_eq!(parse_set_cookie("sid=\"q\"; Max-Age=0"), Some(("sid", "q", true)));
        assert_eq!(parse_set_cookie("garbage"), None);
        assert_eq!(parse_set_cookie("=v"), None);
    }

    #[test]
    fn test_store_and_apply_per_host() {
        let store = CookieStore::new();
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("sid=1; Path=/"));
        headers.append(SET_COOKIE, HeaderValue::from_static("lang=en"));
        store.store(&"http://a.example.com/login".parse().unwrap(), &headers);

        let mut same_host = request("http://a.example.com/profile");
        same_host.headers_mut().insert(COOKIE, HeaderValue::from_static("lang=zh"));
        store.apply(&mut same_host);
        assert_eq!(same_host.headers()[COOKIE], "lang=zh; sid=1");

        let mut other_host = request("http://b.example.com/");
        store.apply(&mut other_host);
        assert!(other_host.headers().get(COOKIE).is_none());
    }

    #[test]
    fn test_expired_removes() {
        let store = CookieStore::new();
        let uri = "http://a.example.com/".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(SET_COOKIE, HeaderValue::from_static("sid=1"));
        store.store(&uri, &headers);
        assert_eq!(store.get("a.example.com", "sid").as_deref(), Some("1"));

        headers.insert(SET_COOKIE, HeaderValue::from_static("sid=deleted; Max-Age=0"));
        store.store(&uri, &headers);
        assert_eq!(store.get("a.example.com", "sid"), None);
    }
}
