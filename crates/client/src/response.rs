use crate::codec::{self, Codecs};
use crate::error::Error;
use crate::stream::EventStream;
use bytes::Bytes;
use http::header::{self, HeaderMap};
use http::StatusCode;
use http_body_util::BodyExt;
use micro_req_transport::{ResponseBody, TransportRequest, TransportResponse};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::{self, Write};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// The outcome of a call.
///
/// Wraps the transport response and reads its body lazily: the first body
/// accessor reads the stream to the end and keeps the bytes, every later one
/// returns the kept bytes. An error stored on the response, from the pipeline
/// or from reading the body, is returned by every body accessor.
pub struct Response {
    request: Option<TransportRequest>,
    raw: Option<TransportResponse>,
    body: Option<Bytes>,
    error: Option<Error>,
    elapsed: Duration,
    timeout: bool,
    codecs: Arc<Codecs>,
}

impl Response {
    pub fn new(codecs: Arc<Codecs>) -> Self {
        Self { request: None, raw: None, body: None, error: None, elapsed: Duration::ZERO, timeout: false, codecs }
    }

    /// The request as it was handed to the transport, body included.
    pub fn request(&self) -> Option<&TransportRequest> {
        self.request.as_ref()
    }

    pub(crate) fn set_request(&mut self, request: TransportRequest) {
        self.request = Some(request);
    }

    pub fn raw(&self) -> Option<&TransportResponse> {
        self.raw.as_ref()
    }

    pub fn raw_mut(&mut self) -> Option<&mut TransportResponse> {
        self.raw.as_mut()
    }

    /// Replaces the transport response, dropping any cached body.
    pub fn set_raw(&mut self, raw: TransportResponse) {
        self.raw = Some(raw);
        self.body = None;
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.raw.as_ref().map(http::Response::status)
    }

    pub fn is_success(&self) -> bool {
        self.status().is_some_and(|status| status.is_success())
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        self.raw.as_ref().map(http::Response::headers)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers()?.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    /// The `Content-Length` header, or the length of the cached body.
    pub fn content_length(&self) -> Option<u64> {
        self.header(header::CONTENT_LENGTH.as_str())
            .and_then(|value| value.parse().ok())
            .or_else(|| self.body.as_ref().map(|body| body.len() as u64))
    }

    /// True if the transport call ran past its deadline.
    pub fn is_timeout(&self) -> bool {
        self.timeout
    }

    pub(crate) fn set_timeout(&mut self, timeout: bool) {
        self.timeout = timeout;
    }

    /// Time spent in the transport call.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub(crate) fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn set_error(&mut self, e: Error) {
        self.error = Some(e);
    }

    pub fn codecs(&self) -> &Arc<Codecs> {
        &self.codecs
    }

    /// The body, if it has been read already.
    pub fn cached_body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Reads the whole body, once.
    pub async fn as_bytes(&mut self) -> Result<Bytes, Error> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        if let Some(body) = &self.body {
            return Ok(body.clone());
        }

        let Some(raw) = self.raw.as_mut() else {
            return Err(Error::NoResponse);
        };
        match raw.body_mut().take().collect().await {
            Ok(collected) => {
                let bytes = collected.to_bytes();
                self.body = Some(bytes.clone());
                Ok(bytes)
            }
            Err(e) => {
                let e = Error::body(e);
                self.timeout |= e.is_timeout();
                self.error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// The body, empty if it could not be read.
    pub async fn bytes(&mut self) -> Bytes {
        self.as_bytes().await.unwrap_or_default()
    }

    /// Finishes with the body: reads it when `read` is set, otherwise drops
    /// the unread stream.
    pub async fn consume(&mut self, read: bool) {
        if read {
            let _ = self.as_bytes().await;
        } else if self.body.is_none() {
            if let Some(raw) = self.raw.as_mut() {
                drop(raw.body_mut().take());
            }
            self.body = Some(Bytes::new());
        }
    }

    pub async fn as_string(&mut self) -> Result<String, Error> {
        let bytes = self.as_bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// The body as text, empty if it could not be read.
    pub async fn text(&mut self) -> String {
        self.as_string().await.unwrap_or_default()
    }

    pub async fn as_reader(&mut self) -> Result<io::Cursor<Bytes>, Error> {
        self.as_bytes().await.map(io::Cursor::new)
    }

    /// Decodes the body with the named codec.
    pub async fn as_struct<T: DeserializeOwned>(&mut self, codec: &str) -> Result<T, Error> {
        let codecs = Arc::clone(&self.codecs);
        codecs.get(codec)?;
        let bytes = self.as_bytes().await?;
        Ok(codecs.unmarshal(codec, &bytes)?)
    }

    pub async fn as_json<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        self.as_struct(codec::JSON).await
    }

    pub async fn as_xml<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        self.as_struct(codec::XML).await
    }

    pub async fn as_json_value(&mut self) -> Result<Value, Error> {
        self.as_json().await
    }

    /// Writes the body to `dest`.
    pub async fn as_file<P: AsRef<Path>>(&mut self, dest: P) -> Result<(), Error> {
        let bytes = self.as_bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }

    /// Reads the body as a server sent event stream.
    ///
    /// A body that was already read is parsed from the cached bytes.
    pub fn into_event_stream(mut self) -> Result<EventStream, Error> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        if let Some(body) = self.body.take() {
            return Ok(EventStream::new(ResponseBody::once(body)));
        }
        match self.raw.take() {
            Some(raw) => Ok(EventStream::new(raw.into_body())),
            None => Err(Error::NoResponse),
        }
    }

    /// Renders the request and the response as text.
    ///
    /// The response body is only included once it has been read, dumping
    /// never reads it.
    pub fn dump(&self) -> String {
        let mut buf = String::new();

        if let Some(request) = &self.request {
            let _ = writeln!(buf, "{} {} {:?}", request.method(), request.uri(), request.version());
            dump_headers(&mut buf, request.headers());
            if !request.body().is_empty() {
                let _ = write!(buf, "\n{}", String::from_utf8_lossy(request.body()));
            }
        }
        buf.push_str("\n\n");

        if let Some(raw) = &self.raw {
            let _ = writeln!(buf, "{:?} {}", raw.version(), raw.status());
            dump_headers(&mut buf, raw.headers());
            if let Some(body) = &self.body {
                let _ = write!(buf, "\n{}", String::from_utf8_lossy(body));
            }
        }
        buf
    }
}

fn dump_headers(buf: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        let _ = writeln!(buf, "{}: {}", name, String::from_utf8_lossy(value.as_bytes()));
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(Codecs::shared_default())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status())
            .field("body", &self.body)
            .field("error", &self.error)
            .field("elapsed", &self.elapsed)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use http_body::Frame;
    use http_body_util::StreamBody;
    use micro_req_transport::BodyError;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn response_with(body: ResponseBody) -> Response {
        let mut response = Response::default();
        let raw = http::Response::builder().header("content-type", "application/json").body(body).unwrap();
        response.set_raw(raw);
        response
    }

    #[tokio::test]
    async fn test_body_read_once() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let frames = futures::stream::iter(vec![
            Ok::<_, io::Error>(Frame::data(Bytes::from_static(b"{\"a\":"))),
            Ok(Frame::data(Bytes::from_static(b"1}"))),
        ])
            .inspect_ok(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .map_err(BodyError::io);
        let mut response = response_with(ResponseBody::stream(StreamBody::new(frames)));

        let first = response.as_bytes().await.unwrap();
        let second = response.as_bytes().await.unwrap();
        assert_eq!(first, Bytes::from_static(b"{\"a\":1}"));
        assert_eq!(first, second);
        assert_eq!(polls.load(Ordering::SeqCst), 2);
        assert_eq!(response.content_length(), Some(7));
    }

    #[tokio::test]
    async fn test_read_error_is_kept() {
        let frames = futures::stream::iter(vec![Err::<Frame<Bytes>, _>(io::Error::other("reset"))]).map_err(BodyError::io);
        let mut response = response_with(ResponseBody::stream(StreamBody::new(frames)));

        assert!(matches!(response.as_bytes().await, Err(Error::Body { .. })));
        assert!(matches!(response.as_string().await, Err(Error::Body { .. })));
        assert!(response.text().await.is_empty());
    }

    #[tokio::test]
    async fn test_stored_error_wins() {
        let mut response = response_with(ResponseBody::from("ok"));
        response.set_error(Error::NoClient);

        assert!(matches!(response.as_bytes().await, Err(Error::NoClient)));
    }

    #[tokio::test]
    async fn test_no_response() {
        let mut response = Response::default();
        assert!(matches!(response.as_bytes().await, Err(Error::NoResponse)));
        assert_eq!(response.status(), None);
    }

    #[tokio::test]
    async fn test_structured() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct A {
            a: u32,
        }

        let mut response = response_with(ResponseBody::from(r#"{"a":1}"#));
        assert_eq!(response.as_json::<A>().await.unwrap(), A { a: 1 });
        assert_eq!(response.as_json_value().await.unwrap()["a"], 1);
        assert_eq!(response.content_type(), Some("application/json"));

        let err = response.as_xml::<A>().await.unwrap_err();
        assert!(matches!(err, Error::Codec(e) if !e.is_no_codec()));
        let err = response.as_struct::<A>("yaml").await.unwrap_err();
        assert!(matches!(err, Error::Codec(e) if e.is_no_codec()));
    }

    #[tokio::test]
    async fn test_as_xml() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Book {
            title: String,
            tags: Vec<String>,
        }

        let mut response = response_with(ResponseBody::from("<book><title>Rust</title><tags>a</tags><tags>b</tags></book>"));
        let book = response.as_xml::<Book>().await.unwrap();
        assert_eq!(book, Book { title: "Rust".into(), tags: vec!["a".into(), "b".into()] });
    }

    #[tokio::test]
    async fn test_dump_does_not_read() {
        let mut response = response_with(ResponseBody::from("payload"));
        response.set_request(TransportRequest::new(Bytes::from_static(b"ping")));

        let dump = response.dump();
        assert!(dump.starts_with("GET / HTTP/1.1\n"));
        assert!(dump.contains("ping"));
        assert!(dump.contains("200 OK"));
        assert!(!dump.contains("payload"));

        assert_eq!(response.as_bytes().await.unwrap(), Bytes::from_static(b"payload"));
        assert!(response.dump().contains("payload"));
    }

    #[tokio::test]
    async fn test_consume_without_read() {
        let mut response = response_with(ResponseBody::from("unread"));
        response.consume(false).await;

        assert_eq!(response.as_bytes().await.unwrap(), Bytes::new());
    }
}
