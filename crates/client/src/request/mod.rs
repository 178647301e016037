//! The request builder.
//!
//! A [`Request`] accumulates everything a call needs (method, url, headers,
//! parameters, cookies, uploads and body) and is turned into a wire ready
//! [`TransportRequest`] by [`Request::build`]. Building does not consume the
//! builder, a request can be used as a template and built again.
//!
//! Setters never fail. The first error a setter runs into is recorded on the
//! request and returned by `build`, later setters keep updating their fields
//! but never replace that error.

mod body;
mod multipart;
mod params;
mod upload;

pub use body::{BodyProducer, BodyReader, BodyStream, IntoBody};
pub use params::Params;
pub use upload::{Upload, UploadSource};

use crate::client::Client;
use crate::codec::{self, Codecs};
use crate::error::Error;
use crate::pipeline::Handler;
use crate::response::Response;
use body::RawBody;
use bytes::Bytes;
use futures::Stream;
use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri};
use micro_req_transport::{BoxError, CallOptions, TransportRequest};
use multipart::Multipart;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Field name used by [`Request::add_files`].
pub const FILES_FIELD: &str = "media";

#[derive(Default)]
pub struct Request {
    name: String,
    method: Method,
    url: String,
    query: Params,
    form: Params,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
    body: RawBody,
    uploads: Vec<Upload>,
    lazy_body: Option<Box<dyn Any + Send>>,
    error: Option<Error>,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
    handlers: Vec<Arc<dyn Handler>>,
    client: Option<Client>,
}

macro_rules! method_shortcuts {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            pub fn $name<S: Into<String>>(url: S) -> Self {
                Self::new(Method::$method, url)
            }
        )*
    };
}

impl Request {
    pub fn new<S: Into<String>>(method: Method, url: S) -> Self {
        Self { method, url: url.into(), ..Self::default() }
    }

    method_shortcuts! {
        get => GET,
        post => POST,
        put => PUT,
        delete => DELETE,
        head => HEAD,
        patch => PATCH,
    }

    /// Binds the request to a client. Unbound requests are sent through the
    /// process wide client, see [`crate::global`].
    pub fn with_client(mut self, client: &Client) -> Self {
        self.client = Some(client.clone());
        self
    }

    /// Names the request, the name shows up in logs.
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_method_str(mut self, method: &str) -> Self {
        match Method::from_bytes(method.as_bytes()) {
            Ok(method) => self.method = method,
            Err(e) => self.set_error(Error::invalid_method(e)),
        }
        self
    }

    pub fn with_url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = url.into();
        self
    }

    // headers

    /// Sets a header, replacing all previous values.
    pub fn with_header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: fmt::Display,
        V: TryInto<HeaderValue>,
        V::Error: fmt::Display,
    {
        if let Some((name, value)) = self.header_pair(name, value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Appends a header value, keeping the previous ones.
    pub fn add_header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: fmt::Display,
        V: TryInto<HeaderValue>,
        V::Error: fmt::Display,
    {
        if let Some((name, value)) = self.header_pair(name, value) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn add_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: TryInto<HeaderName>,
        K::Error: fmt::Display,
        V: TryInto<HeaderValue>,
        V::Error: fmt::Display,
    {
        headers.into_iter().fold(self, |request, (name, value)| request.add_header(name, value))
    }

    pub fn with_accept(self, accept: &str) -> Self {
        self.with_header(header::ACCEPT, accept)
    }

    pub fn with_content_type(self, content_type: &str) -> Self {
        self.with_header(header::CONTENT_TYPE, content_type)
    }

    pub fn with_user_agent(self, user_agent: &str) -> Self {
        self.with_optional_header(header::USER_AGENT, user_agent)
    }

    pub fn with_referer(self, referer: &str) -> Self {
        self.with_optional_header(header::REFERER, referer)
    }

    pub fn with_origin(self, origin: &str) -> Self {
        self.with_optional_header(header::ORIGIN, origin)
    }

    /// Asks for a `text/event-stream` response on a kept alive connection.
    pub fn with_stream_headers(self) -> Self {
        self.with_header(header::ACCEPT, "text/event-stream")
            .with_header(header::CACHE_CONTROL, "no-cache")
            .with_header(header::CONNECTION, "keep-alive")
    }

    fn with_optional_header(mut self, name: HeaderName, value: &str) -> Self {
        if value.is_empty() {
            self.headers.remove(name);
            self
        } else {
            self.with_header(name, value)
        }
    }

    fn header_pair<K, V>(&mut self, name: K, value: V) -> Option<(HeaderName, HeaderValue)>
    where
        K: TryInto<HeaderName>,
        K::Error: fmt::Display,
        V: TryInto<HeaderValue>,
        V::Error: fmt::Display,
    {
        let name = match name.try_into() {
            Ok(name) => name,
            Err(e) => {
                self.set_error(Error::invalid_header(e));
                return None;
            }
        };
        match value.try_into() {
            Ok(value) => Some((name, value)),
            Err(e) => {
                self.set_error(Error::invalid_header(format!("{name}: {e}")));
                None
            }
        }
    }

    // query and form parameters

    pub fn with_query_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.set(key, value);
        self
    }

    pub fn add_query_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.add(key, value);
        self
    }

    pub fn with_query_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query.set_all(params);
        self
    }

    pub fn add_query_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query.add_all(params);
        self
    }

    /// Adds every field of `value` as a query parameter.
    pub fn with_query_struct<T: Serialize>(mut self, value: &T) -> Self {
        match Params::from_struct(value) {
            Ok(params) => self.query.extend(params),
            Err(e) => self.set_error(e),
        }
        self
    }

    pub fn with_form_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.form.set(key, value);
        self
    }

    pub fn add_form_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.form.add(key, value);
        self
    }

    pub fn with_form_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.form.set_all(params);
        self
    }

    pub fn add_form_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.form.add_all(params);
        self
    }

    /// Adds every field of `value` as a form parameter.
    pub fn with_form_struct<T: Serialize>(mut self, value: &T) -> Self {
        match Params::from_struct(value) {
            Ok(params) => self.form.extend(params),
            Err(e) => self.set_error(e),
        }
        self
    }

    pub fn add_cookie<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    // uploads

    /// Uploads the content of `reader`. An empty `field` is replaced by
    /// `file<index>` when the request is built.
    pub fn add_file<R>(self, field: &str, file_name: &str, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.add_upload(field, file_name, UploadSource::Reader(Box::new(reader)))
    }

    pub fn add_file_content<B: Into<Bytes>>(self, field: &str, file_name: &str, content: B) -> Self {
        self.add_upload(field, file_name, UploadSource::Bytes(content.into()))
    }

    /// Uploads every file matching the patterns under the field `media`.
    ///
    /// Patterns follow glob syntax (`*`, `?`, `[...]` and `**`), directories
    /// are skipped. A pattern matching nothing records [`Error::NoFileMatch`],
    /// a malformed one [`Error::InvalidFilePattern`].
    pub fn add_files<I>(mut self, patterns: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for pattern in patterns {
            let paths = match upload::expand(pattern.as_ref()) {
                Ok(paths) => paths,
                Err(e) => {
                    self.set_error(e);
                    continue;
                }
            };
            for path in paths {
                let file_name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
                self.uploads.push(Upload::new(Some(FILES_FIELD.to_owned()), file_name, UploadSource::Path(path)));
            }
        }
        self
    }

    pub fn add_file_path<P: Into<PathBuf>>(self, field: &str, path: P) -> Self {
        let path = path.into();
        let file_name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
        self.add_upload(field, &file_name, UploadSource::Path(path))
    }

    fn add_upload(mut self, field: &str, file_name: &str, source: UploadSource) -> Self {
        let field = if field.is_empty() { None } else { Some(field.to_owned()) };
        self.uploads.push(Upload::new(field, file_name, source));
        self
    }

    // bodies

    pub fn with_body<B: IntoBody>(mut self, body: B) -> Self {
        match body.into_body() {
            Ok(bytes) => self.body = RawBody::Ready(bytes),
            Err(e) => self.set_error(e),
        }
        self
    }

    /// Sets a body of a type only known at runtime.
    ///
    /// Accepted are `serde_json::Value`, [`BodyReader`], [`BodyStream`],
    /// `BytesMut`, `Bytes`, `String`, `&'static str`, `Vec<u8>` and
    /// [`BodyProducer`], anything else
    /// records [`Error::UnsupportedBody`].
    pub fn with_any_body(mut self, body: Box<dyn Any + Send>) -> Self {
        match body::coerce(body) {
            Ok(body) => self.body = body,
            Err(e) => self.set_error(e),
        }
        self
    }

    /// Sets a body read to the end when the request is built.
    pub fn with_body_reader<R>(mut self, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.body = RawBody::Reader(Box::new(reader));
        self
    }

    /// Sets a body collected from a chunk stream when the request is built.
    pub fn with_body_stream<S>(mut self, stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BoxError>> + Send + Unpin + 'static,
    {
        self.body = RawBody::Stream(Box::new(stream));
        self
    }

    /// Sets a body produced when the request is built.
    pub fn with_body_fn<F>(mut self, producer: F) -> Self
    where
        F: FnOnce() -> Result<Bytes, BoxError> + Send + 'static,
    {
        self.body = RawBody::Producer(Box::new(producer));
        self
    }

    /// Marshals `value` with the named codec and sets the codec's content type.
    pub fn with_codec_body<T: Serialize + ?Sized>(mut self, codec: &str, value: &T) -> Self {
        let codecs = self.codecs();
        let marshalled = codecs.get(codec).and_then(|c| Ok((codecs.marshal(codec, value)?, c.content_type().to_owned())));
        match marshalled {
            Ok((bytes, content_type)) => {
                self.body = RawBody::Ready(bytes);
                self.with_content_type(&content_type)
            }
            Err(e) => {
                self.set_error(e.into());
                self
            }
        }
    }

    pub fn with_json_body<T: Serialize + ?Sized>(self, value: &T) -> Self {
        self.with_codec_body(codec::JSON, value)
    }

    pub fn with_xml_body<T: Serialize + ?Sized>(self, value: &T) -> Self {
        self.with_codec_body(codec::XML, value)
    }

    /// Attaches a payload for a handler to turn into the real body.
    pub fn with_lazy_body<T: Any + Send>(mut self, payload: T) -> Self {
        self.lazy_body = Some(Box::new(payload));
        self
    }

    // call options

    /// Limits the whole round trip, overriding the client timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Adds a handler for this request only. It runs after the client's own
    /// handlers, right before the transport call.
    pub fn use_handler<H: Handler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    // mutable access for handlers

    /// Records an error. Only the first error is kept.
    pub fn set_error(&mut self, e: Error) {
        if self.error.is_none() {
            trace!(cause = %e, "request error recorded");
            self.error = Some(e);
        }
    }

    pub fn set_body<B: IntoBody>(&mut self, body: B) {
        match body.into_body() {
            Ok(bytes) => self.body = RawBody::Ready(bytes),
            Err(e) => self.set_error(e),
        }
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn query_params_mut(&mut self) -> &mut Params {
        &mut self.query
    }

    pub fn form_params_mut(&mut self) -> &mut Params {
        &mut self.form
    }

    pub fn lazy_body(&self) -> Option<&(dyn Any + Send)> {
        self.lazy_body.as_deref()
    }

    pub fn lazy_body_as<T: Any>(&self) -> Option<&T> {
        self.lazy_body.as_ref().and_then(|payload| payload.downcast_ref::<T>())
    }

    pub fn take_lazy_body(&mut self) -> Option<Box<dyn Any + Send>> {
        self.lazy_body.take()
    }

    // getters

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The url as given, without prefix and query parameters.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The host the request goes to, an explicit `Host` header wins over the
    /// url.
    pub fn host(&self) -> Option<String> {
        if let Some(host) = self.headers.get(header::HOST).and_then(|value| value.to_str().ok()) {
            return Some(host.to_owned());
        }
        let uri = self.full_url().parse::<Uri>().ok()?;
        uri.authority().map(|authority| authority.to_string())
    }

    pub fn path(&self) -> Option<String> {
        let uri = self.full_url().parse::<Uri>().ok()?;
        Some(uri.path().to_owned())
    }

    pub fn query_params(&self) -> &Params {
        &self.query
    }

    pub fn form_params(&self) -> &Params {
        &self.form
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    pub fn uploads(&self) -> &[Upload] {
        &self.uploads
    }

    /// The raw body, once it is in memory.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.bytes()
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    /// Sends the request through the bound client, or the process wide one.
    pub async fn send(self) -> Response {
        let client = match self.client.clone().or_else(crate::global::current) {
            Some(client) => client,
            None => {
                let mut response = Response::new(self.codecs());
                response.set_error(Error::NoClient);
                return response;
            }
        };
        client.execute(self).await
    }

    pub(crate) fn bind(&mut self, client: &Client) {
        if self.client.is_none() {
            self.client = Some(client.clone());
        }
    }

    pub(crate) fn take_handlers(&mut self) -> Vec<Arc<dyn Handler>> {
        std::mem::take(&mut self.handlers)
    }

    pub(crate) fn codecs(&self) -> Arc<Codecs> {
        match &self.client {
            Some(client) => Arc::clone(client.codecs()),
            None => Codecs::shared_default(),
        }
    }

    fn full_url(&self) -> String {
        let prefix = self.client.as_ref().and_then(|client| client.options().prefix_path()).unwrap_or_default();
        format!("{prefix}{}", self.url)
    }

    /// Builds the wire request.
    ///
    /// The body is, in order of precedence: a multipart body when there are
    /// uploads on a `POST` or `PUT`, the url encoded form parameters, or the
    /// raw body. Readers and producers are resolved here, once.
    pub async fn build(&mut self) -> Result<TransportRequest, Error> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }

        let mut url = self.full_url();
        if url.is_empty() {
            return Err(Error::NoUrl);
        }
        if !self.query.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&self.query.encode()?);
        }

        let mut headers = self.headers.clone();
        let body = if !self.uploads.is_empty() && (self.method == Method::POST || self.method == Method::PUT) {
            let mut multipart = Multipart::new();
            for (key, value) in self.form.iter() {
                multipart.write_field(key, value);
            }
            for (index, upload) in self.uploads.iter_mut().enumerate() {
                let content = upload.content().await?;
                let field = upload.field().map_or_else(|| format!("file{index}"), str::to_owned);
                multipart.write_file(&field, upload.file_name(), &content);
            }
            let content_type = HeaderValue::from_str(&multipart.content_type()).map_err(Error::invalid_header)?;
            headers.insert(header::CONTENT_TYPE, content_type);
            multipart.finish()
        } else if !self.form.is_empty() {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
            Bytes::from(self.form.encode()?)
        } else {
            self.body.resolve().await?
        };

        if !self.cookies.is_empty() {
            let mut cookie = headers.get(header::COOKIE).and_then(|value| value.to_str().ok()).unwrap_or_default().to_owned();
            for (name, value) in &self.cookies {
                if !cookie.is_empty() {
                    cookie.push_str("; ");
                }
                cookie.push_str(name);
                cookie.push('=');
                cookie.push_str(value);
            }
            headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).map_err(Error::invalid_header)?);
        }

        if body.is_empty() {
            headers.remove(header::CONTENT_LENGTH);
        } else {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        let uri = url.parse::<Uri>().map_err(Error::invalid_url)?;

        let mut request = TransportRequest::new(body);
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = uri;
        *request.headers_mut() = headers;

        if let Some(options) = self.call_options() {
            request.extensions_mut().insert(options);
        }
        Ok(request)
    }

    fn call_options(&self) -> Option<CallOptions> {
        let timeout = self.timeout.or_else(|| self.client.as_ref().and_then(|client| client.options().timeout()));
        let deadline = match (self.deadline, timeout) {
            (Some(deadline), Some(timeout)) => Some(deadline.min(Instant::now() + timeout)),
            (deadline, timeout) => deadline.or_else(|| timeout.map(|timeout| Instant::now() + timeout)),
        };

        if deadline.is_none() && self.cancellation.is_none() {
            return None;
        }
        Some(CallOptions::new(deadline, self.cancellation.clone()))
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("query", &self.query)
            .field("form", &self.form)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("uploads", &self.uploads)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
