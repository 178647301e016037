use crate::codec::{Codec, Codecs};
use crate::cookie::CookieStore;
use crate::handler::transport::TransportHandler;
use crate::handler::{Decompress, Recovery};
use crate::pipeline::{Chain, ContextPool, Handler};
use crate::request::Request;
use crate::response::Response;
use http::{Method, Uri};
use micro_req_transport::{HyperOptions, HyperTransport, Transport};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Client wide settings.
#[derive(Debug, Clone)]
pub struct Options {
    timeout: Option<Duration>,
    prefix_path: Option<String>,
    enable_cookie: bool,
    recover_reports_error: bool,
    context_pool_capacity: usize,
    hyper: HyperOptions,
}

impl Options {
    /// The default timeout of a whole round trip.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Prepended to the url of every request.
    pub fn prefix_path(&self) -> Option<&str> {
        self.prefix_path.as_deref()
    }

    pub fn enable_cookie(&self) -> bool {
        self.enable_cookie
    }

    pub fn recover_reports_error(&self) -> bool {
        self.recover_reports_error
    }

    pub fn context_pool_capacity(&self) -> usize {
        self.context_pool_capacity
    }

    pub fn hyper(&self) -> &HyperOptions {
        &self.hyper
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: None,
            prefix_path: None,
            enable_cookie: true,
            recover_reports_error: true,
            context_pool_capacity: 64,
            hyper: HyperOptions::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientBuildError {
    #[error("invalid prefix path {prefix}: {reason}")]
    InvalidPrefix { prefix: String, reason: String },
}

pub struct ClientBuilder {
    options: Options,
    codecs: Codecs,
    handlers: Vec<Arc<dyn Handler>>,
    transport: Option<Arc<dyn Transport>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("options", &self.options)
            .field("codecs", &self.codecs)
            .field("handlers", &self.handlers.len())
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

impl ClientBuilder {
    fn new() -> Self {
        Self { options: Options::default(), codecs: Codecs::default(), handlers: vec![], transport: None }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn prefix_path<S: Into<String>>(mut self, prefix: S) -> Self {
        self.options.prefix_path = Some(prefix.into());
        self
    }

    pub fn enable_cookie(mut self, enable: bool) -> Self {
        self.options.enable_cookie = enable;
        self
    }

    /// Whether a panic caught in the chain is reported as the response error,
    /// or only logged.
    pub fn recover_reports_error(mut self, report: bool) -> Self {
        self.options.recover_reports_error = report;
        self
    }

    pub fn context_pool_capacity(mut self, capacity: usize) -> Self {
        self.options.context_pool_capacity = capacity;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.hyper.connect_timeout = Some(timeout);
        self
    }

    pub fn keepalive(mut self, keepalive: Duration) -> Self {
        self.options.hyper.keepalive = Some(keepalive);
        self
    }

    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.options.hyper.pool_idle_timeout = Some(timeout);
        self
    }

    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.options.hyper.pool_max_idle_per_host = max;
        self
    }

    /// Registers a codec, replacing any codec of the same name.
    pub fn codec<C: Codec + 'static>(mut self, codec: C) -> Self {
        self.codecs.register(codec);
        self
    }

    /// Adds a handler to the chain, after the ones added before.
    pub fn handler<H: Handler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Uses `transport` instead of the default hyper client.
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn build(self) -> Result<Client, ClientBuildError> {
        if let Some(prefix) = &self.options.prefix_path {
            validate_prefix(prefix)?;
        }
        Ok(Client::from_parts(self.options, self.codecs, self.handlers, self.transport))
    }
}

fn validate_prefix(prefix: &str) -> Result<(), ClientBuildError> {
    let invalid = |reason: String| ClientBuildError::InvalidPrefix { prefix: prefix.to_owned(), reason };

    if prefix.is_empty() || prefix.starts_with('/') {
        return Ok(());
    }
    let uri = prefix.parse::<Uri>().map_err(|e| invalid(e.to_string()))?;
    if uri.scheme().is_none() || uri.host().is_none() {
        return Err(invalid("expected an absolute url or a path starting with /".to_owned()));
    }
    Ok(())
}

/// The entry point for sending requests.
///
/// A client owns a handler chain, a transport and a codec registry. Cloning is
/// cheap and clones share all of them, the chain is never mutated in place:
/// [`Client::use_handler`] returns a new client with its own chain.
///
/// The chain always starts with [`Recovery`] and ends with [`Decompress`]
/// followed by the transport call, the configured handlers sit in between.
/// Handlers therefore only ever see decoded response bodies.
#[derive(Clone)]
pub struct Client {
    chain: Chain,
    shared: Arc<Shared>,
}

struct Shared {
    options: Options,
    codecs: Arc<Codecs>,
    pool: Arc<ContextPool>,
    cookies: Option<Arc<CookieStore>>,
}

macro_rules! client_method_shortcuts {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            pub fn $name<S: Into<String>>(&self, url: S) -> Request {
                self.request(Method::$method, url)
            }
        )*
    };
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// A client with default options over the hyper transport.
    pub fn new() -> Self {
        Self::from_parts(Options::default(), Codecs::default(), vec![], None)
    }

    fn from_parts(options: Options, codecs: Codecs, handlers: Vec<Arc<dyn Handler>>, transport: Option<Arc<dyn Transport>>) -> Self {
        let transport: Arc<dyn Transport> = match transport {
            Some(transport) => transport,
            None => Arc::new(HyperTransport::new(&options.hyper)),
        };
        let cookies = options.enable_cookie.then(|| Arc::new(CookieStore::new()));

        let mut chain: Vec<Arc<dyn Handler>> = Vec::with_capacity(handlers.len() + 3);
        chain.push(Arc::new(Recovery::new(options.recover_reports_error)));
        chain.extend(handlers);
        chain.push(Arc::new(Decompress));
        chain.push(Arc::new(TransportHandler::new(transport, cookies.clone())));

        let pool = Arc::new(ContextPool::new(options.context_pool_capacity));
        let shared = Shared { options, codecs: Arc::new(codecs), pool, cookies };
        Self { chain: chain.into(), shared: Arc::new(shared) }
    }

    pub fn options(&self) -> &Options {
        &self.shared.options
    }

    pub fn codecs(&self) -> &Arc<Codecs> {
        &self.shared.codecs
    }

    pub fn cookies(&self) -> Option<&CookieStore> {
        self.shared.cookies.as_deref()
    }

    /// Number of handlers in the chain, the transport call included.
    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    /// Returns a client whose chain has `handler` added right before
    /// decompression and the transport call. `self` is left untouched.
    pub fn use_handler<H: Handler + 'static>(&self, handler: H) -> Client {
        Self { chain: splice(&self.chain, vec![Arc::new(handler)]), shared: Arc::clone(&self.shared) }
    }

    pub fn request<S: Into<String>>(&self, method: Method, url: S) -> Request {
        Request::new(method, url).with_client(self)
    }

    client_method_shortcuts! {
        get => GET,
        post => POST,
        put => PUT,
        delete => DELETE,
        head => HEAD,
        patch => PATCH,
    }

    /// Runs `request` through the chain.
    ///
    /// Never fails: errors end up on the returned [`Response`].
    pub async fn execute(&self, mut request: Request) -> Response {
        request.bind(self);

        let handlers = request.take_handlers();
        let chain = if handlers.is_empty() { Arc::clone(&self.chain) } else { splice(&self.chain, handlers) };

        let response = Response::new(Arc::clone(&self.shared.codecs));
        let mut ctx = self.shared.pool.acquire(chain, request, response);
        ctx.next().await;
        ctx.finish()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("chain_len", &self.chain.len())
            .field("options", &self.shared.options)
            .field("codecs", &self.shared.codecs)
            .finish_non_exhaustive()
    }
}

/// Number of handlers closing every chain: decompression, then the transport.
const TAIL: usize = 2;

/// Copies `chain` with `handlers` inserted before its closing handlers.
fn splice(chain: &Chain, handlers: Vec<Arc<dyn Handler>>) -> Chain {
    let mut spliced = chain.to_vec();
    let at = spliced.len().saturating_sub(TAIL);
    spliced.splice(at..at, handlers);
    spliced.into()
}
