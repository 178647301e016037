//! The middleware pipeline.
//!
//! Every call runs through an ordered chain of [`Handler`]s. A handler does its
//! work, awaits [`Context::next`] to let the rest of the chain run, and may do
//! more work once that returns. Handlers therefore run in registration order
//! on the way in and in reverse order on the way out:
//!
//! ```text
//! H1 pre -> H2 pre -> transport -> H2 post -> H1 post
//! ```
//!
//! A handler that never awaits `next` stops the chain after itself. Calling
//! [`Context::abort`] does the same for every handler still to come, without
//! unwinding the handlers already running.

mod pool;

pub(crate) use pool::ContextPool;

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// An ordered handler chain, shared by every call of a client.
pub type Chain = Arc<[Arc<dyn Handler>]>;

/// One step of the chain.
///
/// `handle` owns the call for as long as it runs: work done before awaiting
/// [`Context::next`] sees the request on its way out, work done after sees
/// the response. Failures are reported on the response, never returned.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut Context);
}

/// Where the execution of a chain stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// More handlers may run.
    #[default]
    Continue,
    /// A handler stopped the chain, `next` is a no-op from now on.
    Aborted,
    /// The last handler of the chain has been invoked.
    Completed,
}

/// The state of one in flight call.
#[derive(Default)]
pub struct Context {
    chain: Option<Chain>,
    cursor: usize,
    flow: Flow,
    request: Request,
    response: Response,
}

impl Context {
    pub(crate) fn new(chain: Chain, request: Request, response: Response) -> Self {
        Self { chain: Some(chain), cursor: 0, flow: Flow::Continue, request, response }
    }

    /// Runs the next handler of the chain.
    pub async fn next(&mut self) {
        if self.flow != Flow::Continue {
            return;
        }

        let Some(chain) = self.chain.as_ref() else {
            return;
        };
        let Some(handler) = chain.get(self.cursor).cloned() else {
            self.flow = Flow::Completed;
            return;
        };

        self.cursor += 1;
        if self.cursor == chain.len() {
            self.flow = Flow::Completed;
        }
        handler.handle(self).await;
    }

    /// Stops the chain, no further handler will be invoked.
    ///
    /// Aborting more than once, or after the chain completed, leaves the flow
    /// as it is.
    pub fn abort(&mut self) {
        if self.flow == Flow::Continue {
            self.flow = Flow::Aborted;
        }
    }

    /// Aborts the chain and records `reason` as the error of the call.
    pub fn abort_with_error<S: ToString>(&mut self, reason: S) {
        self.abort();
        self.response.set_error(Error::aborted(reason));
    }

    pub fn is_aborted(&self) -> bool {
        self.flow == Flow::Aborted
    }

    pub fn flow(&self) -> Flow {
        self.flow
    }

    /// Index of the next handler to run.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub(crate) fn take_response(&mut self) -> Response {
        std::mem::take(&mut self.response)
    }

    /// Clears every field so the context can serve another call.
    pub(crate) fn reset(&mut self) {
        self.chain = None;
        self.cursor = 0;
        self.flow = Flow::Continue;
        self.request = Request::default();
        self.response = Response::default();
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("chain_len", &self.chain.as_ref().map(|chain| chain.len()))
            .field("cursor", &self.cursor)
            .field("flow", &self.flow)
            .field("request", &self.request)
            .field("response", &self.response)
            .finish()
    }
}

/// A handler built from a closure, see [`handler_fn`].
pub struct HandlerFn<F> {
    f: F,
}

/// Turns a closure into a [`Handler`].
///
/// The closure borrows the context and returns a boxed future, so the context
/// stays in place if the closure panics:
///
/// ```
/// use micro_req::pipeline::handler_fn;
///
/// let handler = handler_fn(|ctx| {
///     Box::pin(async move {
///         ctx.request_mut().headers_mut().insert("x-trace", "1".parse().unwrap());
///         ctx.next().await;
///     })
/// });
/// # drop(handler);
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync,
{
    HandlerFn { f }
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync,
{
    async fn handle(&self, ctx: &mut Context) {
        (self.f)(ctx).await;
    }
}
