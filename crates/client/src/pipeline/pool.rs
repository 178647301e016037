use crate::pipeline::{Chain, Context};
use crate::request::Request;
use crate::response::Response;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

/// Keeps reset execution contexts around for reuse.
///
/// At most `capacity` idle contexts are kept, anything released beyond that
/// is dropped.
#[derive(Debug)]
pub(crate) struct ContextPool {
    idle: Mutex<Vec<Context>>,
    capacity: usize,
}

impl ContextPool {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { idle: Mutex::new(Vec::with_capacity(capacity)), capacity }
    }

    pub(crate) fn acquire(self: &Arc<Self>, chain: Chain, request: Request, response: Response) -> PooledContext {
        let reused = self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop();
        let context = match reused {
            Some(mut context) => {
                context.chain = Some(chain);
                context.request = request;
                context.response = response;
                context
            }
            None => Context::new(chain, request, response),
        };
        PooledContext { context, pool: Arc::clone(self) }
    }

    fn release(&self, mut context: Context) {
        context.reset();
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.capacity {
            idle.push(context);
        } else {
            trace!(capacity = self.capacity, "context pool full, dropping context");
        }
    }

    pub(crate) fn idle(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// A context borrowed from a [`ContextPool`].
///
/// The context is reset and handed back when the guard drops, also when a
/// handler panics.
pub(crate) struct PooledContext {
    context: Context,
    pool: Arc<ContextPool>,
}

impl PooledContext {
    /// Ends the call, returning its response.
    pub(crate) fn finish(mut self) -> Response {
        self.context.take_response()
    }
}

impl Deref for PooledContext {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.context
    }
}

impl DerefMut for PooledContext {
    fn deref_mut(&mut self) -> &mut Context {
        &mut self.context
    }
}

impl Drop for PooledContext {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.context));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Flow, Handler};
    use async_trait::async_trait;
    use futures::FutureExt;
    use std::panic::AssertUnwindSafe;

    struct Panic;

    #[async_trait]
    impl Handler for Panic {
        async fn handle(&self, ctx: &mut Context) {
            ctx.abort();
            panic!("boom");
        }
    }

    fn chain() -> Chain {
        let panic: Arc<dyn Handler> = Arc::new(Panic);
        vec![panic].into()
    }

    #[tokio::test]
    async fn test_reused_context_is_reset() {
        let pool = Arc::new(ContextPool::new(2));

        let mut ctx = pool.acquire(Vec::new().into(), Request::get("http://a.example.com").with_name("first"), Response::default());
        ctx.abort();
        drop(ctx);
        assert_eq!(pool.idle(), 1);

        let ctx = pool.acquire(Vec::new().into(), Request::default(), Response::default());
        assert_eq!(pool.idle(), 0);
        assert_eq!(ctx.flow(), Flow::Continue);
        assert_eq!(ctx.cursor(), 0);
        assert_eq!(ctx.request().name(), "");
        assert_eq!(ctx.request().url(), "");
    }

    #[tokio::test]
    async fn test_capacity() {
        let pool = Arc::new(ContextPool::new(1));

        let a = pool.acquire(Vec::new().into(), Request::default(), Response::default());
        let b = pool.acquire(Vec::new().into(), Request::default(), Response::default());
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
    }

    #[tokio::test]
    async fn test_released_on_panic() {
        let pool = Arc::new(ContextPool::new(4));

        let result = AssertUnwindSafe(async {
            let mut ctx = pool.acquire(chain(), Request::get("http://a.example.com"), Response::default());
            ctx.next().await;
        })
        .catch_unwind()
        .await;

        assert!(result.is_err());
        assert_eq!(pool.idle(), 1);

        let ctx = pool.acquire(Vec::new().into(), Request::default(), Response::default());
        assert!(!ctx.is_aborted());
        assert_eq!(ctx.request().url(), "");
    }
}
