use crate::error::Error;
use crate::pipeline::{Context, Handler};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::error;

/// Catches panics raised further down the chain.
///
/// The panic is logged and the chain aborted. Unless built with
/// `report_error` off, the response also carries [`Error::Recovered`].
#[derive(Debug, Clone, Copy)]
pub struct Recovery {
    report_error: bool,
}

impl Recovery {
    pub fn new(report_error: bool) -> Self {
        Self { report_error }
    }
}

impl Default for Recovery {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl Handler for Recovery {
    async fn handle(&self, ctx: &mut Context) {
        let Err(panic) = AssertUnwindSafe(ctx.next()).catch_unwind().await else {
            return;
        };

        let message = panic_message(&*panic);
        error!(request = ctx.request().name(), url = ctx.request().url(), %message, "recovered from handler panic");
        ctx.abort();
        if self.report_error {
            ctx.response_mut().set_error(Error::recovered(message));
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Flow;
    use crate::request::Request;
    use crate::response::Response;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Explode;

    #[async_trait]
    impl Handler for Explode {
        async fn handle(&self, _ctx: &mut Context) {
            panic!("exploded with {}", 42);
        }
    }

    struct Never(Arc<AtomicBool>);

    #[async_trait]
    impl Handler for Never {
        async fn handle(&self, _ctx: &mut Context) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    async fn run(recovery: Recovery) -> (Context, bool) {
        let reached = Arc::new(AtomicBool::new(false));
        let chain: Vec<Arc<dyn Handler>> = vec![Arc::new(recovery), Arc::new(Explode), Arc::new(Never(reached.clone()))];
        let mut ctx = Context::new(chain.into(), Request::default(), Response::default());
        ctx.next().await;
        let reached = reached.load(Ordering::SeqCst);
        (ctx, reached)
    }

    #[tokio::test]
    async fn test_panic_becomes_error() {
        let (ctx, reached) = run(Recovery::default()).await;

        assert!(!reached);
        assert_eq!(ctx.flow(), Flow::Aborted);
        assert!(matches!(ctx.response().error(), Some(Error::Recovered { message }) if message == "exploded with 42"));
    }

    #[tokio::test]
    async fn test_log_only() {
        let (ctx, _) = run(Recovery::new(false)).await;

        assert!(ctx.is_aborted());
        assert!(ctx.response().error().is_none());
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&1u8), "unknown panic");
    }
}
