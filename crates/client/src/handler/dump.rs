use crate::pipeline::{Context, Handler};
use async_trait::async_trait;
use tracing::debug;

/// Logs [`Response::dump`](crate::Response::dump) at debug level.
///
/// With `read_body` set the response body is read first so it shows up in the
/// dump, it stays available to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpHandler {
    read_body: bool,
}

impl DumpHandler {
    pub fn new(read_body: bool) -> Self {
        Self { read_body }
    }
}

#[async_trait]
impl Handler for DumpHandler {
    async fn handle(&self, ctx: &mut Context) {
        ctx.next().await;

        if self.read_body {
            let _ = ctx.response_mut().as_bytes().await;
        }
        debug!(request = ctx.request().name(), "dump:\n{}", ctx.response().dump());
    }
}
