use crate::cookie::CookieStore;
use crate::error::Error;
use crate::pipeline::{Context, Handler};
use async_trait::async_trait;
use micro_req_transport::{CallOptions, Transport, TransportRequest};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// The last handler of every chain: builds the request and performs the
/// round trip.
pub(crate) struct TransportHandler {
    transport: Arc<dyn Transport>,
    cookies: Option<Arc<CookieStore>>,
}

impl TransportHandler {
    pub(crate) fn new(transport: Arc<dyn Transport>, cookies: Option<Arc<CookieStore>>) -> Self {
        Self { transport, cookies }
    }
}

#[async_trait]
impl Handler for TransportHandler {
    async fn handle(&self, ctx: &mut Context) {
        let mut request = match ctx.request_mut().build().await {
            Ok(request) => request,
            Err(e) => {
                debug!(cause = %e, "request build failed");
                ctx.response_mut().set_error(e);
                return;
            }
        };
        if let Some(cookies) = &self.cookies {
            cookies.apply(&mut request);
        }

        let snapshot = snapshot(&request);
        let uri = request.uri().clone();
        let options = CallOptions::of(&request).cloned().unwrap_or_default();

        let started = Instant::now();
        let result = self.transport.perform(request).await;

        let response = ctx.response_mut();
        response.set_elapsed(started.elapsed());
        response.set_request(snapshot);
        match result {
            Ok(raw) => {
                if let Some(cookies) = &self.cookies {
                    cookies.store(&uri, raw.headers());
                }
                response.set_raw(raw.map(|body| options.limit_body(body)));
            }
            Err(e) => {
                response.set_timeout(e.is_timeout());
                response.set_error(Error::Transport(e));
            }
        }
    }
}

/// Copies everything but the extensions.
fn snapshot(request: &TransportRequest) -> TransportRequest {
    let mut copy = TransportRequest::new(request.body().clone());
    *copy.method_mut() = request.method().clone();
    *copy.uri_mut() = request.uri().clone();
    *copy.version_mut() = request.version();
    *copy.headers_mut() = request.headers().clone();
    copy
}
