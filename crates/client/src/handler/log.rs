use crate::pipeline::{Context, Handler};
use async_trait::async_trait;
use tracing::{error, info};

/// Logs one event per call.
///
/// Calls that failed or got a 5xx status are logged at error level, everything
/// else at info.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHandler {
    response_body: bool,
}

impl LogHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log the response body. The body is read to do so, later reads
    /// get the same bytes.
    pub fn with_response_body(mut self, response_body: bool) -> Self {
        self.response_body = response_body;
        self
    }
}

#[async_trait]
impl Handler for LogHandler {
    async fn handle(&self, ctx: &mut Context) {
        ctx.next().await;

        let name = ctx.request().name().to_owned();
        let (mut method, mut uri) = (ctx.request().method().to_string(), ctx.request().url().to_owned());

        let response = ctx.response_mut();
        let response_body = if self.response_body {
            response.as_bytes().await.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()).unwrap_or_default()
        } else {
            String::new()
        };

        let (mut request_headers, mut request_body) = (String::new(), String::new());
        if let Some(request) = response.request() {
            method = request.method().to_string();
            uri = request.uri().to_string();
            request_headers = format!("{:?}", request.headers());
            request_body = String::from_utf8_lossy(request.body()).into_owned();
        }

        let status = response.status().map(|status| status.as_u16());
        let elapsed = response.elapsed();

        match (response.error(), status) {
            (Some(e), _) => error!(
                %name, %method, %uri, ?status, ?elapsed, %request_headers, %request_body, cause = %e,
                "request failed"
            ),
            (None, Some(status)) if status >= 500 => error!(
                %name, %method, %uri, status, ?elapsed, %request_headers, %request_body, %response_body,
                "request got server error"
            ),
            _ => info!(
                %name, %method, %uri, ?status, ?elapsed, %request_headers, %request_body, %response_body,
                "request finished"
            ),
        }
    }
}
