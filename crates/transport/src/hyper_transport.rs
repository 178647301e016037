use crate::body::ResponseBody;
use crate::error::{BodyError, TransportError};
use crate::transport::{CallOptions, Transport, TransportRequest, TransportResponse};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::time::Duration;
use tracing::debug;

/// Connection settings for [`HyperTransport`].
#[derive(Debug, Clone)]
pub struct HyperOptions {
    pub connect_timeout: Option<Duration>,
    pub keepalive: Option<Duration>,
    pub pool_idle_timeout: Option<Duration>,
    pub pool_max_idle_per_host: usize,
}

impl Default for HyperOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(30)),
            keepalive: Some(Duration::from_secs(30)),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 100,
        }
    }
}

/// The default transport: a pooled HTTP/1.1 client built on hyper.
///
/// Only plain `http` urls are supported, TLS is left to custom transports.
#[derive(Debug, Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HyperTransport {
    pub fn new(options: &HyperOptions) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(options.connect_timeout);
        connector.set_keepalive(options.keepalive);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(options.pool_idle_timeout)
            .pool_max_idle_per_host(options.pool_max_idle_per_host)
            .build(connector);

        Self { client }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new(&HyperOptions::default())
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn perform(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let uri = request.uri();
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(TransportError::invalid_request(format!("url must be absolute, got {uri}")));
        }

        let options = CallOptions::of(&request).cloned().unwrap_or_default();
        let call = async {
            let response = self.client.request(request.map(Full::new)).await.map_err(|e| {
                debug!(cause = %e, "hyper request failed");
                if e.is_connect() { TransportError::connect(e) } else { TransportError::request(e) }
            })?;
            Ok(response.map(|body| ResponseBody::stream(body.map_err(BodyError::transport))))
        };

        options.guard(call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    #[tokio::test]
    async fn test_relative_url_is_rejected() {
        let transport = HyperTransport::default();
        let request = Request::builder().uri("/relative").body(Bytes::new()).unwrap();

        let err = transport.perform(request).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_is_connect_error() {
        // bind then drop to get a local port with nothing listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let transport = HyperTransport::default();
        let request = Request::builder().uri(format!("http://{address}/")).body(Bytes::new()).unwrap();

        let err = transport.perform(request).await.unwrap_err();
        assert!(err.is_connect());
        assert!(!err.is_timeout());
    }
}
