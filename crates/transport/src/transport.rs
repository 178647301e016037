use crate::body::ResponseBody;
use crate::error::TransportError;
use crate::limit::LimitedBody;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A finalized, wire ready request: method, url, headers and the full body.
pub type TransportRequest = Request<Bytes>;

/// A response as handed back by a [`Transport`], body still unread.
pub type TransportResponse = Response<ResponseBody>;

/// Performs one request/response round trip.
///
/// Implementations may block the calling task for as long as the round trip
/// takes. A deadline or cancellation token attached through [`CallOptions`]
/// in the request extensions should abort the underlying connection.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn perform(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        (**self).perform(request).await
    }
}

/// Per call cancellation settings, stored in the request extensions.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new(deadline: Option<Instant>, cancellation: Option<CancellationToken>) -> Self {
        Self { deadline, cancellation }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Reads the options attached to a request, if any.
    pub fn of(request: &TransportRequest) -> Option<&CallOptions> {
        request.extensions().get::<CallOptions>()
    }

    /// Runs `call` until it finishes, the deadline passes or the token fires,
    /// whichever comes first.
    pub async fn guard<F>(&self, call: F) -> Result<TransportResponse, TransportError>
    where
        F: Future<Output = Result<TransportResponse, TransportError>>,
    {
        let deadline = self.deadline;
        let cancellation = self.cancellation.clone();

        tokio::select! {
            biased;
            () = cancelled(cancellation) => Err(TransportError::Canceled),
            () = expired(deadline) => Err(TransportError::Timeout),
            result = call => result,
        }
    }
}

impl CallOptions {
    /// Extends the deadline and the cancellation token over the reading of
    /// `body`, which `guard` alone stops covering once the headers arrived.
    pub fn limit_body(&self, body: ResponseBody) -> ResponseBody {
        if self.deadline.is_none() && self.cancellation.is_none() {
            return body;
        }
        ResponseBody::stream(LimitedBody::new(body, self.deadline, self.cancellation.clone()))
    }
}

async fn cancelled(token: Option<CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
