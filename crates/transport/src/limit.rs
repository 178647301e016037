use crate::body::ResponseBody;
use crate::error::BodyError;
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::time::{Instant, Sleep};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

#[derive(Debug, Clone, Copy)]
enum Cut {
    Deadline,
    Canceled,
}

impl Cut {
    fn error(self) -> BodyError {
        match self {
            Cut::Deadline => BodyError::Timeout,
            Cut::Canceled => BodyError::Canceled,
        }
    }
}

pin_project! {
    /// A body that fails once the call deadline passes or the call is
    /// canceled, however far the read has got.
    pub struct LimitedBody {
        #[pin]
        inner: ResponseBody,
        #[pin]
        sleep: Option<Sleep>,
        cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
        cut: Option<Cut>,
    }
}

impl LimitedBody {
    pub fn new(inner: ResponseBody, deadline: Option<Instant>, cancellation: Option<CancellationToken>) -> Self {
        Self {
            inner,
            sleep: deadline.map(tokio::time::sleep_until),
            cancelled: cancellation.map(|token| Box::pin(token.cancelled_owned())),
            cut: None,
        }
    }
}

impl Body for LimitedBody {
    type Data = Bytes;
    type Error = BodyError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();

        if let Some(cut) = *this.cut {
            return Poll::Ready(Some(Err(cut.error())));
        }
        if let Some(cancelled) = this.cancelled.as_mut()
            && cancelled.as_mut().poll(cx).is_ready()
        {
            *this.cancelled = None;
            *this.cut = Some(Cut::Canceled);
            return Poll::Ready(Some(Err(BodyError::Canceled)));
        }
        if let Some(sleep) = this.sleep.as_mut().as_pin_mut()
            && sleep.poll(cx).is_ready()
        {
            *this.cut = Some(Cut::Deadline);
            return Poll::Ready(Some(Err(BodyError::Timeout)));
        }

        this.inner.poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.cut.is_none() && self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl std::fmt::Debug for LimitedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimitedBody").field("inner", &self.inner).field("cut", &self.cut).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt, TryStreamExt};
    use http_body_util::{BodyExt, StreamBody};
    use std::time::Duration;

    fn stalled() -> ResponseBody {
        let frames = futures::stream::iter(vec![Ok::<_, std::io::Error>(Frame::data(Bytes::from_static(b"head")))])
            .chain(futures::stream::pending())
            .map_err(BodyError::io);
        ResponseBody::stream(StreamBody::new(frames))
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cuts_stalled_body() {
        let body = LimitedBody::new(stalled(), Some(Instant::now() + Duration::from_millis(50)), None);

        let err = body.collect().await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_cancellation_cuts_body() {
        let token = CancellationToken::new();
        let mut body = Box::pin(LimitedBody::new(stalled(), None, Some(token.clone())));

        let head = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(head, Bytes::from_static(b"head"));

        token.cancel();
        assert!(matches!(body.frame().await, Some(Err(BodyError::Canceled))));
        assert!(matches!(body.frame().await, Some(Err(BodyError::Canceled))));
        assert!(!body.is_end_stream());
    }

    #[tokio::test(start_paused = true)]
    async fn test_body_within_deadline() {
        let body = LimitedBody::new(ResponseBody::from("fast"), Some(Instant::now() + Duration::from_secs(1)), None);
        assert_eq!(body.collect().await.unwrap().to_bytes(), Bytes::from_static(b"fast"));
    }
}
