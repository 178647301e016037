use crate::error::Error;
use bytes::{Bytes, BytesMut};
use futures::{Stream, TryStreamExt};
use micro_req_transport::BoxError;
use std::any::Any;
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt};

pub type BodyReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BodyStream = Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send + Unpin>;
pub type BodyProducer = Box<dyn FnOnce() -> Result<Bytes, BoxError> + Send>;

/// The raw request body, resolved into bytes when the request is built.
#[derive(Default)]
pub(crate) enum RawBody {
    #[default]
    Empty,
    Ready(Bytes),
    Reader(BodyReader),
    Stream(BodyStream),
    Producer(BodyProducer),
    /// Resolving failed, the source is gone.
    Failed(Error),
}

impl RawBody {
    /// Drains readers and streams and runs producers. The outcome replaces the
    /// pending source, so a body is only ever produced once and a failed one
    /// keeps failing.
    pub(crate) async fn resolve(&mut self) -> Result<Bytes, Error> {
        let result = match std::mem::take(self) {
            RawBody::Empty => Ok(Bytes::new()),
            RawBody::Ready(bytes) => Ok(bytes),
            RawBody::Failed(e) => Err(e),
            RawBody::Reader(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await.map(|_| Bytes::from(buf)).map_err(Error::from)
            }
            RawBody::Stream(stream) => stream
                .try_fold(BytesMut::new(), |mut buf, chunk| async move {
                    buf.extend_from_slice(&chunk);
                    Ok(buf)
                })
                .await
                .map(BytesMut::freeze)
                .map_err(Error::request_body),
            RawBody::Producer(producer) => producer().map_err(Error::request_body),
        };

        *self = match &result {
            Ok(bytes) => RawBody::Ready(bytes.clone()),
            Err(e) => RawBody::Failed(e.clone()),
        };
        result
    }

    /// Returns the body bytes if they are already in memory.
    pub(crate) fn bytes(&self) -> Option<&Bytes> {
        match self {
            RawBody::Ready(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl fmt::Debug for RawBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawBody::Empty => f.write_str("Empty"),
            RawBody::Ready(bytes) => f.debug_tuple("Ready").field(bytes).finish(),
            RawBody::Reader(_) => f.write_str("Reader"),
            RawBody::Stream(_) => f.write_str("Stream"),
            RawBody::Producer(_) => f.write_str("Producer"),
            RawBody::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
        }
    }
}

/// Types usable directly as a request body.
pub trait IntoBody {
    fn into_body(self) -> Result<Bytes, Error>;
}

impl IntoBody for Bytes {
    fn into_body(self) -> Result<Bytes, Error> {
        Ok(self)
    }
}

impl IntoBody for BytesMut {
    fn into_body(self) -> Result<Bytes, Error> {
        Ok(self.freeze())
    }
}

impl IntoBody for Vec<u8> {
    fn into_body(self) -> Result<Bytes, Error> {
        Ok(Bytes::from(self))
    }
}

impl IntoBody for &'static [u8] {
    fn into_body(self) -> Result<Bytes, Error> {
        Ok(Bytes::from_static(self))
    }
}

impl IntoBody for String {
    fn into_body(self) -> Result<Bytes, Error> {
        Ok(Bytes::from(self))
    }
}

impl IntoBody for &'static str {
    fn into_body(self) -> Result<Bytes, Error> {
        Ok(Bytes::from_static(self.as_bytes()))
    }
}

impl IntoBody for serde_json::Value {
    fn into_body(self) -> Result<Bytes, Error> {
        serde_json::to_vec(&self).map(Bytes::from).map_err(Error::request_body)
    }
}

/// Coerces a type erased value into a body.
///
/// Tried in order: a json value, an open reader, a chunk stream, buffered
/// bytes, a string, a byte vector and finally a producer function. Readers
/// and streams stay separate sources. Both are drained at build, then dropped:
/// the request owns them, so dropping is what closes a reader.
pub(crate) fn coerce(value: Box<dyn Any + Send>) -> Result<RawBody, Error> {
    let value = match value.downcast::<serde_json::Value>() {
        Ok(json) => return (*json).into_body().map(RawBody::Ready),
        Err(value) => value,
    };
    let value = match value.downcast::<BodyReader>() {
        Ok(reader) => return Ok(RawBody::Reader(*reader)),
        Err(value) => value,
    };
    let value = match value.downcast::<BodyStream>() {
        Ok(stream) => return Ok(RawBody::Stream(*stream)),
        Err(value) => value,
    };
    let value = match value.downcast::<BytesMut>() {
        Ok(buf) => return Ok(RawBody::Ready(buf.freeze())),
        Err(value) => value,
    };
    let value = match value.downcast::<Bytes>() {
        Ok(bytes) => return Ok(RawBody::Ready(*bytes)),
        Err(value) => value,
    };
    let value = match value.downcast::<String>() {
        Ok(s) => return Ok(RawBody::Ready(Bytes::from(*s))),
        Err(value) => value,
    };
    let value = match value.downcast::<&'static str>() {
        Ok(s) => return Ok(RawBody::Ready(Bytes::from_static(s.as_bytes()))),
        Err(value) => value,
    };
    let value = match value.downcast::<Vec<u8>>() {
        Ok(vec) => return Ok(RawBody::Ready(Bytes::from(*vec))),
        Err(value) => value,
    };
    match value.downcast::<BodyProducer>() {
        Ok(producer) => Ok(RawBody::Producer(*producer)),
        Err(_) => Err(Error::UnsupportedBody),
    }
}
