use crate::codec::CodecError;
use micro_req_transport::{BodyError, SharedError, TransportError};
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// The error type of every fallible operation in this crate.
///
/// `Error` is cheap to clone, so a response that failed once keeps returning the
/// same error from every body accessor.
#[derive(Debug, Error, Clone)]
pub enum Error {
    #[error("req: url not specified")]
    NoUrl,

    #[error("req: invalid url: {reason}")]
    InvalidUrl { reason: String },

    #[error("req: invalid method: {reason}")]
    InvalidMethod { reason: String },

    #[error("req: invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("req: not supported body")]
    UnsupportedBody,

    #[error("req: no file match {pattern}")]
    NoFileMatch { pattern: String },

    #[error("req: invalid file pattern {pattern}: {reason}")]
    InvalidFilePattern { pattern: String, reason: String },

    #[error("req: can not parse struct param: {reason}")]
    ParseStruct { reason: String },

    #[error("req: multipart write error: {source}")]
    Multipart { source: Arc<io::Error> },

    #[error("req: body error: {source}")]
    RequestBody { source: SharedError },

    #[error("req: no client to send the request with")]
    NoClient,

    #[error("resp: no response")]
    NoResponse,

    #[error("resp: body error: {source}")]
    Body { source: Arc<BodyError> },

    #[error("handler panicked: {message}")]
    Recovered { message: String },

    #[error("aborted: {reason}")]
    Aborted { reason: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("stream closed")]
    StreamClosed,

    #[error("end of stream")]
    EndOfStream,

    #[error("io error: {source}")]
    Io { source: Arc<io::Error> },
}

impl Error {
    pub fn invalid_url<S: ToString>(str: S) -> Self {
        Self::InvalidUrl { reason: str.to_string() }
    }

    pub fn invalid_method<S: ToString>(str: S) -> Self {
        Self::InvalidMethod { reason: str.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn no_file_match<S: ToString>(pattern: S) -> Self {
        Self::NoFileMatch { pattern: pattern.to_string() }
    }

    pub fn invalid_file_pattern<P: ToString, S: ToString>(pattern: P, reason: S) -> Self {
        Self::InvalidFilePattern { pattern: pattern.to_string(), reason: reason.to_string() }
    }

    pub fn parse_struct<S: ToString>(str: S) -> Self {
        Self::ParseStruct { reason: str.to_string() }
    }

    pub fn multipart(e: io::Error) -> Self {
        Self::Multipart { source: Arc::new(e) }
    }

    pub fn request_body<E: Into<micro_req_transport::BoxError>>(e: E) -> Self {
        Self::RequestBody { source: Arc::from(e.into()) }
    }

    pub fn body(e: BodyError) -> Self {
        Self::Body { source: Arc::new(e) }
    }

    pub fn recovered<S: ToString>(message: S) -> Self {
        Self::Recovered { message: message.to_string() }
    }

    pub fn aborted<S: ToString>(reason: S) -> Self {
        Self::Aborted { reason: reason.to_string() }
    }

    pub fn io(e: io::Error) -> Self {
        Self::Io { source: Arc::new(e) }
    }

    /// Returns true if the call gave up because the deadline elapsed, during
    /// the round trip or while reading the body.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout(),
            Self::Body { source } => source.is_timeout(),
            _ => false,
        }
    }

    /// Returns true for stream errors: end of stream and reads on a closed stream.
    pub fn is_stream_end(&self) -> bool {
        matches!(self, Self::EndOfStream | Self::StreamClosed)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::io(e)
    }
}

impl From<BodyError> for Error {
    fn from(e: BodyError) -> Self {
        Self::body(e)
    }
}
