use std::error::Error;
use std::io;
use std::sync::Arc;
use thiserror::Error;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// A shared, cloneable error source.
pub type SharedError = Arc<dyn Error + Send + Sync>;

/// Failure of a transport round trip.
///
/// Deadline expiry is reported as its own variant so callers never have to
/// inspect the error text to tell a timeout from any other failure.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("deadline exceeded")]
    Timeout,

    #[error("request canceled")]
    Canceled,

    #[error("connect error: {source}")]
    Connect { source: SharedError },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("request error: {source}")]
    Request { source: SharedError },
}

impl TransportError {
    pub fn connect<E: Into<BoxError>>(e: E) -> Self {
        Self::Connect { source: Arc::from(e.into()) }
    }

    pub fn invalid_request<S: ToString>(str: S) -> Self {
        Self::InvalidRequest { reason: str.to_string() }
    }

    pub fn request<E: Into<BoxError>>(e: E) -> Self {
        Self::Request { source: Arc::from(e.into()) }
    }

    /// Returns true if the round trip failed because its deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect { .. })
    }
}

/// Failure while pulling frames out of a response body.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("deadline exceeded while reading body")]
    Timeout,

    #[error("body read canceled")]
    Canceled,

    #[error("body decode error, encoding {encoding}: {source}")]
    Decode { encoding: &'static str, source: io::Error },

    #[error("body transport error: {source}")]
    Transport { source: BoxError },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl BodyError {
    pub fn decode(encoding: &'static str, source: io::Error) -> Self {
        Self::Decode { encoding, source }
    }

    pub fn transport<E: Into<BoxError>>(e: E) -> Self {
        Self::Transport { source: e.into() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Returns true if the body was cut off because the call deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl From<BodyError> for io::Error {
    fn from(e: BodyError) -> Self {
        match e {
            BodyError::Io { source } => source,
            other => io::Error::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_classified_structurally() {
        assert!(TransportError::Timeout.is_timeout());
        assert!(!TransportError::Canceled.is_timeout());
        assert!(!TransportError::connect(io::Error::new(io::ErrorKind::TimedOut, "deadline exceeded")).is_timeout());
    }

    #[test]
    fn body_error_into_io_keeps_io_source() {
        let e: io::Error = BodyError::io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof")).into();
        assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);

        let e: io::Error = BodyError::transport("boom").into();
        assert_eq!(e.kind(), io::ErrorKind::Other);
    }

    #[test]
    fn body_timeout_is_classified_structurally() {
        assert!(BodyError::Timeout.is_timeout());
        assert!(!BodyError::Canceled.is_timeout());
        assert!(!BodyError::io(io::Error::new(io::ErrorKind::TimedOut, "timed out")).is_timeout());
    }
}
