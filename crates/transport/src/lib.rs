//! The transport layer of the micro-req HTTP client.
//!
//! This crate holds everything below the request pipeline: the contract a
//! transport has to satisfy, the response body type flowing back out of it,
//! streaming decompression of that body, and a default transport built on
//! hyper's pooled HTTP/1.1 client.
//!
//! # Architecture
//!
//! - [`Transport`]: performs one round trip, `TransportRequest` in,
//!   `TransportResponse` out
//! - [`CallOptions`]: deadline and cancellation token carried in the request
//!   extensions, covering the round trip and, through [`LimitedBody`], the
//!   body read
//! - [`ResponseBody`]: a single chunk or a boxed frame stream implementing
//!   `http_body::Body`
//! - [`decode`]: `gzip`, `deflate`, `br` and `zstd` body decoders
//! - [`HyperTransport`]: the default transport
//!
//! # Error Handling
//!
//! - [`TransportError`]: round trip failures, with timeouts and cancellation as
//!   distinct variants
//! - [`BodyError`]: failures while reading or decoding a body
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::Request;
//! use http_body_util::BodyExt;
//! use micro_req_transport::{HyperTransport, Transport};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let transport = HyperTransport::default();
//! let request = Request::builder().uri("http://127.0.0.1:8080/").body(Bytes::new())?;
//! let response = transport.perform(request).await?;
//! let body = response.into_body().collect().await?.to_bytes();
//! println!("{body:?}");
//! # Ok(())
//! # }
//! ```

mod body;
mod error;
mod hyper_transport;
mod limit;
mod transport;

pub mod decode;

pub use body::ResponseBody;
pub use error::{BodyError, BoxError, SharedError, TransportError};
pub use hyper_transport::{HyperOptions, HyperTransport};
pub use limit::LimitedBody;
pub use transport::{CallOptions, Transport, TransportRequest, TransportResponse};
