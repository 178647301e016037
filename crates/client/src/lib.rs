//! An async HTTP client built around a middleware pipeline.
//!
//! A call is described with a [`Request`], handed to a [`Client`] and comes
//! back as a [`Response`]. In between it runs through the client's handler
//! chain, which ends with the transport call.
//!
//! # Architecture
//!
//! - [`request`]: the builder reconciling query and form parameters, uploads
//!   and raw bodies into one wire request
//! - [`pipeline`]: the handler contract and the per call [`Context`]
//! - [`handler`]: recovery, decompression, logging and dump handlers
//! - [`Response`]: lazy, cached body reads and codec based decoding
//! - [`EventStream`]: server sent events read off a streaming body
//! - [`codec`]: the named marshal/unmarshal registry, with `json`, `xml` and
//!   `form` built in
//! - [`global`]: an explicitly installed process wide client
//!
//! The transport itself lives in the `micro-req-transport` crate, re-exported
//! as [`transport`].
//!
//! # Example
//!
//! ```no_run
//! use micro_req::Client;
//! use serde::Deserialize;
//! use std::time::Duration;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     name: String,
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let client = Client::builder().prefix_path("http://127.0.0.1:8080").timeout(Duration::from_secs(5)).build()?;
//!
//! let mut response = client.get("/users/1").with_query_param("fields", "name").send().await;
//! let user: User = response.as_json().await?;
//! println!("{}", user.name);
//! # Ok(())
//! # }
//! ```

mod client;
mod cookie;
mod error;
mod response;
mod stream;

pub mod codec;
pub mod global;
pub mod handler;
pub mod pipeline;
pub mod request;

#[cfg(test)]
mod test_support;

pub use client::{Client, ClientBuildError, ClientBuilder, Options};
pub use cookie::CookieStore;
pub use error::Error;
pub use pipeline::{Context, Flow, Handler, handler_fn};
pub use request::Request;
pub use response::Response;
pub use stream::{DEFAULT_EVENT, Event, EventStream, StreamState};

pub use micro_req_transport as transport;
