//! The process wide client.
//!
//! Nothing is installed by default. [`install`] sets the client that unbound
//! requests are sent with, [`uninstall`] removes it again. The free request
//! constructors of this module create unbound requests, so they go through
//! whatever client is installed when they are sent.

use crate::client::Client;
use crate::request::Request;
use arc_swap::ArcSwapOption;
use once_cell::sync::Lazy;
use std::sync::Arc;

static GLOBAL_CLIENT: Lazy<ArcSwapOption<Client>> = Lazy::new(ArcSwapOption::empty);

/// Installs `client`, returning the one installed before.
pub fn install(client: Client) -> Option<Client> {
    GLOBAL_CLIENT.swap(Some(Arc::new(client))).map(|previous| previous.as_ref().clone())
}

/// The installed client, if any.
pub fn current() -> Option<Client> {
    GLOBAL_CLIENT.load_full().map(|client| client.as_ref().clone())
}

/// Removes the installed client, returning it.
pub fn uninstall() -> Option<Client> {
    GLOBAL_CLIENT.swap(None).map(|previous| previous.as_ref().clone())
}

pub fn get<S: Into<String>>(url: S) -> Request {
    Request::get(url)
}

pub fn post<S: Into<String>>(url: S) -> Request {
    Request::post(url)
}

pub fn put<S: Into<String>>(url: S) -> Request {
    Request::put(url)
}

pub fn delete<S: Into<String>>(url: S) -> Request {
    Request::delete(url)
}

pub fn head<S: Into<String>>(url: S) -> Request {
    Request::head(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_support::{MockTransport, ok};

    // the only test touching the global client, tests run in parallel
    #[tokio::test]
    async fn test_lifecycle() {
        assert!(uninstall().is_none());
        let response = get("http://example.com/").send().await;
        assert!(matches!(response.error(), Some(Error::NoClient)));

        let mut transport = MockTransport::new();
        transport.expect_perform().times(1).returning(|_| ok("global"));
        let client = Client::builder().transport(transport).build().unwrap();

        assert!(install(client).is_none());
        assert!(current().is_some());
        let mut response = post("http://example.com/").send().await;
        assert_eq!(response.text().await, "global");

        assert!(uninstall().is_some());
        assert!(current().is_none());
    }
}
