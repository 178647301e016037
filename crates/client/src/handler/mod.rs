//! Handlers shipped with the client.
//!
//! [`Recovery`] opens every client chain and [`Decompress`] runs right before
//! the transport call, other handlers sit in between. [`LogHandler`] and
//! [`DumpHandler`] are opt in.

mod decompress;
mod dump;
mod log;
mod recovery;
pub(crate) mod transport;

pub use decompress::Decompress;
pub use dump::DumpHandler;
pub use log::LogHandler;
pub use recovery::Recovery;
