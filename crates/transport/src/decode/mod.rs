//! Response body decompression.
//!
//! Decoders are push based: every data frame coming off the connection is
//! written into a `flate2`/`brotli`/`zstd` writer whose sink is an in-memory
//! [`Writer`], and whatever was produced so far is yielded as the next frame.

use bytes::{Bytes, BytesMut};
use std::io;

mod decoder;

pub use decoder::{DecodedBody, Decoder};

// inspired by from actix-http
pub(crate) struct Writer {
    buf: BytesMut,
}

impl Writer {
    fn new() -> Self {
        Self { buf: BytesMut::with_capacity(4096) }
    }

    fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
