use crate::decode::Writer;
use crate::error::BodyError;
use bytes::Bytes;
use flate2::write::{GzDecoder, ZlibDecoder};
use http_body::{Body, Frame};
use pin_project_lite::pin_project;
use std::fmt;
use std::io;
use std::io::Write;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tracing::trace;
use zstd::stream::write::Decoder as ZstdDecoder;

/// A streaming decoder for one of the supported content encodings.
pub struct Decoder {
    kind: Kind,
}

enum Kind {
    /// Gzip decoding.
    Gzip(GzDecoder<Writer>),
    /// Deflate decoding, zlib framed.
    Deflate(ZlibDecoder<Writer>),
    /// Zstd decoding.
    Zstd(ZstdDecoder<'static, Writer>),
    /// Brotli decoding.
    Br(Box<brotli::DecompressorWriter<Writer>>),
}

impl Decoder {
    fn gzip() -> Self {
        Self { kind: Kind::Gzip(GzDecoder::new(Writer::new())) }
    }

    fn deflate() -> Self {
        Self { kind: Kind::Deflate(ZlibDecoder::new(Writer::new())) }
    }

    fn zstd() -> io::Result<Self> {
        Ok(Self { kind: Kind::Zstd(ZstdDecoder::new(Writer::new())?) })
    }

    fn br() -> Self {
        Self {
            kind: Kind::Br(Box::new(brotli::DecompressorWriter::new(
                Writer::new(),
                32 * 1024, // 32 KiB buffer
            ))),
        }
    }

    /// Selects a decoder for a `Content-Encoding` header value.
    ///
    /// Returns `Ok(None)` for encodings that are not recognized, those are
    /// passed through untouched. An `Err` means the decoder itself could not be
    /// constructed.
    pub fn for_encoding(content_encoding: &str) -> io::Result<Option<Self>> {
        let encoding = content_encoding.trim();
        if encoding.eq_ignore_ascii_case("gzip") || encoding.eq_ignore_ascii_case("x-gzip") {
            Ok(Some(Self::gzip()))
        } else if encoding.eq_ignore_ascii_case("deflate") {
            Ok(Some(Self::deflate()))
        } else if encoding.eq_ignore_ascii_case("br") {
            Ok(Some(Self::br()))
        } else if encoding.eq_ignore_ascii_case("zstd") {
            Self::zstd().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Returns the name of the encoding.
    pub fn name(&self) -> &'static str {
        match self.kind {
            Kind::Gzip(_) => "gzip",
            Kind::Deflate(_) => "deflate",
            Kind::Zstd(_) => "zstd",
            Kind::Br(_) => "br",
        }
    }

    /// Feeds compressed data into the decoder.
    fn write(&mut self, data: &[u8]) -> Result<(), io::Error> {
        let result = match &mut self.kind {
            Kind::Gzip(decoder) => decoder.write_all(data).and_then(|()| decoder.flush()),
            Kind::Deflate(decoder) => decoder.write_all(data).and_then(|()| decoder.flush()),
            Kind::Zstd(decoder) => decoder.write_all(data).and_then(|()| decoder.flush()),
            Kind::Br(decoder) => decoder.write_all(data).and_then(|()| decoder.flush()),
        };

        if let Err(err) = &result {
            trace!("Error decoding {} encoding: {}", self.name(), err);
        }
        result
    }

    /// Takes the decoded data produced so far.
    fn take(&mut self) -> Bytes {
        match &mut self.kind {
            Kind::Gzip(decoder) => decoder.get_mut().take(),
            Kind::Deflate(decoder) => decoder.get_mut().take(),
            Kind::Zstd(decoder) => decoder.get_mut().take(),
            Kind::Br(decoder) => decoder.get_mut().take(),
        }
    }

    /// Finishes the decoding process and returns the remaining decoded data.
    fn finish(self) -> Result<Bytes, io::Error> {
        match self.kind {
            Kind::Gzip(decoder) => decoder.finish().map(|mut writer| writer.take()),
            Kind::Deflate(decoder) => decoder.finish().map(|mut writer| writer.take()),
            Kind::Zstd(mut decoder) => {
                decoder.flush()?;
                Ok(decoder.into_inner().take())
            }
            Kind::Br(mut decoder) => {
                decoder.flush()?;
                match decoder.into_inner() {
                    Ok(mut writer) => Ok(writer.take()),
                    Err(_) => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated brotli stream")),
                }
            }
        }
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Decoder").field(&self.name()).finish()
    }
}

pin_project! {
    /// A wrapper around a `Body` that decodes the data.
    #[derive(Debug)]
    pub struct DecodedBody<B> {
        #[pin]
        inner: B,
        decoder: Option<Decoder>,
    }
}

impl<B> DecodedBody<B> {
    pub fn new(inner: B, decoder: Decoder) -> Self {
        Self { inner, decoder: Some(decoder) }
    }
}

impl<B> Body for DecodedBody<B>
where
    B: Body<Data = Bytes, Error = BodyError>,
{
    type Data = Bytes;
    type Error = BodyError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();

        loop {
            // decoder is taken once the inner body ended or failed
            if this.decoder.is_none() {
                return Poll::Ready(None);
            }

            return match ready!(this.inner.as_mut().poll_frame(cx)) {
                Some(Ok(frame)) => {
                    let data = match frame.into_data() {
                        Ok(data) => data,
                        // trailers carry no compressed payload, pass them along
                        Err(frame) => return Poll::Ready(Some(Ok(frame))),
                    };

                    let Some(decoder) = this.decoder.as_mut() else {
                        return Poll::Ready(None);
                    };

                    if let Err(e) = decoder.write(&data) {
                        let name = decoder.name();
                        *this.decoder = None;
                        return Poll::Ready(Some(Err(BodyError::decode(name, e))));
                    }

                    let bytes = decoder.take();
                    if bytes.is_empty() {
                        continue;
                    }
                    Poll::Ready(Some(Ok(Frame::data(bytes))))
                }
                Some(Err(e)) => {
                    *this.decoder = None;
                    Poll::Ready(Some(Err(e)))
                }
                None => match this.decoder.take() {
                    Some(decoder) => {
                        let name = decoder.name();
                        match decoder.finish() {
                            Ok(bytes) if !bytes.is_empty() => Poll::Ready(Some(Ok(Frame::data(bytes)))),
                            Ok(_) => Poll::Ready(None),
                            Err(e) => Poll::Ready(Some(Err(BodyError::decode(name, e)))),
                        }
                    }
                    None => Poll::Ready(None),
                },
            };
        }
    }

    fn is_end_stream(&self) -> bool {
        self.decoder.is_none()
    }
}
