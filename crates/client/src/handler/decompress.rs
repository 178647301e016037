use crate::pipeline::{Context, Handler};
use async_trait::async_trait;
use http::HeaderValue;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH};
use micro_req_transport::ResponseBody;
use micro_req_transport::decode::{DecodedBody, Decoder};
use tracing::{debug, warn};

const SUPPORTED: &str = "gzip, deflate, br, zstd";

/// Decompresses response bodies according to `Content-Encoding`.
///
/// Advertises the supported encodings when the request does not set
/// `Accept-Encoding` itself. The body is decoded while it is read, corrupt
/// data fails the read. Unknown encodings are left alone, and so is a body
/// whose decoder cannot be set up.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decompress;

#[async_trait]
impl Handler for Decompress {
    async fn handle(&self, ctx: &mut Context) {
        let headers = ctx.request_mut().headers_mut();
        if !headers.contains_key(ACCEPT_ENCODING) {
            headers.insert(ACCEPT_ENCODING, HeaderValue::from_static(SUPPORTED));
        }

        ctx.next().await;

        let response = ctx.response_mut();
        if response.cached_body().is_some() {
            return;
        }
        let Some(raw) = response.raw_mut() else {
            return;
        };

        let decoder = match raw.headers().get(CONTENT_ENCODING).and_then(|value| value.to_str().ok()) {
            Some(encoding) => Decoder::for_encoding(encoding),
            None => return,
        };
        let decoder = match decoder {
            Ok(Some(decoder)) => decoder,
            Ok(None) => return,
            Err(e) => {
                warn!(cause = %e, "can not create decoder, keeping the encoded body");
                return;
            }
        };

        debug!(encoding = decoder.name(), "decoding response body");
        let body = raw.body_mut().take();
        *raw.body_mut() = ResponseBody::stream(DecodedBody::new(body, decoder));
        raw.headers_mut().remove(CONTENT_ENCODING);
        raw.headers_mut().remove(CONTENT_LENGTH);
    }
}
