use crate::error::Error;
use bytes::Bytes;
use futures::Stream;
use http_body_util::{BodyDataStream, BodyExt};
use micro_req_transport::ResponseBody;
use std::fmt;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;
use tracing::trace;

const FIELD_EVENT: &str = "event: ";
const FIELD_DATA: &str = "data: ";
const FIELD_ID: &str = "id: ";
const FIELD_RETRY: &str = "retry: ";

/// Name of events that were not given one.
pub const DEFAULT_EVENT: &str = "message";

type LineReader = StreamReader<BodyDataStream<ResponseBody>, Bytes>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Closed,
}

/// One `data: ` line of a server sent event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// The name set by the last `event: ` line of the current event, or
    /// `message`.
    pub name: String,
    pub data: String,
    /// The last `id: ` seen on the stream.
    pub id: Option<String>,
}

/// Reads server sent events off a response body.
///
/// Lines are split on `\n`, a trailing `\r` is dropped. `event: ` names the
/// data lines that follow it until the next blank line, `data: ` yields an
/// [`Event`], `id: ` and `retry: ` are remembered, anything else is skipped.
///
/// The stream closes when the body ends or fails, or when [`close`] is called.
/// Once closed every read fails with [`Error::StreamClosed`].
///
/// [`close`]: EventStream::close
pub struct EventStream {
    reader: Option<LineReader>,
    event: String,
    last_event_id: Option<String>,
    retry: Option<Duration>,
}

impl EventStream {
    pub fn new(body: ResponseBody) -> Self {
        Self { reader: Some(StreamReader::new(body.into_data_stream())), event: String::new(), last_event_id: None, retry: None }
    }

    pub fn state(&self) -> StreamState {
        if self.reader.is_some() { StreamState::Open } else { StreamState::Closed }
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// The reconnection time the server asked for.
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    /// Reads the next event.
    ///
    /// Fails with [`Error::EndOfStream`] when the body ends, the stream is
    /// closed by then.
    pub async fn read(&mut self) -> Result<Event, Error> {
        let mut line = Vec::new();
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Err(Error::StreamClosed);
            };

            line.clear();
            let read = match reader.read_until(b'\n', &mut line).await {
                Ok(read) => read,
                Err(e) => {
                    self.close();
                    return Err(Error::io(e));
                }
            };
            if read == 0 {
                self.close();
                return Err(Error::EndOfStream);
            }

            if line.last() == Some(&b'\n') {
                line.pop();
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);

            if line.is_empty() {
                self.event.clear();
            } else if let Some(data) = line.strip_prefix(FIELD_DATA) {
                let name = if self.event.is_empty() { DEFAULT_EVENT.to_owned() } else { self.event.clone() };
                return Ok(Event { name, data: data.to_owned(), id: self.last_event_id.clone() });
            } else if let Some(name) = line.strip_prefix(FIELD_EVENT) {
                name.clone_into(&mut self.event);
            } else if let Some(id) = line.strip_prefix(FIELD_ID) {
                self.last_event_id = Some(id.to_owned());
            } else if let Some(retry) = line.strip_prefix(FIELD_RETRY) {
                match retry.trim().parse::<u64>() {
                    Ok(millis) => self.retry = Some(Duration::from_millis(millis)),
                    Err(_) => trace!(retry = %retry, "ignoring invalid retry field"),
                }
            }
        }
    }

    /// Releases the body. Closing an already closed stream does nothing.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            trace!("event stream closed");
        }
    }

    /// Turns the reader into a stream of events, ending with the body.
    pub fn into_stream(self) -> impl Stream<Item = Result<Event, Error>> + Send {
        futures::stream::unfold(self, |mut events| async move {
            match events.read().await {
                Ok(event) => Some((Ok(event), events)),
                Err(e) if e.is_stream_end() => None,
                Err(e) => Some((Err(e), events)),
            }
        })
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("state", &self.state())
            .field("event", &self.event)
            .field("last_event_id", &self.last_event_id)
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt, TryStreamExt};
    use http_body::Frame;
    use http_body_util::StreamBody;
    use indoc::indoc;
    use micro_req_transport::BodyError;
    use std::io;

    fn events(text: &'static str) -> EventStream {
        EventStream::new(ResponseBody::from(text))
    }

    fn chunked(chunks: Vec<&'static str>) -> EventStream {
        let frames = chunks.into_iter().map(|chunk| Ok::<_, io::Error>(Frame::data(Bytes::from_static(chunk.as_bytes()))));
        EventStream::new(ResponseBody::stream(StreamBody::new(futures::stream::iter(frames).map_err(BodyError::io))))
    }

    #[tokio::test]
    async fn test_named_event_then_end() {
        let mut stream = events("event: ping\ndata: hello\n\n");

        let event = stream.read().await.unwrap();
        assert_eq!(event.name, "ping");
        assert_eq!(event.data, "hello");

        assert!(matches!(stream.read().await, Err(Error::EndOfStream)));
        assert_eq!(stream.state(), StreamState::Closed);
        assert!(matches!(stream.read().await, Err(Error::StreamClosed)));
    }

    #[tokio::test]
    async fn test_read_after_close() {
        let mut stream = events("data: a\n\ndata: b\n\n");
        assert_eq!(stream.read().await.unwrap().data, "a");

        stream.close();
        stream.close();
        assert_eq!(stream.state(), StreamState::Closed);
        assert!(matches!(stream.read().await, Err(Error::StreamClosed)));
    }

    #[tokio::test]
    async fn test_blank_line_resets_name() {
        let mut stream = events(indoc! {"
            event: update
            data: first
            data: second

            data: third
            : comment
            data: fourth
        "});

        let names = [("update", "first"), ("update", "second"), ("message", "third"), ("message", "fourth")];
        for (name, data) in names {
            let event = stream.read().await.unwrap();
            assert_eq!((event.name.as_str(), event.data.as_str()), (name, data));
        }
        assert!(stream.read().await.unwrap_err().is_stream_end());
    }

    #[tokio::test]
    async fn test_id_and_retry() {
        let mut stream = events("retry: 1500\nid: 42\ndata: x\r\n\r\nretry: soon\ndata: y\n");

        let event = stream.read().await.unwrap();
        assert_eq!(event.id.as_deref(), Some("42"));
        assert_eq!(event.data, "x");
        assert_eq!(stream.retry(), Some(Duration::from_millis(1500)));

        let event = stream.read().await.unwrap();
        assert_eq!(event.data, "y");
        assert_eq!(stream.last_event_id(), Some("42"));
        assert_eq!(stream.retry(), Some(Duration::from_millis(1500)));
    }

    #[tokio::test]
    async fn test_lines_split_across_frames() {
        let mut stream = chunked(vec!["eve", "nt: tick\nda", "ta: 1", "\n\ndata: 2\n"]);

        assert_eq!(stream.read().await.unwrap(), Event { name: "tick".into(), data: "1".into(), id: None });
        assert_eq!(stream.read().await.unwrap().data, "2");
    }

    #[tokio::test]
    async fn test_unterminated_last_line() {
        let mut stream = events("data: tail");
        assert_eq!(stream.read().await.unwrap().data, "tail");
        assert!(matches!(stream.read().await, Err(Error::EndOfStream)));
    }

    #[tokio::test]
    async fn test_body_error_closes() {
        let frames = vec![Ok(Frame::data(Bytes::from_static(b"data: ok\n"))), Err(io::Error::other("reset"))];
        let body = ResponseBody::stream(StreamBody::new(futures::stream::iter(frames).map_err(BodyError::io)));
        let mut stream = EventStream::new(body);

        assert_eq!(stream.read().await.unwrap().data, "ok");
        assert!(matches!(stream.read().await, Err(Error::Io { .. })));
        assert!(matches!(stream.read().await, Err(Error::StreamClosed)));
    }

    #[tokio::test]
    async fn test_into_stream() {
        let data = events("data: 1\n\ndata: 2\n\n").into_stream().map(|event| event.unwrap().data).collect::<Vec<_>>().await;
        assert_eq!(data, ["1", "2"]);
    }
}
