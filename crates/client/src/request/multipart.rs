use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;
use std::fmt::Write;

/// Writes a `multipart/form-data` body into memory.
pub(crate) struct Multipart {
    boundary: String,
    buf: BytesMut,
}

impl Multipart {
    pub(crate) fn new() -> Self {
        let random: [u8; 30] = rand::rng().random();
        let boundary = random.iter().fold(String::with_capacity(60), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        });
        Self::with_boundary(boundary)
    }

    pub(crate) fn with_boundary<S: Into<String>>(boundary: S) -> Self {
        Self { boundary: boundary.into(), buf: BytesMut::with_capacity(1024) }
    }

    pub(crate) fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub(crate) fn write_field(&mut self, name: &str, value: &str) {
        self.part_header(&format!("form-data; name=\"{}\"", escape_quotes(name)), None);
        self.buf.put_slice(value.as_bytes());
    }

    pub(crate) fn write_file(&mut self, field: &str, file_name: &str, content: &[u8]) {
        let disposition = format!("form-data; name=\"{}\"; filename=\"{}\"", escape_quotes(field), escape_quotes(file_name));
        self.part_header(&disposition, Some("application/octet-stream"));
        self.buf.put_slice(content);
    }

    pub(crate) fn finish(mut self) -> Bytes {
        if self.buf.is_empty() {
            self.buf.put_slice(b"--");
        } else {
            self.buf.put_slice(b"\r\n--");
        }
        self.buf.put_slice(self.boundary.as_bytes());
        self.buf.put_slice(b"--\r\n");
        self.buf.freeze()
    }

    fn part_header(&mut self, disposition: &str, content_type: Option<&str>) {
        if !self.buf.is_empty() {
            self.buf.put_slice(b"\r\n");
        }
        self.buf.put_slice(b"--");
        self.buf.put_slice(self.boundary.as_bytes());
        self.buf.put_slice(b"\r\nContent-Disposition: ");
        self.buf.put_slice(disposition.as_bytes());
        if let Some(content_type) = content_type {
            self.buf.put_slice(b"\r\nContent-Type: ");
            self.buf.put_slice(content_type.as_bytes());
        }
        self.buf.put_slice(b"\r\n\r\n");
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_fields_then_files() {
        let mut multipart = Multipart::with_boundary("xyz");
        multipart.write_field("name", "zhang san");
        multipart.write_file("file0", "a\"b.txt", b"hello");

        let expected = indoc! {r#"
            --xyz
            Content-Disposition: form-data; name="name"

            zhang san
            --xyz
            Content-Disposition: form-data; name="file0"; filename="a\"b.txt"
            Content-Type: application/octet-stream

            hello
            --xyz--
        "#}
        .replace('\n', "\r\n");

        assert_eq!(multipart.finish(), Bytes::from(expected));
    }

    #[test]
    fn test_random_boundary() {
        let a = Multipart::new();
        let b = Multipart::new();

        assert_eq!(a.boundary.len(), 60);
        assert_ne!(a.boundary, b.boundary);
        assert!(a.content_type().starts_with("multipart/form-data; boundary="));
    }

    #[test]
    fn test_empty() {
        assert_eq!(Multipart::with_boundary("b").finish(), Bytes::from_static(b"--b--\r\n"));
    }
}
