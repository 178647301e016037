use crate::error::Error;
use bytes::Bytes;
use std::fmt;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Where the content of an uploaded file comes from.
pub enum UploadSource {
    Bytes(Bytes),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
    Path(PathBuf),
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Reader(_) => f.write_str("Reader"),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
        }
    }
}

/// A file part of a multipart body.
pub struct Upload {
    field: Option<String>,
    file_name: String,
    source: UploadSource,
    failed: Option<Error>,
}

impl Upload {
    pub fn new<S: Into<String>>(field: Option<String>, file_name: S, source: UploadSource) -> Self {
        Self { field, file_name: file_name.into(), source, failed: None }
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Reads the content of the upload.
    ///
    /// Readers and files are drained once, the content is kept so that a
    /// request used as a template builds the same body again. A failed read
    /// is kept as well: a half drained reader never yields content.
    pub(crate) async fn content(&mut self) -> Result<Bytes, Error> {
        if let Some(e) = &self.failed {
            return Err(e.clone());
        }

        let read = match &mut self.source {
            UploadSource::Bytes(bytes) => return Ok(bytes.clone()),
            UploadSource::Reader(reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await.map(|_| Bytes::from(buf))
            }
            UploadSource::Path(path) => tokio::fs::read(&*path).await.map(Bytes::from),
        };

        match read {
            Ok(bytes) => {
                self.source = UploadSource::Bytes(bytes.clone());
                Ok(bytes)
            }
            Err(e) => {
                let e = Error::multipart(e);
                self.failed = Some(e.clone());
                Err(e)
            }
        }
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("source", &self.source)
            .field("failed", &self.failed)
            .finish()
    }
}

/// Expands a glob pattern into the files it names.
///
/// Only regular files are returned, sorted by path. A pattern without
/// wildcards matches itself if it names an existing file.
pub(crate) fn expand(pattern: &str) -> Result<Vec<PathBuf>, Error> {
    let paths = glob::glob(pattern).map_err(|e| Error::invalid_file_pattern(pattern, e))?;

    let mut matched = Vec::new();
    for path in paths {
        let path = path.map_err(|e| Error::multipart(e.into_error()))?;
        if path.is_file() {
            matched.push(path);
        }
    }

    if matched.is_empty() {
        return Err(Error::no_file_match(pattern));
    }
    matched.sort();
    Ok(matched)
}
