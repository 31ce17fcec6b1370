//! Streamed `multipart/related` body: one JSON metadata part, one media part.
//!
//! The media part is never buffered; the reader is polled as the request body goes out.

use std::io;

use bytes::Bytes;
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use rand::Rng;
use rand::distributions::Alphanumeric;
use tokio_util::io::ReaderStream;

use crate::domain::ContentStream;

const BOUNDARY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartRelated {
    boundary: String,
}

impl MultipartRelated {
    /// Random alphanumeric boundary.
    pub fn new() -> Self {
        let boundary = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(BOUNDARY_LEN)
            .map(char::from)
            .collect::<String>();
        Self::with_boundary(format!("recsync-{boundary}"))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's Content-Type header.
    pub fn content_type(&self) -> String {
        format!("multipart/related; boundary={}", self.boundary)
    }

    fn head(&self, metadata: &serde_json::Value, media_type: &str) -> Bytes {
        Bytes::from(format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
             --{b}\r\nContent-Type: {media_type}\r\n\r\n",
            b = self.boundary,
        ))
    }

    fn tail(&self) -> Bytes {
        Bytes::from(format!("\r\n--{}--\r\n", self.boundary))
    }

    /// The full body as a stream of chunks.
    pub fn body(
        &self,
        metadata: &serde_json::Value,
        media_type: &str,
        content: ContentStream,
    ) -> impl Stream<Item = io::Result<Bytes>> + Send + Sync + use<> {
        let head = self.head(metadata, media_type);
        let tail = self.tail();
        stream::once(future::ready(Ok::<_, io::Error>(head)))
            .chain(ReaderStream::new(content))
            .chain(stream::once(future::ready(Ok(tail))))
    }
}

impl Default for MultipartRelated {
    fn default() -> Self {
        Self::new()
    }
}
