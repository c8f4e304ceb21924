use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::{future, stream, Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, COOKIE, RANGE, REFERER};
use reqwest::StatusCode;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::http::{ByteStream, HttpTransport};
use crate::session::Session;

/// Box type tag every MP4 carries in its first box.
pub const CONTAINER_SIGNATURE: &[u8; 4] = b"ftyp";
/// How far into the payload the signature may start.
pub const SIGNATURE_WINDOW: usize = 32;

pub const TIKTOK_REFERER: &str = "https://www.tiktok.com/";

/// True when `prefix` carries the MP4 signature within its first 32 bytes.
pub fn is_valid_container(prefix: &[u8]) -> bool {
    let window = &prefix[..prefix.len().min(SIGNATURE_WINDOW)];
    window
        .windows(CONTAINER_SIGNATURE.len())
        .any(|candidate| candidate == CONTAINER_SIGNATURE)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Hand back a chunk stream instead of buffering the whole video.
    pub streaming: bool,
}

impl FetchOptions {
    pub fn buffered() -> Self {
        Self { streaming: false }
    }

    pub fn streaming() -> Self {
        Self { streaming: true }
    }
}

/// Media that passed signature validation, tagged with the URL that served it.
#[derive(Debug)]
pub struct ValidatedMedia {
    pub source_url: String,
    pub body: MediaBody,
}

#[derive(Debug)]
pub enum MediaBody {
    Buffered(Bytes),
    Stream(MediaStream),
}

impl ValidatedMedia {
    /// Drain the media into memory.
    pub async fn into_bytes(self) -> Result<Bytes> {
        match self.body {
            MediaBody::Buffered(bytes) => Ok(bytes),
            MediaBody::Stream(mut stream) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buffer.extend_from_slice(&chunk?);
                }
                Ok(buffer.freeze())
            }
        }
    }

    /// Copy the media into `writer`, chunk by chunk when streaming. Returns bytes written.
    pub async fn write_to<W>(self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0u64;
        match self.body {
            MediaBody::Buffered(bytes) => {
                writer.write_all(&bytes).await?;
                written += bytes.len() as u64;
            }
            MediaBody::Stream(mut stream) => {
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    writer.write_all(&chunk).await?;
                    written += chunk.len() as u64;
                }
            }
        }
        writer.flush().await?;
        Ok(written)
    }
}

/// Forward-only media body whose first chunk has already been validated.
///
/// Yields that chunk first, then the rest of the connection. Dropping the stream
/// drops the connection with it.
pub struct MediaStream {
    inner: ByteStream,
}

impl MediaStream {
    fn new(first: Bytes, rest: ByteStream) -> Self {
        let inner = stream::once(future::ready(Ok(first))).chain(rest).boxed();
        Self { inner }
    }
}

impl Stream for MediaStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream").finish_non_exhaustive()
    }
}

/// Why a single candidate URL was passed over.
#[derive(Debug, Error)]
enum Rejection {
    #[error("status {0}")]
    Status(StatusCode),
    #[error("content type {0:?} is not video")]
    ContentType(String),
    #[error("payload lacks the container signature")]
    Signature,
    #[error("stream ended before the first chunk")]
    Empty,
    #[error(transparent)]
    Transport(Error),
}

/// Read exactly one chunk off `body` and validate it. On success the chunk is handed
/// back alongside the untouched remainder of the stream.
async fn peek_first_chunk(
    mut body: ByteStream,
) -> std::result::Result<(Bytes, ByteStream), Rejection> {
    match body.next().await {
        None => Err(Rejection::Empty),
        Some(Err(err)) => Err(Rejection::Transport(err)),
        Some(Ok(first)) if is_valid_container(&first) => Ok((first, body)),
        Some(Ok(_)) => Err(Rejection::Signature),
    }
}

/// Tries candidate media URLs one after another until one serves a real video.
pub struct MediaFetcher<'a, T: ?Sized> {
    transport: &'a T,
    session: &'a Session,
}

impl<'a, T> MediaFetcher<'a, T>
where
    T: HttpTransport + ?Sized,
{
    pub fn new(transport: &'a T, session: &'a Session) -> Self {
        Self { transport, session }
    }

    /// Return the first candidate that validates. Individual failures are logged and
    /// skipped; only running out of candidates is an error.
    pub async fn fetch(
        &self,
        candidates: &[String],
        options: FetchOptions,
    ) -> Result<ValidatedMedia> {
        if candidates.is_empty() {
            warn!("no media candidates to try");
            return Err(Error::NoValidMedia { attempted: 0 });
        }

        let headers = self.request_headers();

        for url in candidates {
            info!(url = %url, streaming = options.streaming, "trying media candidate");

            let attempt = if options.streaming {
                self.try_stream(url, &headers).await
            } else {
                self.try_buffered(url, &headers).await
            };

            match attempt {
                Ok(body) => {
                    info!(url = %url, "media candidate validated");
                    return Ok(ValidatedMedia {
                        source_url: url.clone(),
                        body,
                    });
                }
                Err(reason) => warn!(url = %url, %reason, "media candidate rejected"),
            }
        }

        Err(Error::NoValidMedia {
            attempted: candidates.len(),
        })
    }

    fn request_headers(&self) -> HeaderMap {
        let mut headers = self.session.headers().clone();
        headers.insert(RANGE, HeaderValue::from_static("bytes=0-"));
        headers.insert(
            ACCEPT_ENCODING,
            HeaderValue::from_static("identity;q=1, *;q=0"),
        );
        headers.insert(REFERER, HeaderValue::from_static(TIKTOK_REFERER));
        if let Some(cookies) = self.session.all_cookies() {
            headers.insert(COOKIE, cookies);
        }
        headers
    }

    async fn try_buffered(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> std::result::Result<MediaBody, Rejection> {
        let response = self
            .transport
            .get(url, headers)
            .await
            .map_err(Rejection::Transport)?;

        if response.status != StatusCode::OK {
            return Err(Rejection::Status(response.status));
        }
        if !response.content_type().contains("video") {
            return Err(Rejection::ContentType(response.content_type().to_owned()));
        }
        if !is_valid_container(&response.body) {
            return Err(Rejection::Signature);
        }

        Ok(MediaBody::Buffered(response.body))
    }

    async fn try_stream(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> std::result::Result<MediaBody, Rejection> {
        let response = self
            .transport
            .stream(url, headers)
            .await
            .map_err(Rejection::Transport)?;

        if response.status != StatusCode::OK {
            return Err(Rejection::Status(response.status));
        }

        debug!(url = %url, "peeking first chunk");
        let (first, rest) = peek_first_chunk(response.body).await?;
        Ok(MediaBody::Stream(MediaStream::new(first, rest)))
    }
}
