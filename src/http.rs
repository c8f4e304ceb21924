use std::borrow::Cow;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use reqwest::{redirect::Policy, Client, Proxy, StatusCode};
use url::Url;

use crate::error::{Error, Result};

/// A boxed, sendable stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send + 'static>>;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    /// Final URL after redirects.
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn content_type(&self) -> &str {
        content_type(&self.headers)
    }
}

/// A response whose body is read incrementally. Dropping it releases the connection.
pub struct StreamingResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// The HTTP capability the scraper and media fetcher need.
///
/// Implementations must not follow cookie state of their own; cookies travel in
/// `headers` and come back through `Set-Cookie` response headers.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET and buffer the whole body.
    async fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse>;

    /// Issue a GET and hand back the body as a chunk stream.
    async fn stream(&self, url: &str, headers: &HeaderMap) -> Result<StreamingResponse>;
}

/// Production transport backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(proxy: Option<&Url>) -> Result<Self> {
        Ok(Self::with_client(build_http_client(proxy)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

/// Expose a configured HTTP client shared by the transport and integration tests.
pub fn build_http_client(proxy: Option<&Url>) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .redirect(Policy::limited(10));

    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy.as_str())?);
    }

    Ok(builder.build()?)
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse> {
        let response = self.client.get(url).headers(headers.clone()).send().await?;

        let status = response.status();
        let url = response.url().clone();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            url,
            headers,
            body,
        })
    }

    async fn stream(&self, url: &str, headers: &HeaderMap) -> Result<StreamingResponse> {
        let response = self.client.get(url).headers(headers.clone()).send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes_stream().map_err(Error::from).boxed();

        Ok(StreamingResponse {
            status,
            headers,
            body,
        })
    }
}
