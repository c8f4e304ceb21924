#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, SET_COOKIE};
use reqwest::StatusCode;
use url::Url;

use tikfetch::error::{Error, Result};
use tikfetch::http::{HttpResponse, HttpTransport, StreamingResponse};

/// A canned reply for one URL.
#[derive(Clone)]
pub struct Route {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub chunks: Vec<Bytes>,
    pub final_url: Option<String>,
    pub fail: bool,
}

impl Route {
    pub fn ok(chunks: Vec<&[u8]>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            chunks: chunks.into_iter().map(Bytes::copy_from_slice).collect(),
            final_url: None,
            fail: false,
        }
    }

    pub fn html(body: &str) -> Self {
        Self::ok(vec![body.as_bytes()]).header(CONTENT_TYPE, "text/html")
    }

    pub fn video(chunks: Vec<&[u8]>) -> Self {
        Self::ok(chunks).header(CONTENT_TYPE, "video/mp4")
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::ok(Vec::new())
        }
    }

    pub fn transport_error() -> Self {
        Self {
            fail: true,
            ..Self::ok(Vec::new())
        }
    }

    pub fn header(mut self, name: HeaderName, value: &'static str) -> Self {
        self.headers.append(name, HeaderValue::from_static(value));
        self
    }

    pub fn set_cookie(self, value: &'static str) -> Self {
        self.header(SET_COOKIE, value)
    }

    pub fn redirected_to(mut self, url: &str) -> Self {
        self.final_url = Some(url.to_string());
        self
    }
}

/// A request the mock saw.
#[derive(Clone, Debug)]
pub struct Seen {
    pub url: String,
    pub headers: HeaderMap,
    pub streaming: bool,
}

#[derive(Default)]
pub struct MockTransport {
    routes: HashMap<String, Route>,
    seen: Mutex<Vec<Seen>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, route: Route) -> Self {
        self.routes.insert(url.to_string(), route);
        self
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn seen_urls(&self) -> Vec<String> {
        self.seen().into_iter().map(|seen| seen.url).collect()
    }

    fn lookup(&self, url: &str, headers: &HeaderMap, streaming: bool) -> Result<Route> {
        self.seen.lock().unwrap().push(Seen {
            url: url.to_string(),
            headers: headers.clone(),
            streaming,
        });

        let route = self
            .routes
            .get(url)
            .cloned()
            .unwrap_or_else(|| Route::status(StatusCode::NOT_FOUND));

        if route.fail {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        Ok(route)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse> {
        let route = self.lookup(url, headers, false)?;
        let body: Vec<u8> = route.chunks.iter().flat_map(|c| c.iter().copied()).collect();
        let final_url = route.final_url.as_deref().unwrap_or(url);

        Ok(HttpResponse {
            status: route.status,
            url: Url::parse(final_url)?,
            headers: route.headers,
            body: Bytes::from(body),
        })
    }

    async fn stream(&self, url: &str, headers: &HeaderMap) -> Result<StreamingResponse> {
        let route = self.lookup(url, headers, true)?;

        Ok(StreamingResponse {
            status: route.status,
            headers: route.headers,
            body: stream::iter(route.chunks.into_iter().map(Ok)).boxed(),
        })
    }
}

/// A minimal MP4 header chunk.
pub const MP4_HEAD: &[u8] = b"\x00\x00\x00\x20ftypisom\x00\x00\x02\x00isomiso2avc1mp41";
