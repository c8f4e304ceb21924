use std::sync::{Arc, PoisonError};

use reqwest::cookie::CookieStore as _;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_LANGUAGE, COOKIE, SET_COOKIE};
use reqwest_cookie_store::{CookieStore, CookieStoreMutex};
use tracing::debug;
use url::Url;

/// Request context shared by every call made on behalf of one TikTok session.
///
/// Cookies are the only mutable part. They are merged in after a page has been
/// scraped successfully and read when media requests are built.
#[derive(Clone)]
pub struct Session {
    headers: HeaderMap,
    proxy: Option<Url>,
    cookies: Arc<CookieStoreMutex>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("headers", &self.headers)
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Session {
    pub fn new(proxy: Option<Url>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        Self {
            headers,
            proxy,
            cookies: Arc::new(CookieStoreMutex::new(CookieStore::default())),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn proxy(&self) -> Option<&Url> {
        self.proxy.as_ref()
    }

    /// Merge the `Set-Cookie` headers of a response from `url` into the jar.
    /// Existing cookies not mentioned by the response are kept.
    pub fn merge_cookies(&self, response_headers: &HeaderMap, url: &Url) {
        let mut set_cookies = response_headers.get_all(SET_COOKIE).iter();
        self.cookies.set_cookies(&mut set_cookies, url);
        debug!(url = %url, "merged response cookies into session");
    }

    /// Cookies the jar would send to `url`, as a `Cookie` header value.
    pub fn cookies_for(&self, url: &Url) -> Option<HeaderValue> {
        self.cookies.cookies(url)
    }

    /// Every unexpired cookie in the jar, regardless of domain. Media hosts differ
    /// from the page host, so media requests carry the whole session.
    pub fn all_cookies(&self) -> Option<HeaderValue> {
        let store = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        let joined = store
            .iter_unexpired()
            .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
            .collect::<Vec<_>>()
            .join("; ");

        if joined.is_empty() {
            return None;
        }
        HeaderValue::from_str(&joined).ok()
    }

    /// Session headers plus the cookies matching `url`.
    pub fn page_headers(&self, url: &Url) -> HeaderMap {
        let mut headers = self.headers.clone();
        if let Some(cookies) = self.cookies_for(url) {
            headers.insert(COOKIE, cookies);
        }
        headers
    }
}
