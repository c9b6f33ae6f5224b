//! The request contract between the data-access layer and whatever executes
//! HTTP: [`RequestOptions`] in, [`Envelope`] out.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::{types::Envelope, Error};

/// Cache lifetime used when the caller does not pick one.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Per-request timeout used when the caller does not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method of a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a transport needs to perform one request.
///
/// `cache`, `cache_ttl` and `retryable` are policy hints. A transport that
/// does not cache or retry is free to ignore them.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestOptions {
    /// Path relative to the transport's base URL, including any query string.
    pub url: String,
    pub method: Method,
    /// Bearer token sent in the `Authorization` header.
    pub token: Option<String>,
    pub cache: bool,
    pub cache_ttl: Duration,
    pub retryable: bool,
    pub timeout: Duration,
}

impl RequestOptions {
    /// A cacheable, retryable GET with default TTL and timeout.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            token: None,
            cache: true,
            cache_ttl: DEFAULT_CACHE_TTL,
            retryable: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Key identifying this request for caching and de-duplication,
    /// e.g. `GET:/admin/users`.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.method, self.url)
    }
}

/// Performs one request and reports its outcome as an [`Envelope`].
///
/// An `Ok` envelope may still be error-tagged: that is an application-level
/// error from a server that answered. `Err` means no usable response was
/// obtained at all.
pub trait Transport: Send + Sync {
    fn request(
        &self,
        options: RequestOptions,
    ) -> impl Future<Output = Result<Envelope, Error>> + Send;
}
