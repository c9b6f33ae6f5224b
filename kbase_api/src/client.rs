//! HTTP client for the knowledge-base REST API.

use serde_json::Value;
use url::Url;

use crate::{
    transport::{Method, RequestOptions, Transport},
    types::Envelope,
    Error,
};

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:9001";

/// Plain HTTP transport for the knowledge-base API.
///
/// Sends one request per call with the bearer token and timeout from the
/// [`RequestOptions`]. It neither caches nor retries; the cache and retry
/// flags are left for a wrapping transport to honour.
pub struct Client {
    http: reqwest::Client,
    /// Base URL for the API. Defaults to [`DEFAULT_BASE_URL`].
    base_api_url: String,
}

impl Client {
    /// Creates a new client pointing at [`DEFAULT_BASE_URL`].
    pub fn new() -> Result<Self, Error> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder().build().map_err(|e| {
            tracing::error!("Failed to build HTTP client: {}", e);
            Error::RequestFailed(e.to_string())
        })?;
        Ok(Self {
            http,
            base_api_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_api_url
    }

    fn get_url(&self, path: &str) -> Result<Url, Error> {
        Url::parse(format!("{}{}", &self.base_api_url, path).as_str()).map_err(|e| {
            tracing::error!("Invalid URL constructed: {}", e);
            Error::RequestFailed(format!("invalid url: {}", e))
        })
    }

    /// Performs the request described by `options` and decodes the envelope.
    pub async fn send(&self, options: &RequestOptions) -> Result<Envelope, Error> {
        let url = self.get_url(&options.url)?;
        let method = match options.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .http
            .request(method, url)
            .timeout(options.timeout)
            .header("content-type", "application/json")
            .header("accept", "application/json");
        if let Some(token) = &options.token {
            builder = builder.bearer_auth(token);
        }

        let resp = builder.send().await.map_err(|e| {
            tracing::error!("Failed to get {}: {}", options.url, e);
            if e.is_timeout() {
                Error::Timeout(options.timeout)
            } else if e.is_connect() || e.is_request() {
                Error::Network(e.to_string())
            } else {
                Error::RequestFailed(e.to_string())
            }
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            tracing::error!("Failed to read response body: {}", e);
            if e.is_timeout() {
                Error::Timeout(options.timeout)
            } else {
                Error::Network(e.to_string())
            }
        })?;

        if !status.is_success() {
            let snippet = truncate_body(&body);
            tracing::error!("Request failed with status {}: {}", status, snippet);
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: snippet,
                detail: serde_json::from_str::<Value>(&body).ok(),
            });
        }

        serde_json::from_str::<Envelope>(&body).map_err(|e| {
            let snippet = truncate_body(&body);
            tracing::error!("Failed to parse envelope: {} | body: {}", e, snippet);
            Error::Decode(e.to_string())
        })
    }
}

impl Transport for Client {
    async fn request(&self, options: RequestOptions) -> Result<Envelope, Error> {
        self.send(&options).await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated]", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_body_untouched() {
        assert_eq!(truncate_body("oops"), "oops");
    }

    #[test]
    fn truncate_long_body() {
        let body = "x".repeat(2500);
        let out = truncate_body(&body);
        assert!(out.ends_with("...[truncated]"));
        assert_eq!(out.len(), 2000 + "...[truncated]".len());
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = Client::with_base_url("http://example.com/").unwrap();
        assert_eq!(client.base_url(), "http://example.com");
        let url = client.get_url("/admin/users").unwrap();
        assert_eq!(url.as_str(), "http://example.com/admin/users");
    }
}
