//! Caching, retrying and de-duplicating wrapper around a [`Transport`].

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kbase_api::types::Envelope;
use kbase_api::{Client, Error, Method, RequestOptions, Transport, DEFAULT_CACHE_TTL};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

use crate::cache::ResponseCache;
use crate::config::{ClientConfig, RetryConfig};

type SharedOutcome = Arc<OnceCell<Result<Envelope, Error>>>;

/// Transport wrapper that adds response caching, retries with backoff, and
/// sharing of identical in-flight requests.
///
/// Cache hits bypass the network entirely. Only success envelopes that carry
/// a payload are cached, each under the TTL requested by its caller.
pub struct CachedTransport<R = Client> {
    inner: R,
    cache: ResponseCache,
    /// One shared outcome per request key that is currently on the wire.
    in_flight: DashMap<String, SharedOutcome>,
    retry: RetryConfig,
}

/// Snapshot of what the response cache currently holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

impl CachedTransport<Client> {
    /// Builds an HTTP-backed transport from configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, Error> {
        let client = Client::with_base_url(&config.api_url)?;
        Ok(Self::new(client, config.retry.clone()))
    }
}

impl<R: Transport> CachedTransport<R> {
    pub fn new(inner: R, retry: RetryConfig) -> Self {
        Self::with_cache(inner, ResponseCache::new(DEFAULT_CACHE_TTL), retry)
    }

    pub fn with_cache(inner: R, cache: ResponseCache, retry: RetryConfig) -> Self {
        Self {
            inner,
            cache,
            in_flight: DashMap::new(),
            retry,
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    async fn with_retry(&self, options: &RequestOptions) -> Result<Envelope, Error> {
        let max_attempts = if options.retryable {
            self.retry.max_attempts.max(1)
        } else {
            1
        };
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match self.inner.request(options.clone()).await {
                Ok(envelope) => return Ok(envelope),
                Err(err) => {
                    if attempt >= max_attempts || !err.is_retryable() {
                        return Err(err);
                    }
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        "[retry {}/{}] {} {} failed ({}), retrying in {:.1}s",
                        attempt,
                        max_attempts,
                        options.method,
                        options.url,
                        err,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn fetch_and_store(&self, options: &RequestOptions, key: &str) -> Result<Envelope, Error> {
        let result = self.with_retry(options).await;
        if let Ok(envelope) = &result {
            if options.cache && envelope.is_success() && envelope.has_payload() {
                self.cache
                    .store(key, envelope.clone(), Some(options.cache_ttl));
                tracing::debug!(
                    "[cached] {} ({}s TTL)",
                    key,
                    options.cache_ttl.as_secs()
                );
            }
        }
        result
    }

    /// Whether a request for `method url` is currently on the wire.
    pub fn is_loading(&self, method: Method, url: &str) -> bool {
        self.in_flight.contains_key(&format!("{}:{}", method, url))
    }

    /// Clears cache entries whose key contains `pattern`, or everything when
    /// `pattern` is `None`. Returns how many entries were removed.
    pub fn clear_cache(&self, pattern: Option<&str>) -> usize {
        let removed = self.cache.invalidate(pattern);
        tracing::debug!("[cache cleared] {} entries", removed);
        removed
    }

    pub fn cache_stats(&self) -> CacheStats {
        let keys = self.cache.keys();
        CacheStats {
            size: keys.len(),
            keys,
        }
    }

    /// Drops expired cache entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let removed = self.cache.evict_stale();
        if removed > 0 {
            tracing::debug!("[cache cleanup] removed {} expired entries", removed);
        }
        removed
    }
}

impl<R: Transport> Transport for CachedTransport<R> {
    async fn request(&self, options: RequestOptions) -> Result<Envelope, Error> {
        let key = options.cache_key();

        if options.cache {
            if let Some(envelope) = self.cache.lookup(&key) {
                tracing::debug!("[cache hit] {}", key);
                return Ok(envelope);
            }
        }

        let cell = {
            let entry = self.in_flight.entry(key.clone());
            if matches!(entry, Entry::Occupied(_)) {
                tracing::debug!("[dedup] {} - joining in-flight request", key);
            }
            entry
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value()
                .clone()
        };

        let guard = InFlightGuard {
            in_flight: &self.in_flight,
            key: &key,
            cell,
        };
        let result = guard
            .cell
            .get_or_init(|| self.fetch_and_store(&options, &key))
            .await
            .clone();
        result
    }
}

/// Releases a request's `in_flight` slot on completion or cancellation.
///
/// An abandoned slot is kept while other callers still wait on its cell,
/// since one of them takes over the fetch.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<String, SharedOutcome>,
    key: &'a str,
    cell: SharedOutcome,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let cell = &self.cell;
        self.in_flight.remove_if(self.key, |_, current| {
            Arc::ptr_eq(current, cell) && (cell.initialized() || Arc::strong_count(current) <= 2)
        });
    }
}

/// Periodically purges expired entries from `transport`'s cache.
///
/// The task holds only a weak reference and ends once the transport is
/// dropped. A zero `period` disables sweeping.
pub fn spawn_cache_sweeper<R>(transport: &Arc<CachedTransport<R>>, period: Duration) -> Option<JoinHandle<()>>
where
    R: Transport + 'static,
{
    if period.is_zero() {
        return None;
    }
    let weak: Weak<CachedTransport<R>> = Arc::downgrade(transport);
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            match weak.upgrade() {
                Some(transport) => {
                    transport.purge_expired();
                }
                None => break,
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed list of outcomes and counts calls.
    struct Scripted {
        outcomes: Mutex<VecDeque<Result<Envelope, Error>>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<Envelope, Error>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for Scripted {
        async fn request(&self, _options: RequestOptions) -> Result<Envelope, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.outcomes.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(Error::RequestFailed("script exhausted".into())))
        }
    }

    fn users_envelope() -> Envelope {
        Envelope::success(json!({"users": [{"id": "1", "username": "ada", "role": "admin"}]}))
    }

    fn unavailable() -> Error {
        Error::HttpStatus {
            status: 503,
            body: String::new(),
            detail: None,
        }
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let transport = CachedTransport::new(
            Scripted::new(vec![Ok(users_envelope())]),
            RetryConfig::disabled(),
        );
        let opts = RequestOptions::get("/admin/users");

        let first = transport.request(opts.clone()).await.unwrap();
        let second = transport.request(opts).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(transport.inner().calls(), 1);
        assert_eq!(transport.cache_stats().keys, vec!["GET:/admin/users"]);
    }

    #[tokio::test]
    async fn cache_disabled_always_hits_network() {
        let transport = CachedTransport::new(
            Scripted::new(vec![Ok(users_envelope()), Ok(users_envelope())]),
            RetryConfig::disabled(),
        );
        let opts = RequestOptions::get("/admin/users").with_cache(false);

        transport.request(opts.clone()).await.unwrap();
        transport.request(opts).await.unwrap();
        assert_eq!(transport.inner().calls(), 2);
        assert_eq!(transport.cache_stats().size, 0);
    }

    #[tokio::test]
    async fn error_envelopes_and_empty_payloads_are_not_cached() {
        let empty: Envelope = serde_json::from_value(json!({"status": "success"})).unwrap();
        let transport = CachedTransport::new(
            Scripted::new(vec![Ok(Envelope::error("nope", None)), Ok(empty)]),
            RetryConfig::disabled(),
        );
        let opts = RequestOptions::get("/admin/reports");

        assert!(transport.request(opts.clone()).await.unwrap().is_error());
        assert!(transport.request(opts).await.unwrap().is_success());
        assert_eq!(transport.cache_stats().size, 0);
    }

    #[tokio::test]
    async fn retries_retryable_errors() {
        tokio::time::pause();
        let transport = CachedTransport::new(
            Scripted::new(vec![Err(unavailable()), Err(unavailable()), Ok(users_envelope())]),
            RetryConfig::default(),
        );

        let result = transport.request(RequestOptions::get("/admin/users")).await;
        assert!(result.is_ok());
        assert_eq!(transport.inner().calls(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        tokio::time::pause();
        let transport = CachedTransport::new(
            Scripted::new(vec![Err(unavailable()), Err(unavailable()), Err(unavailable())]),
            RetryConfig::default(),
        );

        let err = transport
            .request(RequestOptions::get("/admin/users"))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 503);
        assert_eq!(transport.inner().calls(), 3);
    }

    #[tokio::test]
    async fn non_retryable_flag_disables_retry() {
        let transport = CachedTransport::new(
            Scripted::new(vec![Err(unavailable()), Ok(users_envelope())]),
            RetryConfig::default(),
        );

        let opts = RequestOptions::get("/admin/users").with_retryable(false);
        assert!(transport.request(opts).await.is_err());
        assert_eq!(transport.inner().calls(), 1);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let forbidden = Error::HttpStatus {
            status: 403,
            body: String::new(),
            detail: None,
        };
        let transport = CachedTransport::new(
            Scripted::new(vec![Err(forbidden), Ok(users_envelope())]),
            RetryConfig::default(),
        );

        assert!(transport
            .request(RequestOptions::get("/admin/users"))
            .await
            .is_err());
        assert_eq!(transport.inner().calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_identical_requests_share_one_call() {
        tokio::time::pause();
        let transport = Arc::new(CachedTransport::new(
            Scripted::new(vec![Ok(users_envelope()), Ok(users_envelope())])
                .with_delay(Duration::from_millis(50)),
            RetryConfig::disabled(),
        ));
        let opts = RequestOptions::get("/admin/users").with_cache(false);

        let a = tokio::spawn({
            let transport = Arc::clone(&transport);
            let opts = opts.clone();
            async move { transport.request(opts).await }
        });
        let b = tokio::spawn({
            let transport = Arc::clone(&transport);
            let opts = opts.clone();
            async move { transport.request(opts).await }
        });
        tokio::task::yield_now().await;
        assert!(transport.is_loading(Method::Get, "/admin/users"));

        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
        assert_eq!(a, b);
        assert_eq!(transport.inner().calls(), 1);
        assert!(!transport.is_loading(Method::Get, "/admin/users"));
    }

    #[tokio::test]
    async fn cancelled_request_releases_in_flight_slot() {
        tokio::time::pause();
        let transport = Arc::new(CachedTransport::new(
            Scripted::new(vec![Ok(users_envelope()), Ok(users_envelope())])
                .with_delay(Duration::from_secs(5)),
            RetryConfig::disabled(),
        ));
        let opts = RequestOptions::get("/admin/files");

        let task = tokio::spawn({
            let transport = Arc::clone(&transport);
            let opts = opts.clone();
            async move { transport.request(opts).await }
        });
        tokio::task::yield_now().await;
        assert!(transport.is_loading(Method::Get, "/admin/files"));

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(!transport.is_loading(Method::Get, "/admin/files"));
        assert!(transport.in_flight.is_empty());

        assert!(transport.request(opts).await.is_ok());
        assert_eq!(transport.inner().calls(), 2);
    }

    #[tokio::test]
    async fn waiter_takes_over_when_driver_is_cancelled() {
        tokio::time::pause();
        let transport = Arc::new(CachedTransport::new(
            Scripted::new(vec![Ok(users_envelope()), Ok(users_envelope())])
                .with_delay(Duration::from_secs(5)),
            RetryConfig::disabled(),
        ));
        let opts = RequestOptions::get("/admin/users").with_cache(false);

        let driver = tokio::spawn({
            let transport = Arc::clone(&transport);
            let opts = opts.clone();
            async move { transport.request(opts).await }
        });
        tokio::task::yield_now().await;
        let waiter = tokio::spawn({
            let transport = Arc::clone(&transport);
            let opts = opts.clone();
            async move { transport.request(opts).await }
        });
        tokio::task::yield_now().await;

        driver.abort();
        let _ = driver.await;
        assert!(transport.is_loading(Method::Get, "/admin/users"));

        assert!(waiter.await.unwrap().is_ok());
        assert!(!transport.is_loading(Method::Get, "/admin/users"));
        assert!(transport.in_flight.is_empty());
    }

    #[tokio::test]
    async fn clear_cache_by_pattern() {
        let transport = CachedTransport::new(
            Scripted::new(vec![Ok(users_envelope()), Ok(users_envelope())]),
            RetryConfig::disabled(),
        );
        transport
            .request(RequestOptions::get("/admin/users"))
            .await
            .unwrap();
        transport
            .request(RequestOptions::get("/user/profile"))
            .await
            .unwrap();

        assert_eq!(transport.clear_cache(Some("/admin")), 1);
        assert_eq!(transport.cache_stats().keys, vec!["GET:/user/profile"]);
        assert_eq!(transport.clear_cache(None), 1);
        assert_eq!(transport.cache_stats().size, 0);
    }

    #[tokio::test]
    async fn short_ttl_expires() {
        let transport = CachedTransport::new(
            Scripted::new(vec![Ok(users_envelope()), Ok(users_envelope())]),
            RetryConfig::disabled(),
        );
        let opts = RequestOptions::get("/admin/users").with_cache_ttl(Duration::from_millis(5));

        transport.request(opts.clone()).await.unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(transport.purge_expired(), 1);
        transport.request(opts).await.unwrap();
        assert_eq!(transport.inner().calls(), 2);
    }

    #[tokio::test]
    async fn sweeper_stops_when_transport_dropped() {
        tokio::time::pause();
        let transport = Arc::new(CachedTransport::new(
            Scripted::new(vec![]),
            RetryConfig::disabled(),
        ));
        let handle = spawn_cache_sweeper(&transport, Duration::from_secs(60)).unwrap();
        drop(transport);

        tokio::time::advance(Duration::from_secs(61)).await;
        handle.await.unwrap();
        assert!(spawn_cache_sweeper(
            &Arc::new(CachedTransport::new(Scripted::new(vec![]), RetryConfig::disabled())),
            Duration::ZERO
        )
        .is_none());
    }
}
