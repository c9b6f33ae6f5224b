//! Cancellation-aware request orchestration over a [`Transport`].
//!
//! An [`ApiData`] owns one logical "current fetch". Every dispatch mints a
//! new generation number; an attempt may only commit its outcome if its
//! generation is still the newest when it settles. Superseded attempts run
//! to completion but their results are discarded, so out-of-order network
//! completion can never let a stale response win.
//!
//! Caching and retries are the transport's business. The cache and retry
//! flags in [`FetchConfig`] are handed through untouched.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use kbase_api::types::Envelope;
use kbase_api::{Error, RequestOptions, Transport, DEFAULT_CACHE_TTL, DEFAULT_TIMEOUT};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

use crate::error::StructuredError;

/// Called with the decoded data after a successful attempt commits.
pub type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Called with the error after a failed attempt commits.
pub type ErrorCallback = Arc<dyn Fn(&StructuredError) + Send + Sync>;

/// The inputs that identify a fetch. Changing any of them supersedes the
/// current attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchConfig {
    /// Endpoint path. `None` disables fetching.
    pub url: Option<String>,
    pub token: Option<String>,
    pub cache: bool,
    pub cache_ttl: Duration,
    pub retryable: bool,
    pub timeout: Duration,
    /// Disables fetching while set.
    pub skip: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            cache: true,
            cache_ttl: DEFAULT_CACHE_TTL,
            retryable: true,
            timeout: DEFAULT_TIMEOUT,
            skip: false,
        }
    }
}

impl FetchConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
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

    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.skip && self.url.is_some()
    }

    fn request_options(&self) -> Option<RequestOptions> {
        if self.skip {
            return None;
        }
        let url = self.url.as_ref()?;
        Some(
            RequestOptions::get(url.clone())
                .with_token(self.token.clone())
                .with_cache(self.cache)
                .with_cache_ttl(self.cache_ttl)
                .with_retryable(self.retryable)
                .with_timeout(self.timeout),
        )
    }
}

/// Observable state of an [`ApiData`].
///
/// `loading` is true exactly while the newest attempt is unsettled. After a
/// failed attempt, `data` still holds the last successful result and `error`
/// describes the failure.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<StructuredError>,
}

impl<T> FetchState<T> {
    /// No data, not loading, no error.
    pub fn idle() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.data.is_none() && !self.loading && self.error.is_none()
    }
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

/// Optional side effects run after an attempt commits.
pub struct Callbacks<T> {
    pub on_success: Option<SuccessCallback<T>>,
    pub on_error: Option<ErrorCallback>,
}

impl<T> Default for Callbacks<T> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }
}

impl<T> Clone for Callbacks<T> {
    fn clone(&self) -> Self {
        Self {
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<T> Callbacks<T> {
    pub fn on_success(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&StructuredError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
}

impl<T> fmt::Debug for Callbacks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

struct Shared<T, R> {
    transport: Arc<R>,
    state: watch::Sender<FetchState<T>>,
    /// Generation of the newest dispatch. Only mutated while holding the
    /// state channel's write lock.
    generation: AtomicU64,
    /// Set once the owning hook is dropped. Guarded like `generation`.
    closed: AtomicBool,
    config: Mutex<FetchConfig>,
    callbacks: Callbacks<T>,
    latest_task: Mutex<Option<AbortHandle>>,
}

impl<T, R> Shared<T, R>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
    R: Transport + 'static,
{
    fn config(&self) -> FetchConfig {
        self.config
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Starts a new attempt, superseding any unsettled one. Returns `None`
    /// when fetching is disabled, in which case the state is reset to idle.
    fn dispatch(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let config = self.config();
        let Some(options) = config.request_options() else {
            self.state.send_if_modified(|state| {
                if self.closed.load(Ordering::SeqCst) {
                    return false;
                }
                self.generation.fetch_add(1, Ordering::SeqCst);
                *state = FetchState::idle();
                true
            });
            return None;
        };

        let mut generation = None;
        self.state.send_if_modified(|state| {
            if self.closed.load(Ordering::SeqCst) {
                return false;
            }
            generation = Some(self.generation.fetch_add(1, Ordering::SeqCst) + 1);
            state.loading = true;
            state.error = None;
            true
        });
        let generation = generation?;
        tracing::debug!("dispatching {} (generation {})", options.url, generation);

        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = shared.transport.request(options).await;
            shared.settle(generation, result);
        });

        *self
            .latest_task
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(handle.abort_handle());
        Some(handle)
    }

    fn settle(&self, generation: u64, result: Result<Envelope, Error>) {
        let outcome = match result {
            Ok(envelope) if envelope.is_success() => {
                serde_json::from_value::<T>(envelope.into_payload()).map_err(StructuredError::decode)
            }
            Ok(envelope) => Err(StructuredError::from_envelope(&envelope)),
            Err(err) => Err(StructuredError::from_transport(&err)),
        };

        // Checked under the channel's write lock, so no dispatch can slip in
        // between the generation check and the write.
        let committed = self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            state.loading = false;
            match &outcome {
                Ok(data) => {
                    state.data = Some(data.clone());
                    state.error = None;
                }
                Err(err) => state.error = Some(err.clone()),
            }
            true
        });

        if !committed {
            tracing::debug!("discarding stale result (generation {})", generation);
            return;
        }

        match &outcome {
            Ok(data) => {
                if let Some(on_success) = &self.callbacks.on_success {
                    on_success(data);
                }
            }
            Err(err) => {
                tracing::debug!("fetch failed: {}", err);
                if let Some(on_error) = &self.callbacks.on_error {
                    on_error(err);
                }
            }
        }
    }
}

impl<T, R> Shared<T, R> {
    /// Invalidates every outstanding attempt and aborts the newest one.
    fn close(&self) {
        self.state.send_if_modified(|_| {
            self.closed.store(true, Ordering::SeqCst);
            self.generation.fetch_add(1, Ordering::SeqCst);
            false
        });
        if let Some(task) = self
            .latest_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
    }
}

/// One mounted consumer's fetch of a single endpoint.
///
/// Fetches on construction and whenever [`reconfigure`](Self::reconfigure)
/// changes the [`FetchConfig`]. Dropping it cancels whatever is in flight.
pub struct ApiData<T, R> {
    shared: Arc<Shared<T, R>>,
}

impl<T, R> ApiData<T, R>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
    R: Transport + 'static,
{
    /// Creates the hook and dispatches the first fetch. Must be called from
    /// within a tokio runtime.
    pub fn new(transport: Arc<R>, config: FetchConfig) -> Self {
        Self::with_callbacks(transport, config, Callbacks::default())
    }

    pub fn with_callbacks(transport: Arc<R>, config: FetchConfig, callbacks: Callbacks<T>) -> Self {
        let (state, _) = watch::channel(FetchState::idle());
        let shared = Arc::new(Shared {
            transport,
            state,
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            config: Mutex::new(config),
            callbacks,
            latest_task: Mutex::new(None),
        });
        shared.dispatch();
        Self { shared }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> FetchState<T> {
        self.shared.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.shared.state.borrow().data.clone()
    }

    pub fn error(&self) -> Option<StructuredError> {
        self.shared.state.borrow().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().loading
    }

    pub fn config(&self) -> FetchConfig {
        self.shared.config()
    }

    /// Receiver notified on every committed state change.
    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.shared.state.subscribe()
    }

    /// Starts a new attempt, superseding any unsettled one, and waits for it
    /// to settle. Its result is discarded if yet another attempt starts
    /// before it settles.
    pub async fn refetch(&self) {
        if let Some(handle) = self.shared.dispatch() {
            let _ = handle.await;
        }
    }

    /// Starts a new attempt without waiting for it.
    pub fn refetch_detached(&self) {
        self.shared.dispatch();
    }

    /// Replaces the configuration. Dispatches a new attempt (or goes idle)
    /// only when it differs from the current one; returns whether it did.
    pub fn reconfigure(&self, config: FetchConfig) -> bool {
        {
            let mut current = self
                .shared
                .config
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if *current == config {
                return false;
            }
            *current = config;
        }
        self.shared.dispatch();
        true
    }

    /// Waits until no attempt is loading and returns that state.
    pub async fn wait_settled(&self) -> FetchState<T> {
        let mut rx = self.shared.state.subscribe();
        if let Ok(state) = rx.wait_for(|state| !state.loading).await {
            return state.clone();
        }
        self.state()
    }

    /// A weak handle that can trigger refetches without keeping the hook
    /// alive.
    pub fn refetcher(&self) -> Refetcher<T, R> {
        Refetcher {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl<T, R> Drop for ApiData<T, R> {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Weak trigger for [`ApiData::refetch_detached`], used by timers.
pub struct Refetcher<T, R> {
    shared: Weak<Shared<T, R>>,
}

impl<T, R> Clone for Refetcher<T, R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, R> Refetcher<T, R>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
    R: Transport + 'static,
{
    /// Starts a new attempt. Returns `false` once the hook has been dropped.
    pub fn refetch(&self) -> bool {
        match self.shared.upgrade() {
            Some(shared) if !shared.closed.load(Ordering::SeqCst) => {
                shared.dispatch();
                true
            }
            _ => false,
        }
    }
}
