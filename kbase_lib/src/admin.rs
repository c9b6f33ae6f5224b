//! Admin resources: users, files and reports across the organisation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use kbase_api::types::{AdminFile, AdminReport, AdminUser};
use kbase_api::{Filters, ResourcePath, Transport};
use serde_json::Value;
use tokio::sync::watch;

use crate::client::CachedTransport;
use crate::error::StructuredError;
use crate::extract::extract_list;
use crate::fetch::{ApiData, Callbacks, ErrorCallback, FetchConfig, FetchState};
use crate::polling::Poller;

/// Admin data changes often, so it is cached briefly.
pub const ADMIN_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdminResource {
    Users,
    Files,
    Reports,
}

impl AdminResource {
    pub const ALL: [AdminResource; 3] = [Self::Users, Self::Files, Self::Reports];

    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Users => "/admin/users",
            Self::Files => "/admin/files",
            Self::Reports => "/admin/reports",
        }
    }

    /// Payload fields the collection may be found under, in priority order.
    pub fn field_candidates(&self) -> &'static [&'static str] {
        match self {
            Self::Users => &["users"],
            Self::Files => &["files"],
            Self::Reports => &["reports"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Files => "files",
            Self::Reports => "reports",
        }
    }
}

impl fmt::Display for AdminResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint for an optional resource. `None` disables fetching.
pub fn admin_endpoint(resource: Option<AdminResource>) -> Option<&'static str> {
    resource.map(|r| r.endpoint())
}

/// The typed collection extracted for the selected resource.
#[derive(Clone, Debug, PartialEq)]
pub enum AdminCollection {
    Users(Vec<AdminUser>),
    Files(Vec<AdminFile>),
    Reports(Vec<AdminReport>),
    /// No resource selected.
    Unselected,
}

impl AdminCollection {
    pub fn len(&self) -> usize {
        match self {
            Self::Users(v) => v.len(),
            Self::Files(v) => v.len(),
            Self::Reports(v) => v.len(),
            Self::Unselected => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decodes `payload` into the collection for `resource`, tolerating both the
/// direct and the `response`-nested shape. Absent payloads yield an empty
/// collection.
pub fn extract_admin(resource: Option<AdminResource>, payload: Option<&Value>) -> AdminCollection {
    let Some(resource) = resource else {
        return AdminCollection::Unselected;
    };
    let empty = Value::Null;
    let payload = payload.unwrap_or(&empty);
    let candidates = resource.field_candidates();
    match resource {
        AdminResource::Users => AdminCollection::Users(extract_list(payload, candidates)),
        AdminResource::Files => AdminCollection::Files(extract_list(payload, candidates)),
        AdminResource::Reports => AdminCollection::Reports(extract_list(payload, candidates)),
    }
}

#[derive(Clone, Default)]
pub struct AdminDataOptions {
    pub token: Option<String>,
    pub skip: bool,
    pub on_error: Option<ErrorCallback>,
    /// Per-request timeout. `None` uses the transport default.
    pub timeout: Option<Duration>,
    /// Refetch on this period. `None` or zero disables auto-refresh.
    pub auto_refresh_interval: Option<Duration>,
    pub filters: Filters,
}

impl AdminDataOptions {
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn on_error(mut self, f: impl Fn(&StructuredError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn with_auto_refresh(mut self, interval: Option<Duration>) -> Self {
        self.auto_refresh_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }
}

impl fmt::Debug for AdminDataOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminDataOptions")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("skip", &self.skip)
            .field("on_error", &self.on_error.is_some())
            .field("timeout", &self.timeout)
            .field("auto_refresh_interval", &self.auto_refresh_interval)
            .field("filters", &self.filters)
            .finish()
    }
}

/// Fetches one admin resource and exposes it as a typed collection.
///
/// Non-empty filters are sent as the query string; changing them supersedes
/// any fetch in flight.
pub struct AdminData<R = CachedTransport> {
    // Declared first so the timer stops before the hook is torn down.
    poller: Poller,
    api: ApiData<Value, R>,
    resource: Option<AdminResource>,
    options: AdminDataOptions,
}

impl<R: Transport + 'static> AdminData<R> {
    /// Starts fetching `resource` right away. Must be called within a tokio
    /// runtime.
    pub fn new(transport: Arc<R>, resource: Option<AdminResource>, options: AdminDataOptions) -> Self {
        let callbacks = Callbacks {
            on_success: None,
            on_error: options.on_error.clone(),
        };
        let api = ApiData::with_callbacks(transport, fetch_config(resource, &options), callbacks);
        let poller = spawn_poller(&api, options.auto_refresh_interval);
        Self {
            poller,
            api,
            resource,
            options,
        }
    }

    pub fn for_users(transport: Arc<R>, options: AdminDataOptions) -> Self {
        Self::new(transport, Some(AdminResource::Users), options)
    }

    pub fn for_files(transport: Arc<R>, options: AdminDataOptions) -> Self {
        Self::new(transport, Some(AdminResource::Files), options)
    }

    pub fn for_reports(transport: Arc<R>, options: AdminDataOptions) -> Self {
        Self::new(transport, Some(AdminResource::Reports), options)
    }

    pub fn resource(&self) -> Option<AdminResource> {
        self.resource
    }

    /// The latest successfully fetched collection, empty until one arrives.
    pub fn data(&self) -> AdminCollection {
        extract_admin(self.resource, self.api.data().as_ref())
    }

    pub fn users(&self) -> Vec<AdminUser> {
        match self.data() {
            AdminCollection::Users(users) => users,
            _ => Vec::new(),
        }
    }

    pub fn files(&self) -> Vec<AdminFile> {
        match self.data() {
            AdminCollection::Files(files) => files,
            _ => Vec::new(),
        }
    }

    pub fn reports(&self) -> Vec<AdminReport> {
        match self.data() {
            AdminCollection::Reports(reports) => reports,
            _ => Vec::new(),
        }
    }

    pub fn loading(&self) -> bool {
        self.api.is_loading()
    }

    pub fn is_loading(&self) -> bool {
        self.api.is_loading()
    }

    pub fn error(&self) -> Option<StructuredError> {
        self.api.error()
    }

    pub async fn refetch(&self) {
        self.api.refetch().await;
    }

    pub fn refetch_detached(&self) {
        self.api.refetch_detached();
    }

    pub async fn wait_settled(&self) -> FetchState<Value> {
        self.api.wait_settled().await
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<Value>> {
        self.api.subscribe()
    }

    pub fn filters(&self) -> &Filters {
        &self.options.filters
    }

    /// Replaces the filters, refetching when they changed.
    pub fn set_filters(&mut self, filters: Filters) {
        if self.options.filters == filters {
            return;
        }
        self.options.filters = filters;
        self.api.reconfigure(fetch_config(self.resource, &self.options));
    }

    pub fn auto_refresh_interval(&self) -> Option<Duration> {
        self.options.auto_refresh_interval
    }

    /// Restarts the refresh timer when the interval changed. Crossing
    /// [`ADMIN_CACHE_TTL`] toggles response caching, which refetches once.
    pub fn set_auto_refresh(&mut self, interval: Option<Duration>) {
        if self.options.auto_refresh_interval == interval {
            return;
        }
        self.options.auto_refresh_interval = interval;
        self.api.reconfigure(fetch_config(self.resource, &self.options));
        self.poller = spawn_poller(&self.api, interval);
    }
}

fn fetch_config(resource: Option<AdminResource>, options: &AdminDataOptions) -> FetchConfig {
    let url = admin_endpoint(resource).map(|endpoint| {
        ResourcePath::new(endpoint)
            .with_filters(&options.filters)
            .to_url_path()
    });
    // Polling faster than the TTL would only ever see cached copies.
    let cache = options
        .auto_refresh_interval
        .filter(|period| !period.is_zero())
        .map_or(true, |period| period >= ADMIN_CACHE_TTL);
    let mut config = FetchConfig::default()
        .with_url(url)
        .with_token(options.token.clone())
        .with_cache(cache)
        .with_cache_ttl(ADMIN_CACHE_TTL)
        .with_retryable(true)
        .with_skip(options.skip);
    if let Some(timeout) = options.timeout {
        config = config.with_timeout(timeout);
    }
    config
}

fn spawn_poller<R: Transport + 'static>(api: &ApiData<Value, R>, interval: Option<Duration>) -> Poller {
    match interval {
        Some(period) if !period.is_zero() => {
            let refetcher = api.refetcher();
            Poller::spawn(period, move || refetcher.refetch())
        }
        _ => Poller::inactive(),
    }
}
