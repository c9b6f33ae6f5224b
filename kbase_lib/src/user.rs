//! Resources belonging to the signed-in user.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use kbase_api::types::{UserFile, UserProfile};
use kbase_api::{Filters, ResourcePath, Transport, DEFAULT_CACHE_TTL};
use serde_json::Value;
use tokio::sync::watch;

use crate::client::CachedTransport;
use crate::error::StructuredError;
use crate::extract::{extract_list, extract_object};
use crate::fetch::{ApiData, Callbacks, ErrorCallback, FetchConfig, FetchState};

pub const USER_CACHE_TTL: Duration = DEFAULT_CACHE_TTL;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UserResource {
    Profile,
    Files,
}

impl UserResource {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Profile => "/user/profile",
            Self::Files => "/files/list",
        }
    }

    /// Older backends list files under `documents`.
    pub fn field_candidates(&self) -> &'static [&'static str] {
        match self {
            Self::Profile => &["user"],
            Self::Files => &["documents", "files"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Files => "files",
        }
    }
}

impl fmt::Display for UserResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn user_endpoint(resource: Option<UserResource>) -> Option<&'static str> {
    resource.map(|r| r.endpoint())
}

#[derive(Clone, Debug, PartialEq)]
pub enum UserResourceData {
    /// `None` until a profile has been fetched.
    Profile(Option<UserProfile>),
    Files(Vec<UserFile>),
    Unselected,
}

pub fn extract_user(resource: Option<UserResource>, payload: Option<&Value>) -> UserResourceData {
    let Some(resource) = resource else {
        return UserResourceData::Unselected;
    };
    let empty = Value::Null;
    let payload = payload.unwrap_or(&empty);
    let candidates = resource.field_candidates();
    match resource {
        UserResource::Profile => UserResourceData::Profile(extract_object(payload, candidates)),
        UserResource::Files => UserResourceData::Files(extract_list(payload, candidates)),
    }
}

#[derive(Clone, Default)]
pub struct UserDataOptions {
    pub token: Option<String>,
    pub skip: bool,
    pub on_error: Option<ErrorCallback>,
    /// Per-request timeout. `None` uses the transport default.
    pub timeout: Option<Duration>,
    pub filters: Filters,
}

impl UserDataOptions {
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

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }
}

impl fmt::Debug for UserDataOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDataOptions")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("skip", &self.skip)
            .field("on_error", &self.on_error.is_some())
            .field("timeout", &self.timeout)
            .field("filters", &self.filters)
            .finish()
    }
}

/// Fetches the user's profile or file list.
pub struct UserData<R = CachedTransport> {
    api: ApiData<Value, R>,
    resource: Option<UserResource>,
    options: UserDataOptions,
}

impl<R: Transport + 'static> UserData<R> {
    pub fn new(transport: Arc<R>, resource: Option<UserResource>, options: UserDataOptions) -> Self {
        let callbacks = Callbacks {
            on_success: None,
            on_error: options.on_error.clone(),
        };
        let api = ApiData::with_callbacks(transport, fetch_config(resource, &options), callbacks);
        Self {
            api,
            resource,
            options,
        }
    }

    pub fn for_profile(transport: Arc<R>, options: UserDataOptions) -> Self {
        Self::new(transport, Some(UserResource::Profile), options)
    }

    pub fn for_files(transport: Arc<R>, options: UserDataOptions) -> Self {
        Self::new(transport, Some(UserResource::Files), options)
    }

    pub fn resource(&self) -> Option<UserResource> {
        self.resource
    }

    pub fn data(&self) -> UserResourceData {
        extract_user(self.resource, self.api.data().as_ref())
    }

    pub fn profile(&self) -> Option<UserProfile> {
        match self.data() {
            UserResourceData::Profile(profile) => profile,
            _ => None,
        }
    }

    pub fn files(&self) -> Vec<UserFile> {
        match self.data() {
            UserResourceData::Files(files) => files,
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

    pub fn set_filters(&mut self, filters: Filters) {
        if self.options.filters == filters {
            return;
        }
        self.options.filters = filters;
        self.api.reconfigure(fetch_config(self.resource, &self.options));
    }
}

fn fetch_config(resource: Option<UserResource>, options: &UserDataOptions) -> FetchConfig {
    let url = user_endpoint(resource).map(|endpoint| {
        ResourcePath::new(endpoint)
            .with_filters(&options.filters)
            .to_url_path()
    });
    let mut config = FetchConfig::default()
        .with_url(url)
        .with_token(options.token.clone())
        .with_cache(true)
        .with_cache_ttl(USER_CACHE_TTL)
        .with_retryable(true)
        .with_skip(options.skip);
    if let Some(timeout) = options.timeout {
        config = config.with_timeout(timeout);
    }
    config
}
