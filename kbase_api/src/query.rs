//! Endpoint paths with optional filter parameters.

use std::collections::BTreeMap;
use std::fmt;

use url::form_urlencoded;

/// Filter parameters attached to a resource request. Ordered so the
/// rendered query string, and therefore the cache key, is deterministic.
pub type Filters = BTreeMap<String, String>;

/// An endpoint path plus the filters to send with it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourcePath {
    path: String,
    filters: Filters,
}

impl ResourcePath {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            filters: Filters::new(),
        }
    }

    pub fn with_filter(mut self, key: &str, value: &str) -> Self {
        self.filters.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_filters(mut self, filters: &Filters) -> Self {
        self.filters
            .extend(filters.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Renders `path?key=value&...`, or just `path` when there are no filters.
    pub fn to_url_path(&self) -> String {
        if self.filters.is_empty() {
            return self.path.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.filters.iter())
            .finish();
        format!("{}?{}", self.path, query)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url_path())
    }
}
