//! Environment-driven configuration for the client stack.
//!
//! Every setting has a default; unset or unparseable variables fall back
//! to it rather than failing.

use std::time::Duration;

use rand::Rng;

/// API base URL used when `KBASE_API_URL` is unset.
pub const DEFAULT_API_URL: &str = "http://localhost:9001";

/// Retry policy for retryable transport failures.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl RetryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: parse_or(&lookup, "KBASE_RETRY_MAX", defaults.max_attempts).max(1),
            base_delay: Duration::from_millis(parse_or(
                &lookup,
                "KBASE_RETRY_BASE_MS",
                defaults.base_delay.as_millis() as u64,
            )),
            max_delay: Duration::from_millis(parse_or(
                &lookup,
                "KBASE_RETRY_MAX_MS",
                defaults.max_delay.as_millis() as u64,
            )),
        }
    }

    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt` (1-based): `base * 2^(attempt-1)`
    /// capped at `max_delay`, with ±20% jitter.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(30) as u32;
        let exp = 1u64 << shift;
        let base = (self.base_delay.as_millis() as u64)
            .saturating_mul(exp)
            .min(self.max_delay.as_millis() as u64);
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_millis((base as f64 * jitter) as u64)
    }
}

/// Settings for talking to one API deployment.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
    pub retry: RetryConfig,
    /// How often expired cache entries are swept.
    pub cache_sweep_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout: kbase_api::DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            cache_sweep_interval: Duration::from_secs(60),
        }
    }
}

impl ClientConfig {
    /// Reads `KBASE_API_URL`, `KBASE_API_TOKEN`, `KBASE_TIMEOUT_SECS`,
    /// `KBASE_CACHE_SWEEP_SECS` and the `KBASE_RETRY_*` variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            api_url: lookup("KBASE_API_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(defaults.api_url),
            token: lookup("KBASE_API_TOKEN").filter(|token| !token.is_empty()),
            timeout: Duration::from_secs(parse_or(
                &lookup,
                "KBASE_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )),
            retry: RetryConfig::from_lookup(&lookup),
            cache_sweep_interval: Duration::from_secs(parse_or(
                &lookup,
                "KBASE_CACHE_SWEEP_SECS",
                defaults.cache_sweep_interval.as_secs(),
            )),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|val| val.trim().parse::<T>().ok())
        .unwrap_or(default)
}
