//! Fixed-interval auto-refresh.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Background timer that repeatedly invokes a tick function.
///
/// The first tick fires one full period after spawning. Missed ticks are
/// delayed, not burst. The timer stops when the tick function returns
/// `false` (typically because the hook it refreshes is gone) or when the
/// `Poller` is dropped.
#[derive(Debug)]
pub struct Poller {
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Starts polling. A zero period yields an inactive poller.
    pub fn spawn<F>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        if period.is_zero() {
            return Self::inactive();
        }

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !tick() {
                    tracing::debug!("poll target gone, stopping timer");
                    break;
                }
            }
        });

        Self {
            period,
            handle: Some(handle),
        }
    }

    pub fn inactive() -> Self {
        Self {
            period: Duration::ZERO,
            handle: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}
