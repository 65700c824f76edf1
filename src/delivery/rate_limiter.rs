// src/delivery/rate_limiter.rs
//! In-memory, thread-safe rate limiter for outbound platform calls.
//! Each quota class admits at most `max_calls` calls in any rolling window
//! of `period`; callers over quota wait until the oldest admission expires.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::config::LimitsConfig;

/// Call-site class; each class has its own independent quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaClass {
    /// Property writes, asset descriptions and property reads.
    Default,
    /// Catalog listing.
    Catalog,
}

#[derive(Debug)]
struct Window {
    // Admission instants inside the current window, oldest first
    admitted: Mutex<VecDeque<Instant>>,
    max_calls: u32,
    period: Duration,
}

impl Window {
    fn new(max_calls: u32, period: Duration) -> Self {
        let max_calls = max_calls.max(1);
        Self {
            admitted: Mutex::new(VecDeque::with_capacity(max_calls.min(1024) as usize)),
            max_calls,
            period,
        }
    }

    /// Wait for a slot and record the admission. The lock is held while
    /// waiting, so waiters are admitted in arrival order.
    async fn acquire(&self) -> Duration {
        let mut admitted = self.admitted.lock().await;
        let arrived = Instant::now();
        loop {
            let now = Instant::now();
            while let Some(&oldest) = admitted.front() {
                if now.duration_since(oldest) >= self.period {
                    admitted.pop_front();
                } else {
                    break;
                }
            }
            if (admitted.len() as u32) < self.max_calls {
                admitted.push_back(now);
                return now.duration_since(arrived);
            }
            if let Some(&oldest) = admitted.front() {
                sleep_until(oldest + self.period).await;
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct RateLimiter {
    default: Arc<Window>,
    catalog: Arc<Window>,
}

impl RateLimiter {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            default: Arc::new(Window::new(limits.default_quota, limits.period())),
            catalog: Arc::new(Window::new(limits.catalog_quota, limits.period())),
        }
    }

    fn window(&self, class: QuotaClass) -> &Window {
        match class {
            QuotaClass::Default => &self.default,
            QuotaClass::Catalog => &self.catalog,
        }
    }

    /// Block until `class` has capacity. Returns how long the caller waited.
    pub async fn acquire(&self, class: QuotaClass) -> Duration {
        let waited = self.window(class).acquire().await;
        if !waited.is_zero() {
            tracing::debug!("Rate limiter delayed {:?} call by {:?}", class, waited);
        }
        waited
    }

    /// Run `call` once a slot in `class` is available.
    pub async fn throttle<F, Fut, T>(&self, class: QuotaClass, call: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire(class).await;
        call().await
    }

    /// Configured (calls, period) for `class`.
    pub fn quota(&self, class: QuotaClass) -> (u32, Duration) {
        let window = self.window(class);
        (window.max_calls, window.period)
    }
}
