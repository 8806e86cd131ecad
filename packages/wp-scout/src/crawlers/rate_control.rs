//! Adaptive request pacing.
//!
//! Every network call site follows the same shape:
//!
//! ```rust,ignore
//! rate.wait(TrafficClass::Fetch).await;
//! let result = transport.fetch(&request).await;
//! rate.observe(TrafficClass::Fetch, Outcome::classify(&result));
//! ```
//!
//! Search and fetch traffic are paced independently. A throttling response
//! raises that class's delay to its escalated value for the rest of the run.
//! Plain errors leave timing alone: they are availability problems, not
//! rate-limit signals.

use std::num::NonZeroU32;
use std::sync::Mutex;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use rand::Rng;
use tracing::warn;

use crate::error::FetchResult;
use crate::traits::transport::FetchResponse;
use crate::types::config::DelayConfig;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Which kind of traffic a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrafficClass {
    /// Search-engine queries
    Search,
    /// Probes against candidate sites
    Fetch,
}

/// What a response tells the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Throttled,
    Error,
}

impl Outcome {
    /// Classify a transport result. Any response other than 429 is `Ok`
    /// from a pacing point of view, whatever its status.
    pub fn classify(result: &FetchResult<FetchResponse>) -> Self {
        match result {
            Ok(response) if response.is_throttled() => Outcome::Throttled,
            Ok(_) => Outcome::Ok,
            Err(_) => Outcome::Error,
        }
    }
}

#[derive(Debug)]
struct ClassState {
    config: DelayConfig,
    current: Duration,
    throttled: u64,
}

impl ClassState {
    fn new(config: DelayConfig) -> Self {
        Self {
            config,
            current: Duration::from_millis(config.base_ms),
            throttled: 0,
        }
    }
}

/// Delay state for both traffic classes.
///
/// Shared by all workers behind an `Arc`; each class has its own lock.
pub struct RateController {
    search: Mutex<ClassState>,
    fetch: Mutex<ClassState>,
    ceiling: Option<DefaultRateLimiter>,
}

impl RateController {
    /// Create a controller starting both classes at their base delay.
    pub fn new(search: DelayConfig, fetch: DelayConfig) -> Self {
        Self {
            search: Mutex::new(ClassState::new(search)),
            fetch: Mutex::new(ClassState::new(fetch)),
            ceiling: None,
        }
    }

    /// Add a global requests-per-second ceiling across both classes.
    pub fn with_request_ceiling(mut self, per_second: NonZeroU32) -> Self {
        self.ceiling = Some(RateLimiter::direct(Quota::per_second(per_second)));
        self
    }

    fn state(&self, class: TrafficClass) -> std::sync::MutexGuard<'_, ClassState> {
        let lock = match class {
            TrafficClass::Search => &self.search,
            TrafficClass::Fetch => &self.fetch,
        };
        lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current delay for a class, without jitter.
    pub fn current_delay(&self, class: TrafficClass) -> Duration {
        self.state(class).current
    }

    /// Number of throttling signals seen for a class.
    pub fn throttle_count(&self, class: TrafficClass) -> u64 {
        self.state(class).throttled
    }

    /// Suspend for the class's current delay plus random jitter, then wait
    /// for the global ceiling if one is configured.
    pub async fn wait(&self, class: TrafficClass) {
        let (delay, jitter_ms) = {
            let state = self.state(class);
            (state.current, state.config.jitter_ms)
        };
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };

        let total = delay + jitter;
        if !total.is_zero() {
            tokio::time::sleep(total).await;
        }

        if let Some(ceiling) = &self.ceiling {
            ceiling.until_ready().await;
        }
    }

    /// Record the outcome of a request.
    pub fn observe(&self, class: TrafficClass, outcome: Outcome) {
        if outcome != Outcome::Throttled {
            return;
        }

        let mut state = self.state(class);
        state.throttled += 1;
        let escalated = Duration::from_millis(state.config.escalated_ms);
        if state.current < escalated {
            warn!(
                class = ?class,
                from_ms = state.current.as_millis() as u64,
                to_ms = escalated.as_millis() as u64,
                "throttled, escalating delay"
            );
            state.current = escalated;
        } else {
            warn!(
                class = ?class,
                delay_ms = state.current.as_millis() as u64,
                "throttled again at escalated delay"
            );
        }
    }
}
