//! Crawl progress: shared run state, pollable snapshot and final summary.
//!
//! One `CrawlState` per run, owned by the coordinator and handed to workers
//! by `Arc`. Counters are atomics; the in-flight table sits behind a mutex.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tokio::time::Instant;

/// Where a name is in its crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NamePhase {
    Pending,
    Discovering,
    Expanding,
    Probing,
    Found,
    Exhausted,
}

impl NamePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NamePhase::Found | NamePhase::Exhausted)
    }
}

/// Point-in-time view for a monitoring surface.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub running: bool,
    pub processed: usize,
    pub total: usize,
    pub found: usize,
    /// Most recently started name
    pub current: Option<String>,
    pub in_flight: Vec<(String, NamePhase)>,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub rate_per_min: f64,
    pub eta_secs: Option<f64>,
    pub search_delay_ms: u64,
    pub fetch_delay_ms: u64,
}

/// Totals reported when a run ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlSummary {
    /// Distinct names in the input
    pub total_input: usize,
    /// Skipped because they were in the resume set
    pub already_done: usize,
    pub processed: usize,
    pub found: usize,
    pub exhausted: usize,
    /// Stopped before every remaining name was processed
    pub interrupted: bool,
    pub elapsed: Duration,
}

#[derive(Default)]
struct Current {
    name: Option<String>,
    in_flight: IndexMap<String, NamePhase>,
}

/// When the run started; reset by `CrawlState::start`.
#[derive(Clone, Copy)]
struct Clock {
    started: Instant,
    started_at: DateTime<Utc>,
}

impl Clock {
    fn now() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

/// Mutable run state shared by all workers.
pub struct CrawlState {
    running: AtomicBool,
    total: AtomicUsize,
    processed: AtomicUsize,
    found: AtomicUsize,
    exhausted: AtomicUsize,
    current: Mutex<Current>,
    clock: Mutex<Clock>,
}

impl Default for CrawlState {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            total: AtomicUsize::new(0),
            processed: AtomicUsize::new(0),
            found: AtomicUsize::new(0),
            exhausted: AtomicUsize::new(0),
            current: Mutex::new(Current::default()),
            clock: Mutex::new(Clock::now()),
        }
    }

    fn current(&self) -> std::sync::MutexGuard<'_, Current> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn clock(&self) -> Clock {
        *self.clock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark the run started with `total` names left to process. Elapsed
    /// time and rate are measured from here.
    pub fn start(&self, total: usize) {
        *self.clock.lock().unwrap_or_else(|e| e.into_inner()) = Clock::now();
        self.total.store(total, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
    }

    /// A worker picked up `name`.
    pub fn begin(&self, name: &str) {
        let mut current = self.current();
        current.name = Some(name.to_string());
        current.in_flight.insert(name.to_string(), NamePhase::Pending);
    }

    pub fn set_phase(&self, name: &str, phase: NamePhase) {
        if let Some(slot) = self.current().in_flight.get_mut(name) {
            *slot = phase;
        }
    }

    /// A name reached `Found` or `Exhausted`. Returns the processed count.
    pub fn finish_name(&self, name: &str, phase: NamePhase) -> usize {
        self.current().in_flight.shift_remove(name);
        match phase {
            NamePhase::Found => {
                self.found.fetch_add(1, Ordering::SeqCst);
            }
            NamePhase::Exhausted => {
                self.exhausted.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
        self.processed.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// A name was abandoned by the stop signal; it is not counted.
    pub fn abandon(&self, name: &str) {
        self.current().in_flight.shift_remove(name);
    }

    pub fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn found(&self) -> usize {
        self.found.load(Ordering::SeqCst)
    }

    pub fn exhausted(&self) -> usize {
        self.exhausted.load(Ordering::SeqCst)
    }

    pub fn elapsed(&self) -> Duration {
        self.clock().started.elapsed()
    }

    /// Snapshot with rate and ETA derived from elapsed time.
    pub fn snapshot(&self, search_delay: Duration, fetch_delay: Duration) -> ProgressSnapshot {
        let total = self.total.load(Ordering::SeqCst);
        let processed = self.processed();
        let elapsed = self.elapsed().as_secs_f64();
        let rate_per_min = if elapsed > 0.0 {
            processed as f64 / elapsed * 60.0
        } else {
            0.0
        };
        let eta_secs = (rate_per_min > 0.0)
            .then(|| total.saturating_sub(processed) as f64 / rate_per_min * 60.0);

        let current = self.current();
        ProgressSnapshot {
            running: self.is_running(),
            processed,
            total,
            found: self.found(),
            current: current.name.clone(),
            in_flight: current
                .in_flight
                .iter()
                .map(|(name, phase)| (name.clone(), *phase))
                .collect(),
            started_at: self.clock().started_at,
            elapsed_secs: elapsed,
            rate_per_min,
            eta_secs,
            search_delay_ms: search_delay.as_millis() as u64,
            fetch_delay_ms: fetch_delay.as_millis() as u64,
        }
    }
}
