//! Crawl coordinator.
//!
//! Drives each name through `Pending -> Discovering -> Expanding -> Probing
//! -> Found | Exhausted` with a bounded pool of concurrent name workers.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wp_scout::{CrawlCoordinator, CsvResultStore, HttpTransport, ScoutConfig};
//!
//! let config = ScoutConfig::default();
//! let transport = Arc::new(HttpTransport::from_config(&config)?);
//! let store = CsvResultStore::open("results.csv").await?;
//! let coordinator = CrawlCoordinator::from_config(&config, transport, store)?;
//!
//! let handle = coordinator.handle();
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     handle.stop();
//! });
//!
//! let summary = coordinator.run(names).await?;
//! ```

use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::crawlers::discover::CandidateDiscoverer;
use crate::crawlers::expand::CandidateExpander;
use crate::crawlers::probe::ProbeEngine;
use crate::crawlers::rate_control::{RateController, TrafficClass};
use crate::detect::relevance::tokenize;
use crate::error::{CrawlError, CrawlResult, StoreError};
use crate::pipeline::progress::{CrawlState, CrawlSummary, NamePhase, ProgressSnapshot};
use crate::stores::csv::CsvMissLog;
use crate::traits::store::ResultStore;
use crate::traits::transport::Transport;
use crate::transport::{GuardedTransport, HostCapped};
use crate::types::config::ScoutConfig;
use crate::types::record::{AppendOutcome, MissReason, MissRecord, ResultRecord};
use crate::types::target::{DetectionVerdict, OrganizationName};

/// How one name ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameOutcome {
    /// Match found and durably recorded
    Found(DetectionVerdict),
    /// Nothing matched; nothing written to the result store
    Exhausted { reason: MissReason },
    /// Nothing matched, but the search failed or a target was throttled.
    /// Never written to the miss log, so the name is tried again on restart.
    Inconclusive { reason: MissReason },
    /// Stop signal arrived first; the name will be retried on restart
    Interrupted,
}

/// Cheap, cloneable handle for polling and stopping a run from elsewhere.
#[derive(Clone)]
pub struct CrawlHandle {
    state: Arc<CrawlState>,
    rate: Arc<RateController>,
    cancel: CancellationToken,
}

impl CrawlHandle {
    pub fn progress(&self) -> ProgressSnapshot {
        self.state.snapshot(
            self.rate.current_delay(TrafficClass::Search),
            self.rate.current_delay(TrafficClass::Fetch),
        )
    }

    /// Stop dispatching new names. In-flight names stop at their next
    /// probe; a match already found is still recorded.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!("stop requested");
        }
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Orchestrates discovery, expansion, probing and recording.
///
/// One coordinator drives one run.
pub struct CrawlCoordinator<S: ResultStore> {
    config: ScoutConfig,
    store: S,
    misses: Option<CsvMissLog>,
    rate: Arc<RateController>,
    discoverer: CandidateDiscoverer,
    expander: CandidateExpander,
    engine: ProbeEngine,
    state: Arc<CrawlState>,
    cancel: CancellationToken,
}

impl<S: ResultStore> CrawlCoordinator<S> {
    /// Wire up every stage from `config`.
    ///
    /// `transport` gets the per-host cap, and the host guard when
    /// `block_private_hosts` is set.
    pub fn from_config(
        config: &ScoutConfig,
        transport: Arc<dyn Transport>,
        store: S,
    ) -> CrawlResult<Self> {
        config.validate()?;

        let capped: Arc<dyn Transport> =
            Arc::new(HostCapped::new(transport, config.per_host_limit));
        let transport: Arc<dyn Transport> = if config.block_private_hosts {
            Arc::new(GuardedTransport::new(capped))
        } else {
            capped
        };

        let mut rate = RateController::new(config.search_delay, config.fetch_delay);
        if let Some(ceiling) = config.max_requests_per_second.and_then(NonZeroU32::new) {
            rate = rate.with_request_ceiling(ceiling);
        }
        let rate = Arc::new(rate);

        let discoverer = CandidateDiscoverer::new(config, transport.clone(), rate.clone())?;
        let expander = CandidateExpander::from_config(config);
        let engine =
            ProbeEngine::new(transport, rate.clone()).with_name_match(config.require_name_match);

        Ok(Self {
            config: config.clone(),
            store,
            misses: None,
            rate,
            discoverer,
            expander,
            engine,
            state: Arc::new(CrawlState::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Also record misses, and skip names already in the miss log.
    pub fn with_miss_log(mut self, misses: CsvMissLog) -> Self {
        self.misses = Some(misses);
        self
    }

    pub fn handle(&self) -> CrawlHandle {
        CrawlHandle {
            state: self.state.clone(),
            rate: self.rate.clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn rate(&self) -> &RateController {
        &self.rate
    }

    // =========================================================================
    // Run
    // =========================================================================

    /// Process every name not already in the resume set.
    ///
    /// Fails only when the resume set cannot be loaded or a match cannot be
    /// made durable; the latter halts the run after in-flight names drain.
    pub async fn run(&self, names: Vec<OrganizationName>) -> CrawlResult<CrawlSummary> {
        let mut seen = HashSet::new();
        let unique: Vec<OrganizationName> = names
            .into_iter()
            .filter(|name| seen.insert(name.as_str().to_string()))
            .collect();
        let total_input = unique.len();

        let mut done = self.store.load().await?;
        if let Some(misses) = &self.misses {
            done.extend(misses.load().await);
        }
        let pending: Vec<OrganizationName> = unique
            .into_iter()
            .filter(|name| !done.contains(name.as_str()))
            .collect();
        let remaining = pending.len();
        let already_done = total_input - remaining;

        info!(
            total_input,
            already_done,
            remaining,
            parallelism = self.config.parallelism,
            per_host_limit = self.config.per_host_limit,
            "starting crawl"
        );
        self.state.start(remaining);

        let mut outcomes = stream::iter(pending)
            .take_while(|_| futures::future::ready(!self.cancel.is_cancelled()))
            .map(|name| self.process_name(name))
            .buffer_unordered(self.config.parallelism);

        let mut failure: Option<StoreError> = None;
        while let Some(result) = outcomes.next().await {
            match result {
                Ok(NameOutcome::Interrupted) => {}
                Ok(_) => self.maybe_report_progress(),
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                    self.cancel.cancel();
                }
            }
        }
        drop(outcomes);
        self.state.finish();

        let summary = CrawlSummary {
            total_input,
            already_done,
            processed: self.state.processed(),
            found: self.state.found(),
            exhausted: self.state.exhausted(),
            interrupted: self.state.processed() < remaining,
            elapsed: self.state.elapsed(),
        };

        if let Some(e) = failure {
            return Err(CrawlError::Store(e));
        }
        info!(
            processed = summary.processed,
            found = summary.found,
            exhausted = summary.exhausted,
            interrupted = summary.interrupted,
            elapsed_secs = summary.elapsed.as_secs(),
            "crawl finished"
        );
        Ok(summary)
    }

    async fn process_name(&self, name: OrganizationName) -> Result<NameOutcome, StoreError> {
        let key = name.as_str();
        self.state.begin(key);

        self.state.set_phase(key, NamePhase::Discovering);
        let searched = tokio::select! {
            searched = self.discoverer.discover(&name) => searched,
            _ = self.cancel.cancelled() => {
                self.state.abandon(key);
                return Ok(NameOutcome::Interrupted);
            }
        };
        let hosts = match searched {
            Ok(hosts) if hosts.is_empty() => {
                return Ok(self.exhausted(&name, MissReason::NoCandidates, true).await);
            }
            Ok(hosts) => hosts,
            Err(e) => {
                debug!(name = %name, error = %e, "search inconclusive");
                return Ok(self.exhausted(&name, MissReason::NoCandidates, false).await);
            }
        };

        self.state.set_phase(key, NamePhase::Expanding);
        let targets = self.expander.expand(&hosts);
        debug!(name = %name, hosts = hosts.len(), targets = targets.len(), "expanded candidates");

        self.state.set_phase(key, NamePhase::Probing);
        let tokens = tokenize(key);
        let report = self
            .engine
            .probe_sequence(&targets, &tokens, &self.cancel)
            .await;
        debug!(
            name = %name,
            attempted = report.attempted,
            skipped = report.skipped,
            throttled = report.throttled,
            "probe walk done"
        );

        match report.verdict {
            Some(verdict) => {
                if let Err(e) = self.record_match(&name, &verdict).await {
                    self.state.abandon(key);
                    return Err(e);
                }
                info!(
                    name = %name,
                    domain = %verdict.domain(),
                    url = %verdict.target,
                    evidence = %verdict.evidence,
                    "found WordPress site"
                );
                self.state.finish_name(key, NamePhase::Found);
                Ok(NameOutcome::Found(verdict))
            }
            None if report.cancelled => {
                self.state.abandon(key);
                Ok(NameOutcome::Interrupted)
            }
            None => {
                let conclusive = report.throttled == 0;
                Ok(self.exhausted(&name, MissReason::Exhausted, conclusive).await)
            }
        }
    }

    /// Finish a name without a match. Only a `conclusive` miss goes to the
    /// miss log.
    async fn exhausted(
        &self,
        name: &OrganizationName,
        reason: MissReason,
        conclusive: bool,
    ) -> NameOutcome {
        debug!(name = %name, reason = %reason, conclusive, "no match");
        if conclusive {
            if let Some(misses) = &self.misses {
                if let Err(e) = misses.append(&MissRecord::new(name.clone(), reason)).await {
                    warn!(name = %name, error = %e, "failed to record miss");
                }
            }
        }
        self.state.finish_name(name.as_str(), NamePhase::Exhausted);

        if conclusive {
            NameOutcome::Exhausted { reason }
        } else {
            NameOutcome::Inconclusive { reason }
        }
    }

    /// Append with bounded retries. A match is never dropped silently: the
    /// final failure is logged with the full record.
    async fn record_match(
        &self,
        name: &OrganizationName,
        verdict: &DetectionVerdict,
    ) -> Result<(), StoreError> {
        let record = ResultRecord::new(name.clone(), verdict.domain().clone());
        let attempts = self.config.store_write_attempts.max(1);

        let mut attempt = 1;
        loop {
            match self.store.append(&record).await {
                Ok(AppendOutcome::Appended) => return Ok(()),
                Ok(AppendOutcome::AlreadyPresent) => {
                    debug!(name = %name, "already recorded");
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    warn!(name = %name, attempt, attempts, error = %e, "store write failed, retrying");
                    tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        name = %name,
                        domain = %record.domain,
                        error = %e,
                        "could not record match, halting crawl"
                    );
                    return Err(e);
                }
            }
        }
    }

    fn maybe_report_progress(&self) {
        let every = self.config.progress_every;
        let processed = self.state.processed();
        if every == 0 || processed == 0 || processed % every != 0 {
            return;
        }
        let snapshot = self.handle().progress();
        info!(
            processed = snapshot.processed,
            total = snapshot.total,
            found = snapshot.found,
            rate_per_min = (snapshot.rate_per_min * 10.0).round() / 10.0,
            eta_mins = snapshot.eta_secs.map(|s| (s / 60.0).round() as u64),
            fetch_delay_ms = snapshot.fetch_delay_ms,
            "crawl progress"
        );
    }
}
