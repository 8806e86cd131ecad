//! WordPress Site Discovery
//!
//! Finds, for a long list of organization names, which ones run a publicly
//! reachable WordPress site. Built to run for hours against real search
//! engines and real sites: politely, resumably, and without losing a match.
//!
//! # How a name is processed
//!
//! 1. **Discover** - search for the name, keep the first K result hosts
//! 2. **Expand** - host variants (prefixes) x probe paths x https/http
//! 3. **Probe** - walk the targets in order, first WordPress match wins
//! 4. **Record** - append `name,domain` durably; at most one row per name
//!
//! Every network call goes through a shared [`RateController`] that escalates
//! its delay when a server answers 429.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wp_scout::{load_names, CrawlCoordinator, CsvResultStore, HttpTransport, ScoutConfig};
//!
//! let config = ScoutConfig::default();
//! let transport = Arc::new(HttpTransport::from_config(&config)?);
//! let store = CsvResultStore::open("wordpress_sites.csv").await?;
//!
//! let coordinator = CrawlCoordinator::from_config(&config, transport, store)?;
//! let summary = coordinator.run(load_names("organizations.csv")?).await?;
//! println!("found {} of {}", summary.found, summary.processed);
//! ```
//!
//! # Modules
//!
//! - [`types`] - names, hosts, probe targets, records and config
//! - [`traits`] - the `Transport` and `ResultStore` seams
//! - [`transport`] - reqwest transport plus per-host cap and host guard
//! - [`detect`] - fingerprints and the name relevance gate
//! - [`crawlers`] - rate control, discovery, expansion, probing
//! - [`stores`] - CSV and in-memory result stores
//! - [`pipeline`] - input loading, progress and the coordinator
//! - [`testing`] - mock transport and stores for tests

pub mod crawlers;
pub mod detect;
pub mod error;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod transport;
pub mod types;

// Re-export core types at crate root
pub use crawlers::{
    CandidateDiscoverer, CandidateExpander, Outcome, ProbeEngine, RateController,
    SequenceReport, TrafficClass, Verdict,
};
pub use detect::{is_relevant, tokenize, SignatureMatcher};
pub use error::{CrawlError, CrawlResult, FetchError, InputError, SearchError, StoreError};
pub use pipeline::{
    load_names, CrawlCoordinator, CrawlHandle, CrawlSummary, NameOutcome, NamePhase,
    ProgressSnapshot,
};
pub use stores::{CsvMissLog, CsvResultStore, MemoryResultStore};
pub use traits::{
    store::ResultStore,
    transport::{FetchRequest, FetchResponse, Method, Transport},
};
pub use transport::{GuardedTransport, HostCapped, HostGuard, HttpTransport};
pub use types::{
    config::{DelayConfig, DetectionMode, ScoutConfig},
    record::{AppendOutcome, MissReason, MissRecord, ResultRecord},
    target::{
        DetectionVerdict, Evidence, Hostname, OrganizationName, ProbeKind, ProbePath,
        ProbeTarget, Scheme,
    },
};
