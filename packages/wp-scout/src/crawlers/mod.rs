//! The network-facing stages of a name's crawl.
//!
//! - `RateController` - per-class delay, escalated on throttling
//! - `CandidateDiscoverer` - search query to ranked candidate hostnames
//! - `CandidateExpander` - hostnames to the ordered probe sequence
//! - `ProbeEngine` - fetches targets, first match wins

pub mod discover;
pub mod expand;
pub mod probe;
pub mod rate_control;

pub use discover::{parse_result_hosts, CandidateDiscoverer};
pub use expand::CandidateExpander;
pub use probe::{ProbeEngine, SequenceReport, Verdict};
pub use rate_control::{Outcome, RateController, TrafficClass};
