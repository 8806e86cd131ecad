//! Run orchestration: input loading, progress tracking and the coordinator.

pub mod coordinator;
pub mod input;
pub mod progress;

pub use coordinator::{CrawlCoordinator, CrawlHandle, NameOutcome};
pub use input::{load_names, read_names};
pub use progress::{CrawlState, CrawlSummary, NamePhase, ProgressSnapshot};
