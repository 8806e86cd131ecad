//! Typed errors for the scout library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so each layer can tell
//! a transport failure apart from a store failure without string matching.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from a single HTTP exchange.
///
/// These never escape the probe boundary: the probe engine turns every one of
/// them into "this target did not match".
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request exceeded the configured timeout
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// TCP/TLS/DNS level failure
    #[error("connection failed for {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Host refused by the host guard before any network call
    #[error("blocked {url}: {reason}")]
    Blocked { url: String, reason: String },

    /// URL could not be built or parsed
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Any other HTTP client failure
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A search that produced no answer about the name.
///
/// Distinct from an empty result page: the name may well have candidates.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search throttled")]
    Throttled,

    #[error("search returned status {0}")]
    Status(u16),

    #[error("search failed after {attempts} attempts: {source}")]
    Failed {
        attempts: u32,
        #[source]
        source: FetchError,
    },
}

/// Errors from the result store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Existing file has a different header than the one we write
    #[error("{path} has header {found:?}, expected {expected:?}")]
    SchemaMismatch {
        path: PathBuf,
        found: Vec<String>,
        expected: [&'static str; 2],
    },

    /// Backend temporarily unable to accept writes
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors loading the input name list.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("input file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("input I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("input CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Fatal errors for a whole crawl run.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// A positive match could not be made durable
    #[error("result store failed: {0}")]
    Store(#[from] StoreError),

    #[error("input failed: {0}")]
    Input(#[from] InputError),

    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for transport operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for crawl runs.
pub type CrawlResult<T> = std::result::Result<T, CrawlError>;
