//! Configuration types for discovery, probing and the crawl run.

use serde::{Deserialize, Serialize};

use super::target::ProbePath;
use crate::error::CrawlError;

/// Delay settings for one traffic class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayConfig {
    /// Delay before every request until the first throttling signal
    pub base_ms: u64,

    /// Delay after a throttling signal (a ceiling, not a multiplier)
    pub escalated_ms: u64,

    /// Upper bound of the random extra delay added to every wait
    #[serde(default)]
    pub jitter_ms: u64,
}

impl DelayConfig {
    pub fn new(base_ms: u64, escalated_ms: u64) -> Self {
        Self {
            base_ms,
            escalated_ms,
            jitter_ms: 0,
        }
    }

    /// Set jitter.
    pub fn with_jitter_ms(mut self, ms: u64) -> Self {
        self.jitter_ms = ms;
        self
    }

    /// No waiting at all; intended for tests.
    pub fn none() -> Self {
        Self::new(0, 0)
    }
}

/// Which family of probe paths to use when `paths` is not given explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Fingerprints in page bodies plus the login-page existence check
    #[default]
    Content,
    /// REST introspection endpoints only (stricter)
    RestApi,
    /// REST endpoints first, then the content paths
    Combined,
}

impl DetectionMode {
    /// The path table for this mode.
    pub fn default_paths(&self) -> Vec<ProbePath> {
        let content = || {
            vec![
                ProbePath::content("/"),
                ProbePath::exists("/wp-login.php"),
                // served as application/json, so only the REST check can match it
                ProbePath::rest_api("/wp-json/"),
                ProbePath::content("/blog"),
                ProbePath::content("/news"),
                ProbePath::content("/feed"),
            ]
        };
        let rest = || {
            vec![
                ProbePath::rest_api("/wp-json/wp/v2/types"),
                ProbePath::rest_api("/wp-json/wp/v2/posts?per_page=1"),
                ProbePath::rest_api("/wp-json/"),
            ]
        };
        match self {
            DetectionMode::Content => content(),
            DetectionMode::RestApi => rest(),
            DetectionMode::Combined => {
                let mut paths = rest();
                for path in content() {
                    if !paths.contains(&path) {
                        paths.push(path);
                    }
                }
                paths
            }
        }
    }
}

/// Everything a crawl run can be tuned with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// Maximum candidate hostnames taken from one search (K)
    pub max_candidates: usize,

    /// Appended to the organization name to bias the search
    pub query_suffix: String,

    /// Search endpoint; the query goes in `q`, K in `count`
    pub search_url: String,

    /// CSS selector for result anchors on the search page
    pub result_selector: String,

    /// Search attempts per name when the transport fails
    pub search_attempts: u32,

    /// Subdomain prefixes tried on every candidate (`blog.`, `news.`, ...)
    pub prefixes: Vec<String>,

    /// Selects the default path table
    pub mode: DetectionMode,

    /// Explicit path table; empty means `mode.default_paths()`
    pub paths: Vec<ProbePath>,

    /// Require REST site names to share a word with the organization name
    pub require_name_match: bool,

    pub search_delay: DelayConfig,
    pub fetch_delay: DelayConfig,

    /// Optional global ceiling across both traffic classes
    pub max_requests_per_second: Option<u32>,

    pub request_timeout_ms: u64,
    pub user_agent: String,
    pub accept_invalid_certs: bool,

    /// Refuse loopback/private/metadata hosts surfaced by search
    pub block_private_hosts: bool,

    /// Names processed concurrently
    pub parallelism: usize,

    /// Concurrent requests aimed at one host
    pub per_host_limit: usize,

    /// Log progress every N names
    pub progress_every: usize,

    /// Attempts at making a positive match durable before the run halts
    pub store_write_attempts: u32,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            max_candidates: 3,
            query_suffix: "official website".to_string(),
            search_url: "https://www.bing.com/search".to_string(),
            result_selector: "li.b_algo h2 a, h2 a".to_string(),
            search_attempts: 2,
            prefixes: ["www.", "blog.", "news.", "stories.", "newsroom."]
                .into_iter()
                .map(String::from)
                .collect(),
            mode: DetectionMode::Content,
            paths: vec![],
            require_name_match: false,
            search_delay: DelayConfig::new(6_000, 15_000).with_jitter_ms(2_000),
            fetch_delay: DelayConfig::new(2_000, 4_000).with_jitter_ms(500),
            max_requests_per_second: None,
            request_timeout_ms: 30_000,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            accept_invalid_certs: false,
            block_private_hosts: true,
            parallelism: 1,
            per_host_limit: 2,
            progress_every: 25,
            store_write_attempts: 3,
        }
    }
}

impl ScoutConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// The path table actually probed.
    pub fn effective_paths(&self) -> Vec<ProbePath> {
        if self.paths.is_empty() {
            self.mode.default_paths()
        } else {
            self.paths.clone()
        }
    }

    /// Reject settings the crawl cannot run with.
    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.max_candidates == 0 {
            return Err(CrawlError::Config("max_candidates must be > 0".into()));
        }
        if self.parallelism == 0 {
            return Err(CrawlError::Config("parallelism must be > 0".into()));
        }
        if self.per_host_limit == 0 {
            return Err(CrawlError::Config("per_host_limit must be > 0".into()));
        }
        if self.search_attempts == 0 || self.store_write_attempts == 0 {
            return Err(CrawlError::Config("attempt counts must be > 0".into()));
        }
        if self.effective_paths().is_empty() {
            return Err(CrawlError::Config("path table is empty".into()));
        }
        if self.max_requests_per_second == Some(0) {
            return Err(CrawlError::Config("max_requests_per_second must be > 0".into()));
        }
        for (class, delay) in [("search", &self.search_delay), ("fetch", &self.fetch_delay)] {
            if delay.escalated_ms < delay.base_ms {
                return Err(CrawlError::Config(format!(
                    "{class} escalated delay ({} ms) is below its base delay ({} ms)",
                    delay.escalated_ms, delay.base_ms
                )));
            }
        }
        Ok(())
    }

    /// Set K.
    pub fn with_max_candidates(mut self, k: usize) -> Self {
        self.max_candidates = k;
        self
    }

    /// Set the search endpoint.
    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    /// Set the query suffix.
    pub fn with_query_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.query_suffix = suffix.into();
        self
    }

    /// Replace the prefix table.
    pub fn with_prefixes(mut self, prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.prefixes = prefixes.into_iter().map(|p| p.into()).collect();
        self
    }

    /// Replace the path table.
    pub fn with_paths(mut self, paths: impl IntoIterator<Item = ProbePath>) -> Self {
        self.paths = paths.into_iter().collect();
        self
    }

    /// Set the detection mode.
    pub fn with_mode(mut self, mode: DetectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable the REST name-relevance gate.
    pub fn with_name_match(mut self) -> Self {
        self.require_name_match = true;
        self
    }

    /// Set both delay classes.
    pub fn with_delays(mut self, search: DelayConfig, fetch: DelayConfig) -> Self {
        self.search_delay = search;
        self.fetch_delay = fetch;
        self
    }

    /// Set parallelism.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Set the per-host cap.
    pub fn with_per_host_limit(mut self, limit: usize) -> Self {
        self.per_host_limit = limit;
        self
    }

    /// Set progress cadence.
    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every;
        self
    }

    /// Allow probing any host, including private addresses.
    pub fn allow_private_hosts(mut self) -> Self {
        self.block_private_hosts = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::target::ProbeKind;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ScoutConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let config = ScoutConfig::new().with_delays(DelayConfig::new(500, 100), DelayConfig::none());
        assert!(matches!(config.validate(), Err(CrawlError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_parallelism() {
        assert!(ScoutConfig::new().with_parallelism(0).validate().is_err());
    }

    #[test]
    fn test_combined_mode_puts_rest_paths_first() {
        let paths = DetectionMode::Combined.default_paths();
        assert_eq!(paths[0].kind, ProbeKind::RestApi);
        assert!(paths.iter().any(|p| p.kind == ProbeKind::Exists));
    }

    #[test]
    fn test_content_mode_checks_wp_json_as_rest() {
        let paths = DetectionMode::Content.default_paths();
        let wp_json: Vec<_> = paths.iter().filter(|p| p.path.starts_with("/wp-json")).collect();
        assert_eq!(wp_json, vec![&ProbePath::rest_api("/wp-json/")]);
    }

    #[test]
    fn test_combined_mode_has_no_duplicate_paths() {
        let paths = DetectionMode::Combined.default_paths();
        let unique: std::collections::HashSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), paths.len());
    }

    #[test]
    fn test_explicit_paths_override_mode() {
        let config = ScoutConfig::new().with_paths([ProbePath::content("/only")]);
        assert_eq!(config.effective_paths(), vec![ProbePath::content("/only")]);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: ScoutConfig = serde_json::from_str(
            r#"{"max_candidates": 5, "paths": ["/", "head:/wp-login.php"], "mode": "rest_api"}"#,
        )
        .unwrap();
        assert_eq!(config.max_candidates, 5);
        assert_eq!(config.paths[1], ProbePath::exists("/wp-login.php"));
        assert_eq!(config.mode, DetectionMode::RestApi);
        assert_eq!(config.parallelism, 1);
    }
}
