//! Candidate discovery through search-result scraping.
//!
//! One search per organization name. Result anchors are pulled out of the
//! engine's result containers, reduced to their host, deduplicated in rank
//! order and capped at K. A search that never got a usable answer is a
//! [`SearchError`], never an empty list.

use std::sync::Arc;

use indexmap::IndexSet;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::crawlers::rate_control::{Outcome, RateController, TrafficClass};
use crate::error::{CrawlError, CrawlResult, SearchError};
use crate::traits::transport::{FetchRequest, Transport};
use crate::types::config::ScoutConfig;
use crate::types::target::{Hostname, OrganizationName};

/// Finds candidate hostnames for an organization.
pub struct CandidateDiscoverer {
    transport: Arc<dyn Transport>,
    rate: Arc<RateController>,
    endpoint: Url,
    selector: Selector,
    query_suffix: String,
    max_candidates: usize,
    attempts: u32,
}

impl CandidateDiscoverer {
    /// Build a discoverer from the search settings in `config`.
    pub fn new(
        config: &ScoutConfig,
        transport: Arc<dyn Transport>,
        rate: Arc<RateController>,
    ) -> CrawlResult<Self> {
        let endpoint = Url::parse(&config.search_url).map_err(|e| {
            CrawlError::Config(format!("invalid search_url {:?}: {e}", config.search_url))
        })?;
        let selector = Selector::parse(&config.result_selector).map_err(|e| {
            CrawlError::Config(format!(
                "invalid result_selector {:?}: {e}",
                config.result_selector
            ))
        })?;

        Ok(Self {
            transport,
            rate,
            endpoint,
            selector,
            query_suffix: config.query_suffix.trim().to_string(),
            max_candidates: config.max_candidates,
            attempts: config.search_attempts.max(1),
        })
    }

    /// The query text sent for `name`.
    pub fn build_query(&self, name: &OrganizationName) -> String {
        if self.query_suffix.is_empty() {
            name.as_str().to_string()
        } else {
            format!("{} {}", name, self.query_suffix)
        }
    }

    /// Full search URL for `name`.
    pub fn search_url(&self, name: &OrganizationName) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", &self.build_query(name))
            .append_pair("count", &self.max_candidates.to_string());
        url
    }

    /// Ranked, unique candidate hostnames for `name`, at most K of them.
    ///
    /// `Ok` with an empty list means the engine answered and listed nothing.
    /// A throttled or non-success answer, or transport failures on every
    /// attempt, are a `SearchError` instead.
    pub async fn discover(&self, name: &OrganizationName) -> Result<Vec<Hostname>, SearchError> {
        let request = FetchRequest::get(self.search_url(name));

        let mut attempt = 1;
        loop {
            self.rate.wait(TrafficClass::Search).await;
            let result = self.transport.fetch(&request).await;
            self.rate
                .observe(TrafficClass::Search, Outcome::classify(&result));

            match result {
                Ok(response) if response.is_success() => {
                    let hosts = parse_result_hosts(
                        &response.body,
                        &self.selector,
                        self.max_candidates,
                        self.endpoint.host_str(),
                    );
                    info!(name = %name, candidates = hosts.len(), "search complete");
                    debug!(name = %name, hosts = ?hosts, "candidate hosts");
                    return Ok(hosts);
                }
                Ok(response) if response.is_throttled() => {
                    warn!(name = %name, "search throttled");
                    return Err(SearchError::Throttled);
                }
                Ok(response) => {
                    warn!(name = %name, status = response.status, "search returned non-success status");
                    return Err(SearchError::Status(response.status));
                }
                Err(e) if attempt < self.attempts => {
                    warn!(
                        name = %name,
                        attempt,
                        attempts = self.attempts,
                        error = %e,
                        "search request failed"
                    );
                    attempt += 1;
                }
                Err(e) => {
                    warn!(name = %name, attempts = self.attempts, error = %e, "search gave up");
                    return Err(SearchError::Failed {
                        attempts: self.attempts,
                        source: e,
                    });
                }
            }
        }
    }
}

/// Extract candidate hosts from a search results page.
///
/// Only absolute http(s) links count. Links back to the search engine itself
/// are skipped, as are links whose host cannot be parsed.
pub fn parse_result_hosts(
    html: &str,
    selector: &Selector,
    limit: usize,
    search_host: Option<&str>,
) -> Vec<Hostname> {
    let document = Html::parse_document(html);
    let search_base = search_host
        .and_then(Hostname::parse)
        .map(|host| host.registrable_base());

    let mut hosts: IndexSet<Hostname> = IndexSet::new();
    for anchor in document.select(selector) {
        if hosts.len() >= limit {
            break;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(url) = Url::parse(href.trim()) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        let Some(host) = Hostname::from_url(&url) else {
            continue;
        };
        if search_base.as_ref() == Some(&host.registrable_base()) {
            continue;
        }
        hosts.insert(host);
    }

    hosts.into_iter().take(limit).collect()
}
