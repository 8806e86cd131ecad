//! Testing utilities including mock implementations.
//!
//! Provides mock transports and stores for testing without network access.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{FetchError, FetchResult, StoreError, StoreResult};
use crate::stores::memory::MemoryResultStore;
use crate::traits::store::ResultStore;
use crate::traits::transport::{FetchRequest, FetchResponse, Method, Transport};
use crate::types::record::{AppendOutcome, ResultRecord};

#[derive(Debug, Clone)]
enum Canned {
    Response {
        status: u16,
        content_type: Option<String>,
        body: String,
    },
    Error,
}

fn normalize(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

/// A mock transport serving canned responses.
///
/// Routes match by exact URL first, then by host. Anything unrouted fails
/// like an unreachable host. Every request is recorded.
#[derive(Default, Clone)]
pub struct MockTransport {
    routes: Arc<RwLock<HashMap<String, Canned>>>,
    host_routes: Arc<RwLock<HashMap<String, Canned>>>,
    calls: Arc<RwLock<Vec<FetchRequest>>>,
    latency: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockTransport {
    /// Create a new mock transport with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    fn route(self, url: &str, canned: Canned) -> Self {
        self.routes.write().unwrap().insert(normalize(url), canned);
        self
    }

    fn host_route(self, host: &str, canned: Canned) -> Self {
        self.host_routes
            .write()
            .unwrap()
            .insert(host.to_ascii_lowercase(), canned);
        self
    }

    /// Serve any response for a URL.
    pub fn with_response(
        self,
        url: &str,
        status: u16,
        content_type: Option<&str>,
        body: &str,
    ) -> Self {
        self.route(
            url,
            Canned::Response {
                status,
                content_type: content_type.map(String::from),
                body: body.to_string(),
            },
        )
    }

    /// Serve `200 text/html` with `body`.
    pub fn with_html(self, url: &str, body: &str) -> Self {
        self.with_response(url, 200, Some("text/html; charset=UTF-8"), body)
    }

    /// Serve `200 application/json` with `body`.
    pub fn with_json(self, url: &str, body: &str) -> Self {
        self.with_response(url, 200, Some("application/json; charset=UTF-8"), body)
    }

    /// Serve an empty response with `status`.
    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.with_response(url, status, None, "")
    }

    /// Fail requests to `url` with a connection error.
    pub fn with_error(self, url: &str) -> Self {
        self.route(url, Canned::Error)
    }

    /// Answer every request to `host` with a results page linking `urls`.
    pub fn with_search_results(self, host: &str, urls: &[&str]) -> Self {
        self.host_route(
            host,
            Canned::Response {
                status: 200,
                content_type: Some("text/html".to_string()),
                body: search_results_html(urls),
            },
        )
    }

    /// Answer every request to `host` with an empty `status` response.
    pub fn with_host_status(self, host: &str, status: u16) -> Self {
        self.host_route(
            host,
            Canned::Response {
                status,
                content_type: None,
                body: String::new(),
            },
        )
    }

    /// Delay every response (use with paused tokio time).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// All recorded requests, in order.
    pub fn calls(&self) -> Vec<FetchRequest> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// Requested URLs, in order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .map(|c| c.url.to_string())
            .collect()
    }

    /// Whether `url` was requested at all.
    pub fn requested(&self, url: &str) -> bool {
        let url = normalize(url);
        self.calls.read().unwrap().iter().any(|c| c.url.as_str() == url)
    }

    /// Distinct hosts contacted.
    pub fn hosts(&self) -> HashSet<String> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .map(|c| c.host().to_string())
            .collect()
    }

    /// Highest number of concurrent requests observed.
    pub fn max_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn lookup(&self, request: &FetchRequest) -> Option<Canned> {
        if let Some(canned) = self.routes.read().unwrap().get(request.url.as_str()) {
            return Some(canned.clone());
        }
        self.host_routes.read().unwrap().get(request.host()).cloned()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<FetchResponse> {
        self.calls.write().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let canned = self.lookup(request);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match canned {
            Some(Canned::Response {
                status,
                content_type,
                body,
            }) => {
                let mut response = FetchResponse::new(request.url.clone(), status);
                if let Some(content_type) = content_type {
                    response = response.with_content_type(content_type);
                }
                if request.method == Method::Get {
                    response = response.with_body(body);
                }
                Ok(response)
            }
            Some(Canned::Error) | None => Err(FetchError::Connect {
                url: request.url.to_string(),
                source: "mock: no route to host".into(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A search results page in the layout the default selector expects.
pub fn search_results_html(urls: &[&str]) -> String {
    let items: String = urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            format!(
                r#"<li class="b_algo"><h2><a href="{}">Result {}</a></h2><p>snippet</p></li>"#,
                url.replace('&', "&amp;").replace('"', "&quot;"),
                i + 1
            )
        })
        .collect();
    format!(r#"<html><body><ol id="b_results">{items}</ol></body></html>"#)
}

/// A result store whose first `failures` appends fail.
pub struct FailingStore {
    inner: MemoryResultStore,
    remaining_failures: AtomicUsize,
    attempts: AtomicUsize,
}

impl FailingStore {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: MemoryResultStore::new(),
            remaining_failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Every append fails.
    pub fn always() -> Self {
        Self::new(usize::MAX)
    }

    /// Append calls made, failed or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<ResultRecord> {
        self.inner.records()
    }
}

#[async_trait]
impl ResultStore for FailingStore {
    async fn load(&self) -> StoreResult<HashSet<String>> {
        self.inner.load().await
    }

    async fn append(&self, record: &ResultRecord) -> StoreResult<AppendOutcome> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Unavailable("disk full".into()));
        }
        self.inner.append(record).await
    }
}
