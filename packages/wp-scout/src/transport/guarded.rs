//! Host guard for search-derived targets.
//!
//! Hostnames come from scraped search results, so they are untrusted. The
//! guard refuses internal targets before any request is made:
//! - Loopback and unspecified addresses (localhost, 127.0.0.1, 0.0.0.0)
//! - Private IP ranges (10.x, 172.16.x, 192.168.x, fc00::/7)
//! - Link-local / cloud metadata (169.254.x, metadata.google.internal)
//! - Non-HTTP(S) schemes
//!
//! The same rules apply to every redirect hop through
//! [`HostGuard::redirect_policy`].

use std::collections::HashSet;
use std::net::IpAddr;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::traits::transport::{FetchRequest, FetchResponse, Transport};

/// Allow/deny rules for target hosts.
#[derive(Debug, Clone)]
pub struct HostGuard {
    blocked_hosts: HashSet<String>,
    blocked_cidrs: Vec<ipnet::IpNet>,
    allowed_hosts: HashSet<String>,
}

impl Default for HostGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl HostGuard {
    /// Guard with the default deny lists.
    pub fn new() -> Self {
        let cidrs = [
            "10.0.0.0/8",
            "172.16.0.0/12",
            "192.168.0.0/16",
            "169.254.0.0/16",
            "127.0.0.0/8",
            "0.0.0.0/8",
            "::1/128",
            "fc00::/7",
            "fe80::/10",
        ];
        Self {
            blocked_hosts: [
                "localhost",
                "metadata.google.internal",
                "metadata.gke.internal",
                "instance-data",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            blocked_cidrs: cidrs.iter().filter_map(|c| c.parse().ok()).collect(),
            allowed_hosts: HashSet::new(),
        }
    }

    /// Add an allowed host (bypasses the deny lists).
    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.insert(host.into());
        self
    }

    /// Block an additional host.
    pub fn block_host(mut self, host: impl Into<String>) -> Self {
        self.blocked_hosts.insert(host.into());
        self
    }

    /// Check a URL. Returns the reason it is refused, if any.
    pub fn check(&self, url: &Url) -> Result<(), String> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("disallowed scheme {}", url.scheme()));
        }
        let host = url.host_str().ok_or_else(|| "URL has no host".to_string())?;
        if self.allowed_hosts.contains(host) {
            return Ok(());
        }
        if self.blocked_hosts.contains(host) || host.ends_with(".localhost") {
            return Err(format!("blocked host {host}"));
        }
        let literal = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = literal.parse::<IpAddr>() {
            if let Some(cidr) = self.blocked_cidrs.iter().find(|c| c.contains(&ip)) {
                return Err(format!("{ip} is in blocked range {cidr}"));
            }
        }
        Ok(())
    }
}

/// Why a redirect hop was not followed.
#[derive(Debug, Error)]
pub enum RedirectRefused {
    #[error("more than {0} redirects")]
    TooMany(usize),

    #[error("redirect to {url} refused: {reason}")]
    Blocked { url: String, reason: String },
}

impl HostGuard {
    /// Decide whether the hop to `next` may be followed, given the URLs
    /// already visited (the original request first).
    pub fn check_redirect(
        &self,
        next: &Url,
        previous: &[Url],
        max_hops: usize,
    ) -> Result<(), RedirectRefused> {
        if previous.len() > max_hops {
            return Err(RedirectRefused::TooMany(max_hops));
        }
        self.check(next).map_err(|reason| RedirectRefused::Blocked {
            url: next.to_string(),
            reason,
        })
    }

    /// reqwest redirect policy running [`HostGuard::check_redirect`] on
    /// every hop, so a public host cannot bounce a request inward.
    pub fn redirect_policy(self, max_hops: usize) -> reqwest::redirect::Policy {
        reqwest::redirect::Policy::custom(move |attempt| {
            match self.check_redirect(attempt.url(), attempt.previous(), max_hops) {
                Ok(()) => attempt.follow(),
                Err(refused) => {
                    if let RedirectRefused::Blocked { url, reason } = &refused {
                        warn!(url = %url, reason = %reason, "redirect refused by host guard");
                    }
                    attempt.error(refused)
                }
            }
        })
    }
}

/// A transport that refuses guarded hosts without touching the network.
pub struct GuardedTransport<T: Transport> {
    inner: T,
    guard: HostGuard,
}

impl<T: Transport> GuardedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            guard: HostGuard::new(),
        }
    }

    /// Create with a custom guard.
    pub fn with_guard(inner: T, guard: HostGuard) -> Self {
        Self { inner, guard }
    }
}

#[async_trait]
impl<T: Transport> Transport for GuardedTransport<T> {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<FetchResponse> {
        self.guard
            .check(&request.url)
            .map_err(|reason| FetchError::Blocked {
                url: request.url.to_string(),
                reason,
            })?;
        self.inner.fetch(request).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
