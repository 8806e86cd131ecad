//! Transport trait: the seam between the crawl engine and the HTTP client.
//!
//! The engine never talks to reqwest directly. Discovery and probing build a
//! [`FetchRequest`], hand it to a `Transport`, and get back either a
//! [`FetchResponse`] (any status, including 429) or a typed
//! [`FetchError`](crate::error::FetchError). Failure classification is then
//! explicit instead of hidden in a catch-all.
//!
//! # Implementations
//!
//! - `HttpTransport` - reqwest with redirects, timeout and browser headers
//! - `HostCapped` - wrapper limiting concurrent requests per host
//! - `GuardedTransport` - wrapper refusing private/loopback hosts
//! - `MockTransport` - canned responses with call recording, for tests

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::FetchResult;

/// HTTP method used by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
}

/// A single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    pub method: Method,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::Get,
        }
    }

    pub fn head(url: Url) -> Self {
        Self {
            url,
            method: Method::Head,
        }
    }

    /// Host this request is aimed at.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }
}

/// Response after redirects were followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Final URL after redirects
    pub url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    /// Body text; empty for HEAD
    pub body: String,
}

impl FetchResponse {
    pub fn new(url: Url, status: u16) -> Self {
        Self {
            url,
            status,
            content_type: None,
            body: String::new(),
        }
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// HTTP 429: the server is rate-limiting us.
    pub fn is_throttled(&self) -> bool {
        self.status == 429
    }

    /// Content type without parameters, lowercased.
    pub fn mime(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
    }
}

/// Issues HTTP requests on behalf of the engine.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request. Non-success statuses are responses, not errors.
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<FetchResponse>;

    /// Name for logs.
    fn name(&self) -> &str {
        "transport"
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<FetchResponse> {
        (**self).fetch(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
