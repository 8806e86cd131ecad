//! reqwest-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::traits::transport::{FetchRequest, FetchResponse, Method, Transport};
use crate::transport::guarded::{HostGuard, RedirectRefused};
use crate::types::config::ScoutConfig;

/// Maximum redirects followed per request
const MAX_REDIRECTS: usize = 10;

/// HTTP transport using a shared reqwest client.
///
/// Follows redirects, applies the configured timeout, and sends browser-like
/// headers so search and target sites treat us like a regular visitor.
/// With `block_private_hosts` set, every redirect hop passes the host guard.
///
/// # Example
///
/// ```rust,ignore
/// let transport = HttpTransport::from_config(&ScoutConfig::default())?;
/// let response = transport.fetch(&FetchRequest::get(url)).await?;
/// ```
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client from the timeout/user-agent/TLS settings of a config.
    pub fn from_config(config: &ScoutConfig) -> FetchResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.8,*/*;q=0.7",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let redirect = if config.block_private_hosts {
            HostGuard::new().redirect_policy(MAX_REDIRECTS)
        } else {
            reqwest::redirect::Policy::limited(MAX_REDIRECTS)
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .redirect(redirect)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| FetchError::Http(Box::new(e)))?;

        Ok(Self { client })
    }

    /// Use a pre-built client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
        if error.is_redirect() {
            let mut source = std::error::Error::source(&error);
            while let Some(cause) = source {
                if let Some(RedirectRefused::Blocked { url: hop, reason }) =
                    cause.downcast_ref::<RedirectRefused>()
                {
                    return FetchError::Blocked {
                        url: hop.clone(),
                        reason: reason.clone(),
                    };
                }
                source = cause.source();
            }
        }

        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if error.is_connect() {
            FetchError::Connect {
                url: url.to_string(),
                source: Box::new(error),
            }
        } else {
            FetchError::Http(Box::new(error))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<FetchResponse> {
        let url = request.url.as_str();
        debug!(url = %url, method = ?request.method, "HTTP fetch starting");

        let builder = match request.method {
            Method::Get => self.client.get(request.url.clone()),
            Method::Head => self.client.head(request.url.clone()),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| Self::classify_error(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = match request.method {
            Method::Head => String::new(),
            Method::Get => response
                .text()
                .await
                .map_err(|e| Self::classify_error(url, e))?,
        };

        let mut fetched = FetchResponse::new(final_url, status).with_body(body);
        fetched.content_type = content_type;

        debug!(
            url = %url,
            status = status,
            content_length = fetched.body.len(),
            "HTTP fetch finished"
        );

        Ok(fetched)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use url::Url;

    #[test]
    fn test_builds_from_default_config() {
        let transport = HttpTransport::from_config(&ScoutConfig::default()).unwrap();
        assert_eq!(transport.name(), "http");
    }

    /// One-shot local server answering with a redirect to `location`.
    async fn redirect_server(location: &'static str) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    #[tokio::test]
    async fn test_redirect_into_metadata_range_is_blocked() {
        let start = redirect_server("http://169.254.169.254/latest/meta-data").await;
        let transport = HttpTransport::from_config(&ScoutConfig::default()).unwrap();

        let result = transport.fetch(&FetchRequest::get(start)).await;

        match result {
            Err(FetchError::Blocked { url, .. }) => {
                assert_eq!(url, "http://169.254.169.254/latest/meta-data");
            }
            other => panic!("expected a blocked redirect, got {other:?}"),
        }
    }
}
