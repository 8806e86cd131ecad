//! Per-host concurrency cap.
//!
//! Wraps any Transport so that no more than `limit` requests are in flight
//! against the same host, however many name workers are running.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::{FetchError, FetchResult};
use crate::traits::transport::{FetchRequest, FetchResponse, Transport};

/// A transport wrapper that enforces a per-host concurrency limit.
pub struct HostCapped<T: Transport> {
    inner: T,
    limit: usize,
    slots: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl<T: Transport> HostCapped<T> {
    /// Wrap `inner`, allowing `limit` concurrent requests per host (min 1).
    pub fn new(inner: T, limit: usize) -> Self {
        Self {
            inner,
            limit: limit.max(1),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn slot(&self, host: &str) -> Arc<Semaphore> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.limit)))
            .clone()
    }
}

#[async_trait]
impl<T: Transport> Transport for HostCapped<T> {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<FetchResponse> {
        let slot = self.slot(request.host());
        let _permit = slot
            .acquire_owned()
            .await
            .map_err(|e| FetchError::Http(Box::new(e)))?;
        self.inner.fetch(request).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
