//! Result store trait.
//!
//! The store is append-only for the lifetime of a run. Membership is checked
//! before every append so a name can never be recorded twice, even when a
//! restarted run is handed names that are already present.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{record::AppendOutcome, record::ResultRecord};

/// Durable record of `name -> domain` matches.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Names already recorded. Only complete rows are ever returned.
    async fn load(&self) -> StoreResult<HashSet<String>>;

    /// Durably record a match.
    ///
    /// When this returns `Ok(Appended)` the row survives a crash. When it
    /// returns an error, nothing (not even a partial row) is visible to a
    /// later `load()`. Safe to call from concurrent workers.
    async fn append(&self, record: &ResultRecord) -> StoreResult<AppendOutcome>;

    /// Check whether a name is recorded.
    async fn contains(&self, name: &str) -> StoreResult<bool> {
        Ok(self.load().await?.contains(name))
    }
}
