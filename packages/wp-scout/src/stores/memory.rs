//! In-memory result store for tests and dry runs.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::StoreResult;
use crate::traits::store::ResultStore;
use crate::types::record::{AppendOutcome, ResultRecord};

/// Keeps matches in insertion order. Data is lost when dropped.
#[derive(Default)]
pub struct MemoryResultStore {
    records: RwLock<IndexMap<String, ResultRecord>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate, as if a previous run had written these rows.
    pub fn with_records(records: impl IntoIterator<Item = ResultRecord>) -> Self {
        let store = Self::new();
        {
            let mut map = store.records.write().unwrap_or_else(|e| e.into_inner());
            for record in records {
                map.entry(record.name.as_str().to_string()).or_insert(record);
            }
        }
        store
    }

    /// All records in append order.
    pub fn records(&self) -> Vec<ResultRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn load(&self) -> StoreResult<HashSet<String>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.keys().cloned().collect())
    }

    async fn append(&self, record: &ResultRecord) -> StoreResult<AppendOutcome> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let key = record.name.as_str();
        if records.contains_key(key) {
            return Ok(AppendOutcome::AlreadyPresent);
        }
        records.insert(key.to_string(), record.clone());
        Ok(AppendOutcome::Appended)
    }
}
