//! Persisted rows.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::target::{Hostname, OrganizationName};

/// A confirmed match: `name,domain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub name: OrganizationName,
    pub domain: Hostname,
}

impl ResultRecord {
    pub fn new(name: OrganizationName, domain: Hostname) -> Self {
        Self { name, domain }
    }
}

/// Why a name produced no match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    /// Search returned no usable hostnames
    NoCandidates,
    /// Every probe target was tried without a match
    Exhausted,
}

impl MissReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissReason::NoCandidates => "no_candidates",
            MissReason::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A negative result, only written when a miss log is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissRecord {
    pub name: OrganizationName,
    pub reason: MissReason,
}

impl MissRecord {
    pub fn new(name: OrganizationName, reason: MissReason) -> Self {
        Self { name, reason }
    }
}

/// Result of an append attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Row written and synced
    Appended,
    /// Name was already present; nothing written
    AlreadyPresent,
}
