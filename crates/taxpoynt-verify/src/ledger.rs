//! # Blockchain Ledger
//!
//! The external ledger consulted at the BLOCKCHAIN verification level. The
//! service only needs to look up the document hash anchored under a
//! reference; anchoring itself is the ledger's business.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::VerificationError;

/// A document hash anchored on a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub reference: String,
    pub document_hash: String,
    pub anchored_at: DateTime<Utc>,
    /// Ledger-specific location, e.g. a transaction id.
    pub locator: Option<String>,
}

#[async_trait]
pub trait BlockchainLedger: Send + Sync {
    /// Identifier used in evidence details.
    fn name(&self) -> &str;

    /// The record anchored under `reference`, if any.
    async fn lookup(&self, reference: &str) -> Result<Option<LedgerRecord>, VerificationError>;
}

/// Ledger held in memory.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    records: RwLock<HashMap<String, LedgerRecord>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor `document_hash` under `reference`, replacing any earlier record.
    pub fn anchor(&self, reference: impl Into<String>, document_hash: impl Into<String>) -> LedgerRecord {
        let reference = reference.into();
        let record = LedgerRecord {
            reference: reference.clone(),
            document_hash: document_hash.into(),
            anchored_at: Utc::now(),
            locator: None,
        };
        self.records.write().insert(reference, record.clone());
        record
    }
}

#[async_trait]
impl BlockchainLedger for InMemoryLedger {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn lookup(&self, reference: &str) -> Result<Option<LedgerRecord>, VerificationError> {
        Ok(self.records.read().get(reference).cloned())
    }
}
