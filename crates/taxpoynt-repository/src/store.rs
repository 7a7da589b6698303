//! # Seal Store
//!
//! [`SealStore`] is the persistence seam under
//! [`SealRepository`](crate::SealRepository). Two backends ship:
//!
//! - [`InMemorySealStore`] for tests and single-process deployments where
//!   state need not survive a restart.
//! - [`PgSealStore`](crate::PgSealStore) for PostgreSQL.
//!
//! Stores hold no cache and emit no audit events of their own; both are
//! the repository's job.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use taxpoynt_seal::{AuthenticationSeal, SealStatus};

use crate::error::RepositoryError;
use crate::model::{SealAuditEvent, SealSearchCriteria, StoreCounts};

#[async_trait]
pub trait SealStore: Send + Sync {
    /// Insert or replace by `seal_id`.
    async fn upsert(&self, seal: &AuthenticationSeal) -> Result<(), RepositoryError>;

    async fn get(&self, seal_id: &str) -> Result<Option<AuthenticationSeal>, RepositoryError>;

    /// Returns whether a seal was deleted.
    async fn delete(&self, seal_id: &str) -> Result<bool, RepositoryError>;

    /// Returns whether a seal was updated.
    async fn update_status(
        &self,
        seal_id: &str,
        status: SealStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// One page of matches plus the total match count.
    async fn search(
        &self,
        criteria: &SealSearchCriteria,
    ) -> Result<(Vec<AuthenticationSeal>, u64), RepositoryError>;

    /// Seals whose `expires_at` lies before `now`.
    async fn expired(&self, now: DateTime<Utc>) -> Result<Vec<AuthenticationSeal>, RepositoryError>;

    async fn all(&self) -> Result<Vec<AuthenticationSeal>, RepositoryError>;

    async fn counts(&self, now: DateTime<Utc>) -> Result<StoreCounts, RepositoryError>;

    async fn append_audit(&self, event: &SealAuditEvent) -> Result<(), RepositoryError>;

    /// Events for one seal in append order.
    async fn audit_for_seal(&self, seal_id: &str) -> Result<Vec<SealAuditEvent>, RepositoryError>;

    /// Hash of the most recent event, if any.
    async fn last_audit_hash(&self) -> Result<Option<String>, RepositoryError>;

    /// Delete events older than `cutoff`. Returns how many were removed.
    async fn purge_audit_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct InMemorySealStore {
    seals: RwLock<HashMap<String, AuthenticationSeal>>,
    audit: RwLock<Vec<SealAuditEvent>>,
}

impl InMemorySealStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every audit event in append order.
    pub fn audit_events(&self) -> Vec<SealAuditEvent> {
        self.audit.read().clone()
    }
}

#[async_trait]
impl SealStore for InMemorySealStore {
    async fn upsert(&self, seal: &AuthenticationSeal) -> Result<(), RepositoryError> {
        self.seals.write().insert(seal.seal_id.clone(), seal.clone());
        Ok(())
    }

    async fn get(&self, seal_id: &str) -> Result<Option<AuthenticationSeal>, RepositoryError> {
        Ok(self.seals.read().get(seal_id).cloned())
    }

    async fn delete(&self, seal_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.seals.write().remove(seal_id).is_some())
    }

    async fn update_status(
        &self,
        seal_id: &str,
        status: SealStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut seals = self.seals.write();
        Ok(match seals.get_mut(seal_id) {
            Some(seal) => {
                seal.status = status;
                seal.updated_at = updated_at;
                true
            }
            None => false,
        })
    }

    async fn search(
        &self,
        criteria: &SealSearchCriteria,
    ) -> Result<(Vec<AuthenticationSeal>, u64), RepositoryError> {
        let mut matches: Vec<AuthenticationSeal> = self
            .seals
            .read()
            .values()
            .filter(|s| criteria.matches(s))
            .cloned()
            .collect();
        let total = matches.len() as u64;
        criteria.sort(&mut matches);
        let page = matches
            .into_iter()
            .skip(criteria.offset as usize)
            .take(criteria.page_size() as usize)
            .collect();
        Ok((page, total))
    }

    async fn expired(&self, now: DateTime<Utc>) -> Result<Vec<AuthenticationSeal>, RepositoryError> {
        Ok(self
            .seals
            .read()
            .values()
            .filter(|s| s.is_expired_at(&now))
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<AuthenticationSeal>, RepositoryError> {
        Ok(self.seals.read().values().cloned().collect())
    }

    async fn counts(&self, now: DateTime<Utc>) -> Result<StoreCounts, RepositoryError> {
        let seals = self.seals.read();
        let mut counts = StoreCounts {
            total_seals: seals.len() as u64,
            audit_events: self.audit.read().len() as u64,
            ..StoreCounts::default()
        };
        for seal in seals.values() {
            *counts.by_type.entry(seal.seal_type.as_str().to_string()).or_default() += 1;
            *counts.by_status.entry(seal.status.as_str().to_string()).or_default() += 1;
            if seal.is_expired_at(&now) {
                counts.expired_seals += 1;
            }
        }
        Ok(counts)
    }

    async fn append_audit(&self, event: &SealAuditEvent) -> Result<(), RepositoryError> {
        self.audit.write().push(event.clone());
        Ok(())
    }

    async fn audit_for_seal(&self, seal_id: &str) -> Result<Vec<SealAuditEvent>, RepositoryError> {
        Ok(self
            .audit
            .read()
            .iter()
            .filter(|e| e.seal_id.as_deref() == Some(seal_id))
            .cloned()
            .collect())
    }

    async fn last_audit_hash(&self) -> Result<Option<String>, RepositoryError> {
        Ok(self.audit.read().last().map(|e| e.event_hash.clone()))
    }

    async fn purge_audit_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut audit = self.audit.write();
        let before = audit.len();
        audit.retain(|e| e.timestamp >= cutoff);
        Ok((before - audit.len()) as u64)
    }
}
