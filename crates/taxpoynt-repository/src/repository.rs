//! # Seal Repository
//!
//! Durable, queryable, auditable storage for seals over any [`SealStore`],
//! with a bounded in-process cache.
//!
//! ## Failure Semantics
//!
//! Seal operations never return errors. A store failure is logged at
//! `error` and surfaces as `false`, `None`, or an empty result. A failed
//! audit write is logged at `warn` and does not fail the operation it
//! describes. The chain head only advances once an event is stored, so a
//! failed write leaves no dangling link.
//!
//! ## Cache
//!
//! Write-through, keyed by `seal_id`. When an insert takes the cache over
//! `cache_size`, the entry with the oldest `created_at` is evicted. A
//! `cache_size` of 0 disables caching.
//!
//! ## Background Tasks
//!
//! [`SealRepository::start`] spawns a cleanup task and, when a backup
//! directory is configured, a backup task. Both tick on a `tokio` interval
//! and watch a shutdown channel; [`SealRepository::shutdown`] signals them
//! and joins both. A signal interrupts the wait between ticks, never an
//! iteration in progress, so no background write happens after `shutdown`
//! returns.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use taxpoynt_seal::{AuthenticationSeal, SealStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::error::RepositoryError;
use crate::model::{
    AuditOperation, OperationStats, RepositoryStats, SealAuditEvent, SealSearchCriteria,
    SealSearchResult, SortOrder, GENESIS_AUDIT_HASH, MAX_SEARCH_LIMIT,
};
use crate::store::SealStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Maximum cached seals. 0 disables the cache.
    pub cache_size: usize,
    /// Seconds between expired-seal cleanups. 0 disables the task.
    pub cleanup_interval_secs: u64,
    /// Seconds between backups. 0 disables the task.
    pub backup_interval_secs: u64,
    /// Where backups are written. `None` disables backups.
    pub backup_dir: Option<PathBuf>,
    /// Whether [`SealRepository::start`] spawns the periodic tasks.
    pub enable_background_tasks: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            cache_size: 1000,
            cleanup_interval_secs: 3600,
            backup_interval_secs: 86_400,
            backup_dir: None,
            enable_background_tasks: true,
        }
    }
}

/// Contents of a backup file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub created_at: DateTime<Utc>,
    pub seal_count: usize,
    pub seals: Vec<AuthenticationSeal>,
}

#[derive(Debug, Clone, Copy)]
enum Job {
    Cleanup,
    Backup,
}

impl Job {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Cleanup => "cleanup",
            Self::Backup => "backup",
        }
    }
}

struct BackgroundTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

#[derive(Default)]
struct Counters {
    cache_hits: u64,
    cache_misses: u64,
    operations: BTreeMap<String, OperationStats>,
    last_cleanup: Option<DateTime<Utc>>,
    last_backup: Option<DateTime<Utc>>,
}

pub struct SealRepository {
    store: Arc<dyn SealStore>,
    config: RepositoryConfig,
    cache: Mutex<HashMap<String, AuthenticationSeal>>,
    /// Hash of the last audit event this repository appended. Held across
    /// the store write so events are chained in append order.
    audit_head: tokio::sync::Mutex<String>,
    counters: Mutex<Counters>,
    tasks: Mutex<Option<BackgroundTasks>>,
}

impl SealRepository {
    pub fn new(store: Arc<dyn SealStore>, config: RepositoryConfig) -> Self {
        Self {
            store,
            config,
            cache: Mutex::new(HashMap::new()),
            audit_head: tokio::sync::Mutex::new(GENESIS_AUDIT_HASH.to_string()),
            counters: Mutex::new(Counters::default()),
            tasks: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SealStore> {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.tasks.lock().is_some()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Resume the audit chain from the store and spawn the background tasks.
    pub async fn start(self: &Arc<Self>) -> Result<(), RepositoryError> {
        if self.is_running() {
            return Err(RepositoryError::AlreadyStarted);
        }
        if let Some(head) = self.store.last_audit_hash().await? {
            *self.audit_head.lock().await = head;
        }

        let (shutdown, rx) = watch::channel(false);
        let mut handles = Vec::new();
        if self.config.enable_background_tasks {
            if self.config.cleanup_interval_secs > 0 {
                let period = Duration::from_secs(self.config.cleanup_interval_secs);
                handles.push(tokio::spawn(Arc::clone(self).run_periodic(Job::Cleanup, period, rx.clone())));
            }
            if self.config.backup_dir.is_some() && self.config.backup_interval_secs > 0 {
                let period = Duration::from_secs(self.config.backup_interval_secs);
                handles.push(tokio::spawn(Arc::clone(self).run_periodic(Job::Backup, period, rx.clone())));
            }
        }
        let task_count = handles.len();

        let mut tasks = self.tasks.lock();
        if tasks.is_some() {
            drop(tasks);
            let _ = shutdown.send(true);
            return Err(RepositoryError::AlreadyStarted);
        }
        *tasks = Some(BackgroundTasks { shutdown, handles });
        tracing::info!(background_tasks = task_count, "seal repository started");
        Ok(())
    }

    /// Stop the background tasks and wait for them to finish. A no-op when
    /// the repository is not running.
    pub async fn shutdown(&self) {
        let Some(tasks) = self.tasks.lock().take() else {
            return;
        };
        let _ = tasks.shutdown.send(true);
        for handle in tasks.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }
        tracing::info!("seal repository stopped");
    }

    async fn run_periodic(self: Arc<Self>, job: Job, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::debug!(job = job.as_str(), "background task shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match job {
                        Job::Cleanup => {
                            let removed = self.cleanup_expired_seals().await;
                            tracing::debug!(removed, "periodic cleanup finished");
                        }
                        Job::Backup => {
                            if let Err(e) = self.backup_now().await {
                                tracing::warn!(error = %e, "periodic backup failed");
                            }
                        }
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Seal operations
    // -----------------------------------------------------------------------

    /// Insert or replace a seal by `seal_id`.
    pub async fn store_seal(&self, seal: &AuthenticationSeal, user_id: Option<&str>) -> bool {
        let started = Instant::now();
        match self.store.upsert(seal).await {
            Ok(()) => {
                self.cache_put(seal.clone());
                self.audit(
                    AuditOperation::Store,
                    Some(&seal.seal_id),
                    Some(&seal.document_id),
                    user_id,
                    json!({
                        "seal_type": seal.seal_type,
                        "algorithm": seal.algorithm,
                        "status": seal.status,
                    }),
                )
                .await;
                self.record("store", started, true);
                tracing::debug!(seal_id = %seal.seal_id, document_id = %seal.document_id, "seal stored");
                true
            }
            Err(e) => {
                self.record("store", started, false);
                tracing::error!(seal_id = %seal.seal_id, error = %e, "failed to store seal");
                false
            }
        }
    }

    /// Cache first, then the store. `None` when absent or on store failure.
    pub async fn retrieve_seal(&self, seal_id: &str, user_id: Option<&str>) -> Option<AuthenticationSeal> {
        let started = Instant::now();
        let cached = self.cache.lock().get(seal_id).cloned();
        if let Some(seal) = cached {
            self.counters.lock().cache_hits += 1;
            self.audit_retrieve(&seal, user_id, "cache").await;
            self.record("retrieve", started, true);
            return Some(seal);
        }
        self.counters.lock().cache_misses += 1;

        match self.store.get(seal_id).await {
            Ok(Some(seal)) => {
                self.cache_put(seal.clone());
                self.audit_retrieve(&seal, user_id, "database").await;
                self.record("retrieve", started, true);
                Some(seal)
            }
            Ok(None) => {
                self.record("retrieve", started, true);
                tracing::debug!(seal_id, "seal not found");
                None
            }
            Err(e) => {
                self.record("retrieve", started, false);
                tracing::error!(seal_id, error = %e, "failed to retrieve seal");
                None
            }
        }
    }

    async fn audit_retrieve(&self, seal: &AuthenticationSeal, user_id: Option<&str>, source: &str) {
        self.audit(
            AuditOperation::Retrieve,
            Some(&seal.seal_id),
            Some(&seal.document_id),
            user_id,
            json!({ "source": source }),
        )
        .await;
    }

    pub async fn search_seals(&self, criteria: &SealSearchCriteria, user_id: Option<&str>) -> SealSearchResult {
        let started = Instant::now();
        let limit = criteria.page_size();
        match self.store.search(criteria).await {
            Ok((seals, total)) => {
                let result = SealSearchResult::new(seals, total, criteria.offset, limit);
                self.audit(
                    AuditOperation::Search,
                    None,
                    criteria.document_id.as_deref(),
                    user_id,
                    json!({
                        "criteria": criteria,
                        "returned": result.seals.len(),
                        "total_count": total,
                    }),
                )
                .await;
                self.record("search", started, true);
                result
            }
            Err(e) => {
                self.record("search", started, false);
                tracing::error!(error = %e, "seal search failed");
                SealSearchResult::empty(criteria.offset, limit)
            }
        }
    }

    pub async fn delete_seal(&self, seal_id: &str, user_id: Option<&str>) -> bool {
        let started = Instant::now();
        let cached = self.cache.lock().get(seal_id).map(|s| s.document_id.clone());
        let document_id = match cached {
            Some(document_id) => Some(document_id),
            None => self.store.get(seal_id).await.ok().flatten().map(|s| s.document_id),
        };
        match self.store.delete(seal_id).await {
            Ok(deleted) => {
                self.cache.lock().remove(seal_id);
                if deleted {
                    self.audit(
                        AuditOperation::Delete,
                        Some(seal_id),
                        document_id.as_deref(),
                        user_id,
                        json!({}),
                    )
                    .await;
                }
                self.record("delete", started, true);
                deleted
            }
            Err(e) => {
                self.record("delete", started, false);
                tracing::error!(seal_id, error = %e, "failed to delete seal");
                false
            }
        }
    }

    /// Set `status` and `updated_at`. The only mutation of a stored seal.
    pub async fn update_seal_status(&self, seal_id: &str, status: SealStatus, user_id: Option<&str>) -> bool {
        let started = Instant::now();
        let now = Utc::now();
        match self.store.update_status(seal_id, status, now).await {
            Ok(true) => {
                let (previous, document_id) = {
                    let mut cache = self.cache.lock();
                    match cache.get_mut(seal_id) {
                        Some(seal) => {
                            let previous = seal.status;
                            seal.status = status;
                            seal.updated_at = now;
                            (Some(previous), Some(seal.document_id.clone()))
                        }
                        None => (None, None),
                    }
                };
                self.audit(
                    AuditOperation::Update,
                    Some(seal_id),
                    document_id.as_deref(),
                    user_id,
                    json!({ "status": status, "previous_status": previous }),
                )
                .await;
                self.record("update", started, true);
                true
            }
            Ok(false) => {
                self.record("update", started, true);
                false
            }
            Err(e) => {
                self.record("update", started, false);
                tracing::error!(seal_id, error = %e, "failed to update seal status");
                false
            }
        }
    }

    /// Every seal of a document, oldest first. A store failure is logged
    /// and yields the seals read so far.
    pub async fn get_seals_by_document(&self, document_id: &str) -> Vec<AuthenticationSeal> {
        match self.find_seals_by_document(document_id).await {
            Ok(seals) => seals,
            Err(e) => {
                tracing::error!(document_id, error = %e, "failed to list seals for document");
                Vec::new()
            }
        }
    }

    /// Like [`get_seals_by_document`](Self::get_seals_by_document), but
    /// store failures are returned to the caller.
    pub async fn find_seals_by_document(&self, document_id: &str) -> Result<Vec<AuthenticationSeal>, RepositoryError> {
        let mut criteria = SealSearchCriteria::for_document(document_id);
        criteria.sort_order = SortOrder::Asc;
        criteria.limit = Some(MAX_SEARCH_LIMIT);

        let mut seals = Vec::new();
        loop {
            let (page, total) = self.store.search(&criteria).await?;
            let fetched = page.len() as u32;
            seals.extend(page);
            if fetched == 0 || seals.len() as u64 >= total {
                return Ok(seals);
            }
            criteria.offset += fetched;
        }
    }

    pub async fn get_expired_seals(&self) -> Vec<AuthenticationSeal> {
        match self.store.expired(Utc::now()).await {
            Ok(seals) => seals,
            Err(e) => {
                tracing::error!(error = %e, "failed to list expired seals");
                Vec::new()
            }
        }
    }

    /// Delete every seal whose `expires_at` has passed. Each deletion is
    /// audited; audit events themselves are kept. Returns the count deleted.
    pub async fn cleanup_expired_seals(&self) -> usize {
        let started = Instant::now();
        let expired = self.get_expired_seals().await;
        let mut removed = 0;
        for seal in &expired {
            match self.store.delete(&seal.seal_id).await {
                Ok(true) => {
                    self.cache.lock().remove(&seal.seal_id);
                    self.audit(
                        AuditOperation::Cleanup,
                        Some(&seal.seal_id),
                        Some(&seal.document_id),
                        None,
                        json!({ "expires_at": seal.expires_at }),
                    )
                    .await;
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(seal_id = %seal.seal_id, error = %e, "failed to delete expired seal");
                }
            }
        }
        self.counters.lock().last_cleanup = Some(Utc::now());
        self.record("cleanup", started, true);
        if removed > 0 {
            tracing::info!(removed, "expired seals cleaned up");
        }
        removed
    }

    pub async fn get_repository_stats(&self) -> RepositoryStats {
        let store = match self.store.counts(Utc::now()).await {
            Ok(counts) => counts,
            Err(e) => {
                tracing::error!(error = %e, "failed to read store counts");
                Default::default()
            }
        };
        let cache_size = self.cache.lock().len();
        let counters = self.counters.lock();
        let lookups = counters.cache_hits + counters.cache_misses;
        RepositoryStats {
            store,
            cache_size,
            cache_capacity: self.config.cache_size,
            cache_hits: counters.cache_hits,
            cache_misses: counters.cache_misses,
            cache_hit_rate: if lookups == 0 {
                0.0
            } else {
                counters.cache_hits as f64 / lookups as f64
            },
            operations: counters.operations.clone(),
            last_cleanup: counters.last_cleanup,
            last_backup: counters.last_backup,
            background_tasks_running: self.is_running(),
        }
    }

    // -----------------------------------------------------------------------
    // Audit trail
    // -----------------------------------------------------------------------

    pub async fn get_audit_trail(&self, seal_id: &str) -> Vec<SealAuditEvent> {
        match self.store.audit_for_seal(seal_id).await {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(seal_id, error = %e, "failed to read audit trail");
                Vec::new()
            }
        }
    }

    /// Explicit retention. Never called by cleanup.
    pub async fn purge_audit_events_before(&self, cutoff: DateTime<Utc>) -> u64 {
        match self.store.purge_audit_before(cutoff).await {
            Ok(purged) => {
                tracing::info!(purged, cutoff = %cutoff, "audit events purged");
                purged
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to purge audit events");
                0
            }
        }
    }

    async fn audit(
        &self,
        operation: AuditOperation,
        seal_id: Option<&str>,
        document_id: Option<&str>,
        user_id: Option<&str>,
        details: Value,
    ) {
        let mut head = self.audit_head.lock().await;
        let event = SealAuditEvent::chained(&head, operation, seal_id, document_id, user_id, details);
        match self.store.append_audit(&event).await {
            Ok(()) => *head = event.event_hash,
            Err(e) => tracing::warn!(operation = %operation, error = %e, "failed to record audit event"),
        }
    }

    // -----------------------------------------------------------------------
    // Backup
    // -----------------------------------------------------------------------

    /// Write every stored seal to a new JSON file in the backup directory.
    pub async fn backup_now(&self) -> Result<PathBuf, RepositoryError> {
        let dir = self.config.backup_dir.as_ref().ok_or(RepositoryError::BackupDisabled)?;
        tokio::fs::create_dir_all(dir).await?;

        let seals = self.store.all().await?;
        let created_at = Utc::now();
        let snapshot = BackupSnapshot {
            created_at,
            seal_count: seals.len(),
            seals,
        };
        let path = dir.join(format!("seals-{}.json", created_at.format("%Y%m%dT%H%M%S%.6fZ")));
        tokio::fs::write(&path, serde_json::to_vec_pretty(&snapshot)?).await?;

        self.counters.lock().last_backup = Some(created_at);
        tracing::info!(path = %path.display(), seals = snapshot.seal_count, "seal backup written");
        Ok(path)
    }

    /// Upsert every seal from a backup file. Returns how many were restored.
    pub async fn restore_from_backup(&self, path: &Path) -> Result<usize, RepositoryError> {
        let bytes = tokio::fs::read(path).await?;
        let snapshot: BackupSnapshot = serde_json::from_slice(&bytes)?;
        let mut restored = 0;
        for seal in &snapshot.seals {
            self.store.upsert(seal).await?;
            self.cache_put(seal.clone());
            self.audit(
                AuditOperation::Restore,
                Some(&seal.seal_id),
                Some(&seal.document_id),
                None,
                json!({ "backup": path.display().to_string(), "backup_created_at": snapshot.created_at }),
            )
            .await;
            restored += 1;
        }
        tracing::info!(path = %path.display(), restored, "seals restored from backup");
        Ok(restored)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn cache_put(&self, seal: AuthenticationSeal) {
        if self.config.cache_size == 0 {
            return;
        }
        let mut cache = self.cache.lock();
        cache.insert(seal.seal_id.clone(), seal);
        while cache.len() > self.config.cache_size {
            let oldest = cache
                .values()
                .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.seal_id.cmp(&b.seal_id)))
                .map(|s| s.seal_id.clone());
            match oldest {
                Some(id) => {
                    cache.remove(&id);
                }
                None => break,
            }
        }
    }

    fn record(&self, operation: &str, started: Instant, ok: bool) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let mut counters = self.counters.lock();
        let stats = counters.operations.entry(operation.to_string()).or_default();
        stats.count += 1;
        if !ok {
            stats.failures += 1;
        }
        stats.total_ms += elapsed_ms;
        stats.average_ms = stats.total_ms / stats.count as f64;
    }
}

impl std::fmt::Debug for SealRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealRepository")
            .field("config", &self.config)
            .field("cached", &self.cache.lock().len())
            .field("running", &self.is_running())
            .finish()
    }
}
