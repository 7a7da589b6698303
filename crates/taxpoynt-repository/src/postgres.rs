//! # PostgreSQL Seal Store
//!
//! Persists seals in `authentication_seals` and the audit trail in
//! `seal_audit_events`. Both tables are created by the embedded migrations
//! under `migrations/`, applied by [`PgSealStore::connect`].
//!
//! Enum columns hold the `as_str()` form of the value. A row whose enum or
//! JSON columns no longer parse surfaces as
//! [`RepositoryError::CorruptRecord`] rather than being skipped.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use taxpoynt_seal::{AuthenticationSeal, SealStatus};

use crate::error::RepositoryError;
use crate::model::{AuditOperation, SealAuditEvent, SealSearchCriteria, SortOrder, StoreCounts};
use crate::store::SealStore;

// issuer, certificate_thumbprint and key_id are indexed copies of fields
// inside `metadata` and are not read back.
const SEAL_COLUMNS: &str = "seal_id, document_id, seal_type, seal_value, algorithm, status, \
     created_at, updated_at, expires_at, version, verification_data, metadata";

const AUDIT_COLUMNS: &str = "event_id, seal_id, document_id, operation, user_id, timestamp, \
     details, previous_hash, event_hash";

#[derive(Debug, Clone)]
pub struct PgSealStore {
    pool: PgPool,
}

impl PgSealStore {
    /// Connect and apply the embedded migrations.
    pub async fn connect(url: &str) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        tracing::info!("Connected to PostgreSQL");

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Seal store migrations applied");

        Ok(Self { pool })
    }

    /// Wrap an existing pool. Migrations are the caller's responsibility.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Start a query over `authentication_seals` with the criteria's filters
/// applied.
fn filtered(select: &str, c: &SealSearchCriteria) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" FROM authentication_seals WHERE TRUE");
    if let Some(document_id) = &c.document_id {
        qb.push(" AND document_id = ").push_bind(document_id.clone());
    }
    if let Some(seal_type) = c.seal_type {
        qb.push(" AND seal_type = ").push_bind(seal_type.as_str());
    }
    if let Some(algorithm) = c.algorithm {
        qb.push(" AND algorithm = ").push_bind(algorithm.as_str());
    }
    if let Some(status) = c.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(issuer) = &c.issuer {
        qb.push(" AND issuer = ").push_bind(issuer.clone());
    }
    if let Some(t) = c.created_after {
        qb.push(" AND created_at >= ").push_bind(t);
    }
    if let Some(t) = c.created_before {
        qb.push(" AND created_at <= ").push_bind(t);
    }
    if let Some(t) = c.expires_after {
        qb.push(" AND expires_at >= ").push_bind(t);
    }
    if let Some(t) = c.expires_before {
        qb.push(" AND expires_at <= ").push_bind(t);
    }
    qb
}

#[async_trait]
impl SealStore for PgSealStore {
    async fn upsert(&self, seal: &AuthenticationSeal) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO authentication_seals (seal_id, document_id, seal_type, seal_value,
             algorithm, status, created_at, updated_at, expires_at, issuer, version,
             certificate_thumbprint, key_id, verification_data, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             ON CONFLICT (seal_id) DO UPDATE SET
               document_id = EXCLUDED.document_id,
               seal_type = EXCLUDED.seal_type,
               seal_value = EXCLUDED.seal_value,
               algorithm = EXCLUDED.algorithm,
               status = EXCLUDED.status,
               created_at = EXCLUDED.created_at,
               updated_at = EXCLUDED.updated_at,
               expires_at = EXCLUDED.expires_at,
               issuer = EXCLUDED.issuer,
               version = EXCLUDED.version,
               certificate_thumbprint = EXCLUDED.certificate_thumbprint,
               key_id = EXCLUDED.key_id,
               verification_data = EXCLUDED.verification_data,
               metadata = EXCLUDED.metadata",
        )
        .bind(&seal.seal_id)
        .bind(&seal.document_id)
        .bind(seal.seal_type.as_str())
        .bind(&seal.seal_value)
        .bind(seal.algorithm.as_str())
        .bind(seal.status.as_str())
        .bind(seal.created_at)
        .bind(seal.updated_at)
        .bind(seal.expires_at)
        .bind(seal.issuer())
        .bind(seal.version)
        .bind(seal.certificate_thumbprint())
        .bind(seal.key_id())
        .bind(serde_json::to_value(&seal.verification_data)?)
        .bind(serde_json::to_value(&seal.metadata)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, seal_id: &str) -> Result<Option<AuthenticationSeal>, RepositoryError> {
        let row = sqlx::query_as::<_, SealRow>(&format!(
            "SELECT {SEAL_COLUMNS} FROM authentication_seals WHERE seal_id = $1"
        ))
        .bind(seal_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SealRow::into_seal).transpose()
    }

    async fn delete(&self, seal_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM authentication_seals WHERE seal_id = $1")
            .bind(seal_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_status(
        &self,
        seal_id: &str,
        status: SealStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE authentication_seals SET status = $1, updated_at = $2 WHERE seal_id = $3",
        )
        .bind(status.as_str())
        .bind(updated_at)
        .bind(seal_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn search(
        &self,
        criteria: &SealSearchCriteria,
    ) -> Result<(Vec<AuthenticationSeal>, u64), RepositoryError> {
        let total: i64 = filtered("SELECT COUNT(*)", criteria)
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = filtered(&format!("SELECT {SEAL_COLUMNS}"), criteria);
        let direction = match criteria.sort_order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        qb.push(format!(
            " ORDER BY {col} {direction}, seal_id {direction}",
            col = criteria.sort_by.column()
        ));
        qb.push(" LIMIT ").push_bind(i64::from(criteria.page_size()));
        qb.push(" OFFSET ").push_bind(i64::from(criteria.offset));
        let rows = qb.build_query_as::<SealRow>().fetch_all(&self.pool).await?;

        let seals = rows.into_iter().map(SealRow::into_seal).collect::<Result<_, _>>()?;
        Ok((seals, u64::try_from(total).unwrap_or(0)))
    }

    async fn expired(&self, now: DateTime<Utc>) -> Result<Vec<AuthenticationSeal>, RepositoryError> {
        let rows = sqlx::query_as::<_, SealRow>(&format!(
            "SELECT {SEAL_COLUMNS} FROM authentication_seals
             WHERE expires_at IS NOT NULL AND expires_at < $1 ORDER BY expires_at"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SealRow::into_seal).collect()
    }

    async fn all(&self) -> Result<Vec<AuthenticationSeal>, RepositoryError> {
        let rows = sqlx::query_as::<_, SealRow>(&format!(
            "SELECT {SEAL_COLUMNS} FROM authentication_seals ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SealRow::into_seal).collect()
    }

    async fn counts(&self, now: DateTime<Utc>) -> Result<StoreCounts, RepositoryError> {
        let by_type: Vec<(String, i64)> = sqlx::query_as(
            "SELECT seal_type, COUNT(*) FROM authentication_seals GROUP BY seal_type",
        )
        .fetch_all(&self.pool)
        .await?;
        let by_status: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM authentication_seals GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        let expired: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM authentication_seals WHERE expires_at IS NOT NULL AND expires_at < $1",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        let audit_events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seal_audit_events")
            .fetch_one(&self.pool)
            .await?;

        let to_u64 = |n: i64| u64::try_from(n).unwrap_or(0);
        Ok(StoreCounts {
            total_seals: by_type.iter().map(|(_, n)| to_u64(*n)).sum(),
            by_type: by_type.into_iter().map(|(k, n)| (k, to_u64(n))).collect(),
            by_status: by_status.into_iter().map(|(k, n)| (k, to_u64(n))).collect(),
            expired_seals: to_u64(expired),
            audit_events: to_u64(audit_events),
        })
    }

    async fn append_audit(&self, event: &SealAuditEvent) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO seal_audit_events (event_id, seal_id, document_id, operation, user_id,
             timestamp, details, previous_hash, event_hash)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&event.event_id)
        .bind(&event.seal_id)
        .bind(&event.document_id)
        .bind(event.operation.as_str())
        .bind(&event.user_id)
        .bind(event.timestamp)
        .bind(&event.details)
        .bind(&event.previous_hash)
        .bind(&event.event_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn audit_for_seal(&self, seal_id: &str) -> Result<Vec<SealAuditEvent>, RepositoryError> {
        let rows = sqlx::query_as::<_, AuditRow>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM seal_audit_events WHERE seal_id = $1 ORDER BY seq"
        ))
        .bind(seal_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(AuditRow::into_event).collect()
    }

    async fn last_audit_hash(&self) -> Result<Option<String>, RepositoryError> {
        Ok(
            sqlx::query_scalar("SELECT event_hash FROM seal_audit_events ORDER BY seq DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn purge_audit_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM seal_audit_events WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct SealRow {
    seal_id: String,
    document_id: String,
    seal_type: String,
    seal_value: String,
    algorithm: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    version: i32,
    verification_data: serde_json::Value,
    metadata: serde_json::Value,
}

impl SealRow {
    fn into_seal(self) -> Result<AuthenticationSeal, RepositoryError> {
        let id = self.seal_id.clone();
        let corrupt = |reason: String| RepositoryError::CorruptRecord {
            id: id.clone(),
            reason,
        };
        Ok(AuthenticationSeal {
            seal_type: self.seal_type.parse().map_err(|e| corrupt(format!("{e}")))?,
            algorithm: self.algorithm.parse().map_err(|e| corrupt(format!("{e}")))?,
            status: self.status.parse().map_err(|e| corrupt(format!("{e}")))?,
            metadata: serde_json::from_value(self.metadata).map_err(|e| corrupt(e.to_string()))?,
            verification_data: serde_json::from_value(self.verification_data)
                .map_err(|e| corrupt(e.to_string()))?,
            seal_id: self.seal_id,
            document_id: self.document_id,
            seal_value: self.seal_value,
            created_at: self.created_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at,
            version: self.version,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    event_id: String,
    seal_id: Option<String>,
    document_id: Option<String>,
    operation: String,
    user_id: Option<String>,
    timestamp: DateTime<Utc>,
    details: serde_json::Value,
    previous_hash: String,
    event_hash: String,
}

impl AuditRow {
    fn into_event(self) -> Result<SealAuditEvent, RepositoryError> {
        let operation = AuditOperation::parse(&self.operation).ok_or_else(|| {
            RepositoryError::CorruptRecord {
                id: self.event_id.clone(),
                reason: format!("unknown audit operation '{}'", self.operation),
            }
        })?;
        Ok(SealAuditEvent {
            event_id: self.event_id,
            seal_id: self.seal_id,
            document_id: self.document_id,
            operation,
            user_id: self.user_id,
            timestamp: self.timestamp,
            details: self.details,
            previous_hash: self.previous_hash,
            event_hash: self.event_hash,
        })
    }
}
