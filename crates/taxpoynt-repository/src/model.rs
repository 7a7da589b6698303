//! # Repository Data Model
//!
//! Search criteria and results, audit events, and repository statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taxpoynt_core::sha256_raw_hex;
use taxpoynt_seal::{AuthenticationSeal, SealAlgorithm, SealStatus, SealType};

/// Default page size for searches.
pub const DEFAULT_SEARCH_LIMIT: u32 = 100;

/// Upper bound on a single search page.
pub const MAX_SEARCH_LIMIT: u32 = 1000;

/// Hash preceding the first audit event.
pub const GENESIS_AUDIT_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    ExpiresAt,
    DocumentId,
}

impl SortField {
    /// Column name in the seal table.
    pub fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::ExpiresAt => "expires_at",
            Self::DocumentId => "document_id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filter, order and page over the seal store. Unset fields do not filter.
/// Date ranges are inclusive on both ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SealSearchCriteria {
    pub document_id: Option<String>,
    pub seal_type: Option<SealType>,
    pub algorithm: Option<SealAlgorithm>,
    pub status: Option<SealStatus>,
    pub issuer: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub expires_after: Option<DateTime<Utc>>,
    pub expires_before: Option<DateTime<Utc>>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    /// Page size; `None` means [`DEFAULT_SEARCH_LIMIT`].
    pub limit: Option<u32>,
    pub offset: u32,
}

impl SealSearchCriteria {
    pub fn for_document(document_id: impl Into<String>) -> Self {
        Self {
            document_id: Some(document_id.into()),
            ..Self::default()
        }
    }

    /// Effective page size, clamped to [`MAX_SEARCH_LIMIT`].
    pub fn page_size(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).min(MAX_SEARCH_LIMIT)
    }

    /// Whether `seal` passes every filter. A seal without `expires_at` never
    /// matches an expiry range.
    pub fn matches(&self, seal: &AuthenticationSeal) -> bool {
        let expiry_in_range = |bound: Option<DateTime<Utc>>, after: bool| match bound {
            None => true,
            Some(b) => seal
                .expires_at
                .is_some_and(|exp| if after { exp >= b } else { exp <= b }),
        };
        self.document_id.as_deref().map_or(true, |d| seal.document_id == d)
            && self.seal_type.map_or(true, |t| seal.seal_type == t)
            && self.algorithm.map_or(true, |a| seal.algorithm == a)
            && self.status.map_or(true, |s| seal.status == s)
            && self.issuer.as_deref().map_or(true, |i| seal.issuer() == Some(i))
            && self.created_after.map_or(true, |b| seal.created_at >= b)
            && self.created_before.map_or(true, |b| seal.created_at <= b)
            && expiry_in_range(self.expires_after, true)
            && expiry_in_range(self.expires_before, false)
    }

    /// Order `seals` by the criteria's sort field. Seals without an expiry
    /// sort last in ascending order.
    pub fn sort(&self, seals: &mut [AuthenticationSeal]) {
        seals.sort_by(|a, b| {
            let ord = match self.sort_by {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                SortField::ExpiresAt => match (a.expires_at, b.expires_at) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                },
                SortField::DocumentId => a.document_id.cmp(&b.document_id),
            }
            .then_with(|| a.seal_id.cmp(&b.seal_id));
            match self.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealSearchResult {
    pub seals: Vec<AuthenticationSeal>,
    /// Matches across all pages.
    pub total_count: u64,
    pub offset: u32,
    pub limit: u32,
    /// `offset + seals.len() < total_count`.
    pub has_more: bool,
}

impl SealSearchResult {
    pub fn new(seals: Vec<AuthenticationSeal>, total_count: u64, offset: u32, limit: u32) -> Self {
        let has_more = u64::from(offset) + (seals.len() as u64) < total_count;
        Self {
            seals,
            total_count,
            offset,
            limit,
            has_more,
        }
    }

    pub fn empty(offset: u32, limit: u32) -> Self {
        Self::new(Vec::new(), 0, offset, limit)
    }
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOperation {
    Store,
    Retrieve,
    Search,
    Update,
    Delete,
    Cleanup,
    Restore,
}

impl AuditOperation {
    pub const ALL: [AuditOperation; 7] = [
        Self::Store,
        Self::Retrieve,
        Self::Search,
        Self::Update,
        Self::Delete,
        Self::Cleanup,
        Self::Restore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Store => "STORE",
            Self::Retrieve => "RETRIEVE",
            Self::Search => "SEARCH",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Cleanup => "CLEANUP",
            Self::Restore => "RESTORE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }
}

impl std::fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit entry.
///
/// Events form a hash chain: `event_hash` is SHA-256 over the previous
/// event's hash followed by every other field of the event, so a removed
/// or edited event breaks every later link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealAuditEvent {
    pub event_id: String,
    pub seal_id: Option<String>,
    pub document_id: Option<String>,
    pub operation: AuditOperation,
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub details: Value,
    pub previous_hash: String,
    pub event_hash: String,
}

impl SealAuditEvent {
    pub fn chained(
        previous_hash: &str,
        operation: AuditOperation,
        seal_id: Option<&str>,
        document_id: Option<&str>,
        user_id: Option<&str>,
        details: Value,
    ) -> Self {
        let event_id = uuid::Uuid::new_v4().to_string();
        let timestamp = Utc::now();
        let event_hash = chain_hash(
            previous_hash,
            &event_id,
            operation,
            seal_id,
            document_id,
            user_id,
            &timestamp,
            &details,
        );
        Self {
            event_id,
            seal_id: seal_id.map(str::to_string),
            document_id: document_id.map(str::to_string),
            operation,
            user_id: user_id.map(str::to_string),
            timestamp,
            details,
            previous_hash: previous_hash.to_string(),
            event_hash,
        }
    }

    /// Whether `event_hash` matches the event's own fields.
    pub fn hash_is_consistent(&self) -> bool {
        chain_hash(
            &self.previous_hash,
            &self.event_id,
            self.operation,
            self.seal_id.as_deref(),
            self.document_id.as_deref(),
            self.user_id.as_deref(),
            &self.timestamp,
            &self.details,
        ) == self.event_hash
    }
}

/// Fields are `|`-separated; `details` enters in its compact JSON form,
/// which is key-sorted.
#[allow(clippy::too_many_arguments)]
fn chain_hash(
    previous_hash: &str,
    event_id: &str,
    operation: AuditOperation,
    seal_id: Option<&str>,
    document_id: Option<&str>,
    user_id: Option<&str>,
    timestamp: &DateTime<Utc>,
    details: &Value,
) -> String {
    let input = format!(
        "{previous_hash}|{event_id}|{}|{}|{}|{}|{}|{details}",
        operation.as_str(),
        seal_id.unwrap_or(""),
        document_id.unwrap_or(""),
        user_id.unwrap_or(""),
        timestamp.timestamp_micros()
    );
    sha256_raw_hex(input.as_bytes())
}

/// Result of walking a sequence of audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainIntegrity {
    pub total_events: usize,
    pub broken_links: usize,
    pub chain_valid: bool,
}

/// Check hash continuity of `events`, given in append order.
pub fn verify_chain(events: &[SealAuditEvent]) -> ChainIntegrity {
    let mut broken_links = 0;
    let mut last_hash: Option<&str> = None;
    for event in events {
        if !event.hash_is_consistent() {
            broken_links += 1;
        }
        if let Some(expected_prev) = last_hash {
            if event.previous_hash != expected_prev {
                broken_links += 1;
            }
        }
        last_hash = Some(&event.event_hash);
    }
    ChainIntegrity {
        total_events: events.len(),
        broken_links,
        chain_valid: broken_links == 0,
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Aggregate counts from a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub total_seals: u64,
    pub by_type: BTreeMap<String, u64>,
    pub by_status: BTreeMap<String, u64>,
    pub expired_seals: u64,
    pub audit_events: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStats {
    pub count: u64,
    pub failures: u64,
    pub total_ms: f64,
    pub average_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryStats {
    #[serde(flatten)]
    pub store: StoreCounts,
    pub cache_size: usize,
    pub cache_capacity: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Hits over lookups, 0.0 when nothing was looked up.
    pub cache_hit_rate: f64,
    pub operations: BTreeMap<String, OperationStats>,
    pub last_cleanup: Option<DateTime<Utc>>,
    pub last_backup: Option<DateTime<Utc>>,
    pub background_tasks_running: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn has_more_is_offset_plus_len_below_total() {
        assert!(!SealSearchResult::new(Vec::new(), 0, 0, 10).has_more);
        assert!(SealSearchResult::new(Vec::new(), 5, 4, 10).has_more);
        assert!(!SealSearchResult::new(Vec::new(), 5, 5, 10).has_more);
    }

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(SealSearchCriteria::default().page_size(), DEFAULT_SEARCH_LIMIT);
        let big = SealSearchCriteria {
            limit: Some(50_000),
            ..Default::default()
        };
        assert_eq!(big.page_size(), MAX_SEARCH_LIMIT);
    }

    #[test]
    fn audit_chain_detects_edits() {
        let first = SealAuditEvent::chained(GENESIS_AUDIT_HASH, AuditOperation::Store, Some("s1"), Some("d1"), None, json!({}));
        let second = SealAuditEvent::chained(&first.event_hash, AuditOperation::Delete, Some("s1"), Some("d1"), Some("ops"), json!({}));
        let events = vec![first.clone(), second.clone()];
        assert!(verify_chain(&events).chain_valid);

        let mut edited = first;
        edited.operation = AuditOperation::Retrieve;
        let result = verify_chain(&[edited, second]);
        assert!(!result.chain_valid);
        assert_eq!(result.broken_links, 1);
    }

    #[test]
    fn audit_hash_covers_attribution_and_details() {
        let event = SealAuditEvent::chained(
            GENESIS_AUDIT_HASH,
            AuditOperation::Update,
            Some("s1"),
            Some("d1"),
            Some("alice"),
            json!({"status": "revoked"}),
        );
        assert!(event.hash_is_consistent());

        let mut details = event.clone();
        details.details = json!({"status": "verified"});
        assert!(!details.hash_is_consistent());

        let mut user = event.clone();
        user.user_id = Some("mallory".into());
        assert!(!user.hash_is_consistent());

        let mut document = event;
        document.document_id = None;
        assert!(!document.hash_is_consistent());
    }

    #[test]
    fn audit_operation_wire_names() {
        assert_eq!(serde_json::to_value(AuditOperation::Cleanup).unwrap(), json!("CLEANUP"));
        assert_eq!(AuditOperation::parse("RESTORE"), Some(AuditOperation::Restore));
        assert_eq!(AuditOperation::parse("store"), None);
    }
}
