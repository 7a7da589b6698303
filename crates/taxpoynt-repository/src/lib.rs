//! # taxpoynt-repository — Seal Persistence
//!
//! - [`SealStore`]: the storage seam, with [`InMemorySealStore`] and
//!   [`PgSealStore`] backends.
//! - [`SealRepository`]: cache, audit trail, search, cleanup and backup
//!   over any store.
//!
//! ## Ownership
//!
//! The repository is the single writer of persisted seal state. After the
//! initial store, only `status` and `updated_at` ever change.

pub mod error;
pub mod model;
pub mod postgres;
pub mod repository;
pub mod store;

pub use error::RepositoryError;
pub use model::{
    verify_chain, AuditOperation, ChainIntegrity, OperationStats, RepositoryStats, SealAuditEvent,
    SealSearchCriteria, SealSearchResult, SortField, SortOrder, StoreCounts,
};
pub use postgres::PgSealStore;
pub use repository::{BackupSnapshot, RepositoryConfig, SealRepository};
pub use store::{InMemorySealStore, SealStore};
