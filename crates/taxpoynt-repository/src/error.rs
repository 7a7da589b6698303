//! # Repository Error Types
//!
//! Returned by [`SealStore`](crate::SealStore) implementations and by the
//! backup and lifecycle operations of [`SealRepository`](crate::SealRepository).
//! The seal operations themselves (`store_seal`, `retrieve_seal`, ...) log
//! these and return `false` / `None` / empty results instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted row that no longer parses into a seal.
    #[error("corrupt record {id}: {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("no backup directory configured")]
    BackupDisabled,

    #[error("repository already started")]
    AlreadyStarted,
}
