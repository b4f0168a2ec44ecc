//! Error types for lease lock operations.

use std::time::Duration;
use thiserror::Error;

/// A fault raised by a [`LockStore`](crate::store::LockStore) backend.
///
/// This is never used to report "the row was not there" or "the lease is still
/// held"; those outcomes are regular return values.
#[derive(Error, Debug)]
#[error("{operation} failed: {source}")]
pub struct StoreError {
    /// The store primitive that failed (`insert`, `update` or `delete`).
    pub operation: &'static str,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl StoreError {
    pub fn new(
        operation: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            operation,
            source: source.into(),
        }
    }

    pub fn insert(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::new("insert", source)
    }

    pub fn update(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::new("update", source)
    }

    pub fn delete(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::new("delete", source)
    }
}

/// Errors that can occur during lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// The backing store failed for a reason other than a uniqueness or
    /// predicate outcome.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// Connecting to the backing store failed while building it.
    #[error("connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Invalid lock name.
    #[error("invalid lock name: {0}")]
    InvalidName(String),

    /// Lease duration that would not leave `lock_until > locked_at`.
    #[error("invalid lease duration: {0:?}")]
    InvalidLease(Duration),

    /// Incomplete or inconsistent builder configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

/// Result type for store primitives.
pub type StoreResult<T> = Result<T, StoreError>;
