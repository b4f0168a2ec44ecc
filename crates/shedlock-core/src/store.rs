//! The storage contract the lease protocol is built on.
//!
//! A store exposes three single-row primitives. Each one must be evaluated and
//! applied atomically by the store itself: two concurrent callers targeting the
//! same name must never both see success for the same transition.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};

use crate::error::{StoreError, StoreResult};
use crate::record::LockRecord;

/// The instant a predicate (or an expiring write) is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Now {
    /// A timestamp taken from the caller's clock.
    Client(DateTime<Utc>),
    /// The store's own notion of the current time (`now()`, `$$NOW`, ...).
    Store,
}

/// Predicate on the current `lock_until` of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseCondition {
    /// `lock_until <= now`: the lease has run out.
    Expired(Now),
    /// `lock_until > now`: the lease is still running.
    Active(Now),
}

/// Fields written by a conditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseChange {
    /// Take the lease over with fresh boundaries and holder.
    Renew {
        lock_until: DateTime<Utc>,
        locked_at: DateTime<Utc>,
        locked_by: String,
    },
    /// Set `lock_until` to the given instant, leaving the other columns alone.
    Expire(Now),
}

/// Outcome of an insert that did not fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record with the same name already exists.
    Conflict,
}

/// Error for a condition and change the manager never pairs, e.g. an expire
/// to a different instant than the one the predicate was evaluated at.
pub fn unsupported_update(condition: LeaseCondition, change: &LeaseChange) -> StoreError {
    StoreError::update(format!(
        "unsupported conditional update: {condition:?} with {change:?}"
    ))
}

/// Rounds a lease end up to whole milliseconds for stores that keep no finer
/// precision. Rounding down would end the lease early.
pub fn ceil_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = instant.trunc_subsecs(3);
    if truncated == instant {
        return instant;
    }
    truncated
        .checked_add_signed(chrono::Duration::milliseconds(1))
        .unwrap_or(truncated)
}

/// Backend holding lock records.
///
/// Implementations must report a uniqueness violation on insert as
/// [`InsertOutcome::Conflict`] and every other failure as an error, so the
/// caller never mistakes a broken connection for a held lock.
pub trait LockStore: Send + Sync {
    /// Short backend label used in logs and spans.
    fn backend(&self) -> &'static str;

    /// Inserts `record` if no record with the same name exists.
    fn insert(
        &self,
        record: &LockRecord,
    ) -> impl Future<Output = StoreResult<InsertOutcome>> + Send;

    /// Applies `change` to the row named `name` only where `condition` holds.
    /// Returns the number of rows affected (0 or 1).
    fn update(
        &self,
        name: &str,
        condition: LeaseCondition,
        change: &LeaseChange,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Removes the row named `name`. Returns the number of rows removed.
    fn delete(&self, name: &str) -> impl Future<Output = StoreResult<u64>> + Send;
}

impl<S: LockStore> LockStore for Arc<S> {
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    fn insert(
        &self,
        record: &LockRecord,
    ) -> impl Future<Output = StoreResult<InsertOutcome>> + Send {
        (**self).insert(record)
    }

    fn update(
        &self,
        name: &str,
        condition: LeaseCondition,
        change: &LeaseChange,
    ) -> impl Future<Output = StoreResult<u64>> + Send {
        (**self).update(name, condition, change)
    }

    fn delete(&self, name: &str) -> impl Future<Output = StoreResult<u64>> + Send {
        (**self).delete(name)
    }
}
