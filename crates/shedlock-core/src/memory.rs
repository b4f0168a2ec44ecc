//! In-process lock store.
//!
//! Useful for tests and for coordinating tasks inside a single process. Every
//! primitive runs under one mutex, which gives the same single-row atomicity a
//! database provides.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::clock::{Clock, SystemClock};
use crate::error::StoreResult;
use crate::record::LockRecord;
use crate::store::{InsertOutcome, LeaseChange, LeaseCondition, LockStore, Now};

/// A [`LockStore`] backed by a shared `HashMap`.
///
/// Clones share the same records. The store's own time, used for
/// [`Now::Store`], comes from `clock`.
#[derive(Clone)]
pub struct MemoryLockStore<C = SystemClock> {
    records: Arc<Mutex<HashMap<String, LockRecord>>>,
    clock: C,
}

impl MemoryLockStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryLockStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryLockStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Returns a copy of the record named `name`, if any.
    pub fn get(&self, name: &str) -> Option<LockRecord> {
        self.records().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    fn resolve(&self, now: Now) -> DateTime<Utc> {
        match now {
            Now::Client(instant) => instant,
            Now::Store => self.clock.now(),
        }
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, LockRecord>> {
        // Every mutation is a single assignment, so a poisoned map is consistent.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<C: Clock + Clone> LockStore for MemoryLockStore<C> {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, record: &LockRecord) -> StoreResult<InsertOutcome> {
        let mut records = self.records();
        if records.contains_key(&record.name) {
            return Ok(InsertOutcome::Conflict);
        }
        records.insert(record.name.clone(), record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn update(
        &self,
        name: &str,
        condition: LeaseCondition,
        change: &LeaseChange,
    ) -> StoreResult<u64> {
        let mut records = self.records();
        let Some(record) = records.get_mut(name) else {
            return Ok(0);
        };

        let matches = match condition {
            LeaseCondition::Expired(now) => record.lock_until <= self.resolve(now),
            LeaseCondition::Active(now) => record.lock_until > self.resolve(now),
        };
        if !matches {
            return Ok(0);
        }

        match change {
            LeaseChange::Renew {
                lock_until,
                locked_at,
                locked_by,
            } => {
                record.lock_until = *lock_until;
                record.locked_at = *locked_at;
                record.locked_by.clone_from(locked_by);
            }
            LeaseChange::Expire(now) => {
                record.lock_until = self.resolve(*now);
            }
        }
        Ok(1)
    }

    async fn delete(&self, name: &str) -> StoreResult<u64> {
        Ok(u64::from(self.records().remove(name).is_some()))
    }
}
