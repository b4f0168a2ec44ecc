//! Store wrapper for exercising failure paths.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use shedlock_core::clock::Clock;
use shedlock_core::error::{StoreError, StoreResult};
use shedlock_core::memory::MemoryLockStore;
use shedlock_core::record::LockRecord;
use shedlock_core::store::{InsertOutcome, LeaseChange, LeaseCondition, LockStore};

/// Counts calls per primitive and fails or stalls them on demand.
#[derive(Default)]
pub struct Faults {
    pub fail_insert: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_delete: AtomicBool,
    pub inserts: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
    delay_ms: AtomicUsize,
}

impl Faults {
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.load(Ordering::SeqCst) as u64)
    }
}

/// A [`MemoryLockStore`] with injectable faults.
#[derive(Clone)]
pub struct MockLockStore<C: Clock + Clone> {
    inner: MemoryLockStore<C>,
    pub faults: Arc<Faults>,
}

impl<C: Clock + Clone> MockLockStore<C> {
    pub fn new(inner: MemoryLockStore<C>) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }

    pub fn inner(&self) -> &MemoryLockStore<C> {
        &self.inner
    }

    async fn stall(&self) {
        let delay = self.faults.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn injected(operation: &'static str) -> StoreError {
    StoreError::new(
        operation,
        std::io::Error::new(std::io::ErrorKind::ConnectionReset, "injected fault"),
    )
}

impl<C: Clock + Clone> LockStore for MockLockStore<C> {
    fn backend(&self) -> &'static str {
        "mock"
    }

    async fn insert(&self, record: &LockRecord) -> StoreResult<InsertOutcome> {
        self.faults.inserts.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        if self.faults.fail_insert.load(Ordering::SeqCst) {
            return Err(injected("insert"));
        }
        self.inner.insert(record).await
    }

    async fn update(
        &self,
        name: &str,
        condition: LeaseCondition,
        change: &LeaseChange,
    ) -> StoreResult<u64> {
        self.faults.updates.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        if self.faults.fail_update.load(Ordering::SeqCst) {
            return Err(injected("update"));
        }
        self.inner.update(name, condition, change).await
    }

    async fn delete(&self, name: &str) -> StoreResult<u64> {
        self.faults.deletes.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        if self.faults.fail_delete.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }
        self.inner.delete(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shedlock_core::clock::ManualClock;

    #[tokio::test]
    async fn test_mock_store_counts_and_fails() {
        let store = MockLockStore::new(MemoryLockStore::with_clock(ManualClock::default()));
        assert_eq!(store.delete("job").await.unwrap(), 0);

        store.faults.fail_delete.store(true, Ordering::SeqCst);
        assert!(store.delete("job").await.is_err());
        assert_eq!(store.faults.deletes.load(Ordering::SeqCst), 2);
    }
}
