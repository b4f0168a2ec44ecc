//! Lease acquisition protocol on top of a [`LockStore`].

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::watch;
use tracing::{Span, debug, field, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{LockError, LockResult, StoreResult};
use crate::host::{HostIdentity, SystemHostIdentity};
use crate::record::{LockRecord, validate_name};
use crate::store::{InsertOutcome, LeaseChange, LeaseCondition, LockStore, Now};
use crate::traits::Locker;

/// Tunables for a [`LockManager`].
#[derive(Debug, Clone, Default)]
pub struct LockManagerOptions {
    /// Upper bound on a single operation, store round trips included.
    /// An operation that runs out of time reports "not applied".
    pub operation_timeout: Option<Duration>,
    /// Compare lease expiry against the store's clock instead of ours.
    ///
    /// This removes cross-node skew from the expiry check. Timestamps written
    /// by `acquire` still come from the local clock.
    pub use_store_time: bool,
}

/// Builder for [`LockManager`].
pub struct LockManagerBuilder<S, C = SystemClock> {
    store: S,
    clock: C,
    locked_by: Option<String>,
    host_identity: Option<Box<dyn HostIdentity>>,
    options: LockManagerOptions,
    cancel_signal: Option<watch::Receiver<bool>>,
}

impl<S: LockStore> LockManagerBuilder<S, SystemClock> {
    /// Creates a new builder around `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: SystemClock,
            locked_by: None,
            host_identity: None,
            options: LockManagerOptions::default(),
            cancel_signal: None,
        }
    }
}

impl<S: LockStore, C: Clock> LockManagerBuilder<S, C> {
    /// Replaces the time source.
    pub fn clock<C2: Clock>(self, clock: C2) -> LockManagerBuilder<S, C2> {
        LockManagerBuilder {
            store: self.store,
            clock,
            locked_by: self.locked_by,
            host_identity: self.host_identity,
            options: self.options,
            cancel_signal: self.cancel_signal,
        }
    }

    /// Sets the `locked_by` label directly, bypassing host identity lookup.
    pub fn locked_by(mut self, label: impl Into<String>) -> Self {
        self.locked_by = Some(label.into());
        self
    }

    /// Sets how the `locked_by` label is resolved. Defaults to the host name.
    pub fn host_identity(mut self, identity: impl HostIdentity + 'static) -> Self {
        self.host_identity = Some(Box::new(identity));
        self
    }

    /// Sets the per-operation deadline.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.options.operation_timeout = Some(timeout);
        self
    }

    /// Evaluates expiry against the store's clock.
    pub fn use_store_time(mut self, use_store_time: bool) -> Self {
        self.options.use_store_time = use_store_time;
        self
    }

    /// Replaces all options at once.
    pub fn options(mut self, options: LockManagerOptions) -> Self {
        self.options = options;
        self
    }

    /// Cancels pending and future operations once the channel reads `true`.
    pub fn cancel_signal(mut self, signal: watch::Receiver<bool>) -> Self {
        self.cancel_signal = Some(signal);
        self
    }

    /// Builds the manager, resolving the holder label once.
    pub fn build(self) -> LockManager<S, C> {
        let locked_by = match (self.locked_by, self.host_identity) {
            (Some(label), _) => label,
            (None, Some(identity)) => identity.resolve(),
            (None, None) => SystemHostIdentity.resolve(),
        };

        LockManager {
            store: self.store,
            clock: self.clock,
            locked_by,
            options: self.options,
            cancel_signal: self.cancel_signal,
        }
    }
}

/// Lease-based lock built on three atomic store primitives.
///
/// The manager keeps no mutable state of its own; all exclusion comes from the
/// store. It never retries.
pub struct LockManager<S, C = SystemClock> {
    store: S,
    clock: C,
    locked_by: String,
    options: LockManagerOptions,
    cancel_signal: Option<watch::Receiver<bool>>,
}

/// How a guarded store call ended.
enum Guarded<T> {
    Done(StoreResult<T>),
    Cancelled,
    TimedOut,
}

impl<S: LockStore> LockManager<S, SystemClock> {
    /// Returns a new builder for configuring the manager.
    pub fn builder(store: S) -> LockManagerBuilder<S, SystemClock> {
        LockManagerBuilder::new(store)
    }

    /// Creates a manager with the system clock and host name.
    pub fn new(store: S) -> Self {
        Self::builder(store).build()
    }
}

impl<S: LockStore, C: Clock> LockManager<S, C> {
    /// The label written to `locked_by`.
    pub fn locked_by(&self) -> &str {
        &self.locked_by
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &LockManagerOptions {
        &self.options
    }

    fn predicate_now(&self, now: DateTime<Utc>) -> Now {
        if self.options.use_store_time {
            Now::Store
        } else {
            Now::Client(now)
        }
    }

    /// Insert first; fall back to taking over an expired row only on conflict.
    async fn acquire_internal(
        &self,
        name: &str,
        now: DateTime<Utc>,
        lock_until: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let record = LockRecord {
            name: name.to_string(),
            lock_until,
            locked_at: now,
            locked_by: self.locked_by.clone(),
        };

        match self.store.insert(&record).await? {
            InsertOutcome::Inserted => {
                debug!(path = "insert", "lock record created");
                Ok(true)
            }
            InsertOutcome::Conflict => {
                let change = LeaseChange::Renew {
                    lock_until,
                    locked_at: now,
                    locked_by: record.locked_by,
                };
                let rows = self
                    .store
                    .update(
                        name,
                        LeaseCondition::Expired(self.predicate_now(now)),
                        &change,
                    )
                    .await?;
                debug!(path = "update", rows, "lock record exists, tried takeover");
                Ok(rows == 1)
            }
        }
    }

    async fn release_internal(&self, name: &str) -> StoreResult<bool> {
        let now = self.predicate_now(self.clock.now());
        let rows = self
            .store
            .update(name, LeaseCondition::Active(now), &LeaseChange::Expire(now))
            .await?;
        Ok(rows > 0)
    }

    async fn delete_internal(&self, name: &str) -> StoreResult<bool> {
        Ok(self.store.delete(name).await? > 0)
    }

    /// Races `op` against the cancel signal and the operation deadline.
    ///
    /// An already-raised signal wins before `op` is first polled, so no store
    /// call is issued.
    async fn guard<T>(
        &self,
        op: impl Future<Output = StoreResult<T>>,
        cancellable: bool,
    ) -> Guarded<T> {
        let cancelled = async {
            match (&self.cancel_signal, cancellable) {
                (Some(signal), true) => {
                    let mut signal = signal.clone();
                    let sender_gone = signal.wait_for(|cancelled| *cancelled).await.is_err();
                    if sender_gone {
                        std::future::pending::<()>().await;
                    }
                }
                _ => std::future::pending::<()>().await,
            }
        };
        let deadline = async {
            match self.options.operation_timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Guarded::Cancelled,
            result = op => Guarded::Done(result),
            _ = deadline => Guarded::TimedOut,
        }
    }

    /// Collapses a guarded outcome into the boolean contract, keeping the
    /// reason on the current span.
    fn settle(outcome: Guarded<bool>, miss_reason: &'static str) -> LockResult<bool> {
        let span = Span::current();
        match outcome {
            Guarded::Done(Ok(applied)) => {
                span.record("applied", applied);
                if !applied {
                    span.record("reason", miss_reason);
                }
                Ok(applied)
            }
            Guarded::Done(Err(e)) => {
                span.record("applied", false);
                span.record("reason", "store_failure");
                warn!(error = %e, "lock store failure");
                Err(LockError::Store(e))
            }
            Guarded::Cancelled => {
                span.record("applied", false);
                span.record("reason", "cancelled");
                debug!("lock operation cancelled");
                Ok(false)
            }
            Guarded::TimedOut => {
                span.record("applied", false);
                span.record("reason", "timeout");
                debug!("lock operation timed out");
                Ok(false)
            }
        }
    }

    async fn cleanup(&self, name: &str) {
        match self.guard(self.delete_internal(name), false).await {
            Guarded::Done(Ok(true)) => debug!(lock.name = %name, "lock record deleted after run"),
            Guarded::Done(Ok(false)) => {
                warn!(lock.name = %name, "lock record was already gone after run")
            }
            Guarded::Done(Err(e)) => {
                warn!(lock.name = %name, error = %e, "failed to delete lock record after run")
            }
            Guarded::Cancelled | Guarded::TimedOut => {
                warn!(lock.name = %name, "timed out deleting lock record after run")
            }
        }
    }
}

/// Shortest accepted lease. SQL and BSON timestamps keep milliseconds, so a
/// shorter lease could be stored with `lock_until == locked_at`.
pub const MIN_LEASE: Duration = Duration::from_millis(1);

/// Computes `lock_until` for a lease starting at `now`.
fn lease_end(now: DateTime<Utc>, lease: Duration) -> LockResult<DateTime<Utc>> {
    if lease < MIN_LEASE {
        return Err(LockError::InvalidLease(lease));
    }
    chrono::Duration::from_std(lease)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or(LockError::InvalidLease(lease))
}

impl<S: LockStore, C: Clock> Locker for LockManager<S, C> {
    #[instrument(skip(self), fields(lock.name = %name, backend = self.store.backend(), operation = "acquire", applied = field::Empty, reason = field::Empty))]
    async fn acquire(&self, name: &str, lease: Duration) -> LockResult<bool> {
        validate_name(name)?;
        let now = self.clock.now();
        let lock_until = lease_end(now, lease)?;
        let outcome = self
            .guard(self.acquire_internal(name, now, lock_until), true)
            .await;
        Self::settle(outcome, "lock_held")
    }

    #[instrument(skip(self), fields(lock.name = %name, backend = self.store.backend(), operation = "release", applied = field::Empty, reason = field::Empty))]
    async fn release(&self, name: &str) -> LockResult<bool> {
        validate_name(name)?;
        let outcome = self.guard(self.release_internal(name), true).await;
        Self::settle(outcome, "not_active")
    }

    #[instrument(skip(self), fields(lock.name = %name, backend = self.store.backend(), operation = "delete", applied = field::Empty, reason = field::Empty))]
    async fn delete(&self, name: &str) -> LockResult<bool> {
        validate_name(name)?;
        let outcome = self.guard(self.delete_internal(name), true).await;
        Self::settle(outcome, "not_found")
    }

    #[instrument(skip(self, action), fields(lock.name = %name, backend = self.store.backend(), operation = "run_once"))]
    async fn run_once<F, Fut>(
        &self,
        name: &str,
        lease: Duration,
        action: F,
    ) -> LockResult<Option<Fut::Output>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future + Send,
        Fut::Output: Send,
    {
        if !self.acquire(name, lease).await? {
            return Ok(None);
        }

        let outcome = AssertUnwindSafe(async move { action().await })
            .catch_unwind()
            .await;
        self.cleanup(name).await;

        match outcome {
            Ok(output) => Ok(Some(output)),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
