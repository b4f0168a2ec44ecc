//! The capability surface callers program against.

use std::future::Future;
use std::time::Duration;

use crate::error::LockResult;

/// A lease-based distributed lock over named resources.
///
/// Every operation is single-shot: it decides against the current store state
/// and returns immediately. `Ok(false)` / `Ok(None)` means the requested
/// transition did not happen (the lease is held, the record is missing, or the
/// operation was cancelled). Store faults are returned as errors.
///
/// Callers that want to wait for a lock loop on [`Locker::acquire`] with their
/// own delay policy.
///
/// # Example
///
/// ```rust,ignore
/// use std::time::Duration;
///
/// let ran = locker
///     .run_once("nightly-report", Duration::from_secs(600), || async {
///         build_report().await
///     })
///     .await?;
/// if ran.is_none() {
///     tracing::info!("another node is already building the report");
/// }
/// ```
pub trait Locker: Send + Sync {
    /// Tries to take a lease on `name` for `lease`, starting now.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - This caller now holds the lease
    /// * `Ok(false)` - The lease is held by someone else, or the call was cancelled
    /// * `Err(LockError::Store)` - The store failed
    /// * `Err(LockError::InvalidName | LockError::InvalidLease)` - Bad arguments
    fn acquire(
        &self,
        name: &str,
        lease: Duration,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Shortens an active lease so it expires immediately.
    ///
    /// Returns `Ok(true)` iff a lease was active. No ownership check is made.
    fn release(&self, name: &str) -> impl Future<Output = LockResult<bool>> + Send;

    /// Removes the record for `name`. Returns `Ok(true)` iff one existed.
    fn delete(&self, name: &str) -> impl Future<Output = LockResult<bool>> + Send;

    /// Runs `action` while holding the lease on `name`, then deletes the record.
    ///
    /// Returns `Ok(None)` without calling `action` when the lease could not be
    /// taken. The delete is attempted even if `action` panics; the panic is
    /// resumed afterwards. A failed delete is logged, not returned.
    fn run_once<F, Fut>(
        &self,
        name: &str,
        lease: Duration,
        action: F,
    ) -> impl Future<Output = LockResult<Option<Fut::Output>>> + Send
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future + Send,
        Fut::Output: Send;
}
