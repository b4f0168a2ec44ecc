//! Convenience prelude for lease lock types.

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::error::{LockError, LockResult, StoreError, StoreResult};
pub use crate::host::{HostIdentity, StaticHostIdentity, SystemHostIdentity};
pub use crate::manager::{LockManager, LockManagerBuilder, LockManagerOptions, MIN_LEASE};
pub use crate::memory::MemoryLockStore;
pub use crate::record::{DEFAULT_TABLE_NAME, LockRecord, MAX_NAME_LENGTH};
pub use crate::store::{InsertOutcome, LeaseChange, LeaseCondition, LockStore, Now};
pub use crate::traits::Locker;
