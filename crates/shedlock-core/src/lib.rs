//! Core protocol and storage contract for lease-based distributed locks.
//!
//! A lock is a single row per name in a shared store. Exclusion comes from the
//! store applying insert-if-absent, conditional update and delete atomically;
//! a crashed holder is recovered from once its lease runs out.

pub mod clock;
pub mod error;
pub mod host;
pub mod manager;
pub mod memory;
pub mod prelude;
pub mod record;
pub mod store;
pub mod traits;

pub use error::{LockError, LockResult, StoreError, StoreResult};
pub use prelude::*;
