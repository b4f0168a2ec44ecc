//! The persisted lock row and lock name validation.

use chrono::{DateTime, Utc};

use crate::error::{LockError, LockResult};

/// Maximum length of a lock name, matching the `name VARCHAR(64)` column.
pub const MAX_NAME_LENGTH: usize = 64;

/// Default table (or collection) holding lock records.
pub const DEFAULT_TABLE_NAME: &str = "shedlock";

/// A single row of the lock table.
///
/// At most one record exists per `name`. A record whose `lock_until` is not
/// after the current time is stale and can be taken over by any caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    pub name: String,
    pub lock_until: DateTime<Utc>,
    pub locked_at: DateTime<Utc>,
    pub locked_by: String,
}

impl LockRecord {
    /// Returns true if the lease has run out at `now` (the boundary is stale).
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.lock_until <= now
    }
}

/// Checks that a lock name fits the `name` column.
pub fn validate_name(name: &str) -> LockResult<()> {
    if name.is_empty() {
        return Err(LockError::InvalidName(
            "lock name must not be empty".to_string(),
        ));
    }
    let len = name.chars().count();
    if len > MAX_NAME_LENGTH {
        return Err(LockError::InvalidName(format!(
            "lock name is {len} characters, at most {MAX_NAME_LENGTH} allowed"
        )));
    }
    Ok(())
}

/// Checks that a table name is a plain SQL identifier, since it is spliced
/// into statements rather than bound.
pub fn validate_table_name(table: &str) -> LockResult<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !table.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(LockError::Config(format!("invalid table name: {table:?}")))
    }
}
