use chrono::{DateTime as ChronoDateTime, Utc};
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use shedlock_core::record::LockRecord;
use shedlock_core::store::ceil_millis;

/// One lock record. The lock name is the document `_id`, so the primary index
/// enforces uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoLockDocument {
    #[serde(rename = "_id")]
    pub name: String,

    pub lock_until: DateTime,

    pub locked_at: DateTime,

    pub locked_by: String,
}

/// BSON dates carry millisecond precision; this truncates.
pub fn to_bson(instant: ChronoDateTime<Utc>) -> DateTime {
    DateTime::from_millis(instant.timestamp_millis())
}

/// Lease ends round up instead, so truncation never shortens a lease.
pub fn lease_end_to_bson(lock_until: ChronoDateTime<Utc>) -> DateTime {
    to_bson(ceil_millis(lock_until))
}

impl From<&LockRecord> for MongoLockDocument {
    fn from(record: &LockRecord) -> Self {
        Self {
            name: record.name.clone(),
            lock_until: lease_end_to_bson(record.lock_until),
            locked_at: to_bson(record.locked_at),
            locked_by: record.locked_by.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Timelike};

    #[test]
    fn test_short_lease_document_keeps_end_after_start() {
        let locked_at = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .unwrap()
            .with_nanosecond(400_000)
            .unwrap();
        let record = LockRecord {
            name: "job".to_string(),
            lock_until: locked_at + Duration::milliseconds(1),
            locked_at,
            locked_by: "node-1".to_string(),
        };

        let document = MongoLockDocument::from(&record);
        assert_eq!(document.locked_at.timestamp_millis(), 1_704_067_200_000);
        assert_eq!(document.lock_until.timestamp_millis(), 1_704_067_200_002);
    }
}
