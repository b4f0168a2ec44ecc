use mongodb::bson::{Document, doc};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::UpdateModifications;
use mongodb::{Client, Collection, Database};
use shedlock_core::error::{LockError, LockResult, StoreError, StoreResult};
use shedlock_core::record::{DEFAULT_TABLE_NAME, LockRecord};
use shedlock_core::store::{InsertOutcome, LeaseChange, LeaseCondition, LockStore, Now};
use tracing::{debug, instrument};

use crate::document::{MongoLockDocument, lease_end_to_bson, to_bson};

/// Server error code for a duplicate key on insert.
const DUPLICATE_KEY: i32 = 11000;

/// Lock records in a MongoDB collection.
///
/// Store time (`$$NOW`) requires MongoDB 4.2 or later.
#[derive(Clone)]
pub struct MongoLockStore {
    collection: Collection<MongoLockDocument>,
}

impl MongoLockStore {
    pub fn new(database: &Database, collection_name: Option<&str>) -> Self {
        let collection_name = collection_name.unwrap_or(DEFAULT_TABLE_NAME);
        Self {
            collection: database.collection(collection_name),
        }
    }

    /// Connects to `uri` and uses `database` with the default collection.
    pub async fn connect(uri: &str, database: &str) -> LockResult<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| LockError::Connection(Box::new(e)))?;
        Ok(Self::new(&client.database(database), None))
    }

    pub fn collection(&self) -> &Collection<MongoLockDocument> {
        &self.collection
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

fn filter(name: &str, condition: LeaseCondition) -> Document {
    match condition {
        LeaseCondition::Expired(Now::Client(now)) => {
            doc! { "_id": name, "lock_until": { "$lte": to_bson(now) } }
        }
        LeaseCondition::Expired(Now::Store) => {
            doc! { "_id": name, "$expr": { "$lte": ["$lock_until", "$$NOW"] } }
        }
        LeaseCondition::Active(Now::Client(now)) => {
            doc! { "_id": name, "lock_until": { "$gt": to_bson(now) } }
        }
        LeaseCondition::Active(Now::Store) => {
            doc! { "_id": name, "$expr": { "$gt": ["$lock_until", "$$NOW"] } }
        }
    }
}

fn modifications(change: &LeaseChange) -> UpdateModifications {
    match change {
        LeaseChange::Renew {
            lock_until,
            locked_at,
            locked_by,
        } => doc! {
            "$set": {
                "lock_until": lease_end_to_bson(*lock_until),
                "locked_at": to_bson(*locked_at),
                "locked_by": locked_by.as_str(),
            }
        }
        .into(),
        LeaseChange::Expire(Now::Client(to)) => {
            doc! { "$set": { "lock_until": to_bson(*to) } }.into()
        }
        // $$NOW is only available to aggregation-pipeline updates.
        LeaseChange::Expire(Now::Store) => vec![doc! { "$set": { "lock_until": "$$NOW" } }].into(),
    }
}

impl LockStore for MongoLockStore {
    fn backend(&self) -> &'static str {
        "mongo"
    }

    #[instrument(skip_all, fields(lock.name = %record.name, backend = "mongo"))]
    async fn insert(&self, record: &LockRecord) -> StoreResult<InsertOutcome> {
        match self
            .collection
            .insert_one(MongoLockDocument::from(record))
            .await
        {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_duplicate_key(&e) => {
                debug!("duplicate key on insert");
                Ok(InsertOutcome::Conflict)
            }
            Err(e) => Err(StoreError::insert(e)),
        }
    }

    #[instrument(skip_all, fields(lock.name = %name, backend = "mongo", condition = ?condition))]
    async fn update(
        &self,
        name: &str,
        condition: LeaseCondition,
        change: &LeaseChange,
    ) -> StoreResult<u64> {
        let result = self
            .collection
            .update_one(filter(name, condition), modifications(change))
            .await
            .map_err(StoreError::update)?;
        Ok(result.matched_count)
    }

    #[instrument(skip_all, fields(lock.name = %name, backend = "mongo"))]
    async fn delete(&self, name: &str) -> StoreResult<u64> {
        let result = self
            .collection
            .delete_one(doc! { "_id": name })
            .await
            .map_err(StoreError::delete)?;
        Ok(result.deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_client_time_filter() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let filter = filter("job", LeaseCondition::Expired(Now::Client(now)));
        assert_eq!(filter.get_str("_id").unwrap(), "job");
        let lock_until = filter.get_document("lock_until").unwrap();
        assert_eq!(
            lock_until.get_datetime("$lte").unwrap().timestamp_millis(),
            now.timestamp_millis()
        );
    }

    #[test]
    fn test_store_time_filter_uses_expr() {
        let filter = filter("job", LeaseCondition::Active(Now::Store));
        assert!(filter.contains_key("$expr"));
        assert!(!filter.contains_key("lock_until"));
    }

    #[test]
    fn test_store_time_expire_is_a_pipeline() {
        assert!(matches!(
            modifications(&LeaseChange::Expire(Now::Store)),
            UpdateModifications::Pipeline(_)
        ));
        assert!(matches!(
            modifications(&LeaseChange::Expire(Now::Client(Utc::now()))),
            UpdateModifications::Document(_)
        ));
    }
}
