//! MySQL implementation of [`LockStore`].

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use shedlock_core::error::{LockError, LockResult, StoreError, StoreResult};
use shedlock_core::record::{DEFAULT_TABLE_NAME, LockRecord, validate_table_name};
use shedlock_core::store::{
    InsertOutcome, LeaseChange, LeaseCondition, LockStore, Now, ceil_millis, unsupported_update,
};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlConnectOptions;
use tracing::{debug, instrument};

use crate::connection::MySqlConnection;
use crate::queries::Queries;

/// Builder for MySQL lock store configuration.
pub struct MySqlLockStoreBuilder {
    connection: Option<MySqlConnection>,
    table_name: String,
    create_table: bool,
}

impl MySqlLockStoreBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            connection: None,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            create_table: false,
        }
    }

    /// Sets the MySQL connection string.
    pub fn connection_string(mut self, conn_str: impl Into<String>) -> Self {
        self.connection = Some(MySqlConnection::ConnectionString(conn_str.into()));
        self
    }

    /// Sets prepared connect options.
    pub fn connect_options(mut self, options: MySqlConnectOptions) -> Self {
        self.connection = Some(MySqlConnection::Options(options));
        self
    }

    /// Sets an existing connection pool.
    pub fn pool(mut self, pool: MySqlPool) -> Self {
        self.connection = Some(MySqlConnection::Pool(pool));
        self
    }

    /// Sets the lock table. Defaults to `shedlock`.
    pub fn table_name(mut self, table: impl Into<String>) -> Self {
        self.table_name = table.into();
        self
    }

    /// Creates the lock table on build if it does not exist yet.
    pub fn create_table(mut self, create_table: bool) -> Self {
        self.create_table = create_table;
        self
    }

    /// Builds the store.
    pub async fn build(self) -> LockResult<MySqlLockStore> {
        validate_table_name(&self.table_name)?;
        let connection = self
            .connection
            .ok_or_else(|| LockError::Config("connection not specified".to_string()))?;

        let pool = connection
            .get_pool()
            .await
            .map_err(|e| LockError::Connection(Box::new(e)))?;

        let store = MySqlLockStore {
            pool,
            queries: Queries::for_table(&self.table_name),
        };
        if self.create_table {
            store.create_table_if_not_exists().await?;
        }
        Ok(store)
    }
}

impl Default for MySqlLockStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock records in a MySQL table.
#[derive(Clone)]
pub struct MySqlLockStore {
    pool: MySqlPool,
    queries: Queries,
}

impl MySqlLockStore {
    /// Returns a new builder for configuring the store.
    pub fn builder() -> MySqlLockStoreBuilder {
        MySqlLockStoreBuilder::new()
    }

    /// Creates a store on the default table using the specified connection string.
    pub async fn new(connection_string: impl Into<String>) -> LockResult<Self> {
        Self::builder()
            .connection_string(connection_string)
            .build()
            .await
    }

    /// Creates the lock table if it is missing.
    pub async fn create_table_if_not_exists(&self) -> LockResult<()> {
        sqlx::query(&self.queries.create_table)
            .execute(&self.pool)
            .await
            .map_err(|e| LockError::Store(StoreError::new("create_table", e)))?;
        Ok(())
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

impl LockStore for MySqlLockStore {
    fn backend(&self) -> &'static str {
        "mysql"
    }

    #[instrument(skip_all, fields(lock.name = %record.name, backend = "mysql"))]
    async fn insert(&self, record: &LockRecord) -> StoreResult<InsertOutcome> {
        let result = sqlx::query(&self.queries.insert)
            .bind(&record.name)
            .bind(column(&ceil_millis(record.lock_until)))
            .bind(column(&record.locked_at))
            .bind(&record.locked_by)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            // ER_DUP_ENTRY (1062)
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                debug!("duplicate key on insert");
                Ok(InsertOutcome::Conflict)
            }
            Err(e) => Err(StoreError::insert(e)),
        }
    }

    #[instrument(skip_all, fields(lock.name = %name, backend = "mysql", condition = ?condition))]
    async fn update(
        &self,
        name: &str,
        condition: LeaseCondition,
        change: &LeaseChange,
    ) -> StoreResult<u64> {
        let result = match (condition, change) {
            (
                LeaseCondition::Expired(now),
                LeaseChange::Renew {
                    lock_until,
                    locked_at,
                    locked_by,
                },
            ) => {
                let query = match now {
                    Now::Client(_) => &self.queries.renew,
                    Now::Store => &self.queries.renew_db_time,
                };
                let mut query = sqlx::query(query)
                    .bind(column(&ceil_millis(*lock_until)))
                    .bind(column(locked_at))
                    .bind(locked_by)
                    .bind(name);
                if let Now::Client(instant) = now {
                    query = query.bind(column(&instant));
                }
                query.execute(&self.pool).await
            }
            (LeaseCondition::Active(Now::Client(now)), LeaseChange::Expire(Now::Client(to))) => {
                if now != *to {
                    return Err(unsupported_update(condition, change));
                }
                sqlx::query(&self.queries.expire)
                    .bind(column(to))
                    .bind(name)
                    .bind(column(&now))
                    .execute(&self.pool)
                    .await
            }
            (LeaseCondition::Active(Now::Store), LeaseChange::Expire(Now::Store)) => {
                sqlx::query(&self.queries.expire_db_time)
                    .bind(name)
                    .execute(&self.pool)
                    .await
            }
            _ => return Err(unsupported_update(condition, change)),
        };

        result
            .map(|done| done.rows_affected())
            .map_err(StoreError::update)
    }

    #[instrument(skip_all, fields(lock.name = %name, backend = "mysql"))]
    async fn delete(&self, name: &str) -> StoreResult<u64> {
        sqlx::query(&self.queries.delete)
            .bind(name)
            .execute(&self.pool)
            .await
            .map(|done| done.rows_affected())
            .map_err(StoreError::delete)
    }
}

/// `TIMESTAMP(3)` rounds on write, which could push a boundary past the instant
/// it was compared against. Truncating keeps writes and predicates aligned;
/// lease ends go through [`ceil_millis`] first so they never move earlier.
fn column(instant: &DateTime<Utc>) -> NaiveDateTime {
    instant.trunc_subsecs(3).naive_utc()
}
