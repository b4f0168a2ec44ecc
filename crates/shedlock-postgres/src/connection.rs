//! Connection pool management for the PostgreSQL lock store.

use sqlx::{PgPool, Pool, Postgres};
use std::fmt;

/// PostgreSQL connection source.
#[derive(Clone)]
pub enum PostgresConnection {
    /// Connection string - a pool is created for the store.
    ConnectionString(String),
    /// External connection pool, shared with the application.
    Pool(Pool<Postgres>),
}

impl PostgresConnection {
    /// Gets or creates a connection pool.
    pub async fn get_pool(&self) -> Result<PgPool, sqlx::Error> {
        match self {
            Self::ConnectionString(url) => PgPool::connect(url).await,
            Self::Pool(pool) => Ok(pool.clone()),
        }
    }
}

impl fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionString(_) => {
                write!(f, "PostgresConnection::ConnectionString([REDACTED])")
            }
            Self::Pool(_) => write!(f, "PostgresConnection::Pool([POOL])"),
        }
    }
}
