//! MySQL connection management for the lock store.

use std::fmt;
use std::str::FromStr;

use sqlx::mysql::MySqlConnectOptions;
use sqlx::{MySql, MySqlPool, Pool};

/// Represents different ways to connect to MySQL.
///
/// Pools created here keep sqlx's default session `time_zone` of `+00:00`, so
/// `TIMESTAMP` columns and `UTC_TIMESTAMP()` agree. An external pool must be
/// configured the same way.
#[derive(Clone)]
pub enum MySqlConnection {
    /// Connect using a connection string.
    ConnectionString(String),
    /// Connect using prepared connect options.
    Options(MySqlConnectOptions),
    /// Use an existing connection pool.
    Pool(Pool<MySql>),
}

impl MySqlConnection {
    /// Get or create a connection pool.
    pub async fn get_pool(&self) -> Result<Pool<MySql>, sqlx::Error> {
        match self {
            MySqlConnection::ConnectionString(url) => {
                let options = MySqlConnectOptions::from_str(url)?;
                MySqlPool::connect_with(options).await
            }
            MySqlConnection::Options(options) => MySqlPool::connect_with(options.clone()).await,
            MySqlConnection::Pool(pool) => Ok(pool.clone()),
        }
    }
}

impl fmt::Debug for MySqlConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MySqlConnection::ConnectionString(_) => {
                write!(f, "MySqlConnection::ConnectionString([REDACTED])")
            }
            MySqlConnection::Options(_) => write!(f, "MySqlConnection::Options([REDACTED])"),
            MySqlConnection::Pool(_) => write!(f, "MySqlConnection::Pool([POOL])"),
        }
    }
}
