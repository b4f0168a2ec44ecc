//! PostgreSQL backend for lease locks.
//!
//! Lock records live in an ordinary table (default `shedlock`) whose primary
//! key on `name` provides the uniqueness the protocol relies on.

pub mod connection;
pub mod queries;
pub mod store;

pub use connection::PostgresConnection;
pub use store::{PostgresLockStore, PostgresLockStoreBuilder};
