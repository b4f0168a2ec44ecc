//! MySQL backend for lease locks.
//!
//! Works against MySQL 5.7+ and MariaDB. The lock table's primary key on
//! `name` rejects a second insert with a duplicate-key error, which the store
//! reports as a conflict.

pub mod connection;
pub mod queries;
pub mod store;

pub use connection::MySqlConnection;
pub use store::{MySqlLockStore, MySqlLockStoreBuilder};
