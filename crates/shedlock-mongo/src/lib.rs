//! MongoDB backend for lease locks.

pub mod document;
pub mod store;

pub use document::MongoLockDocument;
pub use store::MongoLockStore;
