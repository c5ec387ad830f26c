//! `core.database`: the bootstrap module. Provides a process-wide key/value store
//! under the `database` service name.

pub mod config;
pub mod module;
pub mod store;

pub use config::DatabaseConfig;
pub use module::{DatabaseModule, READY_HOOK, SERVICE_NAME};
pub use store::{InMemoryStore, KvStore, StoreError};
