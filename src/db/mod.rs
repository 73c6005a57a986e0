pub mod connection;
pub mod migration_runner;
pub mod records;
pub mod store;

pub use connection::Database;
pub use store::{KeyValueStore, Listener, MemoryStore, SubscriptionId};
