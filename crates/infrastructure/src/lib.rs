//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod broadcast_notification_bus;
mod in_memory_account_store;
mod postgres_account_store;

#[cfg(test)]
mod workflow_tests;

pub use broadcast_notification_bus::{
    BroadcastNotificationBus, DEFAULT_NOTIFICATION_BUS_CAPACITY, Subscription,
};
pub use in_memory_account_store::{AccountSnapshot, InMemoryAccountStore};
pub use postgres_account_store::PostgresAccountStore;

/// Embedded SQL migrations for [`PostgresAccountStore`].
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
