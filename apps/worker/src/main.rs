//! Portcullis directory sync worker.
//!
//! Runs one group and membership sync pass for a configured account and
//! provider from a normalized roster file.

#![forbid(unsafe_code)]

use std::sync::Arc;

use portcullis_application::{
    AuthorizationService, DirectorySyncService, SyncCircuitBreaker, SyncCounts,
};
use portcullis_core::{AppError, AppResult};
use portcullis_domain::{Permission, Subject, Topic};
use portcullis_infrastructure::{BroadcastNotificationBus, MIGRATOR, PostgresAccountStore};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;
mod roster;

use config::WorkerConfig;
use roster::Roster;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::from_env()?;
    let roster = Roster::load(config.roster_path.as_path())?;
    let pool = connect_pool(config.database_url.as_str(), config.database_max_connections).await?;

    let notification_bus = Arc::new(BroadcastNotificationBus::new(
        config.notification_bus_capacity,
    ));
    let mut subscription = notification_bus.subscribe(Topic::Account(config.account_id));
    let sync_service = DirectorySyncService::new(
        AuthorizationService::new(),
        Arc::new(PostgresAccountStore::new(pool)),
        notification_bus,
        SyncCircuitBreaker::new(config.deletion_threshold),
    );
    let subject = Subject::system(config.account_id, [Permission::DirectorySync]);

    info!(
        account_id = %config.account_id,
        provider_id = %config.provider_id,
        groups = roster.groups.len(),
        memberships = roster.memberships.len(),
        actors = roster.actors.len(),
        threshold = ?config.deletion_threshold,
        "portcullis-sync-worker started"
    );

    let groups = sync_service
        .sync_groups(&subject, config.provider_id, roster.groups)
        .await?;
    log_counts("groups", &groups.counts);

    let memberships = sync_service
        .sync_memberships(
            &subject,
            config.provider_id,
            roster.memberships,
            &roster.actors,
        )
        .await?;
    log_counts("memberships", &memberships.counts);

    let notifications = subscription.drain();
    for notification in &notifications {
        debug!(?notification, "notification published");
    }
    info!(
        account_id = %config.account_id,
        notifications = notifications.len(),
        "directory sync pass finished"
    );

    Ok(())
}

async fn connect_pool(database_url: &str, max_connections: u32) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

fn log_counts(stage: &str, counts: &SyncCounts) {
    info!(
        stage,
        inserted = counts.inserted,
        updated = counts.updated,
        deleted = counts.deleted,
        memberships_deleted = counts.memberships_deleted,
        policies_deleted = counts.policies_deleted,
        skipped = counts.skipped,
        "sync stage committed"
    );
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
