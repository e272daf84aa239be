//! PostgreSQL-backed account store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portcullis_application::{AccountStore, AccountTransaction, GrantFilter, MembershipFilter};
use portcullis_core::{AccountId, AppError, AppResult};
use portcullis_domain::{
    AccessGrant, Actor, ActorId, Group, GroupId, Membership, Policy, ProviderId, Session,
};
use sqlx::{PgPool, Postgres, Transaction};

mod actors;
mod dependents;
mod groups;
mod memberships;
mod rows;


/// PostgreSQL implementation of the account store port.
#[derive(Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn begin(&self, account_id: AccountId) -> AppResult<Box<dyn AccountTransaction>> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| AppError::Internal(format!("failed to begin transaction: {error}")))?;

        sqlx::query(
            r#"
            INSERT INTO accounts (id)
            VALUES ($1)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(account_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to register account: {error}")))?;

        // Every unit of work on the account queues behind this row lock.
        sqlx::query(
            r#"
            SELECT id
            FROM accounts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(account_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock account: {error}")))?;

        Ok(Box::new(PostgresAccountTransaction {
            account_id,
            transaction,
        }))
    }
}

/// Unit of work wrapping one PostgreSQL transaction holding the account lock.
struct PostgresAccountTransaction {
    account_id: AccountId,
    transaction: Transaction<'static, Postgres>,
}

#[async_trait]
impl AccountTransaction for PostgresAccountTransaction {
    fn account_id(&self) -> AccountId {
        self.account_id
    }

    async fn find_actor(&mut self, actor_id: ActorId) -> AppResult<Option<Actor>> {
        self.find_actor_impl(actor_id).await
    }

    async fn list_actors(&mut self) -> AppResult<Vec<Actor>> {
        self.list_actors_impl().await
    }

    async fn insert_actor(&mut self, actor: &Actor) -> AppResult<()> {
        self.insert_actor_impl(actor).await
    }

    async fn update_actor(&mut self, actor: &Actor) -> AppResult<Actor> {
        self.update_actor_impl(actor).await
    }

    async fn delete_actor(&mut self, actor: &Actor) -> AppResult<()> {
        self.delete_actor_impl(actor).await
    }

    async fn count_enabled_admins(&mut self) -> AppResult<u64> {
        self.count_enabled_admins_impl().await
    }

    async fn find_group(&mut self, group_id: GroupId) -> AppResult<Option<Group>> {
        self.find_group_impl(group_id).await
    }

    async fn list_groups(&mut self) -> AppResult<Vec<Group>> {
        self.list_groups_impl().await
    }

    async fn list_provider_groups(&mut self, provider_id: ProviderId) -> AppResult<Vec<Group>> {
        self.list_provider_groups_impl(provider_id).await
    }

    async fn insert_group(&mut self, group: &Group) -> AppResult<()> {
        self.insert_group_impl(group).await
    }

    async fn update_group(&mut self, group: &Group) -> AppResult<Group> {
        self.update_group_impl(group).await
    }

    async fn delete_group(&mut self, group: &Group) -> AppResult<()> {
        self.delete_group_impl(group).await
    }

    async fn list_memberships(&mut self, filter: MembershipFilter) -> AppResult<Vec<Membership>> {
        self.list_memberships_impl(filter).await
    }

    async fn insert_membership(&mut self, membership: Membership) -> AppResult<bool> {
        self.insert_membership_impl(membership).await
    }

    async fn delete_membership(&mut self, membership: Membership) -> AppResult<bool> {
        self.delete_membership_impl(membership).await
    }

    async fn list_policies_for_groups(&mut self, group_ids: &[GroupId]) -> AppResult<Vec<Policy>> {
        self.list_policies_for_groups_impl(group_ids).await
    }

    async fn delete_policies_for_group(&mut self, group_id: GroupId) -> AppResult<u64> {
        self.delete_policies_for_group_impl(group_id).await
    }

    async fn delete_clients_for_actor(&mut self, actor_id: ActorId) -> AppResult<u64> {
        self.delete_clients_for_actor_impl(actor_id).await
    }

    async fn delete_identities_for_actor(&mut self, actor_id: ActorId) -> AppResult<u64> {
        self.delete_identities_for_actor_impl(actor_id).await
    }

    async fn invalidate_sessions_for_actor(
        &mut self,
        actor_id: ActorId,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<Session>> {
        self.invalidate_sessions_for_actor_impl(actor_id, at).await
    }

    async fn expire_grants(
        &mut self,
        filter: GrantFilter,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<AccessGrant>> {
        self.expire_grants_impl(filter, at).await
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.transaction
            .commit()
            .await
            .map_err(|error| AppError::Internal(format!("failed to commit transaction: {error}")))
    }
}

impl PostgresAccountTransaction {
    fn ensure_own_account(
        &self,
        kind: &str,
        id: impl std::fmt::Display,
        account_id: AccountId,
    ) -> AppResult<()> {
        if account_id != self.account_id {
            return Err(AppError::Validation(format!(
                "{kind} '{id}' belongs to another account"
            )));
        }

        Ok(())
    }
}

fn stale_or_missing(kind: &str, id: impl std::fmt::Display, version: i64) -> AppError {
    AppError::Stale(format!("{kind} '{id}' changed since version {version} or no longer exists"))
}
