use chrono::{DateTime, Utc};
use portcullis_application::GrantFilter;
use portcullis_core::{AppError, AppResult};
use portcullis_domain::{AccessGrant, ActorId, GroupId, Policy, Session};
use uuid::Uuid;

use super::PostgresAccountTransaction;
use super::rows::{AccessGrantRow, PolicyRow, SessionRow};

impl PostgresAccountTransaction {
    pub(super) async fn list_policies_for_groups_impl(
        &mut self,
        group_ids: &[GroupId],
    ) -> AppResult<Vec<Policy>> {
        let group_ids: Vec<Uuid> = group_ids.iter().map(|group_id| group_id.as_uuid()).collect();
        let rows = sqlx::query_as::<_, PolicyRow>(
            r#"
            SELECT id, account_id, group_id, resource_id
            FROM policies
            WHERE account_id = $1 AND group_id = ANY($2)
            ORDER BY group_id, id
            "#,
        )
        .bind(self.account_id.as_uuid())
        .bind(group_ids)
        .fetch_all(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list policies: {error}")))?;

        Ok(rows.into_iter().map(Policy::from).collect())
    }

    pub(super) async fn delete_policies_for_group_impl(
        &mut self,
        group_id: GroupId,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM policies
            WHERE account_id = $1 AND group_id = $2
            "#,
        )
        .bind(self.account_id.as_uuid())
        .bind(group_id.as_uuid())
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete policies: {error}")))?;

        Ok(result.rows_affected())
    }

    pub(super) async fn delete_clients_for_actor_impl(
        &mut self,
        actor_id: ActorId,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM clients
            WHERE account_id = $1 AND actor_id = $2
            "#,
        )
        .bind(self.account_id.as_uuid())
        .bind(actor_id.as_uuid())
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete clients: {error}")))?;

        Ok(result.rows_affected())
    }

    pub(super) async fn delete_identities_for_actor_impl(
        &mut self,
        actor_id: ActorId,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM identities
            WHERE account_id = $1 AND actor_id = $2
            "#,
        )
        .bind(self.account_id.as_uuid())
        .bind(actor_id.as_uuid())
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete identities: {error}")))?;

        Ok(result.rows_affected())
    }

    pub(super) async fn invalidate_sessions_for_actor_impl(
        &mut self,
        actor_id: ActorId,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE sessions
            SET invalidated_at = $3
            WHERE account_id = $1
              AND actor_id = $2
              AND invalidated_at IS NULL
            RETURNING id, account_id, actor_id, invalidated_at
            "#,
        )
        .bind(self.account_id.as_uuid())
        .bind(actor_id.as_uuid())
        .bind(at)
        .fetch_all(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to invalidate sessions: {error}")))?;

        Ok(rows.into_iter().map(Session::from).collect())
    }

    pub(super) async fn expire_grants_impl(
        &mut self,
        filter: GrantFilter,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<AccessGrant>> {
        let rows = sqlx::query_as::<_, AccessGrantRow>(
            r#"
            UPDATE access_grants
            SET expires_at = $4
            WHERE account_id = $1
              AND actor_id = $2
              AND ($3::uuid IS NULL OR policy_id = $3)
              AND expires_at > $4
            RETURNING id, account_id, actor_id, policy_id, resource_id, expires_at
            "#,
        )
        .bind(self.account_id.as_uuid())
        .bind(filter.actor_id.as_uuid())
        .bind(filter.policy_id.map(|policy_id| policy_id.as_uuid()))
        .bind(at)
        .fetch_all(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to expire access grants: {error}")))?;

        Ok(rows.into_iter().map(AccessGrant::from).collect())
    }
}
