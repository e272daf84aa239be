use portcullis_core::{AppError, AppResult};
use portcullis_domain::{Actor, ActorId, ActorType};

use super::rows::ActorRow;
use super::{PostgresAccountTransaction, stale_or_missing};

const ACTOR_COLUMNS: &str = r#"
    id, account_id, name, actor_type, disabled_at, last_synced_at,
    created_by_kind, created_by_id, version
"#;

impl PostgresAccountTransaction {
    pub(super) async fn find_actor_impl(&mut self, actor_id: ActorId) -> AppResult<Option<Actor>> {
        let row = sqlx::query_as::<_, ActorRow>(&format!(
            "SELECT {ACTOR_COLUMNS} FROM actors WHERE account_id = $1 AND id = $2"
        ))
        .bind(self.account_id.as_uuid())
        .bind(actor_id.as_uuid())
        .fetch_optional(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find actor: {error}")))?;

        row.map(Actor::try_from).transpose()
    }

    pub(super) async fn list_actors_impl(&mut self) -> AppResult<Vec<Actor>> {
        let rows = sqlx::query_as::<_, ActorRow>(&format!(
            "SELECT {ACTOR_COLUMNS} FROM actors WHERE account_id = $1 ORDER BY name, id"
        ))
        .bind(self.account_id.as_uuid())
        .fetch_all(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list actors: {error}")))?;

        rows.into_iter().map(Actor::try_from).collect()
    }

    pub(super) async fn insert_actor_impl(&mut self, actor: &Actor) -> AppResult<()> {
        self.ensure_own_account("actor", actor.id, actor.account_id)?;

        sqlx::query(
            r#"
            INSERT INTO actors (
                id, account_id, name, actor_type, disabled_at, last_synced_at,
                created_by_kind, created_by_id, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(actor.id.as_uuid())
        .bind(self.account_id.as_uuid())
        .bind(actor.name.as_str())
        .bind(actor.actor_type.as_str())
        .bind(actor.disabled_at)
        .bind(actor.last_synced_at)
        .bind(actor.created_by.kind())
        .bind(actor.created_by.reference())
        .bind(actor.version)
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to insert actor: {error}")))?;

        Ok(())
    }

    pub(super) async fn update_actor_impl(&mut self, actor: &Actor) -> AppResult<Actor> {
        let row = sqlx::query_as::<_, ActorRow>(&format!(
            r#"
            UPDATE actors
            SET name = $3,
                actor_type = $4,
                disabled_at = $5,
                last_synced_at = $6,
                version = version + 1
            WHERE account_id = $1 AND id = $2 AND version = $7
            RETURNING {ACTOR_COLUMNS}
            "#
        ))
        .bind(self.account_id.as_uuid())
        .bind(actor.id.as_uuid())
        .bind(actor.name.as_str())
        .bind(actor.actor_type.as_str())
        .bind(actor.disabled_at)
        .bind(actor.last_synced_at)
        .bind(actor.version)
        .fetch_optional(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update actor: {error}")))?
        .ok_or_else(|| stale_or_missing("actor", actor.id, actor.version))?;

        Actor::try_from(row)
    }

    pub(super) async fn delete_actor_impl(&mut self, actor: &Actor) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM actors
            WHERE account_id = $1 AND id = $2 AND version = $3
            "#,
        )
        .bind(self.account_id.as_uuid())
        .bind(actor.id.as_uuid())
        .bind(actor.version)
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete actor: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(stale_or_missing("actor", actor.id, actor.version));
        }

        Ok(())
    }

    pub(super) async fn count_enabled_admins_impl(&mut self) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM actors
            WHERE account_id = $1
              AND actor_type = $2
              AND disabled_at IS NULL
            "#,
        )
        .bind(self.account_id.as_uuid())
        .bind(ActorType::AccountAdminUser.as_str())
        .fetch_one(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count administrators: {error}")))?;

        u64::try_from(count)
            .map_err(|error| AppError::Internal(format!("invalid administrator count: {error}")))
    }
}
