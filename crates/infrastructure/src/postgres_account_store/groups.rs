use portcullis_core::{AppError, AppResult};
use portcullis_domain::{Group, GroupId, ProviderId};
use sqlx::types::Json;

use super::rows::GroupRow;
use super::{PostgresAccountTransaction, stale_or_missing};

const GROUP_COLUMNS: &str = r#"
    id, account_id, name, origin, provider_id, provider_identifier, managed_kind,
    attributes, created_by_kind, created_by_id, last_synced_at, version
"#;

impl PostgresAccountTransaction {
    pub(super) async fn find_group_impl(&mut self, group_id: GroupId) -> AppResult<Option<Group>> {
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE account_id = $1 AND id = $2"
        ))
        .bind(self.account_id.as_uuid())
        .bind(group_id.as_uuid())
        .fetch_optional(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find group: {error}")))?;

        row.map(Group::try_from).transpose()
    }

    pub(super) async fn list_groups_impl(&mut self) -> AppResult<Vec<Group>> {
        let rows = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE account_id = $1 ORDER BY name, id"
        ))
        .bind(self.account_id.as_uuid())
        .fetch_all(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list groups: {error}")))?;

        rows.into_iter().map(Group::try_from).collect()
    }

    pub(super) async fn list_provider_groups_impl(
        &mut self,
        provider_id: ProviderId,
    ) -> AppResult<Vec<Group>> {
        let rows = sqlx::query_as::<_, GroupRow>(&format!(
            r#"
            SELECT {GROUP_COLUMNS}
            FROM groups
            WHERE account_id = $1
              AND origin = 'synced'
              AND provider_id = $2
            ORDER BY provider_identifier
            "#
        ))
        .bind(self.account_id.as_uuid())
        .bind(provider_id.as_uuid())
        .fetch_all(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list provider groups: {error}")))?;

        rows.into_iter().map(Group::try_from).collect()
    }

    pub(super) async fn insert_group_impl(&mut self, group: &Group) -> AppResult<()> {
        self.ensure_own_account("group", group.id, group.account_id)?;

        sqlx::query(
            r#"
            INSERT INTO groups (
                id, account_id, name, origin, provider_id, provider_identifier, managed_kind,
                attributes, created_by_kind, created_by_id, last_synced_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(group.id.as_uuid())
        .bind(self.account_id.as_uuid())
        .bind(group.name.as_str())
        .bind(group.origin.as_str())
        .bind(group.origin.provider_id().map(|provider_id| provider_id.as_uuid()))
        .bind(group.origin.provider_identifier())
        .bind(group.managed_kind().map(|kind| kind.as_str()))
        .bind(Json(&group.attributes))
        .bind(group.created_by.kind())
        .bind(group.created_by.reference())
        .bind(group.last_synced_at)
        .bind(group.version)
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| match error {
            sqlx::Error::Database(database_error) if database_error.is_unique_violation() => {
                AppError::Conflict(format!(
                    "group '{}' conflicts with an existing group",
                    group.name
                ))
            }
            error => AppError::Internal(format!("failed to insert group: {error}")),
        })?;

        Ok(())
    }

    pub(super) async fn update_group_impl(&mut self, group: &Group) -> AppResult<Group> {
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            r#"
            UPDATE groups
            SET name = $3,
                attributes = $4,
                last_synced_at = $5,
                version = version + 1
            WHERE account_id = $1 AND id = $2 AND version = $6
            RETURNING {GROUP_COLUMNS}
            "#
        ))
        .bind(self.account_id.as_uuid())
        .bind(group.id.as_uuid())
        .bind(group.name.as_str())
        .bind(Json(&group.attributes))
        .bind(group.last_synced_at)
        .bind(group.version)
        .fetch_optional(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update group: {error}")))?
        .ok_or_else(|| stale_or_missing("group", group.id, group.version))?;

        Group::try_from(row)
    }

    pub(super) async fn delete_group_impl(&mut self, group: &Group) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM groups
            WHERE account_id = $1 AND id = $2 AND version = $3
            "#,
        )
        .bind(self.account_id.as_uuid())
        .bind(group.id.as_uuid())
        .bind(group.version)
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete group: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(stale_or_missing("group", group.id, group.version));
        }

        Ok(())
    }
}
