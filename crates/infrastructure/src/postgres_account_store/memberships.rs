use portcullis_application::MembershipFilter;
use portcullis_core::{AppError, AppResult};
use portcullis_domain::Membership;
use uuid::Uuid;

use super::PostgresAccountTransaction;
use super::rows::MembershipRow;

impl PostgresAccountTransaction {
    pub(super) async fn list_memberships_impl(
        &mut self,
        filter: MembershipFilter,
    ) -> AppResult<Vec<Membership>> {
        let account_id = self.account_id.as_uuid();
        let query = match filter {
            MembershipFilter::All => sqlx::query_as::<_, MembershipRow>(
                r#"
                SELECT account_id, actor_id, group_id
                FROM memberships
                WHERE account_id = $1
                ORDER BY actor_id, group_id
                "#,
            )
            .bind(account_id),
            MembershipFilter::Actor(actor_id) => sqlx::query_as::<_, MembershipRow>(
                r#"
                SELECT account_id, actor_id, group_id
                FROM memberships
                WHERE account_id = $1 AND actor_id = $2
                ORDER BY actor_id, group_id
                "#,
            )
            .bind(account_id)
            .bind(actor_id.as_uuid()),
            MembershipFilter::Group(group_id) => sqlx::query_as::<_, MembershipRow>(
                r#"
                SELECT account_id, actor_id, group_id
                FROM memberships
                WHERE account_id = $1 AND group_id = $2
                ORDER BY actor_id, group_id
                "#,
            )
            .bind(account_id)
            .bind(group_id.as_uuid()),
            MembershipFilter::Groups(group_ids) => {
                let group_ids: Vec<Uuid> =
                    group_ids.iter().map(|group_id| group_id.as_uuid()).collect();
                sqlx::query_as::<_, MembershipRow>(
                    r#"
                    SELECT account_id, actor_id, group_id
                    FROM memberships
                    WHERE account_id = $1 AND group_id = ANY($2)
                    ORDER BY actor_id, group_id
                    "#,
                )
                .bind(account_id)
                .bind(group_ids)
            }
        };

        let rows = query
            .fetch_all(&mut *self.transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list memberships: {error}")))?;

        Ok(rows.into_iter().map(Membership::from).collect())
    }

    pub(super) async fn insert_membership_impl(
        &mut self,
        membership: Membership,
    ) -> AppResult<bool> {
        self.ensure_own_account(
            "membership of actor",
            membership.actor_id,
            membership.account_id,
        )?;

        let result = sqlx::query(
            r#"
            INSERT INTO memberships (account_id, actor_id, group_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_id, actor_id, group_id) DO NOTHING
            "#,
        )
        .bind(self.account_id.as_uuid())
        .bind(membership.actor_id.as_uuid())
        .bind(membership.group_id.as_uuid())
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| match error {
            sqlx::Error::Database(database_error) if database_error.is_foreign_key_violation() => {
                AppError::NotFound(format!(
                    "actor '{}' or group '{}' not found",
                    membership.actor_id, membership.group_id
                ))
            }
            error => AppError::Internal(format!("failed to insert membership: {error}")),
        })?;

        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn delete_membership_impl(
        &mut self,
        membership: Membership,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM memberships
            WHERE account_id = $1 AND actor_id = $2 AND group_id = $3
            "#,
        )
        .bind(self.account_id.as_uuid())
        .bind(membership.actor_id.as_uuid())
        .bind(membership.group_id.as_uuid())
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete membership: {error}")))?;

        Ok(result.rows_affected() > 0)
    }
}
