use chrono::Utc;
use portcullis_core::{AppError, AppResult};
use portcullis_domain::{ActorId, GroupId, Membership, Permission, Subject};
use tracing::info;

use super::{GroupService, find_group};
use crate::cascade::{NotificationOutbox, propagate_membership_changes};

impl GroupService {
    /// Adds an actor to a manual group and announces the access it gains.
    pub async fn add_membership(
        &self,
        subject: &Subject,
        group_id: GroupId,
        actor_id: ActorId,
    ) -> AppResult<Membership> {
        self.authorization_service
            .require_permissions(subject, &[Permission::GroupsManage])?;

        let account_id = subject.account_id();
        let now = Utc::now();
        let mut outbox = NotificationOutbox::default();
        let mut transaction = self.store.begin(account_id).await?;

        let group = find_group(transaction.as_mut(), group_id).await?;
        group.ensure_editable()?;
        if transaction.find_actor(actor_id).await?.is_none() {
            return Err(AppError::NotFound(format!("actor '{actor_id}' not found")));
        }

        let membership = Membership::new(account_id, actor_id, group_id);
        if !transaction.insert_membership(membership).await? {
            return Err(AppError::Conflict(format!(
                "actor '{actor_id}' is already a member of group '{group_id}'"
            )));
        }
        propagate_membership_changes(transaction.as_mut(), &[membership], &[], now, &mut outbox)
            .await?;

        transaction.commit().await?;
        let notifications = outbox.publish(self.notification_bus.as_ref());

        info!(
            account_id = %account_id,
            group_id = %group_id,
            actor_id = %actor_id,
            notifications,
            "membership added"
        );

        Ok(membership)
    }

    /// Removes an actor from a manual group and announces the access it loses.
    pub async fn remove_membership(
        &self,
        subject: &Subject,
        group_id: GroupId,
        actor_id: ActorId,
    ) -> AppResult<Membership> {
        self.authorization_service
            .require_permissions(subject, &[Permission::GroupsManage])?;

        let account_id = subject.account_id();
        let now = Utc::now();
        let mut outbox = NotificationOutbox::default();
        let mut transaction = self.store.begin(account_id).await?;

        let group = find_group(transaction.as_mut(), group_id).await?;
        group.ensure_editable()?;

        let membership = Membership::new(account_id, actor_id, group_id);
        if !transaction.delete_membership(membership).await? {
            return Err(AppError::NotFound(format!(
                "actor '{actor_id}' is not a member of group '{group_id}'"
            )));
        }
        propagate_membership_changes(transaction.as_mut(), &[], &[membership], now, &mut outbox)
            .await?;

        transaction.commit().await?;
        let notifications = outbox.publish(self.notification_bus.as_ref());

        info!(
            account_id = %account_id,
            group_id = %group_id,
            actor_id = %actor_id,
            notifications,
            "membership removed"
        );

        Ok(membership)
    }
}
