use std::sync::Arc;

use chrono::Utc;
use portcullis_core::{AppError, AppResult};
use portcullis_domain::{Group, GroupId, ManagedGroupKind, Membership, Permission, Subject};
use tracing::info;

use crate::cascade::{GroupCascadeCounts, NotificationOutbox, remove_group};
use crate::managed_membership::{ManagedReconciliation, reconcile_managed_memberships};
use crate::{
    AccountStore, AccountTransaction, AuthorizationService, MembershipFilter, NotificationBus,
};

mod memberships;

/// Result of a committed group deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDeletion {
    /// Deleted group as it was stored.
    pub group: Group,
    /// Rows removed with the group.
    pub counts: GroupCascadeCounts,
}

/// Result of creating a managed group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedGroupCreation {
    /// Created group.
    pub group: Group,
    /// Memberships written by the initial reconciliation.
    pub reconciliation: ManagedReconciliation,
}

/// Application service for group and membership administration.
#[derive(Clone)]
pub struct GroupService {
    authorization_service: AuthorizationService,
    store: Arc<dyn AccountStore>,
    notification_bus: Arc<dyn NotificationBus>,
}

impl GroupService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        store: Arc<dyn AccountStore>,
        notification_bus: Arc<dyn NotificationBus>,
    ) -> Self {
        Self {
            authorization_service,
            store,
            notification_bus,
        }
    }

    /// Returns one group of the subject's account.
    pub async fn fetch_group(&self, subject: &Subject, group_id: GroupId) -> AppResult<Group> {
        self.authorization_service
            .require_permissions(subject, &[Permission::GroupsRead])?;

        let mut transaction = self.store.begin(subject.account_id()).await?;
        find_group(transaction.as_mut(), group_id).await
    }

    /// Lists groups of the subject's account.
    pub async fn list_groups(&self, subject: &Subject) -> AppResult<Vec<Group>> {
        self.authorization_service
            .require_permissions(subject, &[Permission::GroupsRead])?;

        let mut transaction = self.store.begin(subject.account_id()).await?;
        transaction.list_groups().await
    }

    /// Lists members of one group.
    pub async fn list_group_memberships(
        &self,
        subject: &Subject,
        group_id: GroupId,
    ) -> AppResult<Vec<Membership>> {
        self.authorization_service
            .require_permissions(subject, &[Permission::GroupsRead])?;

        let mut transaction = self.store.begin(subject.account_id()).await?;
        find_group(transaction.as_mut(), group_id).await?;
        transaction
            .list_memberships(MembershipFilter::Group(group_id))
            .await
    }

    /// Creates a manually curated group.
    pub async fn create_group(&self, subject: &Subject, name: &str) -> AppResult<Group> {
        self.authorization_service
            .require_permissions(subject, &[Permission::GroupsManage])?;

        let group = Group::new_manual(subject.account_id(), name, subject.created_by())?;
        let mut transaction = self.store.begin(subject.account_id()).await?;
        transaction.insert_group(&group).await?;
        transaction.commit().await?;

        info!(account_id = %group.account_id, group_id = %group.id, "group created");

        Ok(group)
    }

    /// Creates a system-managed group and fills it immediately.
    ///
    /// An account holds at most one managed group per kind.
    pub async fn create_managed_group(
        &self,
        subject: &Subject,
        kind: ManagedGroupKind,
    ) -> AppResult<ManagedGroupCreation> {
        self.authorization_service
            .require_permissions(subject, &[Permission::GroupsManage])?;

        let account_id = subject.account_id();
        let group = Group::new_managed(account_id, kind)?;
        let now = Utc::now();
        let mut outbox = NotificationOutbox::default();
        let mut transaction = self.store.begin(account_id).await?;

        let exists = transaction
            .list_groups()
            .await?
            .iter()
            .any(|existing| existing.managed_kind() == Some(kind));
        if exists {
            return Err(AppError::Conflict(format!(
                "managed group '{}' already exists in account '{account_id}'",
                kind.as_str()
            )));
        }

        transaction.insert_group(&group).await?;
        let reconciliation =
            reconcile_managed_memberships(transaction.as_mut(), now, &mut outbox).await?;
        transaction.commit().await?;
        outbox.publish(self.notification_bus.as_ref());

        info!(
            account_id = %account_id,
            group_id = %group.id,
            kind = kind.as_str(),
            members = reconciliation.inserted,
            "managed group created"
        );

        Ok(ManagedGroupCreation {
            group,
            reconciliation,
        })
    }

    /// Recomputes every managed group of the subject's account.
    ///
    /// Running it against unchanged state writes nothing.
    pub async fn reconcile_managed_groups(
        &self,
        subject: &Subject,
    ) -> AppResult<ManagedReconciliation> {
        self.authorization_service
            .require_permissions(subject, &[Permission::GroupsManage])?;

        let now = Utc::now();
        let mut outbox = NotificationOutbox::default();
        let mut transaction = self.store.begin(subject.account_id()).await?;
        let reconciliation =
            reconcile_managed_memberships(transaction.as_mut(), now, &mut outbox).await?;
        transaction.commit().await?;
        outbox.publish(self.notification_bus.as_ref());

        Ok(reconciliation)
    }

    /// Renames a manual group.
    pub async fn rename_group(
        &self,
        subject: &Subject,
        group: &Group,
        name: &str,
    ) -> AppResult<Group> {
        self.authorization_service.require_account_permissions(
            subject,
            group.account_id,
            &[Permission::GroupsManage],
        )?;

        let mut transaction = self.store.begin(subject.account_id()).await?;
        let mut stored = load_current_group(transaction.as_mut(), group).await?;
        stored.rename(name)?;
        let updated = transaction.update_group(&stored).await?;
        transaction.commit().await?;

        info!(
            account_id = %updated.account_id,
            group_id = %updated.id,
            version = updated.version,
            "group renamed"
        );

        Ok(updated)
    }

    /// Deletes a manual group with its memberships and referencing policies.
    pub async fn delete_group(&self, subject: &Subject, group: &Group) -> AppResult<GroupDeletion> {
        self.authorization_service.require_account_permissions(
            subject,
            group.account_id,
            &[Permission::GroupsManage],
        )?;

        let now = Utc::now();
        let mut outbox = NotificationOutbox::default();
        let mut transaction = self.store.begin(subject.account_id()).await?;

        let stored = load_current_group(transaction.as_mut(), group).await?;
        stored.ensure_editable()?;
        let counts = remove_group(transaction.as_mut(), &stored, now, &mut outbox).await?;

        transaction.commit().await?;
        outbox.publish(self.notification_bus.as_ref());

        info!(
            account_id = %stored.account_id,
            group_id = %stored.id,
            memberships_deleted = counts.memberships_deleted,
            policies_deleted = counts.policies_deleted,
            "group deleted"
        );

        Ok(GroupDeletion {
            group: stored,
            counts,
        })
    }
}

async fn find_group(
    transaction: &mut dyn AccountTransaction,
    group_id: GroupId,
) -> AppResult<Group> {
    transaction
        .find_group(group_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("group '{group_id}' not found")))
}

/// Reloads the stored group and fails when the caller's copy is out of date.
async fn load_current_group(
    transaction: &mut dyn AccountTransaction,
    group: &Group,
) -> AppResult<Group> {
    let stored = transaction
        .find_group(group.id)
        .await?
        .ok_or_else(|| AppError::Stale(format!("group '{}' no longer exists", group.id)))?;

    if stored.version != group.version {
        return Err(AppError::Stale(format!(
            "group '{}' changed since version {}",
            group.id, group.version
        )));
    }

    Ok(stored)
}
