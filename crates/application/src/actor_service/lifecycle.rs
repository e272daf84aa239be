use chrono::Utc;
use portcullis_core::AppResult;
use portcullis_domain::{Actor, ActorType, Permission, Subject};
use tracing::info;

use super::admin_guard::{AdminRemoval, ensure_other_enabled_admin};
use super::{ActorDeletion, ActorService, load_current_actor};
use crate::cascade::{
    NotificationOutbox, remove_actor, restore_actor_access, revoke_actor_access,
};
use crate::managed_membership::reconcile_managed_memberships;

impl ActorService {
    /// Disables an actor, revoking its access and ending its sessions.
    ///
    /// Memberships are kept so [`ActorService::enable_actor`] restores access.
    /// Disabling an already disabled actor returns it unchanged.
    pub async fn disable_actor(&self, subject: &Subject, actor: &Actor) -> AppResult<Actor> {
        self.authorization_service.require_account_permissions(
            subject,
            actor.account_id,
            &[Permission::ActorsManage],
        )?;

        let now = Utc::now();
        let mut outbox = NotificationOutbox::default();
        let mut transaction = self.store.begin(subject.account_id()).await?;

        let mut stored = load_current_actor(transaction.as_mut(), actor).await?;
        if !stored.is_enabled() {
            return Ok(stored);
        }

        ensure_other_enabled_admin(transaction.as_mut(), &stored, AdminRemoval::Disable).await?;

        let counts = revoke_actor_access(transaction.as_mut(), &stored, now, &mut outbox).await?;
        stored.disabled_at = Some(now);
        let updated = transaction.update_actor(&stored).await?;

        transaction.commit().await?;
        outbox.publish(self.notification_bus.as_ref());

        info!(
            account_id = %updated.account_id,
            actor_id = %updated.id,
            sessions_invalidated = counts.sessions_invalidated,
            grants_expired = counts.grants_expired,
            "actor disabled"
        );

        Ok(updated)
    }

    /// Re-enables a disabled actor and re-announces its access.
    pub async fn enable_actor(&self, subject: &Subject, actor: &Actor) -> AppResult<Actor> {
        self.authorization_service.require_account_permissions(
            subject,
            actor.account_id,
            &[Permission::ActorsManage],
        )?;

        let now = Utc::now();
        let mut outbox = NotificationOutbox::default();
        let mut transaction = self.store.begin(subject.account_id()).await?;

        let mut stored = load_current_actor(transaction.as_mut(), actor).await?;
        if stored.is_enabled() {
            return Ok(stored);
        }

        stored.disabled_at = None;
        let updated = transaction.update_actor(&stored).await?;
        restore_actor_access(transaction.as_mut(), &updated, now, &mut outbox).await?;

        transaction.commit().await?;
        outbox.publish(self.notification_bus.as_ref());

        info!(
            account_id = %updated.account_id,
            actor_id = %updated.id,
            "actor enabled"
        );

        Ok(updated)
    }

    /// Changes the actor type, guarding the last enabled administrator.
    pub async fn update_actor_type(
        &self,
        subject: &Subject,
        actor: &Actor,
        actor_type: ActorType,
    ) -> AppResult<Actor> {
        self.authorization_service.require_account_permissions(
            subject,
            actor.account_id,
            &[Permission::ActorsManage],
        )?;

        let now = Utc::now();
        let mut outbox = NotificationOutbox::default();
        let mut transaction = self.store.begin(subject.account_id()).await?;

        let mut stored = load_current_actor(transaction.as_mut(), actor).await?;
        if stored.actor_type == actor_type {
            return Ok(stored);
        }

        if !actor_type.is_admin() {
            ensure_other_enabled_admin(transaction.as_mut(), &stored, AdminRemoval::Demote)
                .await?;
        }

        stored.actor_type = actor_type;
        let updated = transaction.update_actor(&stored).await?;
        let managed = reconcile_managed_memberships(transaction.as_mut(), now, &mut outbox).await?;

        transaction.commit().await?;
        outbox.publish(self.notification_bus.as_ref());

        info!(
            account_id = %updated.account_id,
            actor_id = %updated.id,
            actor_type = updated.actor_type.as_str(),
            managed_inserted = managed.inserted,
            managed_deleted = managed.deleted,
            "actor type updated"
        );

        Ok(updated)
    }

    /// Deletes an actor with its memberships, clients, identities and sessions.
    pub async fn delete_actor(&self, subject: &Subject, actor: &Actor) -> AppResult<ActorDeletion> {
        self.authorization_service.require_account_permissions(
            subject,
            actor.account_id,
            &[Permission::ActorsManage],
        )?;

        let now = Utc::now();
        let mut outbox = NotificationOutbox::default();
        let mut transaction = self.store.begin(subject.account_id()).await?;

        let stored = load_current_actor(transaction.as_mut(), actor).await?;
        ensure_other_enabled_admin(transaction.as_mut(), &stored, AdminRemoval::Delete).await?;

        let counts = remove_actor(transaction.as_mut(), &stored, now, &mut outbox).await?;
        let managed = reconcile_managed_memberships(transaction.as_mut(), now, &mut outbox).await?;

        transaction.commit().await?;
        outbox.publish(self.notification_bus.as_ref());

        info!(
            account_id = %stored.account_id,
            actor_id = %stored.id,
            memberships_deleted = counts.memberships_deleted,
            clients_deleted = counts.clients_deleted,
            identities_deleted = counts.identities_deleted,
            sessions_invalidated = counts.sessions_invalidated,
            grants_expired = counts.grants_expired,
            "actor deleted"
        );

        Ok(ActorDeletion {
            actor: stored,
            counts,
            managed,
        })
    }
}
