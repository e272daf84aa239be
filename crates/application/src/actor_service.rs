use std::sync::Arc;

use chrono::Utc;
use portcullis_core::{AppError, AppResult};
use portcullis_domain::{Actor, ActorId, NewActor, Permission, Subject};
use tracing::info;

use crate::cascade::{ActorCascadeCounts, NotificationOutbox};
use crate::managed_membership::{ManagedReconciliation, reconcile_managed_memberships};
use crate::{AccountStore, AccountTransaction, AuthorizationService, NotificationBus};

mod admin_guard;
mod lifecycle;

/// Result of a committed actor deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorDeletion {
    /// Deleted actor as it was stored.
    pub actor: Actor,
    /// Rows removed or expired with the actor.
    pub counts: ActorCascadeCounts,
    /// Managed-membership writes triggered by the deletion.
    pub managed: ManagedReconciliation,
}

/// Application service for actor lifecycle workflows.
#[derive(Clone)]
pub struct ActorService {
    authorization_service: AuthorizationService,
    store: Arc<dyn AccountStore>,
    notification_bus: Arc<dyn NotificationBus>,
}

impl ActorService {
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

    /// Returns one actor of the subject's account.
    pub async fn fetch_actor(&self, subject: &Subject, actor_id: ActorId) -> AppResult<Actor> {
        self.authorization_service
            .require_permissions(subject, &[Permission::ActorsRead])?;

        let mut transaction = self.store.begin(subject.account_id()).await?;
        transaction
            .find_actor(actor_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("actor '{actor_id}' not found")))
    }

    /// Lists actors of the subject's account.
    pub async fn list_actors(&self, subject: &Subject) -> AppResult<Vec<Actor>> {
        self.authorization_service
            .require_permissions(subject, &[Permission::ActorsRead])?;

        let mut transaction = self.store.begin(subject.account_id()).await?;
        transaction.list_actors().await
    }

    /// Creates an actor and adds it to every managed group it qualifies for.
    pub async fn create_actor(&self, subject: &Subject, input: NewActor) -> AppResult<Actor> {
        self.authorization_service
            .require_permissions(subject, &[Permission::ActorsManage])?;

        let account_id = subject.account_id();
        let actor = Actor::new(account_id, input, subject.created_by())?;
        let now = Utc::now();
        let mut outbox = NotificationOutbox::default();

        let mut transaction = self.store.begin(account_id).await?;
        transaction.insert_actor(&actor).await?;
        let managed = reconcile_managed_memberships(transaction.as_mut(), now, &mut outbox).await?;
        transaction.commit().await?;
        outbox.publish(self.notification_bus.as_ref());

        info!(
            account_id = %account_id,
            actor_id = %actor.id,
            actor_type = actor.actor_type.as_str(),
            managed_inserted = managed.inserted,
            "actor created"
        );

        Ok(actor)
    }
}

/// Reloads the stored actor and fails when the caller's copy is out of date.
async fn load_current_actor(
    transaction: &mut dyn AccountTransaction,
    actor: &Actor,
) -> AppResult<Actor> {
    let stored = transaction
        .find_actor(actor.id)
        .await?
        .ok_or_else(|| AppError::Stale(format!("actor '{}' no longer exists", actor.id)))?;

    if stored.version != actor.version {
        return Err(AppError::Stale(format!(
            "actor '{}' changed since version {}",
            actor.id, actor.version
        )));
    }

    Ok(stored)
}
