//! Downstream effects of committed membership, actor and group changes.
//!
//! Every function here runs inside the caller's unit of work and only records
//! notifications in a [`NotificationOutbox`]; the owning service publishes the
//! outbox after the unit commits.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use portcullis_core::AppResult;
use portcullis_domain::{
    AccessChange, AccessEvent, Actor, ActorId, Group, GroupId, Membership, Notification, Policy,
};
use tracing::debug;

use crate::{AccountTransaction, GrantFilter, MembershipFilter, NotificationBus};

/// Notifications collected during one unit of work.
#[derive(Debug, Default)]
pub(crate) struct NotificationOutbox {
    notifications: Vec<Notification>,
    seen: HashSet<Notification>,
}

impl NotificationOutbox {
    pub(crate) fn push(&mut self, notification: Notification) {
        if self.seen.insert(notification) {
            self.notifications.push(notification);
        }
    }

    /// Publishes every collected notification once, in insertion order.
    pub(crate) fn publish(self, bus: &dyn NotificationBus) -> usize {
        let published = self.notifications.len();
        for notification in self.notifications {
            bus.publish(notification);
        }
        published
    }
}

/// Row counts of an actor removal cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActorCascadeCounts {
    /// Memberships deleted with the actor.
    pub memberships_deleted: usize,
    /// Client registrations deleted with the actor.
    pub clients_deleted: u64,
    /// Directory identities deleted with the actor.
    pub identities_deleted: u64,
    /// Sessions invalidated.
    pub sessions_invalidated: usize,
    /// In-flight access grants expired.
    pub grants_expired: usize,
}

/// Row counts of a group removal cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupCascadeCounts {
    /// Memberships deleted with the group.
    pub memberships_deleted: usize,
    /// Policies deleted with the group.
    pub policies_deleted: u64,
}

/// Records access events for committed membership inserts and deletes.
///
/// Memberships of disabled actors produce no events: their access was revoked
/// when they were disabled.
pub(crate) async fn propagate_membership_changes(
    transaction: &mut dyn AccountTransaction,
    added: &[Membership],
    removed: &[Membership],
    now: DateTime<Utc>,
    outbox: &mut NotificationOutbox,
) -> AppResult<()> {
    let mut enabled_actors: HashMap<ActorId, bool> = HashMap::new();
    let mut changes = Vec::with_capacity(added.len() + removed.len());

    let tagged = added
        .iter()
        .map(|membership| (*membership, AccessChange::Granted))
        .chain(
            removed
                .iter()
                .map(|membership| (*membership, AccessChange::Revoked)),
        );
    for (membership, change) in tagged {
        let is_enabled = match enabled_actors.get(&membership.actor_id) {
            Some(is_enabled) => *is_enabled,
            None => {
                let is_enabled = transaction
                    .find_actor(membership.actor_id)
                    .await?
                    .is_some_and(|actor| actor.is_enabled());
                enabled_actors.insert(membership.actor_id, is_enabled);
                is_enabled
            }
        };

        if is_enabled {
            changes.push((membership, change));
        }
    }

    record_access_changes(transaction, &changes, now, outbox).await
}

/// Revokes every access of an actor being disabled without touching its rows.
pub(crate) async fn revoke_actor_access(
    transaction: &mut dyn AccountTransaction,
    actor: &Actor,
    now: DateTime<Utc>,
    outbox: &mut NotificationOutbox,
) -> AppResult<ActorCascadeCounts> {
    let memberships = transaction
        .list_memberships(MembershipFilter::Actor(actor.id))
        .await?;
    let revoked: Vec<_> = memberships
        .into_iter()
        .map(|membership| (membership, AccessChange::Revoked))
        .collect();
    record_access_changes(transaction, &revoked, now, outbox).await?;

    let (sessions_invalidated, grants_expired) =
        end_actor_sessions(transaction, actor.id, now, outbox).await?;

    Ok(ActorCascadeCounts {
        sessions_invalidated,
        grants_expired,
        ..ActorCascadeCounts::default()
    })
}

/// Records grant events for every membership of a re-enabled actor.
pub(crate) async fn restore_actor_access(
    transaction: &mut dyn AccountTransaction,
    actor: &Actor,
    now: DateTime<Utc>,
    outbox: &mut NotificationOutbox,
) -> AppResult<()> {
    let memberships = transaction
        .list_memberships(MembershipFilter::Actor(actor.id))
        .await?;
    let granted: Vec<_> = memberships
        .into_iter()
        .map(|membership| (membership, AccessChange::Granted))
        .collect();
    record_access_changes(transaction, &granted, now, outbox).await
}

/// Removes an actor and everything that depends on it.
///
/// Order: access events, sessions, grants, memberships, clients, identities,
/// then the actor row itself (version-checked).
pub(crate) async fn remove_actor(
    transaction: &mut dyn AccountTransaction,
    actor: &Actor,
    now: DateTime<Utc>,
    outbox: &mut NotificationOutbox,
) -> AppResult<ActorCascadeCounts> {
    let memberships = transaction
        .list_memberships(MembershipFilter::Actor(actor.id))
        .await?;

    if actor.is_enabled() {
        let revoked: Vec<_> = memberships
            .iter()
            .map(|membership| (*membership, AccessChange::Revoked))
            .collect();
        record_access_changes(transaction, &revoked, now, outbox).await?;
    }

    let (sessions_invalidated, grants_expired) =
        end_actor_sessions(transaction, actor.id, now, outbox).await?;

    let mut memberships_deleted = 0;
    for membership in memberships {
        if transaction.delete_membership(membership).await? {
            memberships_deleted += 1;
        }
    }

    let clients_deleted = transaction.delete_clients_for_actor(actor.id).await?;
    let identities_deleted = transaction.delete_identities_for_actor(actor.id).await?;
    transaction.delete_actor(actor).await?;

    let counts = ActorCascadeCounts {
        memberships_deleted,
        clients_deleted,
        identities_deleted,
        sessions_invalidated,
        grants_expired,
    };
    debug!(actor_id = %actor.id, ?counts, "actor removal cascade recorded");

    Ok(counts)
}

/// Removes a group with its memberships and every policy referencing it.
pub(crate) async fn remove_group(
    transaction: &mut dyn AccountTransaction,
    group: &Group,
    now: DateTime<Utc>,
    outbox: &mut NotificationOutbox,
) -> AppResult<GroupCascadeCounts> {
    let memberships = transaction
        .list_memberships(MembershipFilter::Group(group.id))
        .await?;

    propagate_membership_changes(transaction, &[], &memberships, now, outbox).await?;

    let mut memberships_deleted = 0;
    for membership in memberships {
        if transaction.delete_membership(membership).await? {
            memberships_deleted += 1;
        }
    }

    let policies_deleted = transaction.delete_policies_for_group(group.id).await?;
    transaction.delete_group(group).await?;

    Ok(GroupCascadeCounts {
        memberships_deleted,
        policies_deleted,
    })
}

async fn record_access_changes(
    transaction: &mut dyn AccountTransaction,
    changes: &[(Membership, AccessChange)],
    now: DateTime<Utc>,
    outbox: &mut NotificationOutbox,
) -> AppResult<()> {
    if changes.is_empty() {
        return Ok(());
    }

    let mut group_ids: Vec<GroupId> = changes
        .iter()
        .map(|(membership, _)| membership.group_id)
        .collect();
    group_ids.sort();
    group_ids.dedup();

    let mut policies_by_group: HashMap<GroupId, Vec<Policy>> = HashMap::new();
    for policy in transaction.list_policies_for_groups(&group_ids).await? {
        policies_by_group
            .entry(policy.group_id)
            .or_default()
            .push(policy);
    }

    for (membership, change) in changes {
        let Some(policies) = policies_by_group.get(&membership.group_id) else {
            continue;
        };

        for policy in policies {
            outbox.push(Notification::Access(AccessEvent {
                account_id: membership.account_id,
                actor_id: membership.actor_id,
                policy_id: policy.id,
                group_id: policy.group_id,
                resource_id: policy.resource_id,
                change: *change,
            }));

            if *change == AccessChange::Revoked {
                let expired = transaction
                    .expire_grants(
                        GrantFilter::actor_policy(membership.actor_id, policy.id),
                        now,
                    )
                    .await?;
                for grant in expired {
                    outbox.push(Notification::GrantExpired {
                        account_id: grant.account_id,
                        actor_id: grant.actor_id,
                        grant_id: grant.id,
                        resource_id: grant.resource_id,
                    });
                }
            }
        }
    }

    Ok(())
}

async fn end_actor_sessions(
    transaction: &mut dyn AccountTransaction,
    actor_id: ActorId,
    now: DateTime<Utc>,
    outbox: &mut NotificationOutbox,
) -> AppResult<(usize, usize)> {
    let sessions = transaction
        .invalidate_sessions_for_actor(actor_id, now)
        .await?;
    for session in &sessions {
        outbox.push(Notification::SessionInvalidated {
            account_id: session.account_id,
            actor_id: session.actor_id,
            session_id: session.id,
        });
    }

    let grants = transaction
        .expire_grants(GrantFilter::actor(actor_id), now)
        .await?;
    for grant in &grants {
        outbox.push(Notification::GrantExpired {
            account_id: grant.account_id,
            actor_id: grant.actor_id,
            grant_id: grant.id,
            resource_id: grant.resource_id,
        });
    }

    Ok((sessions.len(), grants.len()))
}
