//! Reconciliation of system-managed group memberships.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use portcullis_core::AppResult;
use portcullis_domain::{ActorId, Group, ManagedGroupKind, Membership};
use tracing::info;

use crate::cascade::{NotificationOutbox, propagate_membership_changes};
use crate::{AccountTransaction, MembershipFilter};

/// Writes performed by one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagedReconciliation {
    /// Managed groups examined.
    pub groups: usize,
    /// Memberships inserted.
    pub inserted: usize,
    /// Memberships deleted.
    pub deleted: usize,
}

impl ManagedReconciliation {
    /// Returns whether the pass wrote anything.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.deleted == 0
    }
}

/// Brings every managed group of the transaction's account in line with its rule.
///
/// Running it against unchanged state writes nothing.
pub(crate) async fn reconcile_managed_memberships(
    transaction: &mut dyn AccountTransaction,
    now: DateTime<Utc>,
    outbox: &mut NotificationOutbox,
) -> AppResult<ManagedReconciliation> {
    let managed_groups: Vec<Group> = transaction
        .list_groups()
        .await?
        .into_iter()
        .filter(|group| group.managed_kind().is_some())
        .collect();

    let mut reconciliation = ManagedReconciliation {
        groups: managed_groups.len(),
        ..ManagedReconciliation::default()
    };
    if managed_groups.is_empty() {
        return Ok(reconciliation);
    }

    let actors = transaction.list_actors().await?;
    let account_id = transaction.account_id();

    for group in managed_groups {
        let Some(kind) = group.managed_kind() else {
            continue;
        };

        let desired: BTreeSet<ActorId> = match kind {
            ManagedGroupKind::Everyone => actors
                .iter()
                .filter(|actor| actor.is_managed_group_member())
                .map(|actor| actor.id)
                .collect(),
        };
        let current: BTreeSet<ActorId> = transaction
            .list_memberships(MembershipFilter::Group(group.id))
            .await?
            .into_iter()
            .map(|membership| membership.actor_id)
            .collect();

        let mut added = Vec::new();
        for actor_id in desired.difference(&current) {
            let membership = Membership::new(account_id, *actor_id, group.id);
            if transaction.insert_membership(membership).await? {
                added.push(membership);
            }
        }

        let mut removed = Vec::new();
        for actor_id in current.difference(&desired) {
            let membership = Membership::new(account_id, *actor_id, group.id);
            if transaction.delete_membership(membership).await? {
                removed.push(membership);
            }
        }

        propagate_membership_changes(transaction, &added, &removed, now, outbox).await?;
        reconciliation.inserted += added.len();
        reconciliation.deleted += removed.len();
    }

    if !reconciliation.is_noop() {
        info!(
            account_id = %account_id,
            groups = reconciliation.groups,
            inserted = reconciliation.inserted,
            deleted = reconciliation.deleted,
            "managed memberships reconciled"
        );
    }

    Ok(reconciliation)
}
