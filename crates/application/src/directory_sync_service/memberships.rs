use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use portcullis_core::AppResult;
use portcullis_domain::{ActorId, GroupId, Membership, Permission, ProviderId, Subject};
use tracing::{info, warn};

use super::plan::{MembershipKey, plan_sync};
use super::{DirectorySyncService, MembershipRecord, MembershipSyncOutcome, SyncCounts, SyncOutcome};
use crate::MembershipFilter;
use crate::cascade::{NotificationOutbox, propagate_membership_changes};

impl DirectorySyncService {
    /// Replaces the memberships of the provider's groups with the incoming tuples.
    ///
    /// `actor_index` maps external actor identifiers to local actors and is
    /// built by the identity-sync collaborator. Tuples naming a group the
    /// provider does not own, or an actor that is unmapped or outside the
    /// account, are skipped.
    pub async fn sync_memberships(
        &self,
        subject: &Subject,
        provider_id: ProviderId,
        records: Vec<MembershipRecord>,
        actor_index: &HashMap<String, ActorId>,
    ) -> AppResult<MembershipSyncOutcome> {
        self.authorization_service
            .require_permissions(subject, &[Permission::DirectorySync])?;

        let account_id = subject.account_id();
        let now = Utc::now();
        let mut transaction = self.store.begin(account_id).await?;

        let provider_groups: HashMap<String, GroupId> = transaction
            .list_provider_groups(provider_id)
            .await?
            .into_iter()
            .filter_map(|group| {
                group
                    .origin
                    .provider_identifier()
                    .map(|identifier| (identifier.to_owned(), group.id))
            })
            .collect();

        let mut counts = SyncCounts::default();
        let mut account_actors: HashMap<ActorId, bool> = HashMap::new();
        let mut incoming = Vec::with_capacity(records.len());

        for record in records {
            let group_id = provider_groups.get(&record.group_identifier).copied();
            let actor_id = actor_index.get(&record.actor_identifier).copied();
            let (Some(group_id), Some(actor_id)) = (group_id, actor_id) else {
                counts.skipped += 1;
                continue;
            };

            let in_account = match account_actors.get(&actor_id) {
                Some(in_account) => *in_account,
                None => {
                    let in_account = transaction.find_actor(actor_id).await?.is_some();
                    account_actors.insert(actor_id, in_account);
                    in_account
                }
            };
            if !in_account {
                counts.skipped += 1;
                continue;
            }

            incoming.push(MembershipKey { group_id, actor_id });
        }

        if counts.skipped > 0 {
            warn!(
                account_id = %account_id,
                provider_id = %provider_id,
                skipped = counts.skipped,
                "membership sync skipped unresolved tuples"
            );
        }

        let group_ids: Vec<GroupId> = provider_groups.values().copied().collect();
        let current: BTreeSet<MembershipKey> = if group_ids.is_empty() {
            BTreeSet::new()
        } else {
            transaction
                .list_memberships(MembershipFilter::Groups(group_ids))
                .await?
                .into_iter()
                .map(|membership| MembershipKey {
                    group_id: membership.group_id,
                    actor_id: membership.actor_id,
                })
                .collect()
        };
        let current_keys: Vec<MembershipKey> = current.iter().copied().collect();
        let plan = plan_sync(&current_keys, &incoming);

        let mut added = Vec::new();
        let mut upserted = Vec::with_capacity(plan.upsert.len());
        for key in &plan.upsert {
            let membership = Membership::new(account_id, key.actor_id, key.group_id);
            if !current.contains(key) && transaction.insert_membership(membership).await? {
                added.push(membership);
                counts.inserted += 1;
            }
            upserted.push(membership);
        }

        let mut deleted = Vec::with_capacity(plan.delete.len());
        for key in &plan.delete {
            let membership = Membership::new(account_id, key.actor_id, key.group_id);
            if transaction.delete_membership(membership).await? {
                deleted.push(membership);
                counts.deleted += 1;
            }
        }

        let mut outbox = NotificationOutbox::default();
        propagate_membership_changes(transaction.as_mut(), &added, &deleted, now, &mut outbox)
            .await?;

        transaction.commit().await?;
        let notifications = outbox.publish(self.notification_bus.as_ref());

        info!(
            account_id = %account_id,
            provider_id = %provider_id,
            inserted = counts.inserted,
            deleted = counts.deleted,
            skipped = counts.skipped,
            notifications,
            "membership sync committed"
        );

        Ok(SyncOutcome {
            upserted,
            deleted,
            plan,
            counts,
        })
    }
}
