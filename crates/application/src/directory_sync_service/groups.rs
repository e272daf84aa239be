use std::collections::HashMap;

use chrono::Utc;
use portcullis_core::AppResult;
use portcullis_domain::{Group, Permission, ProviderId, Subject};
use tracing::info;

use super::plan::{dedupe_last_wins, plan_sync};
use super::{DirectorySyncService, GroupRecord, GroupSyncOutcome, SyncCounts, SyncOutcome};
use crate::cascade::{NotificationOutbox, remove_group};

impl DirectorySyncService {
    /// Replaces the provider's groups with the incoming roster.
    ///
    /// Runs as one unit of work: the circuit breaker, any invalid record or any
    /// store failure leaves the account untouched.
    pub async fn sync_groups(
        &self,
        subject: &Subject,
        provider_id: ProviderId,
        records: Vec<GroupRecord>,
    ) -> AppResult<GroupSyncOutcome> {
        self.authorization_service
            .require_permissions(subject, &[Permission::DirectorySync])?;

        let account_id = subject.account_id();
        let now = Utc::now();
        let records = dedupe_last_wins(records, |record| record.provider_identifier.clone());

        let mut transaction = self.store.begin(account_id).await?;

        let mut owned: HashMap<String, Group> = HashMap::new();
        let mut owned_identifiers = Vec::new();
        for group in transaction.list_provider_groups(provider_id).await? {
            if let Some(identifier) = group.origin.provider_identifier() {
                owned_identifiers.push(identifier.to_owned());
                owned.insert(identifier.to_owned(), group);
            }
        }

        let incoming_identifiers: Vec<String> = records
            .iter()
            .map(|record| record.provider_identifier.clone())
            .collect();
        let plan = plan_sync(&owned_identifiers, &incoming_identifiers);

        self.circuit_breaker
            .check(owned_identifiers.len(), plan.delete.len())?;

        let mut counts = SyncCounts::default();
        let mut outbox = NotificationOutbox::default();
        let mut upserted = Vec::with_capacity(records.len());

        for record in records {
            match owned.remove(&record.provider_identifier) {
                Some(mut group) => {
                    if group.apply_sync(&record.name, record.attributes, now)? {
                        group = transaction.update_group(&group).await?;
                        counts.updated += 1;
                    }
                    upserted.push(group);
                }
                None => {
                    let group = Group::new_synced(
                        account_id,
                        provider_id,
                        &record.provider_identifier,
                        &record.name,
                        record.attributes,
                        now,
                    )?;
                    transaction.insert_group(&group).await?;
                    counts.inserted += 1;
                    upserted.push(group);
                }
            }
        }

        let mut deleted = Vec::with_capacity(plan.delete.len());
        for identifier in &plan.delete {
            let Some(group) = owned.remove(identifier) else {
                continue;
            };

            let cascade = remove_group(transaction.as_mut(), &group, now, &mut outbox).await?;
            counts.deleted += 1;
            counts.memberships_deleted += cascade.memberships_deleted;
            counts.policies_deleted += cascade.policies_deleted;
            deleted.push(group);
        }

        transaction.commit().await?;
        let notifications = outbox.publish(self.notification_bus.as_ref());

        info!(
            account_id = %account_id,
            provider_id = %provider_id,
            inserted = counts.inserted,
            updated = counts.updated,
            deleted = counts.deleted,
            memberships_deleted = counts.memberships_deleted,
            policies_deleted = counts.policies_deleted,
            notifications,
            "group sync committed"
        );

        Ok(SyncOutcome {
            upserted,
            deleted,
            plan,
            counts,
        })
    }
}
