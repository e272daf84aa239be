use std::collections::HashMap;

use portcullis_application::{DeletionThreshold, GroupRecord, MembershipRecord};
use portcullis_core::AppError;
use portcullis_domain::{AccessChange, ActorType, GroupOrigin, Notification, ProviderId};
use serde_json::{Map, Value, json};

use super::Harness;

fn record(identifier: &str, name: &str) -> GroupRecord {
    GroupRecord {
        provider_identifier: identifier.to_owned(),
        name: name.to_owned(),
        attributes: Map::new(),
    }
}

fn membership_record(group: &str, actor: &str) -> MembershipRecord {
    MembershipRecord {
        group_identifier: group.to_owned(),
        actor_identifier: actor.to_owned(),
    }
}

#[tokio::test]
async fn first_sync_creates_provider_owned_group() {
    let harness = Harness::new(DeletionThreshold::Absolute(2));
    let provider_id = ProviderId::new();

    let outcome = harness
        .sync
        .sync_groups(&harness.sync_subject(), provider_id, vec![record("G1", "Eng")])
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(outcome.plan.upsert, vec!["G1".to_owned()]);
    assert!(outcome.plan.delete.is_empty());
    assert_eq!(outcome.counts.inserted, 1);
    assert_eq!(outcome.upserted.len(), 1);

    let snapshot = harness.store.snapshot(harness.account_id).await;
    let groups: Vec<_> = snapshot.groups.values().collect();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].name.as_str(), "Eng");
    assert!(groups[0].origin.is_owned_by(provider_id));
    assert_eq!(groups[0].origin.provider_identifier(), Some("G1"));
}

#[tokio::test]
async fn empty_roster_beyond_threshold_leaves_store_unchanged() {
    let harness = Harness::new(DeletionThreshold::Absolute(2));
    let provider_id = ProviderId::new();
    let subject = harness.sync_subject();

    let seeded = harness
        .sync
        .sync_groups(
            &subject,
            provider_id,
            vec![record("G1", "Eng"), record("G2", "Ops")],
        )
        .await;
    assert!(seeded.is_ok());
    let before = harness.store.snapshot(harness.account_id).await;
    let mut subscription = harness.subscribe_account();

    let result = harness
        .sync
        .sync_groups(&subject, provider_id, Vec::new())
        .await;

    assert!(matches!(
        result,
        Err(AppError::SyncDeletionTooLarge {
            deletions: 2,
            owned: 2
        })
    ));
    assert_eq!(harness.store.snapshot(harness.account_id).await, before);
    assert!(subscription.drain().is_empty());
}

#[tokio::test]
async fn invalid_record_after_earlier_writes_rolls_back_the_whole_sync() {
    let harness = Harness::new(DeletionThreshold::Absolute(10));
    let provider_id = ProviderId::new();
    let subject = harness.sync_subject();
    let ada = harness.create_actor("Ada", ActorType::AccountUser).await;

    let seeded = harness
        .sync
        .sync_groups(
            &subject,
            provider_id,
            vec![record("G0", "Legacy"), record("G1", "Eng")],
        )
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    let legacy = seeded.upserted[0].clone();
    harness.seed_policy(legacy.id).await;
    harness.seed_membership(ada.id, legacy.id).await;
    let before = harness.store.snapshot(harness.account_id).await;
    let mut subscription = harness.subscribe_account();

    let result = harness
        .sync
        .sync_groups(
            &subject,
            provider_id,
            vec![
                record("G1", "Engineering"),
                record("G3", "Ops"),
                record("G2", "   "),
            ],
        )
        .await;

    match result {
        Err(AppError::InvalidFields(errors)) => {
            assert!(errors.iter().any(|error| error.field == "name"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(harness.store.snapshot(harness.account_id).await, before);
    assert!(subscription.drain().is_empty());
}

#[tokio::test]
async fn ratio_threshold_allows_small_share_of_deletions() {
    let harness = Harness::new(DeletionThreshold::Ratio(0.5));
    let provider_id = ProviderId::new();
    let subject = harness.sync_subject();

    let roster: Vec<_> = ["G1", "G2", "G3", "G4"]
        .iter()
        .map(|identifier| record(identifier, identifier))
        .collect();
    assert!(harness.sync.sync_groups(&subject, provider_id, roster.clone()).await.is_ok());

    let outcome = harness
        .sync
        .sync_groups(&subject, provider_id, roster[1..].to_vec())
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert_eq!(outcome.plan.delete, vec!["G1".to_owned()]);
    assert_eq!(outcome.counts.deleted, 1);

    let tripped = harness
        .sync
        .sync_groups(&subject, provider_id, roster[3..].to_vec())
        .await;
    assert!(matches!(tripped, Err(AppError::SyncDeletionTooLarge { .. })));
}

#[tokio::test]
async fn resync_of_unchanged_roster_writes_nothing() {
    let harness = Harness::new(DeletionThreshold::Absolute(10));
    let provider_id = ProviderId::new();
    let subject = harness.sync_subject();
    let mut attributes = Map::new();
    attributes.insert("mail".to_owned(), Value::from("eng@example.com"));
    let roster = vec![GroupRecord {
        provider_identifier: "G1".to_owned(),
        name: "Eng".to_owned(),
        attributes,
    }];

    assert!(harness.sync.sync_groups(&subject, provider_id, roster.clone()).await.is_ok());
    let before = harness.store.snapshot(harness.account_id).await;

    let outcome = harness
        .sync
        .sync_groups(&subject, provider_id, roster)
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(outcome.counts.mutations(), 0);
    assert_eq!(harness.store.snapshot(harness.account_id).await, before);
}

#[tokio::test]
async fn changed_attributes_update_in_place_and_keep_attribution() {
    let harness = Harness::new(DeletionThreshold::Absolute(10));
    let provider_id = ProviderId::new();
    let subject = harness.sync_subject();

    let created = harness
        .sync
        .sync_groups(&subject, provider_id, vec![record("G1", "Eng")])
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    let original = created.upserted[0].clone();

    let mut renamed = record("G1", "Engineering");
    renamed.attributes = match json!({ "department": "R&D" }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let outcome = harness
        .sync
        .sync_groups(&subject, provider_id, vec![renamed])
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(outcome.counts.updated, 1);
    assert_eq!(outcome.counts.inserted, 0);
    let updated = &outcome.upserted[0];
    assert_eq!(updated.id, original.id);
    assert_eq!(updated.name.as_str(), "Engineering");
    assert_eq!(updated.created_by, original.created_by);
    assert_eq!(updated.version, original.version + 1);
}

#[tokio::test]
async fn sync_only_considers_rows_of_the_provider_under_sync() {
    let harness = Harness::new(DeletionThreshold::Absolute(10));
    let provider_id = ProviderId::new();
    let other_provider = ProviderId::new();
    let subject = harness.sync_subject();

    let manual = harness.create_group("Hand curated").await;
    assert!(harness
        .sync
        .sync_groups(&subject, other_provider, vec![record("G1", "Other")])
        .await
        .is_ok());
    assert!(harness
        .sync
        .sync_groups(&subject, provider_id, vec![record("G1", "Mine")])
        .await
        .is_ok());

    let outcome = harness
        .sync
        .sync_groups(&subject, provider_id, Vec::new())
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert_eq!(outcome.counts.deleted, 1);

    let snapshot = harness.store.snapshot(harness.account_id).await;
    assert!(snapshot.groups.contains_key(&manual.id));
    let remaining: Vec<_> = snapshot
        .groups
        .values()
        .filter_map(|group| match &group.origin {
            GroupOrigin::Synced { provider_id, .. } => Some(*provider_id),
            _ => None,
        })
        .collect();
    assert_eq!(remaining, vec![other_provider]);
}

#[tokio::test]
async fn deleting_synced_group_cascades_memberships_and_policies() {
    let harness = Harness::new(DeletionThreshold::Absolute(10));
    let provider_id = ProviderId::new();
    let subject = harness.sync_subject();
    let actor = harness.create_actor("Ada", ActorType::AccountUser).await;

    let created = harness
        .sync
        .sync_groups(&subject, provider_id, vec![record("G1", "Eng")])
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    let group = created.upserted[0].clone();
    let policy = harness.seed_policy(group.id).await;
    harness.seed_membership(actor.id, group.id).await;
    let mut subscription = harness.subscribe_account();

    let outcome = harness
        .sync
        .sync_groups(&subject, provider_id, Vec::new())
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(outcome.counts.deleted, 1);
    assert_eq!(outcome.counts.memberships_deleted, 1);
    assert_eq!(outcome.counts.policies_deleted, 1);

    let snapshot = harness.store.snapshot(harness.account_id).await;
    assert!(!snapshot.groups.contains_key(&group.id));
    assert!(snapshot.memberships.is_empty());
    assert!(snapshot.policies.is_empty());

    let notifications = subscription.drain();
    assert_eq!(notifications.len(), 1);
    assert!(matches!(
        notifications[0],
        Notification::Access(event)
            if event.change == AccessChange::Revoked
                && event.actor_id == actor.id
                && event.policy_id == policy.id
    ));
}

#[tokio::test]
async fn membership_sync_resolves_tuples_and_skips_unknown_ones() {
    let harness = Harness::new(DeletionThreshold::Absolute(10));
    let provider_id = ProviderId::new();
    let subject = harness.sync_subject();
    let ada = harness.create_actor("Ada", ActorType::AccountUser).await;
    let grace = harness.create_actor("Grace", ActorType::AccountUser).await;

    let groups = harness
        .sync
        .sync_groups(&subject, provider_id, vec![record("G1", "Eng")])
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    let group = groups.upserted[0].clone();
    let policy = harness.seed_policy(group.id).await;

    let actor_index = HashMap::from([
        ("ada".to_owned(), ada.id),
        ("grace".to_owned(), grace.id),
    ]);
    let mut subscription = harness.subscribe_account();

    let outcome = harness
        .sync
        .sync_memberships(
            &subject,
            provider_id,
            vec![
                membership_record("G1", "ada"),
                membership_record("G1", "grace"),
                membership_record("G1", "unknown"),
                membership_record("G9", "ada"),
            ],
            &actor_index,
        )
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(outcome.counts.inserted, 2);
    assert_eq!(outcome.counts.skipped, 2);
    let granted: Vec<_> = subscription
        .drain()
        .into_iter()
        .filter_map(|notification| match notification {
            Notification::Access(event) if event.change == AccessChange::Granted => {
                Some((event.actor_id, event.policy_id))
            }
            _ => None,
        })
        .collect();
    assert_eq!(granted.len(), 2);
    assert!(granted.contains(&(ada.id, policy.id)));
    assert!(granted.contains(&(grace.id, policy.id)));

    let replayed = harness
        .sync
        .sync_memberships(
            &subject,
            provider_id,
            vec![membership_record("G1", "ada")],
            &actor_index,
        )
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert_eq!(replayed.counts.inserted, 0);
    assert_eq!(replayed.counts.deleted, 1);
    assert_eq!(replayed.deleted[0].actor_id, grace.id);
}

#[tokio::test]
async fn membership_sync_never_touches_manual_group_members() {
    let harness = Harness::new(DeletionThreshold::Absolute(10));
    let provider_id = ProviderId::new();
    let ada = harness.create_actor("Ada", ActorType::AccountUser).await;
    let manual = harness.create_group("Hand curated").await;
    let membership = harness.seed_membership(ada.id, manual.id).await;

    let outcome = harness
        .sync
        .sync_memberships(
            &harness.sync_subject(),
            provider_id,
            Vec::new(),
            &HashMap::new(),
        )
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(outcome.counts.mutations(), 0);
    let snapshot = harness.store.snapshot(harness.account_id).await;
    assert!(snapshot.memberships.contains(&membership));
}
