use portcullis_application::{DeletionThreshold, GroupRecord};
use portcullis_core::{AccountId, AppError};
use portcullis_domain::{
    AccessChange, ActorId, ActorType, ManagedGroupKind, Notification, Permission, ProviderId,
    Subject, Topic,
};
use serde_json::Map;

use super::Harness;

#[tokio::test]
async fn synced_and_managed_groups_reject_direct_edits() {
    let harness = Harness::new(DeletionThreshold::default());
    let subject = harness.admin_subject();
    let ada = harness.create_actor("Ada", ActorType::AccountUser).await;

    let synced = harness
        .sync
        .sync_groups(
            &harness.sync_subject(),
            ProviderId::new(),
            vec![GroupRecord {
                provider_identifier: "G1".to_owned(),
                name: "Eng".to_owned(),
                attributes: Map::new(),
            }],
        )
        .await
        .unwrap_or_else(|error| panic!("{error}"))
        .upserted[0]
        .clone();
    let managed = harness
        .groups
        .create_managed_group(&subject, ManagedGroupKind::Everyone)
        .await
        .unwrap_or_else(|error| panic!("{error}"))
        .group;
    let before = harness.store.snapshot(harness.account_id).await;

    assert!(matches!(
        harness.groups.rename_group(&subject, &synced, "Renamed").await,
        Err(AppError::SyncedGroup)
    ));
    assert!(matches!(
        harness.groups.delete_group(&subject, &synced).await,
        Err(AppError::SyncedGroup)
    ));
    assert!(matches!(
        harness.groups.add_membership(&subject, synced.id, ada.id).await,
        Err(AppError::SyncedGroup)
    ));
    assert!(matches!(
        harness.groups.rename_group(&subject, &managed, "Renamed").await,
        Err(AppError::ManagedGroup)
    ));
    assert!(matches!(
        harness.groups.delete_group(&subject, &managed).await,
        Err(AppError::ManagedGroup)
    ));
    assert!(matches!(
        harness.groups.remove_membership(&subject, managed.id, ada.id).await,
        Err(AppError::ManagedGroup)
    ));
    assert_eq!(harness.store.snapshot(harness.account_id).await, before);
}

#[tokio::test]
async fn adding_a_member_announces_each_policy_once_after_commit() {
    let harness = Harness::new(DeletionThreshold::default());
    let subject = harness.admin_subject();
    let ada = harness.create_actor("Ada", ActorType::AccountUser).await;
    let group = harness.create_group("Eng").await;
    let policy = harness.seed_policy(group.id).await;
    let mut actor_topic = harness.bus.subscribe(Topic::Actor(ada.id));

    let membership = harness
        .groups
        .add_membership(&subject, group.id, ada.id)
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert!(
        harness
            .store
            .snapshot(harness.account_id)
            .await
            .memberships
            .contains(&membership)
    );
    let notifications = actor_topic.drain();
    assert_eq!(notifications.len(), 1);
    assert!(matches!(
        notifications[0],
        Notification::Access(event)
            if event.change == AccessChange::Granted
                && event.policy_id == policy.id
                && event.group_id == group.id
                && event.resource_id == policy.resource_id
    ));

    assert!(matches!(
        harness.groups.add_membership(&subject, group.id, ada.id).await,
        Err(AppError::Conflict(_))
    ));
    assert!(actor_topic.drain().is_empty());
}

#[tokio::test]
async fn membership_changes_announce_one_event_per_policy() {
    let harness = Harness::new(DeletionThreshold::default());
    let subject = harness.admin_subject();
    let ada = harness.create_actor("Ada", ActorType::AccountUser).await;
    let group = harness.create_group("Eng").await;
    let mut expected = Vec::new();
    for _ in 0..3 {
        let policy = harness.seed_policy(group.id).await;
        expected.push((policy.id, policy.resource_id));
    }
    expected.sort();
    let mut actor_topic = harness.bus.subscribe(Topic::Actor(ada.id));

    let announced = |notifications: Vec<Notification>, change: AccessChange| {
        let mut tuples: Vec<_> = notifications
            .into_iter()
            .filter_map(|notification| match notification {
                Notification::Access(event)
                    if event.change == change
                        && event.actor_id == ada.id
                        && event.group_id == group.id =>
                {
                    Some((event.policy_id, event.resource_id))
                }
                _ => None,
            })
            .collect();
        tuples.sort();
        tuples
    };

    assert!(harness.groups.add_membership(&subject, group.id, ada.id).await.is_ok());
    let granted = actor_topic.drain();
    assert_eq!(granted.len(), 3);
    assert_eq!(announced(granted, AccessChange::Granted), expected);

    assert!(harness.groups.remove_membership(&subject, group.id, ada.id).await.is_ok());
    let revoked = actor_topic.drain();
    assert_eq!(revoked.len(), 3);
    assert_eq!(announced(revoked, AccessChange::Revoked), expected);
}

#[tokio::test]
async fn membership_changes_require_existing_rows() {
    let harness = Harness::new(DeletionThreshold::default());
    let subject = harness.admin_subject();
    let ada = harness.create_actor("Ada", ActorType::AccountUser).await;
    let group = harness.create_group("Eng").await;

    assert!(matches!(
        harness.groups.remove_membership(&subject, group.id, ada.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        harness
            .groups
            .add_membership(&subject, group.id, ActorId::new())
            .await,
        Err(AppError::NotFound(_))
    ));

    harness.seed_membership(ada.id, group.id).await;
    let mut subscription = harness.subscribe_account();
    let removed = harness
        .groups
        .remove_membership(&subject, group.id, ada.id)
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert!(
        !harness
            .store
            .snapshot(harness.account_id)
            .await
            .memberships
            .contains(&removed)
    );
    assert!(subscription.drain().is_empty());
}

#[tokio::test]
async fn deleting_a_manual_group_cascades_and_rejects_old_copies() {
    let harness = Harness::new(DeletionThreshold::default());
    let subject = harness.admin_subject();
    let ada = harness.create_actor("Ada", ActorType::AccountUser).await;
    let group = harness.create_group("Eng").await;
    let policy = harness.seed_policy(group.id).await;
    harness.seed_membership(ada.id, group.id).await;
    let mut actor_topic = harness.bus.subscribe(Topic::Actor(ada.id));

    let deletion = harness
        .groups
        .delete_group(&subject, &group)
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert_eq!(deletion.counts.memberships_deleted, 1);
    assert_eq!(deletion.counts.policies_deleted, 1);

    let snapshot = harness.store.snapshot(harness.account_id).await;
    assert!(snapshot.groups.is_empty());
    assert!(snapshot.memberships.is_empty());
    assert!(snapshot.policies.is_empty());
    assert!(matches!(
        actor_topic.drain().as_slice(),
        [Notification::Access(event)]
            if event.change == AccessChange::Revoked && event.policy_id == policy.id
    ));

    assert!(matches!(
        harness.groups.delete_group(&subject, &group).await,
        Err(AppError::Stale(_))
    ));
}

#[tokio::test]
async fn renaming_bumps_the_version_and_invalidates_old_copies() {
    let harness = Harness::new(DeletionThreshold::default());
    let subject = harness.admin_subject();
    let group = harness.create_group("Eng").await;

    let renamed = harness
        .groups
        .rename_group(&subject, &group, "Engineering")
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert_eq!(renamed.name.as_str(), "Engineering");
    assert_eq!(renamed.version, group.version + 1);

    assert!(matches!(
        harness.groups.rename_group(&subject, &group, "Platform").await,
        Err(AppError::Stale(_))
    ));
}

#[tokio::test]
async fn everyone_group_tracks_human_actors_only() {
    let harness = Harness::new(DeletionThreshold::default());
    let subject = harness.admin_subject();
    let root = harness.create_actor("Root", ActorType::AccountAdminUser).await;
    let bot = harness.create_actor("Bot", ActorType::ServiceAccount).await;

    let creation = harness
        .groups
        .create_managed_group(&subject, ManagedGroupKind::Everyone)
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert_eq!(creation.reconciliation.inserted, 1);

    let ada = harness.create_actor("Ada", ActorType::AccountUser).await;
    let members: Vec<_> = harness
        .groups
        .list_group_memberships(&subject, creation.group.id)
        .await
        .unwrap_or_else(|error| panic!("{error}"))
        .into_iter()
        .map(|membership| membership.actor_id)
        .collect();
    assert_eq!(members.len(), 2);
    assert!(members.contains(&root.id));
    assert!(members.contains(&ada.id));
    assert!(!members.contains(&bot.id));

    assert!(matches!(
        harness
            .groups
            .create_managed_group(&subject, ManagedGroupKind::Everyone)
            .await,
        Err(AppError::Conflict(_))
    ));
}

#[tokio::test]
async fn reconciling_unchanged_managed_groups_writes_nothing() {
    let harness = Harness::new(DeletionThreshold::default());
    let subject = harness.admin_subject();
    harness.create_actor("Root", ActorType::AccountAdminUser).await;
    harness.create_actor("Ada", ActorType::AccountUser).await;
    assert!(
        harness
            .groups
            .create_managed_group(&subject, ManagedGroupKind::Everyone)
            .await
            .is_ok()
    );
    let before = harness.store.snapshot(harness.account_id).await;

    let reconciliation = harness
        .groups
        .reconcile_managed_groups(&subject)
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert!(reconciliation.is_noop());
    assert_eq!(reconciliation.groups, 1);
    assert_eq!(harness.store.snapshot(harness.account_id).await, before);
}

#[tokio::test]
async fn groups_of_other_accounts_are_not_visible() {
    let harness = Harness::new(DeletionThreshold::default());
    let group = harness.create_group("Eng").await;

    let outsider = Subject::new(
        ActorId::new(),
        AccountId::new(),
        Permission::all().iter().copied(),
    );
    assert!(matches!(
        harness.groups.fetch_group(&outsider, group.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        harness.groups.delete_group(&outsider, &group).await,
        Err(AppError::NotFound(_))
    ));
    assert!(
        harness
            .groups
            .list_groups(&outsider)
            .await
            .is_ok_and(|groups| groups.is_empty())
    );
}
