use std::sync::Arc;

use chrono::{Duration, Utc};
use portcullis_application::DeletionThreshold;
use portcullis_core::{AccountId, AppError};
use portcullis_domain::{
    AccessChange, AccessGrant, ActorId, ActorType, Client, ClientId, GrantId, Identity,
    IdentityId, ManagedGroupKind, NewActor, Notification, Permission, ProviderId, Session,
    SessionId, Subject, Topic,
};

use super::Harness;

#[tokio::test]
async fn sole_administrator_cannot_be_deleted_disabled_or_demoted() {
    let harness = Harness::new(DeletionThreshold::default());
    let subject = harness.admin_subject();
    let admin = harness.create_actor("Root", ActorType::AccountAdminUser).await;
    harness.create_actor("Bot", ActorType::ServiceAccount).await;
    let before = harness.store.snapshot(harness.account_id).await;

    assert!(matches!(
        harness.actors.delete_actor(&subject, &admin).await,
        Err(AppError::CantDeleteLastAdmin)
    ));
    assert!(matches!(
        harness.actors.disable_actor(&subject, &admin).await,
        Err(AppError::CantDisableLastAdmin)
    ));
    assert!(matches!(
        harness
            .actors
            .update_actor_type(&subject, &admin, ActorType::AccountUser)
            .await,
        Err(AppError::CantDemoteLastAdmin)
    ));
    assert_eq!(harness.store.snapshot(harness.account_id).await, before);
}

#[tokio::test]
async fn disabled_administrators_do_not_count_towards_the_guard() {
    let harness = Harness::new(DeletionThreshold::default());
    let subject = harness.admin_subject();
    let first = harness.create_actor("First", ActorType::AccountAdminUser).await;
    let second = harness.create_actor("Second", ActorType::AccountAdminUser).await;

    let disabled = harness
        .actors
        .disable_actor(&subject, &first)
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert!(!disabled.is_enabled());

    assert!(matches!(
        harness.actors.delete_actor(&subject, &second).await,
        Err(AppError::CantDeleteLastAdmin)
    ));

    let deletion = harness.actors.delete_actor(&subject, &disabled).await;
    assert!(deletion.is_ok());
}

#[tokio::test]
async fn administrators_of_other_accounts_do_not_count_towards_the_guard() {
    let harness = Harness::new(DeletionThreshold::default());
    let admin = harness.create_actor("Root", ActorType::AccountAdminUser).await;

    let other_account = AccountId::new();
    let other_subject = Subject::new(
        ActorId::new(),
        other_account,
        Permission::all().iter().copied(),
    );
    let created = harness
        .actors
        .create_actor(
            &other_subject,
            NewActor {
                name: "Elsewhere".to_owned(),
                actor_type: ActorType::AccountAdminUser,
            },
        )
        .await;
    assert!(created.is_ok());

    assert!(matches!(
        harness
            .actors
            .disable_actor(&harness.admin_subject(), &admin)
            .await,
        Err(AppError::CantDisableLastAdmin)
    ));
}

#[tokio::test]
async fn disabling_revokes_access_and_enabling_restores_it() {
    let harness = Harness::new(DeletionThreshold::default());
    let subject = harness.admin_subject();
    harness.create_actor("Root", ActorType::AccountAdminUser).await;
    let ada = harness.create_actor("Ada", ActorType::AccountUser).await;
    let group = harness.create_group("Eng").await;
    let policy = harness.seed_policy(group.id).await;
    let membership = harness.seed_membership(ada.id, group.id).await;

    let session = Session {
        id: SessionId::new(),
        account_id: harness.account_id,
        actor_id: ada.id,
        invalidated_at: None,
    };
    let grant = AccessGrant {
        id: GrantId::new(),
        account_id: harness.account_id,
        actor_id: ada.id,
        policy_id: policy.id,
        resource_id: policy.resource_id,
        expires_at: Utc::now() + Duration::hours(1),
    };
    assert!(harness.store.seed_session(session).await.is_ok());
    assert!(harness.store.seed_grant(grant).await.is_ok());

    let mut actor_topic = harness.bus.subscribe(Topic::Actor(ada.id));
    let mut session_topic = harness
        .bus
        .subscribe(Topic::Session(session.id));

    let disabled = harness
        .actors
        .disable_actor(&subject, &ada)
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    let snapshot = harness.store.snapshot(harness.account_id).await;
    assert!(snapshot.memberships.contains(&membership));
    assert!(snapshot.sessions.get(&session.id).is_some_and(|stored| !stored.is_active()));
    assert!(
        snapshot
            .grants
            .get(&grant.id)
            .is_some_and(|stored| !stored.is_active_at(Utc::now()))
    );

    let notifications = actor_topic.drain();
    assert!(notifications.iter().any(|notification| matches!(
        notification,
        Notification::Access(event)
            if event.change == AccessChange::Revoked && event.policy_id == policy.id
    )));
    assert!(notifications.iter().any(|notification| matches!(
        notification,
        Notification::GrantExpired { grant_id, .. } if *grant_id == grant.id
    )));
    assert_eq!(
        session_topic.drain(),
        vec![Notification::SessionInvalidated {
            account_id: harness.account_id,
            actor_id: ada.id,
            session_id: session.id,
        }]
    );

    harness
        .actors
        .enable_actor(&subject, &disabled)
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    let restored = actor_topic.drain();
    assert_eq!(restored.len(), 1);
    assert!(matches!(
        restored[0],
        Notification::Access(event) if event.change == AccessChange::Granted
    ));
}

#[tokio::test]
async fn deleting_an_actor_removes_its_dependents() {
    let harness = Harness::new(DeletionThreshold::default());
    let subject = harness.admin_subject();
    harness.create_actor("Root", ActorType::AccountAdminUser).await;
    let everyone = harness
        .groups
        .create_managed_group(&subject, ManagedGroupKind::Everyone)
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    let ada = harness.create_actor("Ada", ActorType::AccountUser).await;
    let group = harness.create_group("Eng").await;
    harness.seed_membership(ada.id, group.id).await;

    let seeded = [
        harness
            .store
            .seed_client(Client {
                id: ClientId::new(),
                account_id: harness.account_id,
                actor_id: ada.id,
            })
            .await,
        harness
            .store
            .seed_identity(Identity {
                id: IdentityId::new(),
                account_id: harness.account_id,
                actor_id: ada.id,
                provider_id: ProviderId::new(),
                provider_identifier: "ada@example.com".to_owned(),
            })
            .await,
        harness
            .store
            .seed_session(Session {
                id: SessionId::new(),
                account_id: harness.account_id,
                actor_id: ada.id,
                invalidated_at: None,
            })
            .await,
    ];
    assert!(seeded.iter().all(Result::is_ok));

    let ada = harness.fetch_actor(ada.id).await;
    let deletion = harness
        .actors
        .delete_actor(&subject, &ada)
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(deletion.counts.memberships_deleted, 2);
    assert_eq!(deletion.counts.clients_deleted, 1);
    assert_eq!(deletion.counts.identities_deleted, 1);
    assert_eq!(deletion.counts.sessions_invalidated, 1);

    let snapshot = harness.store.snapshot(harness.account_id).await;
    assert!(!snapshot.actors.contains_key(&ada.id));
    assert!(snapshot.clients.is_empty());
    assert!(snapshot.identities.is_empty());
    assert!(
        snapshot
            .memberships
            .iter()
            .all(|membership| membership.actor_id != ada.id)
    );
    assert_eq!(
        snapshot
            .memberships
            .iter()
            .filter(|membership| membership.group_id == everyone.group.id)
            .count(),
        1
    );
}

#[tokio::test]
async fn repeated_deletion_with_an_old_copy_is_stale() {
    let harness = Harness::new(DeletionThreshold::default());
    let subject = harness.admin_subject();
    harness.create_actor("Root", ActorType::AccountAdminUser).await;
    let ada = harness.create_actor("Ada", ActorType::AccountUser).await;

    assert!(harness.actors.delete_actor(&subject, &ada).await.is_ok());
    assert!(matches!(
        harness.actors.delete_actor(&subject, &ada).await,
        Err(AppError::Stale(_))
    ));
}

#[tokio::test]
async fn lifecycle_calls_require_manage_permission_and_hide_other_accounts() {
    let harness = Harness::new(DeletionThreshold::default());
    let ada = harness.create_actor("Ada", ActorType::AccountUser).await;

    let reader = Subject::new(ActorId::new(), harness.account_id, [Permission::ActorsRead]);
    match harness.actors.delete_actor(&reader, &ada).await {
        Err(AppError::Forbidden(message)) => assert!(message.contains("actors.manage")),
        other => panic!("unexpected result: {other:?}"),
    }

    let outsider = Subject::new(
        ActorId::new(),
        AccountId::new(),
        Permission::all().iter().copied(),
    );
    assert!(matches!(
        harness.actors.fetch_actor(&outsider, ada.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mutual_disables_leave_one_administrator_per_account() {
    let mut pairs = Vec::new();
    for _ in 0..24 {
        let harness = Arc::new(Harness::new(DeletionThreshold::default()));
        let left = harness.create_actor("Left", ActorType::AccountAdminUser).await;
        let right = harness.create_actor("Right", ActorType::AccountAdminUser).await;
        pairs.push((harness, left, right));
    }

    let mut tasks = Vec::new();
    for (harness, left, right) in &pairs {
        for target in [left.clone(), right.clone()] {
            let harness = harness.clone();
            tasks.push(tokio::spawn(async move {
                let subject = harness.admin_subject();
                harness.actors.disable_actor(&subject, &target).await
            }));
        }
    }

    let mut rejected = 0;
    for task in tasks {
        match task.await {
            Ok(Ok(_)) => {}
            Ok(Err(AppError::CantDisableLastAdmin)) => rejected += 1,
            other => panic!("unexpected result: {other:?}"),
        }
    }
    assert_eq!(rejected, pairs.len());

    for (harness, _, _) in &pairs {
        let snapshot = harness.store.snapshot(harness.account_id).await;
        let enabled_admins = snapshot
            .actors
            .values()
            .filter(|actor| actor.is_enabled_admin())
            .count();
        assert_eq!(enabled_admins, 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_demotions_keep_exactly_one_administrator() {
    let harness = Arc::new(Harness::new(DeletionThreshold::default()));
    let mut admins = Vec::new();
    for index in 0..12 {
        admins.push(
            harness
                .create_actor(&format!("Admin {index}"), ActorType::AccountAdminUser)
                .await,
        );
    }

    let tasks: Vec<_> = admins
        .into_iter()
        .map(|admin| {
            let harness = harness.clone();
            tokio::spawn(async move {
                let subject = harness.admin_subject();
                harness
                    .actors
                    .update_actor_type(&subject, &admin, ActorType::AccountUser)
                    .await
            })
        })
        .collect();

    let mut demoted = 0;
    for task in tasks {
        match task.await {
            Ok(Ok(_)) => demoted += 1,
            Ok(Err(AppError::CantDemoteLastAdmin)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
    assert_eq!(demoted, 11);

    let snapshot = harness.store.snapshot(harness.account_id).await;
    assert_eq!(
        snapshot
            .actors
            .values()
            .filter(|actor| actor.is_enabled_admin())
            .count(),
        1
    );
}
