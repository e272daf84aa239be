//! Service workflows wired against the in-memory store and broadcast bus.

use std::sync::Arc;

use portcullis_application::{
    ActorService, AuthorizationService, DeletionThreshold, DirectorySyncService, GroupService,
    SyncCircuitBreaker,
};
use portcullis_core::AccountId;
use portcullis_domain::{
    Actor, ActorId, ActorType, Group, GroupId, Membership, NewActor, Permission,
    Policy, PolicyId, ResourceId, Subject, Topic,
};

use crate::{BroadcastNotificationBus, InMemoryAccountStore, Subscription};

mod actor_lifecycle;
mod directory_sync;
mod group_management;

struct Harness {
    account_id: AccountId,
    store: Arc<InMemoryAccountStore>,
    bus: Arc<BroadcastNotificationBus>,
    actors: ActorService,
    groups: GroupService,
    sync: DirectorySyncService,
}

impl Harness {
    fn new(threshold: DeletionThreshold) -> Self {
        let store = Arc::new(InMemoryAccountStore::new());
        let bus = Arc::new(BroadcastNotificationBus::new(256));

        Self {
            account_id: AccountId::new(),
            actors: ActorService::new(AuthorizationService::new(), store.clone(), bus.clone()),
            groups: GroupService::new(AuthorizationService::new(), store.clone(), bus.clone()),
            sync: DirectorySyncService::new(
                AuthorizationService::new(),
                store.clone(),
                bus.clone(),
                SyncCircuitBreaker::new(threshold),
            ),
            store,
            bus,
        }
    }

    fn admin_subject(&self) -> Subject {
        Subject::new(ActorId::new(), self.account_id, Permission::all().iter().copied())
    }

    fn sync_subject(&self) -> Subject {
        Subject::system(self.account_id, [Permission::DirectorySync])
    }

    fn subscribe_account(&self) -> Subscription {
        self.bus.subscribe(Topic::Account(self.account_id))
    }

    async fn create_actor(&self, name: &str, actor_type: ActorType) -> Actor {
        self.actors
            .create_actor(
                &self.admin_subject(),
                NewActor {
                    name: name.to_owned(),
                    actor_type,
                },
            )
            .await
            .unwrap_or_else(|error| panic!("failed to create actor fixture: {error}"))
    }

    async fn create_group(&self, name: &str) -> Group {
        self.groups
            .create_group(&self.admin_subject(), name)
            .await
            .unwrap_or_else(|error| panic!("failed to create group fixture: {error}"))
    }

    async fn seed_policy(&self, group_id: GroupId) -> Policy {
        let policy = Policy {
            id: PolicyId::new(),
            account_id: self.account_id,
            group_id,
            resource_id: ResourceId::new(),
        };
        self.store
            .seed_policy(policy)
            .await
            .unwrap_or_else(|error| panic!("failed to seed policy: {error}"));
        policy
    }

    async fn seed_membership(&self, actor_id: ActorId, group_id: GroupId) -> Membership {
        let membership = Membership::new(self.account_id, actor_id, group_id);
        self.store
            .seed_membership(membership)
            .await
            .unwrap_or_else(|error| panic!("failed to seed membership: {error}"));
        membership
    }

    async fn fetch_actor(&self, actor_id: ActorId) -> Actor {
        self.actors
            .fetch_actor(&self.admin_subject(), actor_id)
            .await
            .unwrap_or_else(|error| panic!("failed to fetch actor: {error}"))
    }
}
