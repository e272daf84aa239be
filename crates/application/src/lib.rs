//! Application services and ports.

#![forbid(unsafe_code)]

mod account_ports;
mod actor_service;
mod authorization_service;
mod cascade;
mod directory_sync_service;
mod group_service;
mod managed_membership;

pub use account_ports::{
    AccountStore, AccountTransaction, GrantFilter, MembershipFilter, NotificationBus,
};
pub use actor_service::{ActorDeletion, ActorService};
pub use authorization_service::AuthorizationService;
pub use cascade::{ActorCascadeCounts, GroupCascadeCounts};
pub use directory_sync_service::{
    DeletionThreshold, DirectorySyncService, GroupRecord, GroupSyncOutcome, MembershipKey,
    MembershipRecord, MembershipSyncOutcome, SyncCircuitBreaker, SyncCounts, SyncOutcome,
    SyncPlan, plan_sync,
};
pub use group_service::{GroupDeletion, GroupService, ManagedGroupCreation};
pub use managed_membership::ManagedReconciliation;
