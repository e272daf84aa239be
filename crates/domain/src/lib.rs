//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod actor;
mod dependents;
mod group;
mod ids;
mod membership;
mod notification;
mod policy;
mod security;

pub use actor::{ACTOR_NAME_MAX_LENGTH, Actor, ActorType, NewActor};
pub use dependents::{AccessGrant, Client, Identity, Session};
pub use group::{
    CreatedBy, GROUP_NAME_MAX_LENGTH, Group, GroupOrigin, ManagedGroupKind,
    PROVIDER_IDENTIFIER_MAX_LENGTH,
};
pub use ids::{
    ActorId, ClientId, GrantId, GroupId, IdentityId, PolicyId, ProviderId, ResourceId, SessionId,
};
pub use membership::Membership;
pub use notification::{AccessChange, AccessEvent, Notification, Topic};
pub use policy::Policy;
pub use security::{Permission, Subject};
