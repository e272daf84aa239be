//! Notifications published after committed mutations.

use portcullis_core::AccountId;
use serde::{Deserialize, Serialize};

use crate::{ActorId, GrantId, GroupId, PolicyId, ResourceId, SessionId};

/// Direction of an access change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessChange {
    /// The actor can now reach the resource.
    Granted,
    /// The actor can no longer reach the resource.
    Revoked,
}

/// One access change for one `(actor, policy, group, resource)` tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccessEvent {
    /// Owning account.
    pub account_id: AccountId,
    /// Affected actor.
    pub actor_id: ActorId,
    /// Policy whose reach changed.
    pub policy_id: PolicyId,
    /// Group referenced by the policy.
    pub group_id: GroupId,
    /// Resource referenced by the policy.
    pub resource_id: ResourceId,
    /// Direction of the change.
    pub change: AccessChange,
}

/// Subscription address on the notification bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Topic {
    /// Everything happening in one account.
    Account(AccountId),
    /// Everything addressed to one actor.
    Actor(ActorId),
    /// Everything addressed to one session.
    Session(SessionId),
}

/// Message fanned out to bus subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    /// Access of an actor to a resource changed.
    Access(AccessEvent),
    /// A session was invalidated and its client must reconnect.
    SessionInvalidated {
        /// Owning account.
        account_id: AccountId,
        /// Session owner.
        actor_id: ActorId,
        /// Invalidated session.
        session_id: SessionId,
    },
    /// An in-flight access grant was expired early.
    GrantExpired {
        /// Owning account.
        account_id: AccountId,
        /// Grant owner.
        actor_id: ActorId,
        /// Expired grant.
        grant_id: GrantId,
        /// Resource the grant reached.
        resource_id: ResourceId,
    },
}

impl Notification {
    /// Returns the account the notification belongs to.
    #[must_use]
    pub fn account_id(&self) -> AccountId {
        match self {
            Self::Access(event) => event.account_id,
            Self::SessionInvalidated { account_id, .. } | Self::GrantExpired { account_id, .. } => {
                *account_id
            }
        }
    }

    /// Returns the actor the notification is addressed to.
    #[must_use]
    pub fn actor_id(&self) -> ActorId {
        match self {
            Self::Access(event) => event.actor_id,
            Self::SessionInvalidated { actor_id, .. } | Self::GrantExpired { actor_id, .. } => {
                *actor_id
            }
        }
    }

    /// Returns whether a subscriber of `topic` receives the notification.
    #[must_use]
    pub fn is_addressed_to(&self, topic: &Topic) -> bool {
        match topic {
            Topic::Account(account_id) => self.account_id() == *account_id,
            Topic::Actor(actor_id) => self.actor_id() == *actor_id,
            Topic::Session(session_id) => matches!(
                self,
                Self::SessionInvalidated { session_id: invalidated, .. } if invalidated == session_id
            ),
        }
    }
}
