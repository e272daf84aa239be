use portcullis_domain::{ActorId, GroupId, PolicyId};

/// Selection of membership rows inside one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipFilter {
    /// Every membership of the account.
    All,
    /// Memberships of one actor.
    Actor(ActorId),
    /// Memberships of one group.
    Group(GroupId),
    /// Memberships of any of the listed groups.
    Groups(Vec<GroupId>),
}

/// Selection of in-flight access grants of one actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantFilter {
    /// Grant owner.
    pub actor_id: ActorId,
    /// Restricts the selection to grants issued under one policy.
    pub policy_id: Option<PolicyId>,
}

impl GrantFilter {
    /// Selects every active grant of the actor.
    #[must_use]
    pub fn actor(actor_id: ActorId) -> Self {
        Self {
            actor_id,
            policy_id: None,
        }
    }

    /// Selects active grants of the actor under one policy.
    #[must_use]
    pub fn actor_policy(actor_id: ActorId, policy_id: PolicyId) -> Self {
        Self {
            actor_id,
            policy_id: Some(policy_id),
        }
    }
}
