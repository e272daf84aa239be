use portcullis_core::AccountId;
use serde::{Deserialize, Serialize};

use crate::{ActorId, GroupId};

/// Join row between an actor and a group, unique per pair within an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Membership {
    /// Owning account, shared by both sides of the pair.
    pub account_id: AccountId,
    /// Member actor.
    pub actor_id: ActorId,
    /// Containing group.
    pub group_id: GroupId,
}

impl Membership {
    /// Creates a membership row.
    #[must_use]
    pub fn new(account_id: AccountId, actor_id: ActorId, group_id: GroupId) -> Self {
        Self {
            account_id,
            actor_id,
            group_id,
        }
    }
}
