use portcullis_core::AccountId;
use serde::{Deserialize, Serialize};

use crate::{GroupId, PolicyId, ResourceId};

/// Access rule granting members of a group access to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Policy {
    /// Stable identifier.
    pub id: PolicyId,
    /// Owning account.
    pub account_id: AccountId,
    /// Group whose members are granted access.
    pub group_id: GroupId,
    /// Protected resource.
    pub resource_id: ResourceId,
}
