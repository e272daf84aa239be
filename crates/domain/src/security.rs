use std::collections::BTreeSet;
use std::str::FromStr;

use portcullis_core::{AccountId, AppError};
use serde::{Deserialize, Serialize};

use crate::{ActorId, CreatedBy};

/// Capabilities enforced by application policy checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Allows reading actors.
    ActorsRead,
    /// Allows creating, disabling, retyping and deleting actors.
    ActorsManage,
    /// Allows reading groups and memberships.
    GroupsRead,
    /// Allows creating, editing and deleting groups and memberships.
    GroupsManage,
    /// Allows applying directory sync rosters.
    DirectorySync,
}

impl Permission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActorsRead => "actors.read",
            Self::ActorsManage => "actors.manage",
            Self::GroupsRead => "groups.read",
            Self::GroupsManage => "groups.manage",
            Self::DirectorySync => "directory.sync",
        }
    }

    /// Returns all known permissions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
            Permission::ActorsRead,
            Permission::ActorsManage,
            Permission::GroupsRead,
            Permission::GroupsManage,
            Permission::DirectorySync,
        ];

        ALL
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "actors.read" => Ok(Self::ActorsRead),
            "actors.manage" => Ok(Self::ActorsManage),
            "groups.read" => Ok(Self::GroupsRead),
            "groups.manage" => Ok(Self::GroupsManage),
            "directory.sync" => Ok(Self::DirectorySync),
            _ => Err(AppError::Validation(format!(
                "unknown permission value '{value}'"
            ))),
        }
    }
}

/// Authenticated caller context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    actor_id: Option<ActorId>,
    account_id: AccountId,
    permissions: BTreeSet<Permission>,
}

impl Subject {
    /// Creates a subject acting on behalf of an actor.
    #[must_use]
    pub fn new(
        actor_id: ActorId,
        account_id: AccountId,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            actor_id: Some(actor_id),
            account_id,
            permissions: permissions.into_iter().collect(),
        }
    }

    /// Creates a subject for system jobs such as the sync worker.
    #[must_use]
    pub fn system(
        account_id: AccountId,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            actor_id: None,
            account_id,
            permissions: permissions.into_iter().collect(),
        }
    }

    /// Returns the calling actor, if any.
    #[must_use]
    pub fn actor_id(&self) -> Option<ActorId> {
        self.actor_id
    }

    /// Returns the account the subject is authenticated in.
    #[must_use]
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Returns the capability set.
    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }

    /// Returns the capabilities from `required` the subject lacks, in input order.
    #[must_use]
    pub fn missing_permissions(&self, required: &[Permission]) -> Vec<Permission> {
        required
            .iter()
            .filter(|permission| !self.permissions.contains(permission))
            .copied()
            .collect()
    }

    /// Attribution recorded on rows the subject creates.
    #[must_use]
    pub fn created_by(&self) -> CreatedBy {
        self.actor_id.map_or(CreatedBy::System, CreatedBy::Actor)
    }
}
