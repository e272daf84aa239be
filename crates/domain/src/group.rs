//! Group entity, origins and edit rules.

use chrono::{DateTime, Utc};
use portcullis_core::{AccountId, AppError, AppResult, FieldError, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{ActorId, GroupId, ProviderId};

/// Maximum length of a group name.
pub const GROUP_NAME_MAX_LENGTH: usize = 255;

/// Maximum length of an external group identifier.
pub const PROVIDER_IDENTIFIER_MAX_LENGTH: usize = 255;

/// Attribution for the subject that created a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CreatedBy {
    /// Created by an actor through an explicit action.
    Actor(ActorId),
    /// Created by a directory sync of the given provider.
    Provider(ProviderId),
    /// Created by the system itself.
    System,
}

impl CreatedBy {
    /// Returns the storage kind string.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Actor(_) => "actor",
            Self::Provider(_) => "provider",
            Self::System => "system",
        }
    }

    /// Returns the referenced identifier, if any.
    #[must_use]
    pub fn reference(&self) -> Option<Uuid> {
        match self {
            Self::Actor(actor_id) => Some(actor_id.as_uuid()),
            Self::Provider(provider_id) => Some(provider_id.as_uuid()),
            Self::System => None,
        }
    }

    /// Rebuilds attribution from its storage parts.
    pub fn from_parts(kind: &str, reference: Option<Uuid>) -> AppResult<Self> {
        match (kind, reference) {
            ("actor", Some(value)) => Ok(Self::Actor(ActorId::from_uuid(value))),
            ("provider", Some(value)) => Ok(Self::Provider(ProviderId::from_uuid(value))),
            ("system", None) => Ok(Self::System),
            _ => Err(AppError::Validation(format!(
                "invalid creation attribution '{kind}'"
            ))),
        }
    }
}

/// Derivation rule of a system-managed group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagedGroupKind {
    /// Every non-service actor of the account.
    Everyone,
}

impl ManagedGroupKind {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Everyone => "everyone",
        }
    }

    /// Parses a storage string into a managed group kind.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "everyone" => Ok(Self::Everyone),
            _ => Err(AppError::Validation(format!(
                "unknown managed group kind '{value}'"
            ))),
        }
    }

    /// Returns the display name given to new groups of this kind.
    #[must_use]
    pub fn default_name(&self) -> &'static str {
        match self {
            Self::Everyone => "Everyone",
        }
    }
}

/// Where a group came from and who may edit it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GroupOrigin {
    /// Curated by account administrators.
    Manual,
    /// Mirrored from an external directory.
    Synced {
        /// Owning provider.
        provider_id: ProviderId,
        /// Stable identifier of the group inside the provider.
        provider_identifier: NonEmptyString,
    },
    /// Membership derived by the system.
    Managed {
        /// Derivation rule.
        kind: ManagedGroupKind,
    },
}

impl GroupOrigin {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Synced { .. } => "synced",
            Self::Managed { .. } => "managed",
        }
    }

    /// Returns the owning provider for synced groups.
    #[must_use]
    pub fn provider_id(&self) -> Option<ProviderId> {
        match self {
            Self::Synced { provider_id, .. } => Some(*provider_id),
            _ => None,
        }
    }

    /// Returns the external identifier for synced groups.
    #[must_use]
    pub fn provider_identifier(&self) -> Option<&str> {
        match self {
            Self::Synced {
                provider_identifier,
                ..
            } => Some(provider_identifier.as_str()),
            _ => None,
        }
    }

    /// Returns whether the group is owned by the given provider.
    #[must_use]
    pub fn is_owned_by(&self, provider_id: ProviderId) -> bool {
        self.provider_id() == Some(provider_id)
    }
}

/// Named collection of actors within an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Stable identifier.
    pub id: GroupId,
    /// Owning account.
    pub account_id: AccountId,
    /// Display name.
    pub name: NonEmptyString,
    /// Origin and ownership.
    pub origin: GroupOrigin,
    /// Arbitrary attributes reported by the directory.
    pub attributes: Map<String, Value>,
    /// Who created the group.
    pub created_by: CreatedBy,
    /// Last time a directory sync wrote the group.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version, bumped by every committed update.
    pub version: i64,
}

impl Group {
    /// Builds a manually curated group.
    pub fn new_manual(account_id: AccountId, name: &str, created_by: CreatedBy) -> AppResult<Self> {
        let name = validate_group_name(name).map_err(|error| AppError::InvalidFields(vec![error]))?;

        Ok(Self {
            id: GroupId::new(),
            account_id,
            name,
            origin: GroupOrigin::Manual,
            attributes: Map::new(),
            created_by,
            last_synced_at: None,
            version: 0,
        })
    }

    /// Builds a directory-synced group owned by the provider.
    pub fn new_synced(
        account_id: AccountId,
        provider_id: ProviderId,
        provider_identifier: &str,
        name: &str,
        attributes: Map<String, Value>,
        synced_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        let mut errors = Vec::new();
        let name = validate_group_name(name).map_err(|error| errors.push(error)).ok();
        let provider_identifier = validate_provider_identifier(provider_identifier)
            .map_err(|error| errors.push(error))
            .ok();

        let (Some(name), Some(provider_identifier)) = (name, provider_identifier) else {
            return Err(AppError::InvalidFields(errors));
        };

        Ok(Self {
            id: GroupId::new(),
            account_id,
            name,
            origin: GroupOrigin::Synced {
                provider_id,
                provider_identifier,
            },
            attributes,
            created_by: CreatedBy::Provider(provider_id),
            last_synced_at: Some(synced_at),
            version: 0,
        })
    }

    /// Builds a system-managed group.
    pub fn new_managed(account_id: AccountId, kind: ManagedGroupKind) -> AppResult<Self> {
        Ok(Self {
            id: GroupId::new(),
            account_id,
            name: NonEmptyString::new(kind.default_name())?,
            origin: GroupOrigin::Managed { kind },
            attributes: Map::new(),
            created_by: CreatedBy::System,
            last_synced_at: None,
            version: 0,
        })
    }

    /// Fails unless end users may edit or delete the group directly.
    pub fn ensure_editable(&self) -> AppResult<()> {
        match self.origin {
            GroupOrigin::Manual => Ok(()),
            GroupOrigin::Synced { .. } => Err(AppError::SyncedGroup),
            GroupOrigin::Managed { .. } => Err(AppError::ManagedGroup),
        }
    }

    /// Returns the managed kind, if the group is system-managed.
    #[must_use]
    pub fn managed_kind(&self) -> Option<ManagedGroupKind> {
        match self.origin {
            GroupOrigin::Managed { kind } => Some(kind),
            _ => None,
        }
    }

    /// Renames a manual group.
    pub fn rename(&mut self, name: &str) -> AppResult<()> {
        self.ensure_editable()?;
        self.name =
            validate_group_name(name).map_err(|error| AppError::InvalidFields(vec![error]))?;
        Ok(())
    }

    /// Applies directory attributes to a synced group.
    ///
    /// Returns `false` when the group already carries exactly these values, so
    /// repeated syncs of an unchanged roster write nothing.
    pub fn apply_sync(
        &mut self,
        name: &str,
        attributes: Map<String, Value>,
        synced_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let name = validate_group_name(name).map_err(|error| AppError::InvalidFields(vec![error]))?;
        if self.name == name && self.attributes == attributes {
            return Ok(false);
        }

        self.name = name;
        self.attributes = attributes;
        self.last_synced_at = Some(synced_at);
        Ok(true)
    }
}

fn validate_group_name(value: &str) -> Result<NonEmptyString, FieldError> {
    let trimmed = value.trim();
    if trimmed.chars().count() > GROUP_NAME_MAX_LENGTH {
        return Err(FieldError::new(
            "name",
            format!("must not exceed {GROUP_NAME_MAX_LENGTH} characters"),
        ));
    }

    NonEmptyString::new(trimmed).map_err(|_| FieldError::new("name", "must not be empty"))
}

fn validate_provider_identifier(value: &str) -> Result<NonEmptyString, FieldError> {
    if value.chars().count() > PROVIDER_IDENTIFIER_MAX_LENGTH {
        return Err(FieldError::new(
            "provider_identifier",
            format!("must not exceed {PROVIDER_IDENTIFIER_MAX_LENGTH} characters"),
        ));
    }

    NonEmptyString::new(value).map_err(|_| FieldError::new("provider_identifier", "is required"))
}
