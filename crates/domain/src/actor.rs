//! Actor entity and lifecycle rules.

use chrono::{DateTime, Utc};
use portcullis_core::{AccountId, AppError, AppResult, FieldError, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::{ActorId, CreatedBy};

/// Maximum length of an actor display name.
pub const ACTOR_NAME_MAX_LENGTH: usize = 512;

/// Kind of identity represented by an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    /// Regular end user.
    AccountUser,
    /// User allowed to administer the account.
    AccountAdminUser,
    /// Non-human identity used by automation.
    ServiceAccount,
}

impl ActorType {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountUser => "account_user",
            Self::AccountAdminUser => "account_admin_user",
            Self::ServiceAccount => "service_account",
        }
    }

    /// Parses a storage string into an actor type.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "account_user" => Ok(Self::AccountUser),
            "account_admin_user" => Ok(Self::AccountAdminUser),
            "service_account" => Ok(Self::ServiceAccount),
            _ => Err(AppError::Validation(format!("unknown actor type '{value}'"))),
        }
    }

    /// Returns whether the type grants account administration.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::AccountAdminUser)
    }
}

/// Input payload for creating an actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActor {
    /// Display name.
    pub name: String,
    /// Actor kind.
    pub actor_type: ActorType,
}

/// Identity within an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable identifier.
    pub id: ActorId,
    /// Owning account.
    pub account_id: AccountId,
    /// Display name.
    pub name: NonEmptyString,
    /// Actor kind.
    pub actor_type: ActorType,
    /// Set while the actor is disabled.
    pub disabled_at: Option<DateTime<Utc>>,
    /// Last time a directory sync touched the actor.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Who created the actor.
    pub created_by: CreatedBy,
    /// Optimistic concurrency version, bumped by every committed update.
    pub version: i64,
}

impl Actor {
    /// Validates input and builds a new enabled actor.
    pub fn new(account_id: AccountId, input: NewActor, created_by: CreatedBy) -> AppResult<Self> {
        let name = validate_actor_name(input.name.as_str())
            .map_err(|error| AppError::InvalidFields(vec![error]))?;

        Ok(Self {
            id: ActorId::new(),
            account_id,
            name,
            actor_type: input.actor_type,
            disabled_at: None,
            last_synced_at: None,
            created_by,
            version: 0,
        })
    }

    /// Returns whether the actor is currently enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.disabled_at.is_none()
    }

    /// Returns whether the actor counts towards the administrator invariant.
    #[must_use]
    pub fn is_enabled_admin(&self) -> bool {
        self.actor_type.is_admin() && self.is_enabled()
    }

    /// Returns whether the actor belongs to system-managed groups.
    #[must_use]
    pub fn is_managed_group_member(&self) -> bool {
        !matches!(self.actor_type, ActorType::ServiceAccount)
    }
}

fn validate_actor_name(value: &str) -> Result<NonEmptyString, FieldError> {
    if value.chars().count() > ACTOR_NAME_MAX_LENGTH {
        return Err(FieldError::new(
            "name",
            format!("must not exceed {ACTOR_NAME_MAX_LENGTH} characters"),
        ));
    }

    NonEmptyString::new(value.trim()).map_err(|_| FieldError::new("name", "must not be empty"))
}
