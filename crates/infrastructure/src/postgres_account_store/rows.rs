use chrono::{DateTime, Utc};
use portcullis_core::{AccountId, AppError, AppResult, NonEmptyString};
use portcullis_domain::{
    AccessGrant, Actor, ActorId, ActorType, CreatedBy, GrantId, Group, GroupId, GroupOrigin,
    ManagedGroupKind, Membership, Policy, PolicyId, ProviderId, ResourceId, Session, SessionId,
};
use serde_json::{Map, Value};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub(super) struct ActorRow {
    id: Uuid,
    account_id: Uuid,
    name: String,
    actor_type: String,
    disabled_at: Option<DateTime<Utc>>,
    last_synced_at: Option<DateTime<Utc>>,
    created_by_kind: String,
    created_by_id: Option<Uuid>,
    version: i64,
}

impl TryFrom<ActorRow> for Actor {
    type Error = AppError;

    fn try_from(row: ActorRow) -> AppResult<Self> {
        Ok(Self {
            id: ActorId::from_uuid(row.id),
            account_id: AccountId::from_uuid(row.account_id),
            name: NonEmptyString::new(row.name)?,
            actor_type: ActorType::parse(row.actor_type.as_str())?,
            disabled_at: row.disabled_at,
            last_synced_at: row.last_synced_at,
            created_by: CreatedBy::from_parts(row.created_by_kind.as_str(), row.created_by_id)?,
            version: row.version,
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct GroupRow {
    id: Uuid,
    account_id: Uuid,
    name: String,
    origin: String,
    provider_id: Option<Uuid>,
    provider_identifier: Option<String>,
    managed_kind: Option<String>,
    attributes: Json<Map<String, Value>>,
    created_by_kind: String,
    created_by_id: Option<Uuid>,
    last_synced_at: Option<DateTime<Utc>>,
    version: i64,
}

impl TryFrom<GroupRow> for Group {
    type Error = AppError;

    fn try_from(row: GroupRow) -> AppResult<Self> {
        let origin = match (
            row.origin.as_str(),
            row.provider_id,
            row.provider_identifier,
            row.managed_kind,
        ) {
            ("manual", _, _, _) => GroupOrigin::Manual,
            ("synced", Some(provider_id), Some(provider_identifier), _) => GroupOrigin::Synced {
                provider_id: ProviderId::from_uuid(provider_id),
                provider_identifier: NonEmptyString::new(provider_identifier)?,
            },
            ("managed", _, _, Some(kind)) => GroupOrigin::Managed {
                kind: ManagedGroupKind::parse(kind.as_str())?,
            },
            (origin, _, _, _) => {
                return Err(AppError::Internal(format!(
                    "group '{}' has inconsistent origin '{origin}'",
                    row.id
                )));
            }
        };

        Ok(Self {
            id: GroupId::from_uuid(row.id),
            account_id: AccountId::from_uuid(row.account_id),
            name: NonEmptyString::new(row.name)?,
            origin,
            attributes: row.attributes.0,
            created_by: CreatedBy::from_parts(row.created_by_kind.as_str(), row.created_by_id)?,
            last_synced_at: row.last_synced_at,
            version: row.version,
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct MembershipRow {
    account_id: Uuid,
    actor_id: Uuid,
    group_id: Uuid,
}

impl From<MembershipRow> for Membership {
    fn from(row: MembershipRow) -> Self {
        Self::new(
            AccountId::from_uuid(row.account_id),
            ActorId::from_uuid(row.actor_id),
            GroupId::from_uuid(row.group_id),
        )
    }
}

#[derive(Debug, FromRow)]
pub(super) struct PolicyRow {
    id: Uuid,
    account_id: Uuid,
    group_id: Uuid,
    resource_id: Uuid,
}

impl From<PolicyRow> for Policy {
    fn from(row: PolicyRow) -> Self {
        Self {
            id: PolicyId::from_uuid(row.id),
            account_id: AccountId::from_uuid(row.account_id),
            group_id: GroupId::from_uuid(row.group_id),
            resource_id: ResourceId::from_uuid(row.resource_id),
        }
    }
}

#[derive(Debug, FromRow)]
pub(super) struct SessionRow {
    id: Uuid,
    account_id: Uuid,
    actor_id: Uuid,
    invalidated_at: Option<DateTime<Utc>>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: SessionId::from_uuid(row.id),
            account_id: AccountId::from_uuid(row.account_id),
            actor_id: ActorId::from_uuid(row.actor_id),
            invalidated_at: row.invalidated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(super) struct AccessGrantRow {
    id: Uuid,
    account_id: Uuid,
    actor_id: Uuid,
    policy_id: Uuid,
    resource_id: Uuid,
    expires_at: DateTime<Utc>,
}

impl From<AccessGrantRow> for AccessGrant {
    fn from(row: AccessGrantRow) -> Self {
        Self {
            id: GrantId::from_uuid(row.id),
            account_id: AccountId::from_uuid(row.account_id),
            actor_id: ActorId::from_uuid(row.actor_id),
            policy_id: PolicyId::from_uuid(row.policy_id),
            resource_id: ResourceId::from_uuid(row.resource_id),
            expires_at: row.expires_at,
        }
    }
}
