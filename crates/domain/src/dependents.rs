//! Rows owned by an actor that follow its lifecycle.

use chrono::{DateTime, Utc};
use portcullis_core::AccountId;
use serde::{Deserialize, Serialize};

use crate::{ActorId, ClientId, GrantId, IdentityId, PolicyId, ProviderId, ResourceId, SessionId};

/// Device registration owned by an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Stable identifier.
    pub id: ClientId,
    /// Owning account.
    pub account_id: AccountId,
    /// Owning actor.
    pub actor_id: ActorId,
}

/// Link between an actor and its record in an external directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable identifier.
    pub id: IdentityId,
    /// Owning account.
    pub account_id: AccountId,
    /// Owning actor.
    pub actor_id: ActorId,
    /// Directory the identity belongs to.
    pub provider_id: ProviderId,
    /// Stable identifier of the actor inside the provider.
    pub provider_identifier: String,
}

/// Authenticated session of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Stable identifier.
    pub id: SessionId,
    /// Owning account.
    pub account_id: AccountId,
    /// Authenticated actor.
    pub actor_id: ActorId,
    /// Set once the session can no longer be used.
    pub invalidated_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Returns whether the session is still usable.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.invalidated_at.is_none()
    }
}

/// Authorization of one actor to reach one resource under one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Stable identifier.
    pub id: GrantId,
    /// Owning account.
    pub account_id: AccountId,
    /// Authorized actor.
    pub actor_id: ActorId,
    /// Policy that authorized access.
    pub policy_id: PolicyId,
    /// Reachable resource.
    pub resource_id: ResourceId,
    /// Hard expiry of the grant.
    pub expires_at: DateTime<Utc>,
}

impl AccessGrant {
    /// Returns whether the grant is still valid at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
