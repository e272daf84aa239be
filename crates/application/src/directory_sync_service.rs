use std::sync::Arc;

use portcullis_domain::{Group, Membership};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{AccountStore, AuthorizationService, NotificationBus};

mod circuit_breaker;
mod groups;
mod memberships;
mod plan;


pub use circuit_breaker::{DeletionThreshold, SyncCircuitBreaker};
pub use plan::{MembershipKey, SyncPlan, plan_sync};

/// Normalized group record delivered by the identity-provider collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Stable identifier of the group inside the provider.
    #[serde(alias = "ext_id")]
    pub provider_identifier: String,
    /// Display name.
    pub name: String,
    /// Arbitrary provider attributes.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Normalized `(external group, external actor)` membership tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MembershipRecord {
    /// External identifier of the group.
    pub group_identifier: String,
    /// External identifier of the actor.
    pub actor_identifier: String,
}

/// Per-step mutation counts of one sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    /// Rows created.
    pub inserted: usize,
    /// Existing rows whose attributes changed.
    pub updated: usize,
    /// Rows deleted.
    pub deleted: usize,
    /// Memberships deleted by group cascades.
    pub memberships_deleted: usize,
    /// Policies deleted by group cascades.
    pub policies_deleted: u64,
    /// Incoming records ignored because they could not be resolved.
    pub skipped: usize,
}

impl SyncCounts {
    /// Returns the number of row writes the sync committed.
    #[must_use]
    pub fn mutations(&self) -> u64 {
        let rows = self.inserted + self.updated + self.deleted + self.memberships_deleted;
        u64::try_from(rows)
            .unwrap_or(u64::MAX)
            .saturating_add(self.policies_deleted)
    }
}

/// Result of one committed sync.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome<T, K> {
    /// Rows present in the roster after the sync, created or not.
    pub upserted: Vec<T>,
    /// Rows removed by the sync.
    pub deleted: Vec<T>,
    /// Plan the sync executed.
    pub plan: SyncPlan<K>,
    /// Per-step mutation counts.
    pub counts: SyncCounts,
}

/// Outcome of a group sync keyed by external group identifier.
pub type GroupSyncOutcome = SyncOutcome<Group, String>;

/// Outcome of a membership sync keyed by local `(group, actor)` pair.
pub type MembershipSyncOutcome = SyncOutcome<Membership, MembershipKey>;

/// Application service reconciling directory rosters into local state.
#[derive(Clone)]
pub struct DirectorySyncService {
    authorization_service: AuthorizationService,
    store: Arc<dyn AccountStore>,
    notification_bus: Arc<dyn NotificationBus>,
    circuit_breaker: SyncCircuitBreaker,
}

impl DirectorySyncService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        store: Arc<dyn AccountStore>,
        notification_bus: Arc<dyn NotificationBus>,
        circuit_breaker: SyncCircuitBreaker,
    ) -> Self {
        Self {
            authorization_service,
            store,
            notification_bus,
            circuit_breaker,
        }
    }
}
