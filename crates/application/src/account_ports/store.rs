use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portcullis_core::{AccountId, AppResult};
use portcullis_domain::{
    AccessGrant, Actor, ActorId, Group, GroupId, Membership, Policy, ProviderId, Session,
};

use super::filters::{GrantFilter, MembershipFilter};

/// Port opening account-scoped units of work.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Opens one atomic unit of work for the account.
    ///
    /// Units of work on the same account are serialized: a second `begin` for
    /// the account waits until the first unit commits or is dropped.
    async fn begin(&self, account_id: AccountId) -> AppResult<Box<dyn AccountTransaction>>;
}

/// One atomic unit of work scoped to a single account.
///
/// Every read and write is restricted to the account the unit was opened for,
/// so rows of other accounts are invisible. Dropping the unit without calling
/// [`AccountTransaction::commit`] discards every write.
#[async_trait]
pub trait AccountTransaction: Send {
    /// Returns the account this unit is scoped to.
    fn account_id(&self) -> AccountId;

    /// Finds one actor.
    async fn find_actor(&mut self, actor_id: ActorId) -> AppResult<Option<Actor>>;

    /// Lists every actor ordered by name.
    async fn list_actors(&mut self) -> AppResult<Vec<Actor>>;

    /// Inserts a new actor.
    async fn insert_actor(&mut self, actor: &Actor) -> AppResult<()>;

    /// Writes the actor when the stored version equals `actor.version` and
    /// returns the stored row with its bumped version.
    async fn update_actor(&mut self, actor: &Actor) -> AppResult<Actor>;

    /// Deletes the actor when the stored version equals `actor.version`.
    async fn delete_actor(&mut self, actor: &Actor) -> AppResult<()>;

    /// Counts enabled administrator actors.
    async fn count_enabled_admins(&mut self) -> AppResult<u64>;

    /// Finds one group.
    async fn find_group(&mut self, group_id: GroupId) -> AppResult<Option<Group>>;

    /// Lists every group ordered by name.
    async fn list_groups(&mut self) -> AppResult<Vec<Group>>;

    /// Lists groups owned by one provider ordered by external identifier.
    async fn list_provider_groups(&mut self, provider_id: ProviderId) -> AppResult<Vec<Group>>;

    /// Inserts a new group.
    async fn insert_group(&mut self, group: &Group) -> AppResult<()>;

    /// Writes the group when the stored version equals `group.version` and
    /// returns the stored row with its bumped version.
    async fn update_group(&mut self, group: &Group) -> AppResult<Group>;

    /// Deletes the group row when the stored version equals `group.version`.
    async fn delete_group(&mut self, group: &Group) -> AppResult<()>;

    /// Lists memberships matching the filter.
    async fn list_memberships(&mut self, filter: MembershipFilter) -> AppResult<Vec<Membership>>;

    /// Inserts a membership, returning `false` when the pair already exists.
    async fn insert_membership(&mut self, membership: Membership) -> AppResult<bool>;

    /// Deletes a membership, returning `false` when the pair did not exist.
    async fn delete_membership(&mut self, membership: Membership) -> AppResult<bool>;

    /// Lists policies referencing any of the groups.
    async fn list_policies_for_groups(&mut self, group_ids: &[GroupId]) -> AppResult<Vec<Policy>>;

    /// Deletes every policy referencing the group.
    async fn delete_policies_for_group(&mut self, group_id: GroupId) -> AppResult<u64>;

    /// Deletes every client registration owned by the actor.
    async fn delete_clients_for_actor(&mut self, actor_id: ActorId) -> AppResult<u64>;

    /// Deletes every directory identity of the actor.
    async fn delete_identities_for_actor(&mut self, actor_id: ActorId) -> AppResult<u64>;

    /// Invalidates every active session of the actor and returns them.
    async fn invalidate_sessions_for_actor(
        &mut self,
        actor_id: ActorId,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<Session>>;

    /// Expires every grant matching the filter that is active at `at`.
    async fn expire_grants(
        &mut self,
        filter: GrantFilter,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<AccessGrant>>;

    /// Makes every write of the unit visible at once.
    async fn commit(self: Box<Self>) -> AppResult<()>;
}
