use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portcullis_application::{AccountTransaction, GrantFilter, MembershipFilter};
use portcullis_core::{AccountId, AppError, AppResult};
use portcullis_domain::{
    AccessGrant, Actor, ActorId, Group, GroupId, Membership, Policy, ProviderId, Session,
};
use tokio::sync::OwnedMutexGuard;

use super::{AccountSnapshot, ensure_membership_rows, insert_unique};

/// Unit of work over a private copy of one account's rows.
pub(super) struct InMemoryAccountTransaction {
    account_id: AccountId,
    guard: OwnedMutexGuard<AccountSnapshot>,
    working: AccountSnapshot,
}

impl InMemoryAccountTransaction {
    pub(super) fn new(account_id: AccountId, guard: OwnedMutexGuard<AccountSnapshot>) -> Self {
        let working = guard.clone();
        Self {
            account_id,
            guard,
            working,
        }
    }

    fn stored_actor(&self, actor: &Actor) -> AppResult<&Actor> {
        let stored = self
            .working
            .actors
            .get(&actor.id)
            .ok_or_else(|| AppError::Stale(format!("actor '{}' no longer exists", actor.id)))?;
        if stored.version != actor.version {
            return Err(AppError::Stale(format!(
                "actor '{}' changed since version {}",
                actor.id, actor.version
            )));
        }

        Ok(stored)
    }

    fn stored_group(&self, group: &Group) -> AppResult<&Group> {
        let stored = self
            .working
            .groups
            .get(&group.id)
            .ok_or_else(|| AppError::Stale(format!("group '{}' no longer exists", group.id)))?;
        if stored.version != group.version {
            return Err(AppError::Stale(format!(
                "group '{}' changed since version {}",
                group.id, group.version
            )));
        }

        Ok(stored)
    }

    fn ensure_provider_identifier_free(&self, group: &Group) -> AppResult<()> {
        let (Some(provider_id), Some(identifier)) =
            (group.origin.provider_id(), group.origin.provider_identifier())
        else {
            return Ok(());
        };

        let taken = self.working.groups.values().any(|existing| {
            existing.id != group.id
                && existing.origin.provider_id() == Some(provider_id)
                && existing.origin.provider_identifier() == Some(identifier)
        });
        if taken {
            return Err(AppError::Conflict(format!(
                "provider '{provider_id}' already owns group '{identifier}'"
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl AccountTransaction for InMemoryAccountTransaction {
    fn account_id(&self) -> AccountId {
        self.account_id
    }

    async fn find_actor(&mut self, actor_id: ActorId) -> AppResult<Option<Actor>> {
        Ok(self.working.actors.get(&actor_id).cloned())
    }

    async fn list_actors(&mut self) -> AppResult<Vec<Actor>> {
        let mut actors: Vec<Actor> = self.working.actors.values().cloned().collect();
        actors.sort_by(|left, right| {
            left.name
                .as_str()
                .cmp(right.name.as_str())
                .then(left.id.cmp(&right.id))
        });
        Ok(actors)
    }

    async fn insert_actor(&mut self, actor: &Actor) -> AppResult<()> {
        if actor.account_id != self.account_id {
            return Err(AppError::Validation(format!(
                "actor '{}' belongs to another account",
                actor.id
            )));
        }

        insert_unique(&mut self.working.actors, actor.id, actor.clone(), "actor")
    }

    async fn update_actor(&mut self, actor: &Actor) -> AppResult<Actor> {
        self.stored_actor(actor)?;

        let mut updated = actor.clone();
        updated.version += 1;
        self.working.actors.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn delete_actor(&mut self, actor: &Actor) -> AppResult<()> {
        self.stored_actor(actor)?;
        self.working.actors.remove(&actor.id);
        Ok(())
    }

    async fn count_enabled_admins(&mut self) -> AppResult<u64> {
        let count = self
            .working
            .actors
            .values()
            .filter(|actor| actor.is_enabled_admin())
            .count();
        Ok(count as u64)
    }

    async fn find_group(&mut self, group_id: GroupId) -> AppResult<Option<Group>> {
        Ok(self.working.groups.get(&group_id).cloned())
    }

    async fn list_groups(&mut self) -> AppResult<Vec<Group>> {
        let mut groups: Vec<Group> = self.working.groups.values().cloned().collect();
        groups.sort_by(|left, right| {
            left.name
                .as_str()
                .cmp(right.name.as_str())
                .then(left.id.cmp(&right.id))
        });
        Ok(groups)
    }

    async fn list_provider_groups(&mut self, provider_id: ProviderId) -> AppResult<Vec<Group>> {
        let mut groups: Vec<Group> = self
            .working
            .groups
            .values()
            .filter(|group| group.origin.is_owned_by(provider_id))
            .cloned()
            .collect();
        groups.sort_by(|left, right| {
            left.origin
                .provider_identifier()
                .cmp(&right.origin.provider_identifier())
        });
        Ok(groups)
    }

    async fn insert_group(&mut self, group: &Group) -> AppResult<()> {
        if group.account_id != self.account_id {
            return Err(AppError::Validation(format!(
                "group '{}' belongs to another account",
                group.id
            )));
        }

        self.ensure_provider_identifier_free(group)?;
        insert_unique(&mut self.working.groups, group.id, group.clone(), "group")
    }

    async fn update_group(&mut self, group: &Group) -> AppResult<Group> {
        self.stored_group(group)?;
        self.ensure_provider_identifier_free(group)?;

        let mut updated = group.clone();
        updated.version += 1;
        self.working.groups.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn delete_group(&mut self, group: &Group) -> AppResult<()> {
        self.stored_group(group)?;
        self.working.groups.remove(&group.id);
        Ok(())
    }

    async fn list_memberships(&mut self, filter: MembershipFilter) -> AppResult<Vec<Membership>> {
        let memberships = self.working.memberships.iter().copied();
        let selected = match filter {
            MembershipFilter::All => memberships.collect(),
            MembershipFilter::Actor(actor_id) => memberships
                .filter(|membership| membership.actor_id == actor_id)
                .collect(),
            MembershipFilter::Group(group_id) => memberships
                .filter(|membership| membership.group_id == group_id)
                .collect(),
            MembershipFilter::Groups(group_ids) => memberships
                .filter(|membership| group_ids.contains(&membership.group_id))
                .collect(),
        };
        Ok(selected)
    }

    async fn insert_membership(&mut self, membership: Membership) -> AppResult<bool> {
        if membership.account_id != self.account_id {
            return Err(AppError::Validation(format!(
                "membership of actor '{}' belongs to another account",
                membership.actor_id
            )));
        }

        ensure_membership_rows(&self.working, membership)?;
        Ok(self.working.memberships.insert(membership))
    }

    async fn delete_membership(&mut self, membership: Membership) -> AppResult<bool> {
        Ok(self.working.memberships.remove(&membership))
    }

    async fn list_policies_for_groups(&mut self, group_ids: &[GroupId]) -> AppResult<Vec<Policy>> {
        Ok(self
            .working
            .policies
            .values()
            .filter(|policy| group_ids.contains(&policy.group_id))
            .copied()
            .collect())
    }

    async fn delete_policies_for_group(&mut self, group_id: GroupId) -> AppResult<u64> {
        let before = self.working.policies.len();
        self.working
            .policies
            .retain(|_, policy| policy.group_id != group_id);
        Ok((before - self.working.policies.len()) as u64)
    }

    async fn delete_clients_for_actor(&mut self, actor_id: ActorId) -> AppResult<u64> {
        let before = self.working.clients.len();
        self.working
            .clients
            .retain(|_, client| client.actor_id != actor_id);
        Ok((before - self.working.clients.len()) as u64)
    }

    async fn delete_identities_for_actor(&mut self, actor_id: ActorId) -> AppResult<u64> {
        let before = self.working.identities.len();
        self.working
            .identities
            .retain(|_, identity| identity.actor_id != actor_id);
        Ok((before - self.working.identities.len()) as u64)
    }

    async fn invalidate_sessions_for_actor(
        &mut self,
        actor_id: ActorId,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<Session>> {
        let mut invalidated = Vec::new();
        for session in self.working.sessions.values_mut() {
            if session.actor_id == actor_id && session.is_active() {
                session.invalidated_at = Some(at);
                invalidated.push(*session);
            }
        }
        Ok(invalidated)
    }

    async fn expire_grants(
        &mut self,
        filter: GrantFilter,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<AccessGrant>> {
        let mut expired = Vec::new();
        for grant in self.working.grants.values_mut() {
            let selected = grant.actor_id == filter.actor_id
                && filter
                    .policy_id
                    .is_none_or(|policy_id| grant.policy_id == policy_id);
            if selected && grant.is_active_at(at) {
                grant.expires_at = at;
                expired.push(*grant);
            }
        }
        Ok(expired)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let Self {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}
