use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use portcullis_application::{AccountStore, AccountTransaction};
use portcullis_core::{AccountId, AppError, AppResult};
use portcullis_domain::{
    AccessGrant, Actor, ActorId, Client, ClientId, GrantId, Group, GroupId, Identity, IdentityId,
    Membership, Policy, PolicyId, Session, SessionId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

mod transaction;


/// Every row of one account as held by [`InMemoryAccountStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountSnapshot {
    /// Actors by id.
    pub actors: BTreeMap<ActorId, Actor>,
    /// Groups by id.
    pub groups: BTreeMap<GroupId, Group>,
    /// Membership pairs.
    pub memberships: BTreeSet<Membership>,
    /// Policies by id.
    pub policies: BTreeMap<PolicyId, Policy>,
    /// Client registrations by id.
    pub clients: BTreeMap<ClientId, Client>,
    /// Directory identities by id.
    pub identities: BTreeMap<IdentityId, Identity>,
    /// Sessions by id, including invalidated ones.
    pub sessions: BTreeMap<SessionId, Session>,
    /// Access grants by id, including expired ones.
    pub grants: BTreeMap<GrantId, AccessGrant>,
}

/// In-memory account store with per-account serialized units of work.
///
/// A unit of work holds the account's lock from `begin` until it commits or
/// is dropped, and writes to a private copy that replaces the stored state on
/// commit.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: Mutex<HashMap<AccountId, Arc<Mutex<AccountSnapshot>>>>,
}

impl InMemoryAccountStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every row of the account.
    pub async fn snapshot(&self, account_id: AccountId) -> AccountSnapshot {
        let state = self.account_state(account_id).await;
        let guard = state.lock().await;
        guard.clone()
    }

    /// Seeds an actor outside of any service workflow.
    pub async fn seed_actor(&self, actor: Actor) -> AppResult<()> {
        self.seed(actor.account_id, |state| {
            insert_unique(&mut state.actors, actor.id, actor, "actor")
        })
        .await
    }

    /// Seeds a group outside of any service workflow.
    pub async fn seed_group(&self, group: Group) -> AppResult<()> {
        self.seed(group.account_id, |state| {
            insert_unique(&mut state.groups, group.id, group, "group")
        })
        .await
    }

    /// Seeds a membership between existing rows.
    pub async fn seed_membership(&self, membership: Membership) -> AppResult<()> {
        self.seed(membership.account_id, |state| {
            ensure_membership_rows(state, membership)?;
            state.memberships.insert(membership);
            Ok(())
        })
        .await
    }

    /// Seeds a policy on an existing group.
    pub async fn seed_policy(&self, policy: Policy) -> AppResult<()> {
        self.seed(policy.account_id, |state| {
            if !state.groups.contains_key(&policy.group_id) {
                return Err(AppError::NotFound(format!(
                    "group '{}' not found",
                    policy.group_id
                )));
            }
            insert_unique(&mut state.policies, policy.id, policy, "policy")
        })
        .await
    }

    /// Seeds a client registration.
    pub async fn seed_client(&self, client: Client) -> AppResult<()> {
        self.seed(client.account_id, |state| {
            insert_unique(&mut state.clients, client.id, client, "client")
        })
        .await
    }

    /// Seeds a directory identity.
    pub async fn seed_identity(&self, identity: Identity) -> AppResult<()> {
        self.seed(identity.account_id, |state| {
            insert_unique(&mut state.identities, identity.id, identity, "identity")
        })
        .await
    }

    /// Seeds a session.
    pub async fn seed_session(&self, session: Session) -> AppResult<()> {
        self.seed(session.account_id, |state| {
            insert_unique(&mut state.sessions, session.id, session, "session")
        })
        .await
    }

    /// Seeds an access grant.
    pub async fn seed_grant(&self, grant: AccessGrant) -> AppResult<()> {
        self.seed(grant.account_id, |state| {
            insert_unique(&mut state.grants, grant.id, grant, "grant")
        })
        .await
    }

    async fn seed<F>(&self, account_id: AccountId, apply: F) -> AppResult<()>
    where
        F: FnOnce(&mut AccountSnapshot) -> AppResult<()>,
    {
        let state = self.account_state(account_id).await;
        let mut guard = state.lock().await;
        apply(&mut guard)
    }

    async fn account_state(&self, account_id: AccountId) -> Arc<Mutex<AccountSnapshot>> {
        let mut accounts = self.accounts.lock().await;
        accounts.entry(account_id).or_default().clone()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn begin(&self, account_id: AccountId) -> AppResult<Box<dyn AccountTransaction>> {
        let state = self.account_state(account_id).await;
        let guard: OwnedMutexGuard<AccountSnapshot> = state.lock_owned().await;

        Ok(Box::new(transaction::InMemoryAccountTransaction::new(
            account_id, guard,
        )))
    }
}

fn insert_unique<K: Ord + std::fmt::Display + Copy, V>(
    rows: &mut BTreeMap<K, V>,
    id: K,
    row: V,
    kind: &str,
) -> AppResult<()> {
    if rows.contains_key(&id) {
        return Err(AppError::Conflict(format!("{kind} '{id}' already exists")));
    }

    rows.insert(id, row);
    Ok(())
}

fn ensure_membership_rows(state: &AccountSnapshot, membership: Membership) -> AppResult<()> {
    if !state.actors.contains_key(&membership.actor_id) {
        return Err(AppError::NotFound(format!(
            "actor '{}' not found",
            membership.actor_id
        )));
    }
    if !state.groups.contains_key(&membership.group_id) {
        return Err(AppError::NotFound(format!(
            "group '{}' not found",
            membership.group_id
        )));
    }

    Ok(())
}
