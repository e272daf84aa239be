use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use portcullis_domain::{ActorId, GroupId};
use serde::Serialize;

/// Upsert/delete identifier sets computed for one full-replacement sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncPlan<K> {
    /// Identifiers present in the incoming roster, whether or not a row exists.
    pub upsert: Vec<K>,
    /// Identifiers of provider-owned rows absent from the incoming roster.
    pub delete: Vec<K>,
}

impl<K> SyncPlan<K> {
    /// Returns whether the plan neither upserts nor deletes anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upsert.is_empty() && self.delete.is_empty()
    }
}

/// Local key of a synced membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MembershipKey {
    /// Provider-owned group.
    pub group_id: GroupId,
    /// Member actor.
    pub actor_id: ActorId,
}

/// Diffs the identifiers a provider currently owns against an incoming roster.
///
/// `owned` must only hold identifiers of rows owned by the provider under sync.
/// Duplicated incoming identifiers collapse to their last occurrence.
#[must_use]
pub fn plan_sync<K>(owned: &[K], incoming: &[K]) -> SyncPlan<K>
where
    K: Clone + Eq + Hash,
{
    let upsert = dedupe_last_wins(incoming.to_vec(), Clone::clone);
    let present: HashSet<&K> = upsert.iter().collect();

    let mut seen = HashSet::new();
    let delete = owned
        .iter()
        .filter(|key| !present.contains(key) && seen.insert(*key))
        .cloned()
        .collect();

    SyncPlan { upsert, delete }
}

/// Keeps the last record per key, ordered by the position of that last record.
pub(crate) fn dedupe_last_wins<T, K, F>(records: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut slots: Vec<Option<T>> = Vec::with_capacity(records.len());

    for record in records {
        if let Some(previous) = positions.insert(key(&record), slots.len()) {
            slots[previous] = None;
        }
        slots.push(Some(record));
    }

    slots.into_iter().flatten().collect()
}
