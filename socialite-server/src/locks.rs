use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard},
};

use socialite_api::{FriendRequestId, PostId};
use tokio::sync::OwnedMutexGuard;

type Lock = Arc<tokio::sync::Mutex<()>>;

/// One async lock per document currently being modified.
///
/// Every read-modify-write of a document happens while holding its guard,
/// so concurrent requests on the same document are applied one after the
/// other. Entries are dropped along with the last guard.
pub struct Locks<K>(Arc<Mutex<HashMap<K, Lock>>>);

pub type PostLocks = Locks<PostId>;
pub type RequestLocks = Locks<FriendRequestId>;

pub struct Guard<K: Copy + Eq + Hash> {
    locks: Locks<K>,
    key: K,
    _guard: OwnedMutexGuard<()>,
}

impl<K> Clone for Locks<K> {
    fn clone(&self) -> Self {
        Locks(self.0.clone())
    }
}

impl<K> Default for Locks<K> {
    fn default() -> Self {
        Locks(Arc::new(Mutex::new(HashMap::new())))
    }
}

impl<K: Copy + Eq + Hash> Locks<K> {
    pub fn new() -> Locks<K> {
        Locks::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<K, Lock>> {
        // the map is never left in an inconsistent state, so poisoning is harmless
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn lock(&self, key: K) -> Guard<K> {
        let lock = self.map().entry(key).or_default().clone();
        Guard {
            locks: self.clone(),
            key,
            _guard: lock.lock_owned().await,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.map().len()
    }
}

impl<K: Copy + Eq + Hash> Drop for Guard<K> {
    fn drop(&mut self) {
        let mut map = self.locks.map();
        // one reference in the map and one in our own guard: nobody is waiting
        if matches!(map.get(&self.key), Some(l) if Arc::strong_count(l) == 2) {
            map.remove(&self.key);
        }
    }
}
