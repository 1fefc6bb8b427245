use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use shared::{domain::Resource, protocol::PageEnvelope};

use crate::key::{CachePrefix, FetchKey};

/// One page as returned by the backend. Never mutated once cached.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total_pages: u32,
    pub total_count: u64,
}

impl<T> PageResult<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_pages: 0,
            total_count: 0,
        }
    }
}

impl<T> From<PageEnvelope<T>> for PageResult<T> {
    fn from(envelope: PageEnvelope<T>) -> Self {
        Self {
            items: envelope.data,
            total_pages: envelope.total_pages,
            total_count: envelope.total_count,
        }
    }
}

#[derive(Debug)]
pub struct CacheEntry<T> {
    pub result: Arc<PageResult<T>>,
    pub stale: bool,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            result: Arc::clone(&self.result),
            stale: self.stale,
        }
    }
}

impl<T> CacheEntry<T> {
    pub fn fresh(&self) -> Option<Arc<PageResult<T>>> {
        (!self.stale).then(|| Arc::clone(&self.result))
    }
}

/// Page cache shared by every controller of a resource.
///
/// `invalidate` marks entries stale instead of dropping them and bumps the
/// resource epoch; writers hand `set_if_epoch` the epoch they observed at
/// request time so that a response issued before an invalidation never
/// lands as fresh.
pub trait QueryCache<T>: Send + Sync {
    fn get(&self, key: &FetchKey) -> Option<CacheEntry<T>>;
    fn set(&self, key: FetchKey, result: Arc<PageResult<T>>);
    /// Stores `result` only while the resource epoch still equals `epoch`,
    /// checked under the same lock as the write.
    fn set_if_epoch(&self, key: FetchKey, result: Arc<PageResult<T>>, epoch: u64) -> bool;
    fn invalidate(&self, prefix: &CachePrefix) -> usize;
    fn epoch(&self, resource: Resource) -> u64;
}

struct CacheState<T> {
    entries: HashMap<FetchKey, CacheEntry<T>>,
    insertion_order: VecDeque<FetchKey>,
    epochs: HashMap<Resource, u64>,
}

pub struct MemoryQueryCache<T> {
    state: RwLock<CacheState<T>>,
    capacity: Option<usize>,
}

impl<T> Default for MemoryQueryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoryQueryCache<T> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CacheState {
                entries: HashMap::new(),
                insertion_order: VecDeque::new(),
                epochs: HashMap::new(),
            }),
            capacity: None,
        }
    }

    /// Keeps at most `capacity` pages, evicting the oldest first.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::new()
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn store(&self, state: &mut CacheState<T>, key: FetchKey, result: Arc<PageResult<T>>) {
        let entry = CacheEntry {
            result,
            stale: false,
        };
        if state.entries.insert(key.clone(), entry).is_none() {
            state.insertion_order.push_back(key);
        }

        let Some(capacity) = self.capacity else {
            return;
        };
        while state.entries.len() > capacity {
            let Some(oldest) = state.insertion_order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState<T>> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState<T>> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Send + Sync> QueryCache<T> for MemoryQueryCache<T> {
    fn get(&self, key: &FetchKey) -> Option<CacheEntry<T>> {
        self.read().entries.get(key).cloned()
    }

    fn set(&self, key: FetchKey, result: Arc<PageResult<T>>) {
        let mut guard = self.write();
        self.store(&mut guard, key, result);
    }

    fn set_if_epoch(&self, key: FetchKey, result: Arc<PageResult<T>>, epoch: u64) -> bool {
        let mut guard = self.write();
        let current = guard.epochs.get(&key.resource).copied().unwrap_or_default();
        if current != epoch {
            return false;
        }
        self.store(&mut guard, key, result);
        true
    }

    fn invalidate(&self, prefix: &CachePrefix) -> usize {
        let mut guard = self.write();
        *guard.epochs.entry(prefix.resource).or_default() += 1;
        let mut marked = 0;
        for (key, entry) in guard.entries.iter_mut() {
            if prefix.matches(key) && !entry.stale {
                entry.stale = true;
                marked += 1;
            }
        }
        marked
    }

    fn epoch(&self, resource: Resource) -> u64 {
        self.read().epochs.get(&resource).copied().unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
