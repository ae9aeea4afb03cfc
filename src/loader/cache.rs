//! Bounded map of bound units, keyed by app id.

use std::collections::HashMap;

use tracing::debug;

use super::executor::LoadedUnit;

struct CacheEntry {
    unit: LoadedUnit,
    /// Load order; smallest is evicted first
    seq: u64,
}

/// Owned id -> unit cache with a hard capacity.
///
/// Re-binding an id replaces its unit. When the cache is full the unit that
/// was loaded longest ago is evicted.
pub struct UnitCache {
    capacity: usize,
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
}

impl UnitCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, app_id: &str) -> Option<&LoadedUnit> {
        self.entries.get(app_id).map(|e| &e.unit)
    }

    pub fn contains(&self, app_id: &str) -> bool {
        self.entries.contains_key(app_id)
    }

    /// Insert or replace the unit for its app id.
    pub fn insert(&mut self, unit: LoadedUnit) -> &LoadedUnit {
        let app_id = unit.app_id.clone();
        self.entries.remove(&app_id);

        while self.entries.len() >= self.capacity {
            self.evict_oldest();
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        &self
            .entries
            .entry(app_id)
            .or_insert(CacheEntry { unit, seq })
            .unit
    }

    pub fn remove(&mut self, app_id: &str) -> Option<LoadedUnit> {
        self.entries.remove(app_id).map(|e| e.unit)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Units in load order, oldest first.
    pub fn units(&self) -> Vec<&LoadedUnit> {
        let mut entries: Vec<&CacheEntry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| &e.unit).collect()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.seq)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            self.entries.remove(&id);
            debug!(app_id = %id, "Evicted loaded unit");
        }
    }
}
