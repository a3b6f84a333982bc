//! Adaptive Replacement Cache (ARC), ported from the reference
//! implementation's `T1`/`T2`/`B1`/`B2` list structure and `p` adaptation.
//!
//! Ghost lists here track keys only (no stale payload): a ghost hit can't
//! serve the entry itself, since there is nothing upstream to re-fetch it
//! from inside this trait — the caller falls through to the scalar store on
//! a tier miss either way. What the ghost lists still drive correctly is the
//! adaptive target `p`, which is ARC's actual point.

use indexmap::{IndexMap, IndexSet};

use super::{EvictionPolicy, TierLookup};
use crate::types::{CacheEntry, EntryId};

pub struct ArcCache {
    capacity: usize,
    p: usize,
    t1: IndexMap<EntryId, CacheEntry>,
    t2: IndexMap<EntryId, CacheEntry>,
    b1: IndexSet<EntryId>,
    b2: IndexSet<EntryId>,
}

fn move_to_end(map: &mut IndexMap<EntryId, CacheEntry>, key: EntryId, value: CacheEntry) {
    map.shift_remove(&key);
    map.insert(key, value);
}

impl ArcCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            p: 0,
            t1: IndexMap::new(),
            t2: IndexMap::new(),
            b1: IndexSet::new(),
            b2: IndexSet::new(),
        }
    }

    fn evict_internal(&mut self) -> Option<CacheEntry> {
        let mut victim = None;
        while self.t1.len() + self.t2.len() > self.capacity {
            let evicted = if self.t1.len() > self.p || (self.t1.is_empty() && !self.t2.is_empty()) {
                let (key, value) = self.t1.shift_remove_index(0).expect("t1 non-empty");
                self.b1.insert(key);
                value
            } else {
                let (key, value) = self.t2.shift_remove_index(0).expect("t2 non-empty");
                self.b2.insert(key);
                value
            };
            victim = Some(evicted);
        }
        while self.b1.len() > self.capacity.saturating_sub(self.p) {
            self.b1.shift_remove_index(0);
        }
        while self.b2.len() > self.p {
            self.b2.shift_remove_index(0);
        }
        victim
    }
}

impl EvictionPolicy for ArcCache {
    fn get(&mut self, id: EntryId) -> TierLookup {
        if let Some(value) = self.t1.shift_remove(&id) {
            move_to_end(&mut self.t2, id, value.clone());
            self.p = self.p.saturating_sub(1);
            self.evict_internal();
            return TierLookup::Hit(value);
        }
        if let Some(value) = self.t2.get(&id).cloned() {
            move_to_end(&mut self.t2, id, value.clone());
            self.p = (self.p + 1).min(self.capacity);
            self.evict_internal();
            return TierLookup::Hit(value);
        }
        if self.b1.shift_remove(&id) {
            self.p = (self.p + 1).min(self.capacity);
            self.evict_internal();
            return TierLookup::GhostHit;
        }
        if self.b2.shift_remove(&id) {
            self.p = self.p.saturating_sub(1);
            self.evict_internal();
            return TierLookup::GhostHit;
        }
        TierLookup::Miss
    }

    fn insert(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        let id = entry.id;
        self.t1.shift_remove(&id);
        self.t2.shift_remove(&id);
        let was_ghost_b1 = self.b1.shift_remove(&id);
        let was_ghost_b2 = self.b2.shift_remove(&id);

        if was_ghost_b1 {
            self.p = (self.p + 1).min(self.capacity);
            move_to_end(&mut self.t2, id, entry);
        } else if was_ghost_b2 {
            self.p = self.p.saturating_sub(1);
            move_to_end(&mut self.t2, id, entry);
        } else {
            move_to_end(&mut self.t1, id, entry);
        }
        self.evict_internal()
    }

    /// `get` already consumed the ghost-list membership and adapted `p` for
    /// this id (§4.5.1: a ghost hit is one atomic transition). Placing it
    /// straight at MRU of `T2` — without re-checking `B1`/`B2`, which would
    /// find nothing and fall through to `T1` — is what gives a
    /// ghost-recovered entry the scan-resistance a real `T2` hit has.
    fn insert_after_ghost_hit(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        let id = entry.id;
        self.t1.shift_remove(&id);
        move_to_end(&mut self.t2, id, entry);
        self.evict_internal()
    }

    fn remove(&mut self, id: EntryId) {
        self.t1.shift_remove(&id);
        self.t2.shift_remove(&id);
        self.b1.shift_remove(&id);
        self.b2.shift_remove(&id);
    }

    fn clear(&mut self) {
        self.t1.clear();
        self.t2.clear();
        self.b1.clear();
        self.b2.clear();
        self.p = 0;
    }

    fn len(&self) -> usize {
        self.t1.len() + self.t2.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: EntryId) -> CacheEntry {
        CacheEntry {
            id,
            prompt: format!("p{id}"),
            answer: crate::types::Answer::Str(format!("a{id}")),
            model: "m".into(),
            embedding: vec![id as f32],
            hit_count: 0,
            deleted: false,
        }
    }

    #[test]
    fn insert_under_capacity_never_evicts() {
        let mut arc = ArcCache::new(3);
        assert!(arc.insert(entry(1)).is_none());
        assert!(arc.insert(entry(2)).is_none());
        assert_eq!(arc.len(), 2);
    }

    #[test]
    fn insert_over_capacity_evicts_lru_from_t1() {
        let mut arc = ArcCache::new(2);
        arc.insert(entry(1));
        arc.insert(entry(2));
        let evicted = arc.insert(entry(3));
        assert_eq!(evicted.unwrap().id, 1);
        assert_eq!(arc.len(), 2);
    }

    #[test]
    fn get_promotes_t1_entry_protecting_it_from_eviction() {
        let mut arc = ArcCache::new(2);
        arc.insert(entry(1));
        assert!(matches!(arc.get(1), TierLookup::Hit(_))); // promotes 1 from t1 to t2
        arc.insert(entry(2));
        // t1 now holds only {2}; a third insert evicts 2 from t1, not the
        // promoted entry 1 sitting in t2.
        let evicted = arc.insert(entry(3));
        assert_eq!(evicted.unwrap().id, 2);
        assert!(matches!(arc.get(1), TierLookup::Hit(_)));
    }

    #[test]
    fn ghost_hit_adapts_p_without_returning_a_value() {
        let mut arc = ArcCache::new(1);
        arc.insert(entry(1));
        arc.insert(entry(2)); // evicts 1 into b1
        assert_eq!(arc.get(1), TierLookup::GhostHit);
        assert_eq!(arc.p, 1);
    }

    #[test]
    fn ghost_hit_recovery_lands_in_t2_not_t1() {
        // Regression for the single-access re-admission bug: a ghost-hit
        // recovery must use `insert_after_ghost_hit`, which places the
        // recovered entry straight into T2 (frequency-favoured), not a
        // plain `insert`, which would route it into T1 (single-access) and
        // leave it immediately vulnerable to the next T1 eviction.
        let mut arc = ArcCache::new(2);
        arc.insert(entry(1));
        arc.insert(entry(2)); // t1 = [1, 2]
        arc.insert(entry(3)); // evicts 1 into b1; t1 = [2, 3]
        assert_eq!(arc.get(1), TierLookup::GhostHit);

        // Recover the value (as `DataManager::hydrate` would after a
        // scalar-store fetch) and re-admit it via the ghost-hit path.
        let recovered = entry(1);
        assert!(arc.insert_after_ghost_hit(recovered).is_none());

        assert!(arc.t2.contains_key(&1));
        assert!(!arc.t1.contains_key(&1));
    }

    #[test]
    fn plain_insert_after_ghost_hit_would_have_landed_in_t1() {
        // Documents the bug the previous test guards against: feeding a
        // ghost-recovered entry through the *plain* `insert` path (as the
        // old `DataManager::hydrate` did) loses T2 immunity, because by the
        // time `insert` runs, `get` has already consumed B1/B2 membership,
        // so `insert` can't tell this apart from a brand-new key.
        let mut arc = ArcCache::new(2);
        arc.insert(entry(1));
        arc.insert(entry(2));
        arc.insert(entry(3)); // evicts 1 into b1
        assert_eq!(arc.get(1), TierLookup::GhostHit);

        arc.insert(entry(1)); // the buggy path: ghost membership already gone
        assert!(arc.t1.contains_key(&1));
        assert!(!arc.t2.contains_key(&1));
    }

    #[test]
    fn clear_resets_everything() {
        let mut arc = ArcCache::new(2);
        arc.insert(entry(1));
        arc.get(1);
        arc.clear();
        assert_eq!(arc.len(), 0);
        assert_eq!(arc.p, 0);
    }
}
