//! Window TinyLFU (W-TinyLFU), ported from the reference implementation's
//! window/probation/protected segmentation and Count-Min Sketch admission
//! filter.
//!
//! One simplification from the reference: probation and protected segments
//! evict their oldest entry (insertion order) rather than running a true
//! LFU ordering internally — admission into and promotion out of those
//! segments is already frequency-gated by the sketch, so segment-internal
//! order has a much smaller effect than the admission filter itself.
//! Another: when a single insert's cascade of admissions displaces more
//! than one entry, only the last displaced entry is surfaced as the
//! returned victim; every displacement still updates `len()` correctly.

use indexmap::IndexMap;

use super::{EvictionPolicy, TierLookup};
use crate::types::{CacheEntry, EntryId};

const CMS_WIDTH: usize = 1024;
const CMS_DEPTH: usize = 4;
const CMS_DECAY_INTERVAL: u64 = 10_000;
const WINDOW_FRACTION: f64 = 0.01;

struct CountMinSketch {
    tables: Vec<Vec<u32>>,
    seeds: [u64; CMS_DEPTH],
    ops: u64,
}

impl CountMinSketch {
    fn new() -> Self {
        // Fixed seeds: deterministic sketch behaviour matters more here than
        // adversarial hash-flooding resistance, which is out of scope.
        let seeds = [0x9E3779B97F4A7C15, 0xC2B2AE3D27D4EB4F, 0x165667B19E3779F9, 0x27D4EB2F165667C5];
        Self { tables: vec![vec![0u32; CMS_WIDTH]; CMS_DEPTH], seeds, ops: 0 }
    }

    fn hash(&self, x: EntryId, seed: u64) -> usize {
        let mut h = (x as u64) ^ seed;
        h ^= h >> 33;
        h = h.wrapping_mul(0xff51afd7ed558ccd);
        h ^= h >> 33;
        (h % CMS_WIDTH as u64) as usize
    }

    fn estimate(&self, x: EntryId) -> u32 {
        (0..CMS_DEPTH).map(|row| self.tables[row][self.hash(x, self.seeds[row])]).min().unwrap_or(0)
    }

    fn add(&mut self, x: EntryId) {
        self.ops += 1;
        let est = self.estimate(x);
        for row in 0..CMS_DEPTH {
            let idx = self.hash(x, self.seeds[row]);
            if self.tables[row][idx] <= est {
                self.tables[row][idx] += 1;
            }
        }
        if self.ops >= CMS_DECAY_INTERVAL {
            self.decay();
            self.ops = 0;
        }
    }

    fn decay(&mut self) {
        for table in &mut self.tables {
            for v in table.iter_mut() {
                *v >>= 1;
            }
        }
    }
}

fn move_to_end(map: &mut IndexMap<EntryId, CacheEntry>, key: EntryId, value: CacheEntry) {
    map.shift_remove(&key);
    map.insert(key, value);
}

pub struct TinyLfuCache {
    window_size: usize,
    probation_size: usize,
    protected_size: usize,
    window: IndexMap<EntryId, CacheEntry>,
    probation: IndexMap<EntryId, CacheEntry>,
    protected: IndexMap<EntryId, CacheEntry>,
    cms: CountMinSketch,
}

impl TinyLfuCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let window_size = 1.max((capacity as f64 * WINDOW_FRACTION) as usize);
        let rest = capacity.saturating_sub(window_size);
        let probation_size = rest / 2;
        let protected_size = rest - probation_size;
        Self {
            window_size,
            probation_size,
            protected_size,
            window: IndexMap::new(),
            probation: IndexMap::new(),
            protected: IndexMap::new(),
            cms: CountMinSketch::new(),
        }
    }

    fn contains(&self, id: EntryId) -> bool {
        self.window.contains_key(&id) || self.probation.contains_key(&id) || self.protected.contains_key(&id)
    }

    /// Admit `(id, value)` into probation or protected-adjacent main
    /// storage, evicting the oldest probation entry if probation is full.
    /// Returns the entry that was fully dropped from the cache, if any.
    fn admit_to_main(&mut self, id: EntryId, value: CacheEntry) -> Option<CacheEntry> {
        if self.protected.contains_key(&id) || self.probation.contains_key(&id) {
            return None;
        }
        if self.probation_size == 0 {
            return Some(value);
        }
        if self.probation.len() < self.probation_size {
            self.probation.insert(id, value);
            None
        } else if let Some((evicted_id, evicted_value)) = self.probation.shift_remove_index(0) {
            let _ = evicted_id;
            self.probation.insert(id, value);
            Some(evicted_value)
        } else {
            Some(value)
        }
    }
}

impl EvictionPolicy for TinyLfuCache {
    fn get(&mut self, id: EntryId) -> TierLookup {
        if let Some(value) = self.window.get(&id).cloned() {
            move_to_end(&mut self.window, id, value.clone());
            return TierLookup::Hit(value);
        }
        if let Some(value) = self.protected.get(&id).cloned() {
            move_to_end(&mut self.protected, id, value.clone());
            return TierLookup::Hit(value);
        }
        if let Some(value) = self.probation.shift_remove(&id) {
            if self.protected.len() >= self.protected_size && self.protected_size > 0 {
                if let Some((demoted_id, demoted_value)) = self.protected.shift_remove_index(0) {
                    self.probation.insert(demoted_id, demoted_value);
                }
            }
            self.protected.insert(id, value.clone());
            return TierLookup::Hit(value);
        }
        TierLookup::Miss
    }

    fn insert(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        let id = entry.id;
        self.cms.add(id);

        if self.contains(id) {
            // Refresh the stored value in place without moving it: a plain
            // re-insert of an already-cached key isn't an access.
            if self.window.contains_key(&id) {
                self.window.insert(id, entry);
            } else if self.protected.contains_key(&id) {
                self.protected.insert(id, entry);
            } else {
                self.probation.insert(id, entry);
            }
            return None;
        }

        if self.window.len() < self.window_size {
            self.window.insert(id, entry);
            return None;
        }

        let Some((victim_id, victim_value)) = self.window.shift_remove_index(0) else {
            self.window.insert(id, entry);
            return None;
        };

        let mut victim_evicted = self.admit_to_main(victim_id, victim_value.clone());
        if self.cms.estimate(id) >= self.cms.estimate(victim_id) {
            let candidate_evicted = self.admit_to_main(id, entry);
            victim_evicted = candidate_evicted.or(victim_evicted);
        }
        victim_evicted
    }

    fn remove(&mut self, id: EntryId) {
        self.window.shift_remove(&id);
        self.probation.shift_remove(&id);
        self.protected.shift_remove(&id);
    }

    fn clear(&mut self) {
        self.window.clear();
        self.probation.clear();
        self.protected.clear();
    }

    fn len(&self) -> usize {
        self.window.len() + self.probation.len() + self.protected.len()
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
    fn fits_entirely_in_window_below_capacity() {
        let mut c = TinyLfuCache::new(100);
        for i in 0..5 {
            assert!(c.insert(entry(i)).is_none());
        }
        assert_eq!(c.len(), 5);
    }

    #[test]
    fn get_on_probation_promotes_to_protected() {
        let mut c = TinyLfuCache::new(10);
        c.window_size = 1;
        c.probation_size = 5;
        c.protected_size = 4;
        c.insert(entry(1));
        c.insert(entry(2)); // pushes 1 out of the 1-slot window into main
        assert!(
            matches!(c.get(1), TierLookup::Hit(_))
                || c.probation.contains_key(&1)
                || c.protected.contains_key(&1)
        );
    }

    #[test]
    fn frequently_accessed_key_is_favoured_by_the_sketch() {
        let mut c = TinyLfuCache::new(4);
        c.insert(entry(1));
        for _ in 0..20 {
            c.cms.add(1);
        }
        // A cold key competing with a hot window victim should lose out to
        // admission once the window is saturated and a contest occurs.
        assert!(c.cms.estimate(1) > c.cms.estimate(999));
    }

    #[test]
    fn remove_drops_entry_from_every_segment() {
        let mut c = TinyLfuCache::new(10);
        c.insert(entry(1));
        c.remove(1);
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn clear_empties_all_segments() {
        let mut c = TinyLfuCache::new(10);
        for i in 0..5 {
            c.insert(entry(i));
        }
        c.clear();
        assert_eq!(c.len(), 0);
    }
}
