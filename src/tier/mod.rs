//! C5: the in-memory tier (§4.5) — a per-model bounded cache of hydrated
//! [`CacheEntry`] rows, fronting the scalar store with an adaptive eviction
//! policy.

mod arc;
mod tinylfu;

pub use arc::ArcCache;
pub use tinylfu::TinyLfuCache;

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::{CacheEntry, EntryId};

/// The outcome of recording an access to a key (§4.5.1).
///
/// `GhostHit` is distinct from `Miss`: a policy with ghost lists (ARC) can
/// recognise a key it recently evicted, which must adapt its adaptive
/// parameters *and* regain its frequency-favoured placement once the value
/// is re-fetched — but the value itself isn't available synchronously from
/// inside the policy, since re-fetching it means a round-trip to the scalar
/// store. The caller fetches the value, then must feed it back in through
/// [`EvictionPolicy::insert_after_ghost_hit`], not a plain `insert`, or the
/// ghost-list bookkeeping a [`GhostHit`](TierLookup::GhostHit) already
/// performed gets silently discarded (the entry would land back in the
/// single-access tier instead of the frequency one).
#[derive(Debug, Clone, PartialEq)]
pub enum TierLookup {
    /// The key was live in the tier; here is its value.
    Hit(CacheEntry),
    /// The key was found in a ghost/history list: no value to return, but
    /// the policy has already adjusted its internal state (e.g. ARC's `p`)
    /// and consumed the ghost entry. A recovered value must be re-admitted
    /// via [`EvictionPolicy::insert_after_ghost_hit`].
    GhostHit,
    /// The key is entirely unknown to the policy.
    Miss,
}

impl TierLookup {
    pub fn into_hit(self) -> Option<CacheEntry> {
        match self {
            TierLookup::Hit(entry) => Some(entry),
            TierLookup::GhostHit | TierLookup::Miss => None,
        }
    }

    pub fn is_ghost_hit(&self) -> bool {
        matches!(self, TierLookup::GhostHit)
    }
}

/// A capacity-bounded, single-model eviction policy.
///
/// Not `async`: every operation is pure in-memory bookkeeping, so
/// implementations take `&mut self` and [`MemoryTier`] serialises access
/// with a standard-library mutex rather than an async one.
pub trait EvictionPolicy: Send {
    /// Record an access to `id` (§4.5.1 "State transitions on lookup").
    fn get(&mut self, id: EntryId) -> TierLookup;

    /// Insert or overwrite `entry`, evicting and returning a victim if the
    /// tier was already at capacity. Use this for a genuinely new entry —
    /// one that wasn't just reported as a [`TierLookup::GhostHit`].
    fn insert(&mut self, entry: CacheEntry) -> Option<CacheEntry>;

    /// Re-admit `entry` after [`Self::get`] returned [`TierLookup::GhostHit`]
    /// for its id. Must place the entry with the same frequency-favoured
    /// immunity a real hit would have granted it, without re-running (or
    /// re-adapting on) ghost-list membership the prior `get` already
    /// consumed. Policies with no ghost-list concept (e.g. W-TinyLFU) never
    /// produce a `GhostHit`, so the default — identical to [`Self::insert`]
    /// — is correct for them.
    fn insert_after_ghost_hit(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        self.insert(entry)
    }

    /// Drop `id` from the tier, if present.
    fn remove(&mut self, id: EntryId);

    /// Drop every entry.
    fn clear(&mut self);

    /// Number of entries currently held.
    fn len(&self) -> usize;
}

/// Which adaptive eviction policy new per-model tiers should use.
#[derive(Debug, Clone, Copy)]
pub enum EvictionPolicyKind {
    Arc,
    WTinyLfu,
}

fn new_policy(kind: EvictionPolicyKind, capacity: usize) -> Box<dyn EvictionPolicy> {
    match kind {
        EvictionPolicyKind::Arc => Box::new(ArcCache::new(capacity)),
        EvictionPolicyKind::WTinyLfu => Box::new(TinyLfuCache::new(capacity)),
    }
}

/// Per-model map of bounded in-memory tiers, all using the same eviction
/// policy kind and per-model capacity.
pub struct MemoryTier {
    kind: EvictionPolicyKind,
    capacity: usize,
    models: Mutex<HashMap<String, Box<dyn EvictionPolicy>>>,
}

impl MemoryTier {
    pub fn new(kind: EvictionPolicyKind, capacity: usize) -> Self {
        Self { kind, capacity, models: Mutex::new(HashMap::new()) }
    }

    /// Look up `id` under `model`, recording the access with the policy. A
    /// [`TierLookup::GhostHit`] means the caller must re-admit any recovered
    /// value through [`Self::insert_after_ghost_hit`], not [`Self::insert`]
    /// (§4.5.1).
    pub fn get(&self, model: &str, id: EntryId) -> TierLookup {
        let mut models = self.models.lock().expect("tier lock poisoned");
        match models.get_mut(model) {
            Some(policy) => policy.get(id),
            None => TierLookup::Miss,
        }
    }

    /// Insert `entry` under its own `model`, evicting a victim if needed.
    /// Eviction here only drops the tier's copy; the scalar row and vector
    /// index entry are untouched (§4.5 invariant).
    pub fn insert(&self, entry: CacheEntry) -> Option<CacheEntry> {
        self.insert_with(entry, |policy, entry| policy.insert(entry))
    }

    /// Re-admit `entry` after a [`TierLookup::GhostHit`] for its id, so the
    /// policy grants it the frequency-favoured placement a ghost hit earns
    /// instead of treating it as a brand-new single-access entry.
    pub fn insert_after_ghost_hit(&self, entry: CacheEntry) -> Option<CacheEntry> {
        self.insert_with(entry, |policy, entry| policy.insert_after_ghost_hit(entry))
    }

    fn insert_with(
        &self,
        entry: CacheEntry,
        op: impl FnOnce(&mut dyn EvictionPolicy, CacheEntry) -> Option<CacheEntry>,
    ) -> Option<CacheEntry> {
        let model = entry.model.clone();
        let mut models = self.models.lock().expect("tier lock poisoned");
        let policy = models
            .entry(model.clone())
            .or_insert_with(|| new_policy(self.kind, self.capacity));
        let evicted = op(policy.as_mut(), entry);
        let size = policy.len();
        let policy_label = match self.kind {
            EvictionPolicyKind::Arc => "arc",
            EvictionPolicyKind::WTinyLfu => "w-tinylfu",
        };
        drop(models);
        metrics::gauge!(crate::telemetry::TIER_SIZE, "model" => model.clone()).set(size as f64);
        if evicted.is_some() {
            metrics::counter!(crate::telemetry::TIER_EVICTIONS_TOTAL, "model" => model, "policy" => policy_label)
                .increment(1);
        }
        evicted
    }

    pub fn remove(&self, model: &str, id: EntryId) {
        let mut models = self.models.lock().expect("tier lock poisoned");
        if let Some(policy) = models.get_mut(model) {
            policy.remove(id);
        }
    }

    pub fn truncate(&self, model: &str) {
        let mut models = self.models.lock().expect("tier lock poisoned");
        if let Some(policy) = models.get_mut(model) {
            policy.clear();
        }
    }

    pub fn len(&self, model: &str) -> usize {
        let models = self.models.lock().expect("tier lock poisoned");
        models.get(model).map(|p| p.len()).unwrap_or(0)
    }
}
