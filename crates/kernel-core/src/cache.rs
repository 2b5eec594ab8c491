//! WorkingMemoryCache
//!
//! Capacity-bounded, priority-ordered cache of reflex/deep-think results,
//! plus a parallel anomaly map written during deep-think discovery. All
//! mutating operations and snapshots take the cache's single exclusive
//! lock, per the concurrency model in spec §5.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::tensor::{Tensor, TensorOps};

/// A deduced constraint recorded against a cache key during deep-think
/// discovery (`deduceGeometricGap`). Opaque to the cache itself.
pub type DeducedConstraint = Tensor;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub vector: Tensor,
    pub fitness: f32,
    pub hits: u32,
    pub age_ticks: u64,
    pub entry_type: String,
    pub id: String,
    pub burn: f32,
}

impl CacheEntry {
    /// `fitness·(1+hits) − ageDecay`, with `ageDecay = ticksSinceTouch ×
    /// 1e-6` kept tiny so fitness/hits dominate ordering and staleness only
    /// breaks near-ties. `age_ticks` holds the tick the entry was last
    /// touched, so elapsed time is `current_tick - age_ticks`.
    pub fn priority(&self, current_tick: u64) -> f32 {
        let age_decay = current_tick.saturating_sub(self.age_ticks) as f32 * 1e-6;
        self.fitness * (1.0 + self.hits as f32) - age_decay
    }
}

struct Inner {
    entries: HashMap<String, CacheEntry>,
    anomalies: HashMap<String, Option<DeducedConstraint>>,
    capacity: usize,
    tick: u64,
}

/// Priority-ordered, capacity-bounded working-memory cache.
pub struct WorkingMemoryCache {
    inner: Mutex<Inner>,
}

impl WorkingMemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                anomalies: HashMap::new(),
                capacity: capacity.max(1),
                tick: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scan all entries for the best cosine-similarity match at or above
    /// `threshold`. Ties break to higher fitness, then older age.
    pub fn cosine_similarity_hit(&self, vec: &Tensor, threshold: f32) -> Option<(String, f32)> {
        let inner = self.inner.lock().unwrap();
        let mut best: Option<(&CacheEntry, f32)> = None;
        for entry in inner.entries.values() {
            let sim = TensorOps::cosine_similarity(&entry.vector, vec);
            if sim < threshold {
                continue;
            }
            best = match best {
                None => Some((entry, sim)),
                Some((cur, cur_sim)) => {
                    if sim > cur_sim
                        || (sim == cur_sim && entry.fitness > cur.fitness)
                        || (sim == cur_sim
                            && entry.fitness == cur.fitness
                            && entry.age_ticks < cur.age_ticks)
                    {
                        Some((entry, sim))
                    } else {
                        Some((cur, cur_sim))
                    }
                }
            };
        }
        best.map(|(entry, sim)| (entry.key.clone(), sim))
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.inner.lock().unwrap().entries.get(key).cloned()
    }

    /// Upsert `key`. On update: `fitness = max(old, new)`, `hits += 1`, age
    /// refreshed. On insert at capacity: evict the lowest-priority entry
    /// first.
    pub fn promote_to_cache(
        &self,
        key: &str,
        vec: Tensor,
        fitness: f32,
        entry_type: &str,
        id: &str,
        burn: f32,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.tick += 1;
        let tick = inner.tick;
        if let Some(existing) = inner.entries.get_mut(key) {
            existing.fitness = existing.fitness.max(fitness);
            existing.hits += 1;
            existing.age_ticks = tick;
            existing.vector = vec;
            existing.burn = burn;
            return;
        }
        if inner.entries.len() >= inner.capacity {
            if let Some(evict_key) = inner
                .entries
                .values()
                .min_by(|a, b| {
                    a.priority(tick)
                        .partial_cmp(&b.priority(tick))
                        .unwrap()
                })
                .map(|e| e.key.clone())
            {
                inner.entries.remove(&evict_key);
            }
        }
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                vector: vec,
                fitness,
                hits: 0,
                age_ticks: tick,
                entry_type: entry_type.to_string(),
                id: id.to_string(),
                burn,
            },
        );
    }

    /// Top-`k` copies by descending priority.
    pub fn snapshot_by_priority(&self, k: usize) -> Vec<CacheEntry> {
        let inner = self.inner.lock().unwrap();
        let tick = inner.tick;
        let mut entries: Vec<CacheEntry> = inner.entries.values().cloned().collect();
        entries.sort_by(|a, b| b.priority(tick).partial_cmp(&a.priority(tick)).unwrap());
        entries.truncate(k);
        entries
    }

    pub fn flag_anomaly(&self, key: &str, deduced: Option<DeducedConstraint>) {
        self.inner
            .lock()
            .unwrap()
            .anomalies
            .insert(key.to_string(), deduced);
    }

    pub fn get_anomalies(&self) -> HashMap<String, Option<DeducedConstraint>> {
        self.inner.lock().unwrap().anomalies.clone()
    }

    pub fn clear_anomalies(&self) {
        self.inner.lock().unwrap().anomalies.clear();
    }

    /// `fitness = max(floor, fitness·multiplier)` for every entry.
    pub fn apply_time_decay(&self, fitness_multiplier: f32, floor: f32) {
        let mut inner = self.inner.lock().unwrap();
        for entry in inner.entries.values_mut() {
            entry.fitness = (entry.fitness * fitness_multiplier).max(floor);
        }
    }

    /// Drop all entries and anomalies.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();
        inner.anomalies.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f32) -> Tensor {
        Tensor::from_vec(vec![x, 1.0 - x])
    }

    #[test]
    fn capacity_is_never_exceeded() {
        let cache = WorkingMemoryCache::new(2);
        cache.promote_to_cache("a", v(0.1), 0.5, "t", "1", 0.1);
        cache.promote_to_cache("b", v(0.2), 0.5, "t", "2", 0.1);
        cache.promote_to_cache("c", v(0.3), 0.9, "t", "3", 0.1);
        assert!(cache.len() <= 2);
    }

    #[test]
    fn update_takes_max_fitness_and_bumps_hits() {
        let cache = WorkingMemoryCache::new(8);
        cache.promote_to_cache("a", v(0.1), 0.3, "t", "1", 0.0);
        cache.promote_to_cache("a", v(0.1), 0.7, "t", "1", 0.0);
        let entry = cache.get("a").unwrap();
        assert_eq!(entry.fitness, 0.7);
        assert_eq!(entry.hits, 1);
    }

    #[test]
    fn eviction_drops_lowest_priority() {
        let cache = WorkingMemoryCache::new(1);
        cache.promote_to_cache("low", v(0.1), 0.1, "t", "1", 0.0);
        cache.promote_to_cache("high", v(0.2), 0.9, "t", "2", 0.0);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("high").is_some());
        assert!(cache.get("low").is_none());
    }

    #[test]
    fn cosine_hit_respects_threshold() {
        let cache = WorkingMemoryCache::new(8);
        let vec = Tensor::from_vec(vec![1.0, 0.0]);
        cache.promote_to_cache("a", vec.clone(), 0.5, "t", "1", 0.0);
        let hit = cache.cosine_similarity_hit(&vec, 0.99);
        assert!(hit.is_some());
        let miss = cache.cosine_similarity_hit(&Tensor::from_vec(vec![0.0, 1.0]), 0.5);
        assert!(miss.is_none());
    }

    #[test]
    fn decay_respects_floor() {
        let cache = WorkingMemoryCache::new(8);
        cache.promote_to_cache("a", v(0.1), 0.5, "t", "1", 0.0);
        cache.apply_time_decay(0.0, 0.2);
        assert_eq!(cache.get("a").unwrap().fitness, 0.2);
    }

    #[test]
    fn clear_drops_entries_and_anomalies() {
        let cache = WorkingMemoryCache::new(8);
        cache.promote_to_cache("a", v(0.1), 0.5, "t", "1", 0.0);
        cache.flag_anomaly("a", None);
        cache.clear();
        assert_eq!(cache.len(), 0);
        assert!(cache.get_anomalies().is_empty());
    }
}
