//! Transform cache with a reverse index for exact invalidation.
//!
//! Structure:
//! - entries: `(dest, orig)` key -> composed 4x4 transform
//! - node index: frame id -> set of keys whose resolution path touched it
//!
//! The two maps move together: a key never enters the cache without being
//! indexed under every frame id its resolution traversed, and invalidating a
//! frame removes exactly the keys registered under it — nothing more,
//! nothing less. Entries have no expiry; eviction is purely change-driven.
//!
//! Keys are directional: `(A, B)` and `(B, A)` are distinct entries whose
//! values are mathematical inverses but are computed and evicted
//! independently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::DMat4;
use indexmap::{IndexMap, IndexSet};
use log::debug;

use crate::graph::{FrameId, FrameRef};

/// Ordered `(destination, origin)` pair identifying a directional query
pub type TransformKey = (FrameRef, FrameRef);

/// Hit/miss counters for monitoring cache effectiveness
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.hits() + self.misses()
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Cache of resolved transforms plus the frame -> keys reverse index
#[derive(Debug, Default)]
pub struct TransformCache {
    entries: HashMap<TransformKey, DMat4>,
    node_index: IndexMap<FrameId, IndexSet<TransformKey>>,
    stats: CacheStats,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure lookup; never recomputes
    pub fn get(&self, key: &TransformKey) -> Option<DMat4> {
        let entry = self.entries.get(key).copied();
        if entry.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        entry
    }

    /// Insert an entry and index it under every frame id its resolution
    /// traversed (endpoints included).
    pub fn insert(&mut self, key: TransformKey, transform: DMat4, touched: &[FrameId]) {
        for id in touched {
            self.node_index.entry(*id).or_default().insert(key.clone());
        }
        self.entries.insert(key, transform);
    }

    /// Evict every entry whose resolution path touched `id`.
    ///
    /// Evicted keys are scrubbed from the other frames' index sets as well,
    /// so the index never references a key the cache no longer holds.
    /// Returns the number of entries removed.
    pub fn invalidate(&mut self, id: FrameId) -> usize {
        let Some(keys) = self.node_index.shift_remove(&id) else {
            return 0;
        };
        let mut evicted = 0;
        for key in &keys {
            if self.entries.remove(key).is_some() {
                evicted += 1;
            }
        }
        self.node_index.retain(|_, set| {
            for key in &keys {
                set.shift_remove(key);
            }
            !set.is_empty()
        });
        debug!("invalidated frame {id}: {evicted} cached transforms evicted");
        evicted
    }

    /// Drop all entries and the whole index
    pub fn clear(&mut self) {
        self.entries.clear();
        self.node_index.clear();
    }

    /// Number of cached transforms
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of frame ids currently indexed
    pub fn indexed_frames(&self) -> usize {
        self.node_index.len()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn key(dest: &str, orig: &str) -> TransformKey {
        (dest.into(), orig.into())
    }

    fn translation(x: f64) -> DMat4 {
        DMat4::from_translation(DVec3::new(x, 0.0, 0.0))
    }

    #[test]
    fn test_insert_get() {
        let mut cache = TransformCache::new();
        let k = key("world", "hand");
        assert!(cache.get(&k).is_none());

        cache.insert(k.clone(), translation(1.0), &[0, 1, 2]);
        assert_eq!(cache.get(&k), Some(translation(1.0)));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.indexed_frames(), 3);

        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn test_directional_keys_are_distinct() {
        let mut cache = TransformCache::new();
        cache.insert(key("a", "b"), translation(1.0), &[0, 1]);
        assert!(cache.get(&key("b", "a")).is_none());
    }

    #[test]
    fn test_invalidate_is_exact() {
        let mut cache = TransformCache::new();
        // Path of (a,b) covers frames 0,1,2; path of (c,d) covers 0,3,4
        cache.insert(key("a", "b"), translation(1.0), &[0, 1, 2]);
        cache.insert(key("c", "d"), translation(2.0), &[0, 3, 4]);

        // Frame 2 only belongs to (a,b)
        assert_eq!(cache.invalidate(2), 1);
        assert!(cache.get(&key("a", "b")).is_none());
        assert_eq!(cache.get(&key("c", "d")), Some(translation(2.0)));
    }

    #[test]
    fn test_invalidate_shared_frame_evicts_both() {
        let mut cache = TransformCache::new();
        cache.insert(key("a", "b"), translation(1.0), &[0, 1, 2]);
        cache.insert(key("c", "d"), translation(2.0), &[0, 3, 4]);

        assert_eq!(cache.invalidate(0), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_index_has_no_dangling_keys() {
        let mut cache = TransformCache::new();
        cache.insert(key("a", "b"), translation(1.0), &[0, 1, 2]);

        cache.invalidate(1);
        // Frames 0 and 2 referenced only the evicted key; their sets are gone
        assert_eq!(cache.indexed_frames(), 0);
    }

    #[test]
    fn test_invalidate_unknown_frame_is_noop() {
        let mut cache = TransformCache::new();
        cache.insert(key("a", "b"), translation(1.0), &[0, 1]);
        assert_eq!(cache.invalidate(99), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut cache = TransformCache::new();
        cache.insert(key("a", "b"), translation(1.0), &[0, 1]);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.indexed_frames(), 0);
    }
}
