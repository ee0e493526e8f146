//! Tick-based idle eviction on top of [`AssetManager`]
//!
//! The cache only decides which ids are interesting; loading, payload
//! memory and lifetimes stay with the manager. Each tracked id holds exactly
//! one manager reference.

use ahash::AHashMap;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

use tracing::debug;

use crate::config::OnDemandConfig;
use crate::id::AssetId;
use crate::manager::AssetManager;

/// Cache statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_loads: u64,
}

struct CacheState {
    current_tick: u32,
    last_use: AHashMap<AssetId, u32>,
    stats: CacheStats,
}

/// Auto-loading cache that unloads ids unused for too many ticks
pub struct OnDemandCache {
    manager: AssetManager,
    eviction_threshold: u32,
    state: Mutex<CacheState>,
}

impl OnDemandCache {
    pub fn new(manager: AssetManager) -> Self {
        Self::with_config(manager, OnDemandConfig::default())
    }

    pub fn with_config(manager: AssetManager, config: OnDemandConfig) -> Self {
        Self {
            manager,
            eviction_threshold: config.eviction_threshold,
            state: Mutex::new(CacheState {
                current_tick: 0,
                last_use: AHashMap::new(),
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn manager(&self) -> &AssetManager {
        &self.manager
    }

    pub fn eviction_threshold(&self) -> u32 {
        self.eviction_threshold
    }

    /// Mark `id` used this tick and return its payload if ready.
    ///
    /// The first use of an id starts loading it and returns `None`; callers
    /// retry on a later tick.
    pub fn acquire<T: Any + Send + Sync>(&self, id: AssetId) -> Option<Arc<T>> {
        if self.touch(id) {
            return None;
        }
        let payload = self.manager.get::<T>(id);
        let mut state = self.state.lock();
        if payload.is_some() {
            state.stats.hits += 1;
        } else {
            state.stats.misses += 1;
        }
        payload
    }

    /// Start tracking and loading `id` without reading it
    pub fn preload(&self, id: AssetId) {
        self.touch(id);
    }

    /// Advance one tick and unload every id idle past the threshold.
    ///
    /// Returns the number of ids evicted.
    pub fn tick(&self) -> usize {
        let evicted: Vec<AssetId> = {
            let mut state = self.state.lock();
            state.current_tick = state.current_tick.wrapping_add(1);
            let now = state.current_tick;
            let threshold = self.eviction_threshold;
            let idle: Vec<AssetId> = state
                .last_use
                .iter()
                .filter(|(_, last)| now.wrapping_sub(**last) > threshold)
                .map(|(id, _)| *id)
                .collect();
            for id in &idle {
                state.last_use.remove(id);
            }
            state.stats.evictions += idle.len() as u64;
            idle
        };

        for id in &evicted {
            debug!(asset = %id, "evicting idle asset");
            self.manager.unload(*id);
        }
        evicted.len()
    }

    /// Unload every tracked id
    pub fn clear(&self) {
        let tracked: Vec<AssetId> = self.state.lock().last_use.drain().map(|(id, _)| id).collect();
        for id in tracked {
            self.manager.unload(id);
        }
    }

    pub fn contains(&self, id: AssetId) -> bool {
        self.state.lock().last_use.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().last_use.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().last_use.is_empty()
    }

    pub fn current_tick(&self) -> u32 {
        self.state.lock().current_tick
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats.clone()
    }

    /// Record a use; true when the id was not tracked and a load was issued
    fn touch(&self, id: AssetId) -> bool {
        let inserted = {
            let mut state = self.state.lock();
            let now = state.current_tick;
            let inserted = state.last_use.insert(id, now).is_none();
            if inserted {
                state.stats.misses += 1;
                state.stats.total_loads += 1;
            }
            inserted
        };
        if inserted {
            self.manager.load(id);
        }
        inserted
    }
}

impl Drop for OnDemandCache {
    fn drop(&mut self) {
        self.clear();
    }
}
