// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

/// The upper bound of slab classes, including the global page pool at index 0.
pub const MAX_NUMBER_OF_SLAB_CLASSES: usize = 64;

/// The first real size class. Class 0 is the global page pool.
pub const POWER_SMALLEST: usize = 1;

/// Index of the global page pool.
pub const GLOBAL_POOL_CLASS: usize = 0;

/// Per-class item counters sampled from the LRU.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ItemStats {
    pub evicted: u64,
    pub outofmemory: u64,
    /// Age in seconds of the oldest item in the class tail.
    pub age: u64,
}

/// Per-class page and chunk counters sampled from the slab allocator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SlabStats {
    pub chunk_size: u32,
    pub chunks_per_page: u32,
    pub total_pages: u32,
    pub free_chunks: u32,
}

/// Occupancy of the global page pool.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GlobalPool {
    pub pages: u32,
    /// Whether the allocator has reached its configured memory limit.
    pub mem_limit_reached: bool,
}

pub type ItemStatsArray = [ItemStats; MAX_NUMBER_OF_SLAB_CLASSES];
pub type SlabStatsArray = [SlabStats; MAX_NUMBER_OF_SLAB_CLASSES];

/// Supplies point-in-time statistics to the automove engine.
///
/// Every call must return an internally consistent view. The engine neither
/// retries nor waits on the source.
pub trait StatsSource {
    fn fill_item_stats(&mut self, stats: &mut ItemStatsArray);
    fn fill_slab_stats(&mut self, stats: &mut SlabStatsArray);
    fn global_page_pool(&mut self) -> GlobalPool;
}

/// Two generations of statistics. The "after" generation is refilled every
/// tick and becomes the "before" generation of the next tick by flipping the
/// selector instead of copying.
#[derive(Debug, Clone)]
pub struct Snapshots {
    items: [ItemStatsArray; 2],
    slabs: [SlabStatsArray; 2],
    /// Index of the "after" generation.
    cur: usize,
}

impl Snapshots {
    /// Fills the "before" generation from `source` so that the first tick
    /// computes deltas against a real baseline.
    pub fn new<S: StatsSource>(source: &mut S) -> Self {
        let mut snapshots = Self {
            items: [[ItemStats::default(); MAX_NUMBER_OF_SLAB_CLASSES]; 2],
            slabs: [[SlabStats::default(); MAX_NUMBER_OF_SLAB_CLASSES]; 2],
            cur: 0,
        };
        let before = snapshots.cur ^ 1;
        source.fill_item_stats(&mut snapshots.items[before]);
        source.fill_slab_stats(&mut snapshots.slabs[before]);
        snapshots
    }

    /// Refills the "after" generation.
    pub fn refresh<S: StatsSource>(&mut self, source: &mut S) {
        source.fill_item_stats(&mut self.items[self.cur]);
        source.fill_slab_stats(&mut self.slabs[self.cur]);
    }

    /// Makes the current "after" generation the next tick's "before".
    pub fn flip(&mut self) {
        self.cur ^= 1;
    }

    pub fn item_before(&self, class: usize) -> &ItemStats {
        &self.items[self.cur ^ 1][class]
    }

    pub fn item_after(&self, class: usize) -> &ItemStats {
        &self.items[self.cur][class]
    }

    pub fn slab_before(&self, class: usize) -> &SlabStats {
        &self.slabs[self.cur ^ 1][class]
    }

    pub fn slab_after(&self, class: usize) -> &SlabStats {
        &self.slabs[self.cur][class]
    }

    pub fn slabs_after(&self) -> &SlabStatsArray {
        &self.slabs[self.cur]
    }
}
