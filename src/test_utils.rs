// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::stats::GlobalPool;
use crate::stats::ItemStats;
use crate::stats::ItemStatsArray;
use crate::stats::SlabStats;
use crate::stats::SlabStatsArray;
use crate::stats::StatsSource;
use crate::stats::MAX_NUMBER_OF_SLAB_CLASSES;

/// A stats source whose counters are set directly by the test between ticks.
pub struct FakeStatsSource {
    pub items: ItemStatsArray,
    pub slabs: SlabStatsArray,
    pub global: GlobalPool,
}

impl FakeStatsSource {
    pub fn new() -> Self {
        Self {
            items: [ItemStats::default(); MAX_NUMBER_OF_SLAB_CLASSES],
            slabs: [SlabStats::default(); MAX_NUMBER_OF_SLAB_CLASSES],
            global: GlobalPool::default(),
        }
    }

    /// Describes a size class holding `total_pages` pages of `chunk_size` chunks.
    pub fn set_class(&mut self, class: usize, chunk_size: u32, total_pages: u32) {
        let slab = &mut self.slabs[class];
        slab.chunk_size = chunk_size;
        slab.chunks_per_page = (1024 * 1024) / chunk_size;
        slab.total_pages = total_pages;
    }

    /// Sets the free chunks of `class` just above its excess-free target.
    pub fn make_excess_free(&mut self, class: usize) {
        let slab = &mut self.slabs[class];
        slab.free_chunks = slab.chunks_per_page * 2 + 1;
    }
}

impl StatsSource for FakeStatsSource {
    fn fill_item_stats(&mut self, stats: &mut ItemStatsArray) {
        *stats = self.items;
    }

    fn fill_slab_stats(&mut self, stats: &mut SlabStatsArray) {
        *stats = self.slabs;
    }

    fn global_page_pool(&mut self) -> GlobalPool {
        self.global
    }
}
