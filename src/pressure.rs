// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::stats::SlabStatsArray;

/// Classes at or below this many pages are never move sources.
pub const MIN_PAGES_FOR_SOURCE: u32 = 2;

/// Floor of the global page pool reserve.
pub const MIN_GLOBAL_POOL_WATERMARK: u32 = 2;

/// Computes how many free pages the global pool should hold.
///
/// The ratio is applied to every page the allocator currently owns, including
/// the pages already sitting in the global pool (index 0).
pub fn compute_global_pool_watermark(slabs: &SlabStatsArray, free_ratio: f64) -> u32 {
    let total_pages: u64 = slabs.iter().map(|slab| u64::from(slab.total_pages)).sum();
    watermark_from_total(total_pages, free_ratio)
}

fn watermark_from_total(total_pages: u64, free_ratio: f64) -> u32 {
    // `as` saturates and maps NaN to 0, the floor below covers both.
    let watermark = (total_pages as f64 * free_ratio) as u32;
    watermark.max(MIN_GLOBAL_POOL_WATERMARK)
}

/// Page totals used to estimate how close the external store is to running
/// out of item headers. 100% means item headers have to be evicted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PressureTally {
    /// Pages in classes whose items are too small for the external store.
    pub low_pages: u64,
    /// Pages in external-store eligible classes that could be moved.
    pub high_pages: u64,
}

impl PressureTally {
    pub fn add_class(&mut self, small_slab: bool, total_pages: u32) {
        if small_slab {
            self.low_pages += u64::from(total_pages);
        } else if total_pages > MIN_PAGES_FOR_SOURCE {
            self.high_pages += u64::from(total_pages);
        }
    }

    /// Share of pages held by small classes, in percent.
    pub fn memory_pressure(&self, global_pages: u32) -> f64 {
        let total = self.low_pages + self.high_pages + u64::from(global_pages);
        if total == 0 {
            return 0.0;
        }
        self.low_pages as f64 / total as f64 * 100.0
    }
}
