// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Decides which slab class should give a page back to the global page pool
//! when the cache is backed by an external store.
//!
//! A percentage of memory is held free in the global page pool as a buffer for
//! the external store, and every class keeps a couple of pages worth of free
//! chunks. This gives the external store time to flush data when waves of
//! sets arrive. The global pool reserve is a secondary buffer shared by every
//! class, which absorbs shifts in which class is active.

use std::collections::TryReserveError;
use std::sync::Arc;

use log::debug;
use log::info;
use thiserror::Error as ThisError;

use crate::config::Config;
use crate::pressure::compute_global_pool_watermark;
use crate::pressure::PressureTally;
use crate::pressure::MIN_GLOBAL_POOL_WATERMARK;
use crate::pressure::MIN_PAGES_FOR_SOURCE;
use crate::shared::SharedState;
use crate::stats::Snapshots;
use crate::stats::StatsSource;
use crate::stats::GLOBAL_POOL_CLASS;
use crate::stats::MAX_NUMBER_OF_SLAB_CLASSES;
use crate::stats::POWER_SMALLEST;
use crate::window::Window;
use crate::window::WindowSlot;

/// Class index reported to the host when no move is requested.
pub const NO_CLASS: i32 = -1;

#[derive(Debug, ThisError)]
pub enum AutomoveError {
    #[error("window size must be at least 1")]
    InvalidWindowSize,
    #[error("invalid {0}: {1}")]
    InvalidRatio(&'static str, f64),
    #[error("failed to allocate the window: {0}")]
    Allocation(#[from] TryReserveError),
}

/// Why a page is moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveReason {
    /// The class had more free chunks than it needs for a whole window.
    ExcessFree,
    /// The global pool ran low and the class holds the oldest large items.
    OldestTail,
}

/// A request to move one page from `src` to `dst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlabMove {
    pub src: usize,
    pub dst: usize,
    pub reason: MoveReason,
}

impl SlabMove {
    fn to_global_pool(src: usize, reason: MoveReason) -> Self {
        Self {
            src,
            dst: GLOBAL_POOL_CLASS,
            reason,
        }
    }

    pub fn as_raw(&self) -> (i32, i32) {
        (self.src as i32, self.dst as i32)
    }
}

/// Converts a decision to the `(src, dst)` pair the slab rebalancer expects.
pub fn raw_decision(decision: Option<SlabMove>) -> (i32, i32) {
    decision.map_or((NO_CLASS, NO_CLASS), |m| m.as_raw())
}

/// The automove engine. The host calls [SlabAutomove::run] on a fixed interval
/// and never from two threads at once.
pub struct SlabAutomove<S: StatsSource> {
    source: S,
    shared: Arc<SharedState>,
    window: Window,
    /// Number of ticks run so far.
    window_cur: usize,
    item_size: u32,
    /// Not read by the decision rules yet.
    max_age_ratio: f64,
    free_ratio: f64,
    /// Set once the allocator has been seen at its memory limit.
    pool_filled_once: bool,
    global_pool_watermark: u32,
    snapshots: Snapshots,
}

impl<S: StatsSource> SlabAutomove<S> {
    /// Create a new [SlabAutomove]. The "before" statistics are filled by a dry
    /// run against `source`.
    pub fn new(
        config: &Config,
        mut source: S,
        shared: Arc<SharedState>,
    ) -> Result<Self, AutomoveError> {
        config.validate()?;
        let window = Window::new(config.window_size)?;
        let snapshots = Snapshots::new(&mut source);
        Ok(Self {
            source,
            shared,
            window,
            window_cur: 0,
            item_size: config.ext_item_size,
            max_age_ratio: config.max_age_ratio,
            free_ratio: config.free_ratio,
            pool_filled_once: false,
            global_pool_watermark: MIN_GLOBAL_POOL_WATERMARK,
            snapshots,
        })
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn window_cur(&self) -> usize {
        self.window_cur
    }

    pub fn global_pool_watermark(&self) -> u32 {
        self.global_pool_watermark
    }

    pub fn pool_filled_once(&self) -> bool {
        self.pool_filled_once
    }

    pub fn max_age_ratio(&self) -> f64 {
        self.max_age_ratio
    }

    /// Returns the global pool page count and whether the pool is below its
    /// watermark while the allocator is at its memory limit.
    fn global_pool_check(&mut self) -> (u32, bool) {
        let pool = self.source.global_page_pool();
        if !pool.mem_limit_reached {
            return (pool.pages, false);
        }
        if !self.pool_filled_once {
            info!("Global page pool filled for the first time");
            self.pool_filled_once = true;
        }
        (pool.pages, pool.pages < self.global_pool_watermark)
    }

    /// Runs one tick. Returns the page move to perform, if any.
    pub fn run(&mut self) -> Option<SlabMove> {
        // Checked against the watermark of the previous tick.
        let (global_count, global_low) = self.global_pool_check();
        self.snapshots.refresh(&mut self.source);
        self.window_cur += 1;

        self.global_pool_watermark =
            compute_global_pool_watermark(self.snapshots.slabs_after(), self.free_ratio);

        let mut tally = PressureTally::default();
        let mut too_free: Option<SlabMove> = None;
        // (class, age) of the large class with the oldest tail.
        let mut oldest: Option<(usize, u64)> = None;

        for n in POWER_SMALLEST..MAX_NUMBER_OF_SLAB_CLASSES {
            let item_before = self.snapshots.item_before(n);
            let item_after = self.snapshots.item_after(n);
            let slab_before = self.snapshots.slab_before(n);
            let slab_after = self.snapshots.slab_after(n);

            let small_slab = slab_before.chunk_size < self.item_size;
            let free_target = slab_after.chunks_per_page.saturating_mul(MIN_PAGES_FOR_SOURCE);
            tally.add_class(small_slab, slab_after.total_pages);

            let mut slot = WindowSlot::default();
            // Classes marked dirty cannot donate memory back to the global pool.
            if small_slab {
                if item_after.evicted > item_before.evicted
                    || item_after.outofmemory > item_before.outofmemory
                {
                    slot.evicted = 1;
                    slot.dirty = 1;
                }
                if slab_after.total_pages > slab_before.total_pages {
                    slot.dirty = 1;
                }
            }
            if slab_after.free_chunks > free_target {
                slot.excess_free = 1;
            }
            slot.age = item_after.age;
            let age = item_after.age;
            let total_pages = slab_after.total_pages;

            self.window.record(n, self.window_cur, slot);
            let w_sum = self.window.sum(n);

            // While the global pool still has pages, leave classes under
            // pressure alone.
            if w_sum.dirty != 0 && global_count != 0 {
                continue;
            }

            // Small classes aren't age balanced and rely on this rule alone.
            if w_sum.excess_free as usize >= self.window.size() {
                too_free = Some(SlabMove::to_global_pool(n, MoveReason::ExcessFree));
            }

            // Evictions from large classes push items to the external store,
            // so they can give up pages aggressively when the pool is low.
            if !small_slab
                && total_pages > MIN_PAGES_FOR_SOURCE
                && oldest.map_or(true, |(_, oldest_age)| age > oldest_age)
            {
                oldest = Some((n, age));
            }
        }

        let memory_pressure = tally.memory_pressure(global_count);
        self.shared.set_memory_pressure(memory_pressure);
        self.snapshots.flip();

        debug!(
            "tick {}: memory pressure {:.2}%, global pool {} pages, watermark {}",
            self.window_cur, memory_pressure, global_count, self.global_pool_watermark
        );

        // Only make decisions once the window has filled.
        if self.window_cur < self.window.size() {
            return None;
        }

        self.shared.set_ext_global_pool_min(self.global_pool_watermark);

        let decision = match (too_free, oldest) {
            (Some(m), _) => Some(m),
            (None, Some((class, _))) if global_low => {
                Some(SlabMove::to_global_pool(class, MoveReason::OldestTail))
            }
            _ => None,
        };
        if let Some(m) = &decision {
            debug!(
                "Moving a page from class {} to {} ({:?})",
                m.src, m.dst, m.reason
            );
        }
        decision
    }
}
