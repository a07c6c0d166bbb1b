// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use crate::pressure::MIN_GLOBAL_POOL_WATERMARK;
use crate::sync::NoPoison;

/// Stats read by the rest of the cache, guarded by the same lock its readers use.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ExtstoreStats {
    /// Percentage of pages held by classes too small for the external store.
    pub memory_pressure: f64,
}

/// State the automove engine publishes to other subsystems.
#[derive(Debug)]
pub struct SharedState {
    stats: Mutex<ExtstoreStats>,
    /// Minimum free pages the external store should keep in the global pool.
    ext_global_pool_min: AtomicU32,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(ExtstoreStats::default()),
            ext_global_pool_min: AtomicU32::new(MIN_GLOBAL_POOL_WATERMARK),
        }
    }

    pub fn set_memory_pressure(&self, memory_pressure: f64) {
        self.stats.do_lock().memory_pressure = memory_pressure;
    }

    pub fn memory_pressure(&self) -> f64 {
        self.stats.do_lock().memory_pressure
    }

    pub fn set_ext_global_pool_min(&self, pages: u32) {
        self.ext_global_pool_min.store(pages, Ordering::SeqCst);
    }

    pub fn ext_global_pool_min(&self) -> u32 {
        self.ext_global_pool_min.load(Ordering::SeqCst)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
