// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::collections::TryReserveError;

use crate::stats::MAX_NUMBER_OF_SLAB_CLASSES;

/// One class's observations for a single tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WindowSlot {
    pub age: u64,
    /// The class grew, or a small class evicted or hit out-of-memory.
    pub dirty: u64,
    pub evicted: u64,
    /// Free chunks exceeded the reclaim target.
    pub excess_free: u32,
    /// Not consumed by the decision rules yet.
    pub relaxed: u32,
}

impl WindowSlot {
    fn accumulate(&mut self, other: &WindowSlot) {
        // Counters come straight from the host, wrap instead of panicking.
        self.age = self.age.wrapping_add(other.age);
        self.dirty = self.dirty.wrapping_add(other.dirty);
        self.evicted = self.evicted.wrapping_add(other.evicted);
        self.excess_free = self.excess_free.wrapping_add(other.excess_free);
        self.relaxed = self.relaxed.wrapping_add(other.relaxed);
    }
}

/// Ring of the last `size` ticks for every slab class.
///
/// Slots live in one flat arena, class-major: the ring of class `n` occupies
/// `[n * size, (n + 1) * size)`.
#[derive(Debug)]
pub struct Window {
    slots: Vec<WindowSlot>,
    size: usize,
}

impl Window {
    /// Allocates the arena. `size` must be non-zero.
    pub fn new(size: usize) -> Result<Self, TryReserveError> {
        let len = size.saturating_mul(MAX_NUMBER_OF_SLAB_CLASSES);
        let mut slots = Vec::new();
        slots.try_reserve_exact(len)?;
        slots.resize(len, WindowSlot::default());
        Ok(Self { slots, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn offset(&self, class: usize, position: usize) -> usize {
        class * self.size + position % self.size
    }

    /// Overwrites the slot of `class` at ring position `tick % size`.
    pub fn record(&mut self, class: usize, tick: usize, slot: WindowSlot) {
        let offset = self.offset(class, tick);
        self.slots[offset] = slot;
    }

    /// Sums every slot of `class`'s ring.
    pub fn sum(&self, class: usize) -> WindowSlot {
        let start = self.offset(class, 0);
        self.slots[start..start + self.size]
            .iter()
            .fold(WindowSlot::default(), |mut total, slot| {
                total.accumulate(slot);
                total
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn excess_free_slot() -> WindowSlot {
        WindowSlot {
            excess_free: 1,
            ..WindowSlot::default()
        }
    }

    #[test]
    fn test_sum_starts_empty() {
        let window = Window::new(4).unwrap();
        assert_eq!(window.sum(1), WindowSlot::default());
        assert_eq!(window.sum(MAX_NUMBER_OF_SLAB_CLASSES - 1), WindowSlot::default());
    }

    #[test]
    fn test_sum_adds_all_positions() {
        let mut window = Window::new(3).unwrap();
        for tick in 1..=3 {
            window.record(
                2,
                tick,
                WindowSlot {
                    age: 10 * tick as u64,
                    dirty: 1,
                    evicted: 1,
                    excess_free: 1,
                    relaxed: 0,
                },
            );
        }
        let sum = window.sum(2);
        assert_eq!(sum.age, 60);
        assert_eq!(sum.dirty, 3);
        assert_eq!(sum.evicted, 3);
        assert_eq!(sum.excess_free, 3);
        assert_eq!(sum.relaxed, 0);
    }

    #[test]
    fn test_record_overwrites_oldest_slot() {
        let mut window = Window::new(2).unwrap();
        window.record(1, 1, excess_free_slot());
        window.record(1, 2, excess_free_slot());
        assert_eq!(window.sum(1).excess_free, 2);

        // Tick 3 lands on the same position as tick 1.
        window.record(1, 3, WindowSlot::default());
        assert_eq!(window.sum(1).excess_free, 1);
    }

    #[test]
    fn test_classes_are_independent() {
        let mut window = Window::new(2).unwrap();
        window.record(1, 1, excess_free_slot());
        assert_eq!(window.sum(1).excess_free, 1);
        assert_eq!(window.sum(0).excess_free, 0);
        assert_eq!(window.sum(2).excess_free, 0);
    }

    #[test]
    fn test_sum_of_huge_ages_wraps() {
        let mut window = Window::new(2).unwrap();
        let age = u64::MAX / 2 + 1;
        for tick in 1..=2 {
            window.record(
                2,
                tick,
                WindowSlot {
                    age,
                    excess_free: 1,
                    ..WindowSlot::default()
                },
            );
        }
        let sum = window.sum(2);
        assert_eq!(sum.age, 0);
        assert_eq!(sum.excess_free, 2);
    }

    #[test]
    fn test_window_of_one() {
        let mut window = Window::new(1).unwrap();
        window.record(5, 7, excess_free_slot());
        assert_eq!(window.sum(5).excess_free, 1);
        window.record(5, 8, WindowSlot::default());
        assert_eq!(window.sum(5).excess_free, 0);
    }
}
