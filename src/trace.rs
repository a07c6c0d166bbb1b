// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Recorded slab statistics, replayed one tick at a time.
//!
//! A trace is a list of tick blocks, each started by a `tick` line:
//!
//! ```text
//! tick
//! global <pages> <mem_limit_reached 0|1>
//! class <id> <chunk_size> <chunks_per_page> <total_pages> <free_chunks> <evicted> <outofmemory> <age>
//! ```
//!
//! Classes not listed in a block report zero. The first block is the baseline
//! read when the engine is created.

use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;

use crate::stats::GlobalPool;
use crate::stats::ItemStats;
use crate::stats::ItemStatsArray;
use crate::stats::SlabStats;
use crate::stats::SlabStatsArray;
use crate::stats::StatsSource;
use crate::stats::MAX_NUMBER_OF_SLAB_CLASSES;

#[derive(Debug, Clone, PartialEq)]
pub struct TraceTick {
    pub global: GlobalPool,
    pub items: ItemStatsArray,
    pub slabs: SlabStatsArray,
}

impl Default for TraceTick {
    fn default() -> Self {
        Self {
            global: GlobalPool::default(),
            items: [ItemStats::default(); MAX_NUMBER_OF_SLAB_CLASSES],
            slabs: [SlabStats::default(); MAX_NUMBER_OF_SLAB_CLASSES],
        }
    }
}

fn parse_field<T: FromStr>(token: Option<&str>, name: &str, line_no: usize) -> Result<T> {
    let Some(token) = token else {
        bail!("line {}: missing {}", line_no, name);
    };
    match token.parse() {
        Ok(value) => Ok(value),
        Err(_) => bail!("line {}: couldn't parse {} \"{}\"", line_no, name, token),
    }
}

/// Parses a whole trace.
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<TraceTick>> {
    let mut ticks: Vec<TraceTick> = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else {
            continue;
        };
        if key.starts_with('#') {
            continue;
        }
        if key == "tick" {
            ticks.push(TraceTick::default());
            continue;
        }
        let tick = match (key, ticks.last_mut()) {
            ("global" | "class", Some(tick)) => tick,
            ("global" | "class", None) => {
                bail!("line {}: {} before the first tick", line_no, key)
            }
            _ => continue,
        };
        if key == "global" {
            tick.global.pages = parse_field(tokens.next(), "global pages", line_no)?;
            let limit: u8 = parse_field(tokens.next(), "mem_limit_reached", line_no)?;
            tick.global.mem_limit_reached = limit != 0;
            continue;
        }
        let class: usize = parse_field(tokens.next(), "class id", line_no)?;
        if class >= MAX_NUMBER_OF_SLAB_CLASSES {
            bail!("line {}: class {} out of range", line_no, class);
        }
        tick.slabs[class] = SlabStats {
            chunk_size: parse_field(tokens.next(), "chunk_size", line_no)?,
            chunks_per_page: parse_field(tokens.next(), "chunks_per_page", line_no)?,
            total_pages: parse_field(tokens.next(), "total_pages", line_no)?,
            free_chunks: parse_field(tokens.next(), "free_chunks", line_no)?,
        };
        tick.items[class] = ItemStats {
            evicted: parse_field(tokens.next(), "evicted", line_no)?,
            outofmemory: parse_field(tokens.next(), "outofmemory", line_no)?,
            age: parse_field(tokens.next(), "age", line_no)?,
        };
    }
    Ok(ticks)
}

/// Feeds recorded ticks to the automove engine.
pub struct TraceSource {
    ticks: Vec<TraceTick>,
    cur: usize,
}

impl TraceSource {
    pub fn new(ticks: Vec<TraceTick>) -> Result<Self> {
        if ticks.is_empty() {
            bail!("trace has no ticks");
        }
        Ok(Self { ticks, cur: 0 })
    }

    /// Load a trace file.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = File::open(path)
            .map(BufReader::new)
            .with_context(|| format!("Couldn't read {}", path.display()))?;
        let ticks =
            parse_trace(reader).with_context(|| format!("Couldn't parse {}", path.display()))?;
        Self::new(ticks)
    }

    /// Number of ticks after the baseline.
    pub fn remaining(&self) -> usize {
        self.ticks.len() - 1 - self.cur
    }

    /// Moves to the next tick. Returns false when the trace is exhausted.
    pub fn advance(&mut self) -> bool {
        if self.cur + 1 >= self.ticks.len() {
            return false;
        }
        self.cur += 1;
        true
    }

    fn current(&self) -> &TraceTick {
        &self.ticks[self.cur]
    }
}

impl StatsSource for TraceSource {
    fn fill_item_stats(&mut self, stats: &mut ItemStatsArray) {
        *stats = self.current().items;
    }

    fn fill_slab_stats(&mut self, stats: &mut SlabStatsArray) {
        *stats = self.current().slabs;
    }

    fn global_page_pool(&mut self) -> GlobalPool {
        self.current().global
    }
}
