// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod automove;
pub mod config;
pub mod pressure;
pub mod shared;
pub mod stats;
mod sync;
pub mod trace;
mod window;

#[cfg(test)]
mod test_utils;

pub use self::automove::raw_decision;
pub use self::automove::AutomoveError;
pub use self::automove::MoveReason;
pub use self::automove::SlabAutomove;
pub use self::automove::SlabMove;
pub use self::config::Config;
pub use self::shared::SharedState;
pub use self::stats::StatsSource;
