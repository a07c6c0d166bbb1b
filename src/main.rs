// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::path::Path;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use getopts::Options;
use log::info;
use slab_automove::raw_decision;
use slab_automove::trace::TraceSource;
use slab_automove::Config;
use slab_automove::SharedState;
use slab_automove::SlabAutomove;

fn usage(program: &str, opts: &Options) -> String {
    let brief = format!("Usage: {} [options] TRACE", program);
    opts.usage(&brief)
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let program = args
        .first()
        .cloned()
        .unwrap_or_else(|| "slab-automove-replay".to_string());

    let mut opts = Options::new();
    opts.optopt("c", "config", "directory holding the automove settings", "DIR");
    opts.optflag("v", "verbose", "log every tick");
    opts.optflag("h", "help", "print this help menu");
    let matches = opts
        .parse(args.iter().skip(1))
        .context("Failed to parse arguments")?;

    if matches.opt_present("h") {
        print!("{}", usage(&program, &opts));
        return Ok(());
    }

    let verbosity = if matches.opt_present("v") { 3 } else { 1 };
    if let Err(e) = stderrlog::new()
        .module(module_path!())
        .module("slab_automove")
        .verbosity(verbosity)
        .init()
    {
        bail!("Failed to initialize logging: {}", e);
    }

    let trace_path = match matches.free.first() {
        Some(path) => path.clone(),
        None => bail!("{}", usage(&program, &opts)),
    };

    let config = match matches.opt_str("c") {
        Some(dir) => Config::load_from_dir(Path::new(&dir))?,
        None => Config::default(),
    };
    info!("Replaying {} with {:?}", trace_path, config);

    let source = TraceSource::load(Path::new(&trace_path))?;
    let shared = Arc::new(SharedState::new());
    let mut automove = SlabAutomove::new(&config, source, shared.clone())
        .context("Failed to create the automove engine")?;

    while automove.source_mut().advance() {
        let (src, dst) = raw_decision(automove.run());
        println!(
            "tick {}: src {} dst {} pressure {:.2} watermark {}",
            automove.window_cur(),
            src,
            dst,
            shared.memory_pressure(),
            automove.global_pool_watermark()
        );
    }

    Ok(())
}
