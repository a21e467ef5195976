/*
 * Copyright 2024 The ftlsim Authors
 *
 * This file is part of ftlsim.
 *
 * ftlsim is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * ftlsim is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * ftlsim. If not, see <https://www.gnu.org/licenses/>.
 */

//! The `ftlsim` command-line binary: resolves configuration, opens the
//! trace input, and replays it to completion.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use ftlsim::config::{self, CliOverrides};
use ftlsim::device::Simulator;
use ftlsim::error::SimError;
use ftlsim::trace;

/// Replay an I/O trace through a simulated page-mapped flash device and
/// print write-amplification and utilization statistics.
#[derive(Debug, Parser)]
#[command(name = "ftlsim", version, about)]
struct Args {
    /// Path to the trace file, or `-` to read from stdin.
    trace: PathBuf,

    /// Optional TOML file overriding a subset of the device geometry.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Total physical blocks on the simulated device.
    #[arg(long)]
    total_blocks: Option<u32>,

    /// Minimum number of free blocks that must remain before GC is
    /// triggered.
    #[arg(long)]
    gc_threshold: Option<u32>,

    /// User-visible logical capacity, in GiB.
    #[arg(long)]
    logical_gib: Option<f64>,

    /// Byte interval between statistics emissions, in GiB.
    #[arg(long)]
    stride_gib: Option<f64>,

    /// Increase log verbosity; may be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new().filter_level(level).init();
}

fn run(args: Args) -> Result<(), SimError> {
    let overrides = CliOverrides {
        total_blocks: args.total_blocks,
        gc_threshold: args.gc_threshold,
        logical_gib: args.logical_gib,
        stride_gib: args.stride_gib,
    };
    let geometry = config::resolve(args.config.as_ref(), &overrides)?;
    log::info!(
        "starting run: total_blocks={} page_size={} pages_per_block={} gc_threshold={}",
        geometry.total_blocks,
        geometry.page_size,
        geometry.pages_per_block,
        geometry.gc_threshold
    );

    let mut sim = Simulator::new(geometry);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.trace.as_os_str() == "-" {
        trace::run(&mut sim, io::stdin().lock(), &mut out)
    } else {
        let file = File::open(&args.trace).map_err(|source| SimError::TraceOpen {
            path: args.trace.clone(),
            source,
        })?;
        trace::run(&mut sim, BufReader::new(file), &mut out)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("run aborted: {err}");
            eprintln!("ftlsim: {err}");
            ExitCode::FAILURE
        }
    }
}
