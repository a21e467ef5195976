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

//! Parses and replays a trace of I/O requests through a [`Simulator`].

use std::io::{BufRead, Write};

use log::info;

use crate::device::Simulator;
use crate::error::SimError;
use crate::stats;

/// The type of an I/O request, per the trace grammar's `io_type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoType {
    Read,
    Write,
    Trim,
    Unknown,
}

impl From<i32> for IoType {
    fn from(value: i32) -> Self {
        match value {
            0 => IoType::Read,
            1 => IoType::Write,
            3 => IoType::Trim,
            _ => IoType::Unknown,
        }
    }
}

/// One parsed trace record: `<timestamp> <io_type> <lba> <size> <stream>`.
///
/// `stream` is accepted but never consulted by the simulator core, per the
/// stream is never separated from another in this simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TraceRecord {
    #[allow(dead_code)]
    timestamp: f64,
    io_type: IoType,
    lba: u64,
    size: u32,
    #[allow(dead_code)]
    stream: u32,
}

impl TraceRecord {
    fn parse(line: &str, line_no: usize) -> Result<Self, SimError> {
        let mut fields = line.split_whitespace();
        let mut next = |name: &'static str| -> Result<&str, SimError> {
            fields.next().ok_or_else(|| SimError::TraceParse {
                line: line_no,
                text: line.to_string(),
            })
        };
        let timestamp: f64 = next("timestamp")?
            .parse()
            .map_err(|_| SimError::TraceParse {
                line: line_no,
                text: line.to_string(),
            })?;
        let io_type: i32 = next("io_type")?
            .parse()
            .map_err(|_| SimError::TraceParse {
                line: line_no,
                text: line.to_string(),
            })?;
        let lba: u64 = next("lba")?.parse().map_err(|_| SimError::TraceParse {
            line: line_no,
            text: line.to_string(),
        })?;
        let size: u32 = next("size")?.parse().map_err(|_| SimError::TraceParse {
            line: line_no,
            text: line.to_string(),
        })?;
        let stream: u32 = next("stream")?.parse().map_err(|_| SimError::TraceParse {
            line: line_no,
            text: line.to_string(),
        })?;
        if fields.next().is_some() {
            return Err(SimError::TraceParse {
                line: line_no,
                text: line.to_string(),
            });
        }
        Ok(Self {
            timestamp,
            io_type: IoType::from(io_type),
            lba,
            size,
            stream,
        })
    }
}

/// Replays every record of `input` through `sim`, emitting statistics lines
/// to `out` every `sim.geometry().statistics_stride_bytes` processed bytes
/// and once more at end of trace.
///
/// Blank lines are skipped (trailing newline tolerance); any other
/// malformed line is fatal.
pub fn run<R: BufRead, W: Write>(sim: &mut Simulator, input: R, mut out: W) -> Result<(), SimError> {
    let mut progress_bytes: u64 = 0;
    let mut progress_boundary_gib: u64 = sim.geometry().statistics_stride_bytes / (1024 * 1024 * 1024);
    if progress_boundary_gib == 0 {
        progress_boundary_gib = 1;
    }
    let mut boundary_step = progress_boundary_gib;

    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let record = TraceRecord::parse(&line, line_no)?;

        match record.io_type {
            IoType::Write => {
                let pages = record.size.div_ceil(sim.geometry().page_size);
                for i in 0..u64::from(pages) {
                    sim.write_page(record.lba + i, false)?;
                }
            }
            IoType::Trim => {
                sim.trim_block(record.lba)?;
            }
            IoType::Read | IoType::Unknown => {}
        }

        if sim.free_blocks() < sim.geometry().gc_threshold as usize {
            sim.run_gc_until_threshold()?;
        }

        progress_bytes += u64::from(record.size);
        if progress_bytes >= sim.geometry().statistics_stride_bytes {
            stats::emit(sim, progress_boundary_gib, &mut out)?;
            sim.reset_window();
            progress_boundary_gib += boundary_step;
            progress_bytes = 0;
        }
    }

    info!(
        "trace replay complete: user_writes={} gc_writes={} erases={}",
        sim.counters().user_writes,
        sim.counters().gc_writes,
        sim.counters().erases
    );
    stats::emit(sim, progress_boundary_gib, &mut out)?;
    Ok(())
}
