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

//! Write-amplification and utilization statistics, computed in page units.
//!
//! WAF and TMP_WAF are ratios of page counts, not bytes, since every
//! write in this simulator is already whole-page granular. Valid-data
//! ratio is normalized by the blocks actually carrying live data rather
//! than by every non-free block.

use std::io::Write;

use crate::device::Simulator;
use crate::error::SimError;

/// A snapshot of the quantities printed in one statistics record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    /// Cumulative write-amplification factor: `(user_writes + gc_writes) /
    /// user_writes`, or `1.0` if no host write has occurred yet.
    pub waf: f64,
    /// Write-amplification factor over the most recently completed window.
    pub tmp_waf: f64,
    /// Fraction of the logical address space currently mapped.
    pub utilization: f64,
    /// Mean fraction of valid pages across blocks currently in use.
    pub valid_data_ratio: f64,
    /// Cumulative erase count.
    pub erases: u64,
    /// `total_blocks - free_blocks`: blocks not currently on the free queue.
    pub used_blocks: usize,
}

fn waf_ratio(writes_total: u64, writes_user: u64) -> f64 {
    if writes_user == 0 {
        1.0
    } else {
        writes_total as f64 / writes_user as f64
    }
}

/// Computes the current statistics snapshot for `sim`.
pub fn snapshot(sim: &Simulator) -> Snapshot {
    let c = sim.counters();
    let waf = waf_ratio(c.user_writes + c.gc_writes, c.user_writes);
    let tmp_waf = waf_ratio(
        c.window_user_writes + c.window_gc_writes,
        c.window_user_writes,
    );
    let utilization = sim.utilized_pages() as f64 / sim.geometry().logical_pages() as f64;

    let used_blocks = sim.used_blocks_with_valid_data();
    let ppb = u64::from(sim.geometry().pages_per_block);
    let valid_data_ratio = if used_blocks == 0 {
        0.0
    } else {
        // Every block with zero valid pages contributes nothing to the sum,
        // so summing `valid_count` over only the "used" blocks equals the
        // device-wide valid page count already tracked as `utl`.
        sim.utilized_pages() as f64 / (used_blocks as u64 * ppb) as f64
    };

    Snapshot {
        waf,
        tmp_waf,
        utilization,
        valid_data_ratio,
        erases: c.erases,
        // The printed header counts every block not on the free queue,
        // including the active block; this is deliberately not
        // `sim.used_blocks()`, which excludes the active block for the
        // free+active+used accounting invariant checked in tests.
        used_blocks: sim.geometry().total_blocks as usize - sim.free_blocks(),
    }
}

/// Writes one statistics record (two lines) to `out`, matching the exact
/// output format of the original `Statistics()` routine this replaces.
pub fn emit<W: Write>(sim: &Simulator, progress_gib: u64, out: &mut W) -> Result<(), SimError> {
    let s = snapshot(sim);
    writeln!(
        out,
        "[Progress: {progress_gib} GiB] WAF: {:.3}, TMP_WAF: {:.3}, Utilization: {:.3}",
        s.waf, s.tmp_waf, s.utilization
    )?;
    writeln!(
        out,
        "GROUP 0[{}]: {:.6} (ERASE: {})",
        s.used_blocks, s.valid_data_ratio, s.erases
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;

    #[test]
    fn waf_is_one_with_no_gc() {
        let mut sim = Simulator::new(Geometry::reduced_for_testing());
        for lba in 0..12 {
            sim.write_page(lba, false).unwrap();
        }
        let s = snapshot(&sim);
        assert_eq!(s.waf, 1.0);
        assert_eq!(s.tmp_waf, 1.0);
    }

    #[test]
    fn utilization_tracks_mapped_fraction() {
        let mut sim = Simulator::new(Geometry::reduced_for_testing());
        for lba in 0..6 {
            sim.write_page(lba, false).unwrap();
        }
        let s = snapshot(&sim);
        assert!((s.utilization - 0.5).abs() < 1e-9);
    }

    #[test]
    fn emit_matches_expected_two_line_format() {
        let mut sim = Simulator::new(Geometry::reduced_for_testing());
        for lba in 0..4 {
            sim.write_page(lba, false).unwrap();
        }
        let mut out = Vec::new();
        emit(&sim, 8, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        let first = lines.next().unwrap();
        let second = lines.next().unwrap();
        assert!(first.starts_with("[Progress: 8 GiB] WAF: "));
        assert!(second.starts_with("GROUP 0["));
        assert!(second.contains("(ERASE: "));
    }
}
