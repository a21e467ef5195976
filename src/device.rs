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

//! The simulator: owns every piece of device state and implements the
//! write path and garbage collector.
//!
//! This is the single ownership root for device state: blocks,
//! free queue, indirection maps and counters all live in one [`Simulator`]
//! value, built once from a [`Geometry`] and never resized afterward.

use log::{info, warn};

use crate::block::BlockTable;
use crate::error::SimError;
use crate::geometry::{BlockId, Geometry, Lba, PhysicalPage};
use crate::map::{ForwardMap, ReverseMap};
use crate::queue::FreeBlockQueue;

/// Cumulative and windowed counters accumulated as the trace is replayed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counters {
    /// Host-write page issuances, cumulative.
    pub user_writes: u64,
    /// GC-relocation page issuances, cumulative.
    pub gc_writes: u64,
    /// Block erases, cumulative.
    pub erases: u64,
    /// Host-write page issuances since the last statistics emission.
    pub window_user_writes: u64,
    /// GC-relocation page issuances since the last statistics emission.
    pub window_gc_writes: u64,
    /// Block erases since the last statistics emission.
    pub window_erases: u64,
}

impl Counters {
    /// Resets the windowed counters to zero; cumulative counters are
    /// untouched.
    pub fn reset_window(&mut self) {
        self.window_user_writes = 0;
        self.window_gc_writes = 0;
        self.window_erases = 0;
    }
}

/// The full simulated device: geometry, block state, indirection maps, the
/// free-block queue, the active-block cursor, and run counters.
pub struct Simulator {
    geometry: Geometry,
    blocks: BlockTable,
    fwd: ForwardMap,
    oob: ReverseMap,
    free: FreeBlockQueue,
    active: BlockId,
    /// Currently valid pages across the whole device; kept incrementally
    /// in lockstep with `blocks`' per-block counters.
    utl: u64,
    counters: Counters,
}

impl Simulator {
    /// Builds a fresh simulator: every block erased, every block but one
    /// on the free queue, the remaining block active.
    pub fn new(geometry: Geometry) -> Self {
        let mut free = FreeBlockQueue::with_capacity(geometry.total_blocks as usize);
        for b in 1..geometry.total_blocks {
            free.enqueue(b);
        }
        Self {
            blocks: BlockTable::new(&geometry),
            fwd: ForwardMap::new(&geometry),
            oob: ReverseMap::new(&geometry),
            free,
            active: 0,
            utl: 0,
            geometry,
            counters: Counters::default(),
        }
    }

    /// The geometry this simulator was built from.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Read-only access to the run counters.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Resets the windowed counters after a statistics emission; cumulative
    /// counters are untouched.
    pub fn reset_window(&mut self) {
        self.counters.reset_window();
    }

    /// Currently valid (mapped) pages across the whole device.
    pub fn utilized_pages(&self) -> u64 {
        self.utl
    }

    /// Read-only access to the per-block validity state, for invariant
    /// checking in tests.
    pub fn blocks(&self) -> &BlockTable {
        &self.blocks
    }

    /// Read-only access to the forward indirection map, for invariant
    /// checking in tests.
    pub fn forward_map(&self) -> &ForwardMap {
        &self.fwd
    }

    /// Read-only access to the reverse (OOB) indirection map, for
    /// invariant checking in tests.
    pub fn reverse_map(&self) -> &ReverseMap {
        &self.oob
    }

    /// The block indices currently queued as free, front to back.
    pub fn free_queue_contents(&self) -> Vec<BlockId> {
        self.free.contents()
    }

    /// Number of blocks currently on the free queue.
    pub fn free_blocks(&self) -> usize {
        self.free.len()
    }

    /// Number of blocks that are neither free nor the active block, i.e.
    /// full or partially written and not yet erased.
    pub fn used_blocks(&self) -> usize {
        self.geometry.total_blocks as usize - self.free_blocks() - 1
    }

    /// Number of blocks anywhere on the device (including the active
    /// block) that currently hold at least one valid page. Used for the
    /// valid-data-ratio denominator, which normalizes by blocks actually
    /// carrying live data rather than by every non-free block.
    pub fn used_blocks_with_valid_data(&self) -> usize {
        (0..self.geometry.total_blocks)
            .filter(|&b| self.blocks.block(b).valid_count() > 0)
            .count()
    }

    /// The block currently receiving appends.
    pub fn active_block(&self) -> BlockId {
        self.active
    }

    /// Rotates the active block out for a fresh one dequeued from the free
    /// list. Only called when the current active block is full.
    fn rotate_active(&mut self, lba_for_diagnostic: Lba) -> Result<(), SimError> {
        self.active = self
            .free
            .dequeue()
            .ok_or(SimError::FreeQueueUnderflow {
                lba: Some(lba_for_diagnostic),
                free_len: 0,
            })?;
        Ok(())
    }

    /// Writes `lba`'s data to a freshly appended physical page, rotating
    /// the active block first if it is full.
    ///
    /// `is_gc` distinguishes a host write (counted in `user_writes`) from a
    /// GC relocation (counted in `gc_writes`); the credit is applied here,
    /// exactly once, regardless of caller.
    pub fn write_page(&mut self, lba: Lba, is_gc: bool) -> Result<(), SimError> {
        let logical_pages = self.geometry.logical_pages();
        if lba >= logical_pages {
            return Err(SimError::OutOfRangeLba { lba, logical_pages });
        }

        if self.blocks.block(self.active).is_full() {
            self.rotate_active(lba)?;
        }

        // Invalidate the previous mapping, if any, before installing the
        // new one, so a live fwd entry never transiently points at an
        // invalid page. A stale entry (already invalidated by
        // a prior GC pass) is silently ignored.
        if let Some(old_pp) = self.fwd.get(lba) {
            let (old_block, old_offset) = self.geometry.page_location(old_pp);
            if self.blocks.block(old_block).is_valid(old_offset) {
                self.blocks.block_mut(old_block).mark_invalid(old_offset);
                self.utl -= 1;
            }
        }

        let offset = self.blocks.append(self.active);
        let pp = self.geometry.physical_page(self.active, offset);
        self.oob.set(pp, lba);
        self.fwd.set(lba, pp);
        self.utl += 1;

        if is_gc {
            self.counters.gc_writes += 1;
            self.counters.window_gc_writes += 1;
        } else {
            self.counters.user_writes += 1;
            self.counters.window_user_writes += 1;
        }
        Ok(())
    }

    /// Picks the victim block minimizing valid-page count, excluding the
    /// active block and blocks that have never been written (those are
    /// already on the free queue). Ties favor the smallest block index.
    fn pick_victim(&self) -> Option<BlockId> {
        (0..self.geometry.total_blocks)
            .filter(|&b| b != self.active)
            .filter(|&b| self.blocks.block(b).free_offset() > 0)
            .min_by_key(|&b| self.blocks.block(b).valid_count())
    }

    /// Relocates every valid page off `victim` (in increasing offset
    /// order) through the write path, then erases it and returns it to the
    /// free queue.
    fn collect(&mut self, victim: BlockId) -> Result<(), SimError> {
        let ppb = self.geometry.pages_per_block;
        let mut relocated = 0u32;
        for offset in 0..ppb {
            if !self.blocks.block(victim).is_valid(offset) {
                continue;
            }
            let pp = self.geometry.physical_page(victim, offset);
            if let Some(lba) = self.oob.get(pp) {
                self.write_page(lba, true)?;
                relocated += 1;
            }
        }
        self.blocks.block_mut(victim).reset();
        self.free.enqueue(victim);
        self.counters.erases += 1;
        self.counters.window_erases += 1;
        info!("gc: erased block {victim} after relocating {relocated} page(s)");
        Ok(())
    }

    /// Runs garbage collection passes until the free queue is at or above
    /// `gc_threshold`, or no eligible victim remains (logged as a warning:
    /// the device is logically overfull and the next write will underflow).
    pub fn run_gc_until_threshold(&mut self) -> Result<(), SimError> {
        while self.free.len() < self.geometry.gc_threshold as usize {
            match self.pick_victim() {
                Some(victim) => self.collect(victim)?,
                None => {
                    warn!(
                        "gc: no eligible victim with free_blocks={} below gc_threshold={}",
                        self.free.len(),
                        self.geometry.gc_threshold
                    );
                    break;
                }
            }
        }
        Ok(())
    }

    /// Erases the block containing `lba` outright, as TRIM does, provided
    /// it is neither the active block nor already free. Otherwise a no-op,
    /// per the original source's coarse, whole-block TRIM.
    ///
    /// Fails with [`SimError::OutOfRangeTrimBlock`] if `lba / pages_per_block`
    /// names a block outside `[0, total_blocks)`, rather than panicking on
    /// the table index or silently wrapping onto an unrelated block.
    pub fn trim_block(&mut self, lba: Lba) -> Result<(), SimError> {
        let ppb = u64::from(self.geometry.pages_per_block);
        let block = lba / ppb;
        if block >= u64::from(self.geometry.total_blocks) {
            return Err(SimError::OutOfRangeTrimBlock {
                block,
                total_blocks: self.geometry.total_blocks,
            });
        }
        let block = block as BlockId;

        if block == self.active {
            return Ok(());
        }
        if self.blocks.block(block).free_offset() == 0 {
            // Already erased (on the free queue, or never written and not
            // yet active): nothing to do.
            return Ok(());
        }
        let freed = u64::from(self.blocks.block(block).valid_count());
        self.blocks.block_mut(block).reset();
        self.utl -= freed;
        self.free.enqueue(block);
        self.counters.erases += 1;
        self.counters.window_erases += 1;
        Ok(())
    }
}
