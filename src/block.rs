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

//! Per-block validity bitmap and the table of all blocks on the device.

use bitvec::vec::BitVec;

use crate::geometry::{BlockId, Geometry};

/// The state of a single block: which of its pages are valid, how far the
/// write cursor has advanced, and how many pages are currently valid.
///
/// `valid_count` is always kept consistent with the bitmap by construction:
/// every mutator that flips a bit also adjusts the counter, so it never
/// needs to be recomputed by popcount.
#[derive(Debug, Clone)]
pub struct BlockState {
    valid: BitVec,
    free_offset: u32,
    valid_count: u32,
}

impl BlockState {
    fn new(pages_per_block: u32) -> Self {
        Self {
            valid: BitVec::repeat(false, pages_per_block as usize),
            free_offset: 0,
            valid_count: 0,
        }
    }

    /// Whether page `offset` within this block currently holds live data.
    pub fn is_valid(&self, offset: u32) -> bool {
        self.valid[offset as usize]
    }

    /// Marks page `offset` as valid. Callers are responsible for ensuring
    /// the offset was not already valid (the write path only ever marks
    /// freshly appended pages, which start out invalid).
    pub fn mark_valid(&mut self, offset: u32) {
        let slot = self.valid.get_mut(offset as usize).unwrap();
        if !*slot {
            *slot = true;
            self.valid_count += 1;
        }
    }

    /// Marks page `offset` as invalid. A no-op if it was already invalid:
    /// this is how overwrites silently absorb pages already obsoleted by a
    /// prior GC pass, without double-decrementing the valid count.
    pub fn mark_invalid(&mut self, offset: u32) {
        let slot = self.valid.get_mut(offset as usize).unwrap();
        if *slot {
            *slot = false;
            self.valid_count -= 1;
        }
    }

    /// The next writable offset within this block, in `[0, pages_per_block]`.
    pub fn free_offset(&self) -> u32 {
        self.free_offset
    }

    /// Number of currently valid pages in this block.
    pub fn valid_count(&self) -> u32 {
        self.valid_count
    }

    /// Whether this block has been fully written and cannot accept more
    /// appends without being erased first.
    pub fn is_full(&self) -> bool {
        self.free_offset as usize == self.valid.len()
    }

    /// Advances the write cursor by one page, for use right after appending.
    fn advance(&mut self) {
        debug_assert!(!self.is_full());
        self.free_offset += 1;
    }

    /// Clears every validity bit and resets the write cursor and valid
    /// count to zero, as happens when a block is erased.
    pub fn reset(&mut self) {
        self.valid.fill(false);
        self.free_offset = 0;
        self.valid_count = 0;
    }
}

/// The state of every block on the device.
#[derive(Debug, Clone)]
pub struct BlockTable {
    blocks: Vec<BlockState>,
    pages_per_block: u32,
}

impl BlockTable {
    /// Builds a table of `geometry.total_blocks` freshly erased blocks.
    pub fn new(geometry: &Geometry) -> Self {
        let blocks = (0..geometry.total_blocks)
            .map(|_| BlockState::new(geometry.pages_per_block))
            .collect();
        Self {
            blocks,
            pages_per_block: geometry.pages_per_block,
        }
    }

    /// Number of blocks in the table.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Pages per block, as supplied at construction.
    pub fn pages_per_block(&self) -> u32 {
        self.pages_per_block
    }

    /// Immutable access to one block's state.
    pub fn block(&self, block: BlockId) -> &BlockState {
        &self.blocks[block as usize]
    }

    /// Mutable access to one block's state.
    pub fn block_mut(&mut self, block: BlockId) -> &mut BlockState {
        &mut self.blocks[block as usize]
    }

    /// Appends a page to `block`'s write cursor, returning the offset just
    /// written. Panics if the block is already full; callers must rotate
    /// to a fresh active block before calling this.
    pub fn append(&mut self, block: BlockId) -> u32 {
        let state = self.block_mut(block);
        let offset = state.free_offset();
        state.mark_valid(offset);
        state.advance();
        offset
    }

    /// Total valid pages across every block. Used only to cross-check
    /// the device-wide valid-page count (`utl = sum of valid_count`) in tests; the simulator
    /// itself tracks `utl` incrementally for O(1) bookkeeping.
    pub fn total_valid(&self) -> u64 {
        self.blocks.iter().map(|b| u64::from(b.valid_count())).sum()
    }
}
