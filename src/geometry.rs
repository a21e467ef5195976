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

//! Device geometry: the fixed sizing of a simulated flash device.
//!
//! A [`Geometry`] is a plain, validated value rather than a set of
//! compile-time constants, so the CLI and an optional config file can size
//! the simulated device without a rebuild. It is never mutated once built;
//! every other component is sized from it at construction time.

use crate::error::ConfigError;

/// A physical page identifier: `block * pages_per_block + offset`.
pub type PhysicalPage = u64;
/// A logical block address, an index into the logical page space.
pub type Lba = u64;
/// A block index.
pub type BlockId = u32;

/// Fixed sizing of a simulated flash device.
///
/// Construct via [`Geometry::new`] (validated), or one of the convenience
/// constructors [`Geometry::production`] and [`Geometry::reduced_for_testing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Size of one page, in bytes.
    pub page_size: u32,
    /// Number of pages per block.
    pub pages_per_block: u32,
    /// Total number of physical blocks on the device.
    pub total_blocks: u32,
    /// User-visible logical capacity, in bytes. Strictly smaller than the
    /// physical capacity; the gap is overprovisioning.
    pub logical_size: u64,
    /// Minimum number of free blocks that must remain; falling below this
    /// triggers GC before the next trace record is processed.
    pub gc_threshold: u32,
    /// Byte interval between statistics emissions.
    pub statistics_stride_bytes: u64,
}

impl Geometry {
    /// Builds a geometry, validating every field.
    ///
    /// See [`ConfigError`] for the rejected cases.
    pub fn new(
        page_size: u32,
        pages_per_block: u32,
        total_blocks: u32,
        logical_size: u64,
        gc_threshold: u32,
        statistics_stride_bytes: u64,
    ) -> Result<Self, ConfigError> {
        if page_size == 0 || pages_per_block == 0 || total_blocks <= 1 {
            return Err(ConfigError::DegenerateGeometry {
                page_size,
                pages_per_block,
                total_blocks,
            });
        }
        if gc_threshold == 0 || gc_threshold >= total_blocks {
            return Err(ConfigError::InvalidGcThreshold {
                gc_threshold,
                total_blocks,
            });
        }
        if statistics_stride_bytes == 0 {
            return Err(ConfigError::ZeroStatisticsStride);
        }
        let geometry = Self {
            page_size,
            pages_per_block,
            total_blocks,
            logical_size,
            gc_threshold,
            statistics_stride_bytes,
        };
        let (logical_pages, total_pages) = (geometry.logical_pages(), geometry.total_pages());
        if logical_pages >= total_pages {
            return Err(ConfigError::NoOverprovisioning {
                logical_pages,
                total_pages,
            });
        }
        Ok(geometry)
    }

    /// An 8 GiB device (4 KiB pages, 1024 pages/block, 2048 blocks) with a
    /// 10% overprovisioning ratio and an 8 GiB statistics stride, matching
    /// the scale of the system this simulator was distilled from.
    pub fn production() -> Self {
        let page_size = 4096u32;
        let pages_per_block = 1024u32;
        let total_blocks = 2048u32;
        let total_size = u64::from(page_size) * u64::from(pages_per_block) * u64::from(total_blocks);
        let logical_size = total_size - total_size / 10;
        Self::new(
            page_size,
            pages_per_block,
            total_blocks,
            logical_size,
            32,
            8 * 1024 * 1024 * 1024,
        )
        .expect("built-in production geometry must be valid")
    }

    /// A small geometry for end-to-end test scenarios:
    /// PPB = 4, TotalBlocks = 4, LogicalPages = 12, GCThreshold = 1.
    pub fn reduced_for_testing() -> Self {
        let page_size = 4096u32;
        let pages_per_block = 4u32;
        let total_blocks = 4u32;
        let logical_pages = 12u64;
        Self::new(
            page_size,
            pages_per_block,
            total_blocks,
            logical_pages * u64::from(page_size),
            1,
            u64::MAX,
        )
        .expect("built-in reduced-for-testing geometry must be valid")
    }

    /// Total physical pages across the whole device.
    pub fn total_pages(&self) -> u64 {
        u64::from(self.total_blocks) * u64::from(self.pages_per_block)
    }

    /// Size of the user-visible logical address space, in pages.
    pub fn logical_pages(&self) -> u64 {
        self.logical_size / u64::from(self.page_size)
    }

    /// Decomposes a physical page into its (block, offset) coordinates.
    pub fn page_location(&self, pp: PhysicalPage) -> (BlockId, u32) {
        let ppb = u64::from(self.pages_per_block);
        ((pp / ppb) as BlockId, (pp % ppb) as u32)
    }

    /// Computes the physical page identifier for a (block, offset) pair.
    pub fn physical_page(&self, block: BlockId, offset: u32) -> PhysicalPage {
        u64::from(block) * u64::from(self.pages_per_block) + u64::from(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_is_valid_and_overprovisioned() {
        let g = Geometry::production();
        assert!(g.logical_pages() < g.total_pages());
        assert_eq!(g.total_pages(), 2048 * 1024);
    }

    #[test]
    fn reduced_for_testing_matches_spec_scenarios() {
        let g = Geometry::reduced_for_testing();
        assert_eq!(g.pages_per_block, 4);
        assert_eq!(g.total_blocks, 4);
        assert_eq!(g.logical_pages(), 12);
        assert_eq!(g.gc_threshold, 1);
    }

    #[test]
    fn rejects_zero_pages_per_block() {
        let err = Geometry::new(4096, 0, 4, 4096 * 12, 1, 1).unwrap_err();
        assert!(matches!(err, ConfigError::DegenerateGeometry { .. }));
    }

    #[test]
    fn rejects_non_overprovisioned_logical_size() {
        // logical_pages == total_pages: no overprovisioning headroom.
        let err = Geometry::new(4096, 4, 4, 4096 * 16, 1, 1).unwrap_err();
        assert!(matches!(err, ConfigError::NoOverprovisioning { .. }));
    }

    #[test]
    fn rejects_gc_threshold_out_of_range() {
        let err = Geometry::new(4096, 4, 4, 4096 * 12, 4, 1).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGcThreshold { .. }));
        let err = Geometry::new(4096, 4, 4, 4096 * 12, 0, 1).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGcThreshold { .. }));
    }

    #[test]
    fn page_location_roundtrips() {
        let g = Geometry::production();
        let pp = g.physical_page(17, 3);
        assert_eq!(g.page_location(pp), (17, 3));
    }
}
