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

//! Error types shared across the simulator.
//!
//! [`SimError`] is the top-level error returned from the trace driver and,
//! ultimately, from `main`. Every variant corresponds to one of the error
//! kinds the simulator can raise; stale
//! forward entries and GC finding no eligible victim are *not* represented
//! here, since both are silent, expected recoveries rather than errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A fatal error resolving the simulator's configuration before any trace
/// record has been processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `page_size`, `pages_per_block`, or `total_blocks` was zero, or
    /// `total_blocks` was too small to ever hold an active block plus one
    /// free block.
    #[error("page_size, pages_per_block and total_blocks must all be non-zero, and total_blocks must exceed 1 (got page_size={page_size}, pages_per_block={pages_per_block}, total_blocks={total_blocks})")]
    DegenerateGeometry {
        page_size: u32,
        pages_per_block: u32,
        total_blocks: u32,
    },
    /// `logical_size` did not leave any overprovisioning headroom, i.e.
    /// `logical_pages >= total_pages`.
    #[error("logical capacity ({logical_pages} pages) must be strictly smaller than physical capacity ({total_pages} pages) to leave overprovisioning headroom for GC")]
    NoOverprovisioning { logical_pages: u64, total_pages: u64 },
    /// `gc_threshold` was zero or not smaller than `total_blocks`.
    #[error("gc_threshold must be in [1, total_blocks) (got gc_threshold={gc_threshold}, total_blocks={total_blocks})")]
    InvalidGcThreshold { gc_threshold: u32, total_blocks: u32 },
    /// `statistics_stride` was zero.
    #[error("statistics_stride_bytes must be non-zero")]
    ZeroStatisticsStride,
    /// The `--config` TOML file could not be read from disk.
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The `--config` TOML file could not be parsed.
    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A fatal error encountered while running a trace through the simulator.
#[derive(Debug, Error)]
pub enum SimError {
    /// Resolving the run's configuration failed; see [`ConfigError`].
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The trace file could not be opened.
    #[error("failed to open trace file {path}: {source}")]
    TraceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Reading a line from the trace input failed at the I/O level.
    #[error("failed to read trace input: {0}")]
    TraceRead(#[from] io::Error),
    /// A trace line did not match the five-field record grammar.
    #[error("malformed trace record at line {line}: {text:?}")]
    TraceParse { line: usize, text: String },
    /// A write record addressed an LBA outside `[0, logical_pages)`.
    #[error("out-of-range LBA {lba} (logical address space has {logical_pages} pages)")]
    OutOfRangeLba { lba: u64, logical_pages: u64 },
    /// A TRIM record's LBA divided by `pages_per_block` named a block
    /// outside `[0, total_blocks)`.
    #[error("out-of-range TRIM block {block} (device has {total_blocks} blocks)")]
    OutOfRangeTrimBlock { block: u64, total_blocks: u32 },
    /// The free-block queue was empty when a rotation or GC relocation
    /// needed a block to write into. Means the device is logically overfull
    /// for its overprovisioning ratio: free_blocks + 1 + used_blocks no longer
    /// covers total_blocks with any slack.
    #[error("free-block queue underflow servicing lba={lba:?} (free_len={free_len}); the device is overfull for its overprovisioning ratio")]
    FreeQueueUnderflow { lba: Option<u64>, free_len: usize },
}
