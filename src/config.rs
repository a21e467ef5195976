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

//! Resolves a run's [`Geometry`] from built-in defaults, an optional TOML
//! config file, and CLI overrides, in that ascending order of precedence.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::geometry::Geometry;

/// The subset of geometry fields a TOML config file may override. Every
/// field is optional so a config file only needs to mention what it wants
/// to change from [`Geometry::production`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub page_size: Option<u32>,
    pub pages_per_block: Option<u32>,
    pub total_blocks: Option<u32>,
    pub logical_size: Option<u64>,
    pub gc_threshold: Option<u32>,
    pub statistics_stride_bytes: Option<u64>,
}

impl ConfigFile {
    /// Reads and parses a TOML config file from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// CLI-level overrides, applied on top of a [`ConfigFile`] (or the
/// built-in defaults if none was given).
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub total_blocks: Option<u32>,
    pub gc_threshold: Option<u32>,
    pub logical_gib: Option<f64>,
    pub stride_gib: Option<f64>,
}

/// Builds a [`Geometry`] from the built-in production defaults, an
/// optional config file, and CLI overrides, validating the final result.
pub fn resolve(
    config_path: Option<&PathBuf>,
    overrides: &CliOverrides,
) -> Result<Geometry, ConfigError> {
    let base = Geometry::production();
    let file = match config_path {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };

    let page_size = file.page_size.unwrap_or(base.page_size);
    let pages_per_block = file.pages_per_block.unwrap_or(base.pages_per_block);
    let total_blocks = overrides
        .total_blocks
        .or(file.total_blocks)
        .unwrap_or(base.total_blocks);
    let logical_size = overrides
        .logical_gib
        .map(gib_to_bytes)
        .or(file.logical_size)
        .unwrap_or(base.logical_size);
    let gc_threshold = overrides
        .gc_threshold
        .or(file.gc_threshold)
        .unwrap_or(base.gc_threshold);
    let statistics_stride_bytes = overrides
        .stride_gib
        .map(gib_to_bytes)
        .or(file.statistics_stride_bytes)
        .unwrap_or(base.statistics_stride_bytes);

    Geometry::new(
        page_size,
        pages_per_block,
        total_blocks,
        logical_size,
        gc_threshold,
        statistics_stride_bytes,
    )
}

fn gib_to_bytes(gib: f64) -> u64 {
    (gib * 1024.0 * 1024.0 * 1024.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_geometry() {
        let g = resolve(None, &CliOverrides::default()).unwrap();
        assert_eq!(g, Geometry::production());
    }

    #[test]
    fn cli_override_beats_default() {
        // total_blocks must be paired with a compatible logical_gib: the
        // production default's logical_size is sized for a 2048-block
        // device and would leave no overprovisioning headroom at 64 blocks.
        let overrides = CliOverrides {
            total_blocks: Some(64),
            gc_threshold: Some(4),
            logical_gib: Some(0.2),
            ..Default::default()
        };
        let g = resolve(None, &overrides).unwrap();
        assert_eq!(g.total_blocks, 64);
        assert_eq!(g.gc_threshold, 4);
        assert!(g.logical_pages() < g.total_pages());
    }

    #[test]
    fn config_file_parses_partial_overrides() {
        let toml_text = "total_blocks = 16\ngc_threshold = 2\n";
        let file: ConfigFile = toml::from_str(toml_text).unwrap();
        assert_eq!(file.total_blocks, Some(16));
        assert_eq!(file.gc_threshold, Some(2));
        assert_eq!(file.page_size, None);
    }

    #[test]
    fn invalid_resolved_geometry_surfaces_as_config_error() {
        let overrides = CliOverrides {
            total_blocks: Some(2),
            gc_threshold: Some(5),
            ..Default::default()
        };
        let err = resolve(None, &overrides).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGcThreshold { .. }));
    }
}
