//! Parameters for a tiling run.

use std::path::PathBuf;

use crate::cancel::CancelToken;
use crate::error::{TilingError, TilingResult};
use crate::tile::OutputFormat;

/// Where LAS tiles take their points from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryCoordinates {
    /// Re-read every point from its LAS input, keeping all attributes.
    /// Falls back to [`Cache`](Self::Cache) when the inputs are not LAS.
    #[default]
    Reread,
    /// Rebuild points from the coordinates stored in the scratch files.
    Cache,
}

/// Parameters for [`tile_files`](crate::tile_files).
#[derive(Debug, Clone)]
pub struct TilingConfig {
    /// Target maximum number of vertices per tile. Default: 1 000 000
    pub max_vertices_per_tile: u64,

    /// One vertex in `sample_stride` goes to the downsample. Default: 1000
    pub sample_stride: u64,

    /// Seed of the sampling jitter. If None, a seed is drawn and logged.
    pub seed: Option<u64>,

    /// Format of the tile files. Default: xyz
    pub output_format: OutputFormat,

    /// Directory for scratch files. If None, the output directory is used.
    pub scratch_dir: Option<PathBuf>,

    /// Point source for LAS tiles. Default: re-read the inputs
    pub boundary_coordinates: BoundaryCoordinates,

    /// Keep the flattened stream after a successful run. Default: false
    pub keep_scratch: bool,

    /// Checked between files, splits and tiles.
    pub cancel: CancelToken,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            max_vertices_per_tile: 1_000_000,
            sample_stride: 1000,
            seed: None,
            output_format: OutputFormat::Xyz,
            scratch_dir: None,
            boundary_coordinates: BoundaryCoordinates::Reread,
            keep_scratch: false,
            cancel: CancelToken::new(),
        }
    }
}

impl TilingConfig {
    /// Config targeting at most `max_vertices_per_tile` vertices per tile.
    #[must_use]
    pub fn new(max_vertices_per_tile: u64) -> Self {
        Self {
            max_vertices_per_tile,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_sample_stride(mut self, stride: u64) -> Self {
        self.sample_stride = stride;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_boundary_coordinates(mut self, mode: BoundaryCoordinates) -> Self {
        self.boundary_coordinates = mode;
        self
    }

    #[must_use]
    pub fn with_keep_scratch(mut self, keep: bool) -> Self {
        self.keep_scratch = keep;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Downsample points a leaf may hold before it is split.
    ///
    /// The tile budget scaled down by the sampling stride, never below 1.
    pub fn cell_sample_threshold(&self) -> u64 {
        (self.max_vertices_per_tile / self.sample_stride.max(1)).max(1)
    }

    /// Checks that every parameter is in range.
    pub fn validate(&self) -> TilingResult<()> {
        if self.max_vertices_per_tile == 0 {
            return Err(TilingError::InvalidParameter {
                reason: "max vertices per tile must be positive".to_string(),
            });
        }
        if self.sample_stride == 0 {
            return Err(TilingError::InvalidParameter {
                reason: "sample stride must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TilingConfig::default();
        assert_eq!(config.sample_stride, 1000);
        assert_eq!(config.output_format, OutputFormat::Xyz);
        assert_eq!(config.boundary_coordinates, BoundaryCoordinates::Reread);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = TilingConfig::new(500)
            .with_sample_stride(10)
            .with_seed(7)
            .with_output_format(OutputFormat::Off)
            .with_boundary_coordinates(BoundaryCoordinates::Cache);
        assert_eq!(config.max_vertices_per_tile, 500);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.cell_sample_threshold(), 50);
    }

    #[test]
    fn test_threshold_never_zero() {
        assert_eq!(TilingConfig::new(4).with_sample_stride(1000).cell_sample_threshold(), 1);
        assert_eq!(TilingConfig::new(4).with_sample_stride(1).cell_sample_threshold(), 4);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            TilingConfig::new(0).validate(),
            Err(TilingError::InvalidParameter { .. })
        ));
        assert!(matches!(
            TilingConfig::new(10).with_sample_stride(0).validate(),
            Err(TilingError::InvalidParameter { .. })
        ));
    }
}
