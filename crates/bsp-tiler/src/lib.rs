//! Out-of-core spatial tiling of point clouds and triangle meshes.
//!
//! Splits datasets too large for memory into spatially coherent tiles of
//! bounded size using a binary space partition built from a downsample.
//! Only three sequential passes are made over the data and the working set
//! stays proportional to the downsample, not the dataset.

pub mod bsp;
pub mod scratch;
pub mod source;
pub mod tile;

mod bounds;
mod cancel;
mod config;
mod error;
mod plane;
mod sample;
mod scan;
mod tiling;
mod util;

pub use bounds::BoundingBox;
pub use cancel::CancelToken;
pub use config::{BoundaryCoordinates, TilingConfig};
pub use error::{ErrorCategory, Stage, TilingError, TilingResult};
pub use plane::{Axis, PlaneSide, SplitPlane};
pub use sample::StridedSampler;
pub use scan::{ScanSummary, scan_inputs};
pub use source::{InputFormat, SourceIndex};
pub use tile::{Materializer, OutputFormat, TileInfo};
pub use tiling::{TilingReport, tile_files, tile_files_with};
