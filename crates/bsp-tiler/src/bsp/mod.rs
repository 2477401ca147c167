//! Out-of-core binary space partition of a vertex dataset.
//!
//! The partition is built in two passes over scratch files:
//!
//! 1. [`BinarySpacePartition::build`] splits the bounding box using only
//!    the downsample, until each leaf holds few enough samples.
//! 2. [`BinarySpacePartition::fill`] streams every vertex (and triangle)
//!    to its leaf.
//!
//! # Example
//!
//! ```ignore
//! use bsp_tiler::bsp::{BinarySpacePartition, MedianSplit};
//!
//! let mut bsp = BinarySpacePartition::new(scan.bbox, &scan.downsample_path, scan.sample_count, dir);
//! bsp.build(target_samples, &MedianSplit, &cancel)?;
//! bsp.fill(&scan.binary_path, inputs.len(), scan.has_triangles(), &cancel)?;
//!
//! for leaf in bsp.leaves() {
//!     println!("leaf {:?}: {} vertices", leaf.leaf_id(), leaf.inner_vertex_count());
//! }
//! ```
//!
//! # Architecture
//!
//! - [`BinarySpacePartition`]: arena of [`Cell`]s addressed by [`CellId`]
//! - [`SplitSelector`]: strategy trait for choosing split planes
//! - [`classify_triangle`]: owner of a triangle spanning several leaves
//! - [`BoundaryStatus`]: per-vertex boundary bookkeeping for meshes

mod boundary;
mod cell;
mod fill;
mod selector;
mod tree;

pub use boundary::{BoundaryStatus, ConstrainedVertex, TriangleOwnership, classify_triangle};
pub use cell::{Cell, CellId, Children, TileFiles};
pub use fill::FillSummary;
pub use selector::{MedianSplit, SplitSelector};
pub use tree::BinarySpacePartition;
