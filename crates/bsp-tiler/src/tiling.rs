//! End-to-end tiling of a set of input files.

use std::fs;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::bsp::{BinarySpacePartition, MedianSplit, SplitSelector};
use crate::config::{BoundaryCoordinates, TilingConfig};
use crate::error::{Stage, TilingError, TilingResult};
use crate::sample::StridedSampler;
use crate::scan::{ScanSummary, scan_inputs};
use crate::scratch;
use crate::source::InputFormat;
use crate::tile::{LasOutput, LasSources, Materializer, OutputFormat, TileInfo};
use crate::util::Timed;

/// Outcome of a tiling run.
#[derive(Debug, Clone)]
pub struct TilingReport {
    /// Written tiles, in leaf-id order.
    pub tiles: Vec<TileInfo>,
    /// Vertices read from the inputs.
    pub vertices: u64,
    /// Triangles read from the inputs.
    pub triangles: u64,
    /// Vertices in the downsample.
    pub sampled: u64,
    /// Leaves of the partition, empty ones included.
    pub leaves: usize,
    /// Seed the sampler ran with.
    pub seed: u64,
}

impl TilingReport {
    /// Paths of the tile files, in leaf-id order.
    pub fn tile_paths(&self) -> impl Iterator<Item = &Path> + '_ {
        self.tiles.iter().map(|tile| tile.tile_path.as_path())
    }

    /// Leaves that received no vertex and produced no tile.
    pub fn empty_leaves(&self) -> usize {
        self.leaves - self.tiles.len()
    }
}

/// Tiles `inputs` into `output_dir`, splitting cells with [`MedianSplit`].
///
/// # Errors
/// See [`tile_files_with`].
pub fn tile_files(inputs: &[PathBuf], output_dir: &Path, config: &TilingConfig) -> TilingResult<TilingReport> {
    tile_files_with(inputs, output_dir, config, &MedianSplit)
}

/// Tiles `inputs` into `output_dir` using `selector` to split cells.
///
/// Runs the scan, build, fill and materialize passes in order. The output
/// and scratch directories are created if missing.
///
/// # Errors
/// Fails on invalid parameters, unreadable, malformed or mixed inputs,
/// degenerate triangles, scratch or output I/O failures, and cancellation.
/// Errors raised by a pass are tagged with its [`Stage`]. Scratch files of
/// a failed run are left behind.
pub fn tile_files_with<S: SplitSelector + ?Sized>(
    inputs: &[PathBuf],
    output_dir: &Path,
    config: &TilingConfig,
    selector: &S,
) -> TilingResult<TilingReport> {
    config.validate()?;
    let _t = Timed::info("Tiling");
    let cancel = &config.cancel;

    let scratch_dir = config.scratch_dir.as_deref().unwrap_or(output_dir);
    create_dir(output_dir)?;
    create_dir(scratch_dir)?;

    let seed = config.seed.unwrap_or_else(rand::random);
    log::info!(
        "Tiling {} files into {} (max {} vertices per tile, stride {}, seed {})",
        inputs.len(),
        output_dir.display(),
        config.max_vertices_per_tile,
        config.sample_stride,
        seed
    );

    let mut sampler = StridedSampler::new(config.sample_stride, StdRng::seed_from_u64(seed));
    let scan = scan_inputs(inputs, scratch_dir, &mut sampler, cancel).map_err(|e| e.in_stage(Stage::Scan))?;

    let mut bsp = BinarySpacePartition::new(scan.bbox, &scan.downsample_path, scan.sample_count, scratch_dir);
    bsp.build(config.cell_sample_threshold(), selector, cancel)
        .map_err(|e| e.in_stage(Stage::Build))?;
    bsp.fill(&scan.binary_path, inputs.len(), scan.has_triangles(), cancel)
        .map_err(|e| e.in_stage(Stage::Fill))?;

    let tiles =
        materialize(inputs, output_dir, config, &scan, &mut bsp).map_err(|e| e.in_stage(Stage::Materialize))?;

    if !config.keep_scratch {
        scratch::remove_scratch(&scan.binary_path)?;
    }

    Ok(TilingReport {
        tiles,
        vertices: scan.vertex_count,
        triangles: scan.triangle_count,
        sampled: scan.sample_count,
        leaves: bsp.leaf_count(),
        seed,
    })
}

fn materialize(
    inputs: &[PathBuf],
    output_dir: &Path,
    config: &TilingConfig,
    scan: &ScanSummary,
    bsp: &mut BinarySpacePartition,
) -> TilingResult<Vec<TileInfo>> {
    let mut materializer = Materializer::new(output_dir, config.output_format);
    if config.output_format == OutputFormat::Las {
        materializer = materializer.with_las_output(las_output(inputs, scan, config.boundary_coordinates)?);
    }
    materializer.run(bsp, &config.cancel)
}

fn create_dir(dir: &Path) -> TilingResult<()> {
    fs::create_dir_all(dir).map_err(|e| TilingError::create(dir, e))
}

/// Header and point source for LAS tiles of this run.
fn las_output(inputs: &[PathBuf], scan: &ScanSummary, mode: BoundaryCoordinates) -> TilingResult<LasOutput> {
    if scan.format != InputFormat::Las {
        if mode == BoundaryCoordinates::Reread {
            log::warn!("Inputs are not LAS; LAS tiles are built from cached coordinates");
        }
        return Ok(LasOutput::default());
    }

    let output = LasOutput::from_file(&inputs[0])?;
    Ok(match mode {
        BoundaryCoordinates::Reread => {
            output.with_sources(LasSources::new(inputs.to_vec(), scan.source_index.clone()))
        }
        BoundaryCoordinates::Cache => output,
    })
}
