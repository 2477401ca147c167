//! Final pass: one tile per non-empty leaf.
//!
//! For every leaf, in leaf-id order, the materializer writes
//!
//! - `cell_<leaf>.<ext>`: the leaf's own vertices in scratch order, then
//!   its boundary vertices in ascending global id, then (OFF only) its
//!   triangles re-indexed to tile-local vertex positions;
//! - `cell_<leaf>_v_loc2glob`: the global id of each tile vertex, one per
//!   line, in the same order.
//!
//! The leaf's scratch files are deleted once its tile is closed. Empty
//! leaves produce no files.

mod las_file;
mod off;
mod xyz;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use nalgebra::Point3;

use crate::bounds::BoundingBox;
use crate::bsp::{BinarySpacePartition, TileFiles};
use crate::cancel::CancelToken;
use crate::error::{TilingError, TilingResult};
use crate::scratch::{self, CELL_VERTEX_BYTES, TRIANGLE_BYTES};
use crate::util::Timed;

pub use las_file::{LasOutput, LasSources};
pub use xyz::{XYZ_PRECISION, format_general};

/// Tile file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// ASCII `x y z` per line.
    #[default]
    Xyz,
    /// ASPRS LAS point cloud.
    Las,
    /// ASCII OFF mesh, including the leaf's triangles.
    Off,
}

impl OutputFormat {
    /// File extension of tiles in this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Xyz => "xyz",
            Self::Las => "las",
            Self::Off => "off",
        }
    }

    /// Returns `true` if tiles carry triangles.
    pub fn writes_triangles(self) -> bool {
        matches!(self, Self::Off)
    }
}

impl FromStr for OutputFormat {
    type Err = TilingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xyz" => Ok(Self::Xyz),
            "las" => Ok(Self::Las),
            "off" => Ok(Self::Off),
            _ => Err(TilingError::UnsupportedOutput { format: s.to_string() }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One finished tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileInfo {
    pub leaf_id: usize,
    pub tile_path: PathBuf,
    pub index_path: PathBuf,
    /// Vertices owned by the leaf.
    pub inner_vertices: u64,
    /// Vertices copied from other leaves.
    pub boundary_vertices: u64,
    /// Triangles owned by the leaf.
    pub triangles: u64,
    /// Leaves sharing a triangle with this one.
    pub neighbors: BTreeSet<usize>,
    /// Region of the leaf.
    pub bbox: BoundingBox,
}

impl TileInfo {
    /// Number of vertices in the tile file.
    pub fn vertex_count(&self) -> u64 {
        self.inner_vertices + self.boundary_vertices
    }
}

/// Sink for the vertices (and triangles) of one tile.
trait TileWriter {
    fn write_vertex(&mut self, id: u64, point: &Point3<f64>) -> TilingResult<()>;

    /// Writes a triangle with tile-local indices. Ignored by point formats.
    fn write_triangle(&mut self, _triangle: [u64; 3]) -> TilingResult<()> {
        Ok(())
    }

    fn finish(self: Box<Self>) -> TilingResult<()>;
}

/// Writes the tiles of a filled partition.
pub struct Materializer {
    output_dir: PathBuf,
    format: OutputFormat,
    las: LasOutput,
}

impl Materializer {
    pub fn new(output_dir: &Path, format: OutputFormat) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            format,
            las: LasOutput::default(),
        }
    }

    /// Header and point source for LAS tiles.
    pub fn with_las_output(mut self, las: LasOutput) -> Self {
        self.las = las;
        self
    }

    #[inline]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Writes every non-empty leaf of `bsp` and deletes all leaf scratch
    /// files.
    ///
    /// Returns the tiles in leaf-id order.
    ///
    /// # Panics
    /// Panics if a leaf lists boundary vertices whose coordinates were not
    /// cached by the fill.
    pub fn run(&mut self, bsp: &mut BinarySpacePartition, cancel: &CancelToken) -> TilingResult<Vec<TileInfo>> {
        let _t = Timed::info("Materialize tiles");
        let mut tiles = Vec::new();

        for leaf_id in 0..bsp.leaf_count() {
            cancel.check()?;
            if let Some(tile) = self.write_leaf(bsp, leaf_id)? {
                tiles.push(tile);
            }
        }

        log::info!(
            "Wrote {} {} tiles ({} empty leaves skipped) to {}",
            tiles.len(),
            self.format,
            bsp.leaf_count() - tiles.len(),
            self.output_dir.display()
        );
        Ok(tiles)
    }

    fn write_leaf(&mut self, bsp: &mut BinarySpacePartition, leaf_id: usize) -> TilingResult<Option<TileInfo>> {
        let cell = bsp.leaf(leaf_id);
        let files = cell.files().clone();
        let inner = cell.inner_vertex_count();
        let bbox = *cell.bbox();
        let neighbors = cell.neighbors().clone();
        let triangles = if self.format.writes_triangles() {
            cell.inner_triangle_count()
        } else {
            0
        };

        if inner == 0 {
            log::debug!("Leaf {leaf_id} is empty");
            files.remove_all()?;
            return Ok(None);
        }
        let _t = Timed::debug("Write tile");

        let boundary = read_boundary(&files.boundary_vertices)?;
        let tile_path = self
            .output_dir
            .join(format!("cell_{leaf_id}.{}", self.format.extension()));
        let index_path = self.output_dir.join(format!("cell_{leaf_id}_v_loc2glob"));
        let vertex_total = inner + boundary.len() as u64;

        let mut writer: Box<dyn TileWriter + '_> = match self.format {
            OutputFormat::Xyz => Box::new(xyz::XyzTile::create(&tile_path)?),
            OutputFormat::Off => Box::new(off::OffTile::create(&tile_path, vertex_total, triangles)?),
            OutputFormat::Las => Box::new(las_file::LasTile::create(&tile_path, &mut self.las)?),
        };
        let mut index = LocalIndex::create(&index_path, triangles > 0)?;

        let mut reader = scratch::open_reader(&files.inner_vertices)?;
        for i in 0..inner {
            let (id, point) = scratch::read_cell_vertex(&mut reader)
                .map_err(|e| TilingError::io(&files.inner_vertices, i * CELL_VERTEX_BYTES, e))?;
            writer.write_vertex(id, &point)?;
            index.push(id)?;
        }
        drop(reader);

        for &id in &boundary {
            let point = bsp
                .vertex_point(id)
                .unwrap_or_else(|| panic!("boundary vertex {id} of leaf {leaf_id} has no cached coordinates"));
            writer.write_vertex(id, point)?;
            index.push(id)?;
        }

        if triangles > 0 {
            let mut reader = scratch::open_reader(&files.inner_triangles)?;
            for i in 0..triangles {
                let triangle = scratch::read_triangle(&mut reader)
                    .map_err(|e| TilingError::io(&files.inner_triangles, i * TRIANGLE_BYTES, e))?;
                writer.write_triangle(triangle.map(|v| index.local(v, leaf_id)))?;
            }
        }

        writer.finish()?;
        index.finish()?;
        files.remove_all()?;

        log::debug!(
            "Tile {}: {} inner, {} boundary vertices, {} triangles",
            tile_path.display(),
            inner,
            boundary.len(),
            triangles
        );
        bsp.set_tile(
            leaf_id,
            TileFiles {
                tile: tile_path.clone(),
                local_to_global: index_path.clone(),
            },
        );

        Ok(Some(TileInfo {
            leaf_id,
            tile_path,
            index_path,
            inner_vertices: inner,
            boundary_vertices: boundary.len() as u64,
            triangles,
            neighbors,
            bbox,
        }))
    }
}

/// Writes the local-to-global index of a tile and, for meshes, keeps the
/// reverse mapping.
struct LocalIndex {
    out: BufWriter<File>,
    path: PathBuf,
    global_to_local: Option<HashMap<u64, u64>>,
    len: u64,
}

impl LocalIndex {
    fn create(path: &Path, track_local: bool) -> TilingResult<Self> {
        Ok(Self {
            out: scratch::create_writer(path)?,
            path: path.to_path_buf(),
            global_to_local: track_local.then(HashMap::new),
            len: 0,
        })
    }

    fn push(&mut self, id: u64) -> TilingResult<()> {
        writeln!(self.out, "{id}").map_err(|e| TilingError::io(&self.path, self.len + 1, e))?;
        if let Some(map) = &mut self.global_to_local {
            map.insert(id, self.len);
        }
        self.len += 1;
        Ok(())
    }

    /// Tile-local position of global vertex `id`.
    fn local(&self, id: u64, leaf_id: usize) -> u64 {
        self.global_to_local
            .as_ref()
            .and_then(|map| map.get(&id).copied())
            .unwrap_or_else(|| panic!("triangle vertex {id} is not in tile {leaf_id}"))
    }

    fn finish(self) -> TilingResult<()> {
        scratch::finish_writer(self.out, &self.path)
    }
}

/// Distinct boundary vertex ids of a leaf. A missing file means none.
fn read_boundary(path: &Path) -> TilingResult<BTreeSet<u64>> {
    let mut ids = BTreeSet::new();
    if !path.exists() {
        return Ok(ids);
    }
    let mut reader = scratch::open_reader(path)?;
    let mut offset = 0u64;
    while let Some(id) = scratch::try_read_u64(&mut reader).map_err(|e| TilingError::io(path, offset, e))? {
        ids.insert(id);
        offset += 8;
    }
    Ok(ids)
}
