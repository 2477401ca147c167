//! BSP arena and construction from the downsample.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use nalgebra::Point3;

use crate::bounds::BoundingBox;
use crate::cancel::CancelToken;
use crate::error::{TilingError, TilingResult};
use crate::plane::PlaneSide;
use crate::scratch::{self, CellFiles, POINT_BYTES};
use crate::util::Timed;

use super::boundary::{BoundaryStatus, ConstrainedVertex};
use super::cell::{Cell, CellId, Children, TileFiles};
use super::selector::SplitSelector;

/// A binary space partition of the dataset's bounding box.
///
/// Cells live in an arena indexed by [`CellId`]; the root is cell 0 and
/// every split appends its two children. The tree is built from the
/// downsample only (see [`build`](Self::build)), after which the leaves
/// are fixed and numbered densely from 0 in creation order.
///
/// Filling the tree with the full-resolution stream (see
/// [`fill`](Self::fill)) distributes vertices and triangles to leaves and,
/// for meshes, records boundary vertices and leaf adjacency.
#[derive(Debug)]
pub struct BinarySpacePartition {
    pub(crate) cells: Vec<Cell>,
    /// Current leaves; after stabilisation, indexed by leaf id.
    pub(crate) leaves: Vec<CellId>,
    /// Highest cell id issued so far.
    id_counter: usize,
    scratch_dir: PathBuf,
    stabilized: bool,
    // Mesh bookkeeping, only populated when triangles are present.
    pub(crate) vertex_leaf: Vec<usize>,
    pub(crate) vertex_boundary: Vec<BoundaryStatus>,
    pub(crate) coordinates: Vec<Point3<f64>>,
    pub(crate) constrained: BTreeMap<u64, ConstrainedVertex>,
}

impl BinarySpacePartition {
    /// Creates a single-cell partition over `bbox`.
    ///
    /// `downsample` holds `sample_count` points that become the root's
    /// inner vertices. Scratch files of new cells go to `scratch_dir`.
    pub fn new(bbox: BoundingBox, downsample: &Path, sample_count: u64, scratch_dir: &Path) -> Self {
        let mut files = CellFiles::for_cell(scratch_dir, CellId::ROOT.0);
        files.inner_vertices = downsample.to_path_buf();
        let root = Cell::new(CellId::ROOT, bbox, None, files, sample_count);

        Self {
            cells: vec![root],
            leaves: vec![CellId::ROOT],
            id_counter: CellId::ROOT.0,
            scratch_dir: scratch_dir.to_path_buf(),
            stabilized: false,
            vertex_leaf: Vec::new(),
            vertex_boundary: Vec::new(),
            coordinates: Vec::new(),
            constrained: BTreeMap::new(),
        }
    }

    /// Splits leaves until every splittable leaf holds at most
    /// `max_cell_samples` downsample points.
    ///
    /// The leaf with the most points (first in leaf order on ties) is
    /// split next. A leaf for which `selector` finds no plane is marked
    /// unsplittable and left oversized. Once no leaf needs splitting the
    /// leaves get dense leaf ids, their counts are reset and the
    /// downsample scratch files are deleted.
    ///
    /// # Panics
    /// Panics if `max_cell_samples` is zero or the tree was already built.
    pub fn build<S: SplitSelector + ?Sized>(
        &mut self,
        max_cell_samples: u64,
        selector: &S,
        cancel: &CancelToken,
    ) -> TilingResult<()> {
        assert!(max_cell_samples > 0, "cell sample threshold must be positive");
        assert!(!self.stabilized, "partition already built");
        let _t = Timed::info("Build BSP");

        while let Some(position) = self.largest_splittable_leaf(max_cell_samples) {
            cancel.check()?;
            let handle = self.leaves[position];

            match self.split_cell(handle, selector)? {
                Some(children) => {
                    self.leaves.remove(position);
                    self.leaves.push(children.lower);
                    self.leaves.push(children.upper);
                }
                None => {
                    let cell = &mut self.cells[handle.0];
                    cell.splittable = false;
                    log::warn!(
                        "Cell {} with {} samples cannot be split; its tile will exceed the target size",
                        handle,
                        cell.inner_vertex_count
                    );
                }
            }
        }

        self.stabilize()?;
        log::info!(
            "BSP built: {} cells, {} leaves, depth {}",
            self.cells.len(),
            self.leaves.len(),
            self.depth()
        );
        Ok(())
    }

    /// Position in `self.leaves` of the splittable leaf with the most
    /// samples, if that count exceeds `threshold`.
    fn largest_splittable_leaf(&self, threshold: u64) -> Option<usize> {
        let mut best: Option<(usize, u64)> = None;
        for (position, handle) in self.leaves.iter().enumerate() {
            let cell = &self.cells[handle.0];
            if !cell.splittable {
                continue;
            }
            if best.is_none_or(|(_, count)| cell.inner_vertex_count > count) {
                best = Some((position, cell.inner_vertex_count));
            }
        }
        best.filter(|&(_, count)| count > threshold)
            .map(|(position, _)| position)
    }

    /// Splits a leaf into two children, redistributing its samples.
    ///
    /// Returns `None`, leaving the cell untouched, when the selector finds
    /// no plane or its plane leaves one side empty.
    fn split_cell<S: SplitSelector + ?Sized>(
        &mut self,
        handle: CellId,
        selector: &S,
    ) -> TilingResult<Option<Children>> {
        let cell = &self.cells[handle.0];
        debug_assert!(cell.is_leaf());
        let parent_path = cell.files.inner_vertices.clone();
        let samples = read_samples(&parent_path, cell.inner_vertex_count)?;

        let Some(plane) = selector.select(&cell.bbox, &samples) else {
            return Ok(None);
        };
        let sides: Vec<PlaneSide> = samples.iter().map(|p| plane.classify_point(p)).collect();
        let lower_count = sides.iter().filter(|&&s| s == PlaneSide::Lower).count() as u64;
        let upper_count = samples.len() as u64 - lower_count;
        if lower_count == 0 || upper_count == 0 {
            log::debug!("Split of cell {handle} at {plane:?} leaves one side empty");
            return Ok(None);
        }

        let (lower_box, upper_box) = cell.bbox.split(&plane);
        let lower = CellId(self.id_counter + 1);
        let upper = CellId(self.id_counter + 2);
        debug_assert_eq!(lower.0, self.cells.len());

        let lower_files = CellFiles::for_cell(&self.scratch_dir, lower.0);
        let upper_files = CellFiles::for_cell(&self.scratch_dir, upper.0);
        let mut lower_out = scratch::create_writer(&lower_files.inner_vertices)?;
        let mut upper_out = scratch::create_writer(&upper_files.inner_vertices)?;
        let (mut lower_written, mut upper_written) = (0u64, 0u64);
        for (point, side) in samples.iter().zip(&sides) {
            let (out, path, written) = match side {
                PlaneSide::Lower => (&mut lower_out, &lower_files.inner_vertices, &mut lower_written),
                PlaneSide::Upper => (&mut upper_out, &upper_files.inner_vertices, &mut upper_written),
            };
            scratch::write_point(out, point).map_err(|e| TilingError::io(path, *written * POINT_BYTES, e))?;
            *written += 1;
        }
        scratch::finish_writer(lower_out, &lower_files.inner_vertices)?;
        scratch::finish_writer(upper_out, &upper_files.inner_vertices)?;
        scratch::remove_scratch(&parent_path)?;

        log::debug!(
            "Split cell {handle} at {plane:?}: {lower} gets {lower_count}, {upper} gets {upper_count}"
        );

        let children = Children { plane, lower, upper };
        self.cells.push(Cell::new(lower, lower_box, Some(handle), lower_files, lower_count));
        self.cells.push(Cell::new(upper, upper_box, Some(handle), upper_files, upper_count));
        let parent = &mut self.cells[handle.0];
        parent.children = Some(children);
        parent.inner_vertex_count = 0;
        self.id_counter += 2;

        Ok(Some(children))
    }

    /// Numbers the leaves, resets their counts and drops the downsample.
    fn stabilize(&mut self) -> TilingResult<()> {
        for (leaf_id, handle) in self.leaves.iter().enumerate() {
            let cell = &mut self.cells[handle.0];
            scratch::remove_scratch(&cell.files.inner_vertices)?;
            cell.files = CellFiles::for_cell(&self.scratch_dir, handle.0);
            cell.leaf_id = Some(leaf_id);
            cell.inner_vertex_count = 0;
            cell.inner_triangle_count = 0;
        }
        self.stabilized = true;
        Ok(())
    }

    /// Returns `true` once [`build`](Self::build) has completed.
    #[inline]
    pub fn is_built(&self) -> bool {
        self.stabilized
    }

    #[inline]
    pub fn root(&self) -> &Cell {
        &self.cells[CellId::ROOT.0]
    }

    #[inline]
    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.0]
    }

    /// All cells, indexed by id.
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// The leaf with the given leaf id.
    ///
    /// # Panics
    /// Panics if the tree is not built or `leaf_id` is out of range.
    pub fn leaf(&self, leaf_id: usize) -> &Cell {
        assert!(self.stabilized, "leaf ids are assigned by build");
        &self.cells[self.leaves[leaf_id].0]
    }

    /// Leaves in leaf-id order (creation order before the tree is built).
    pub fn leaves(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.leaves.iter().map(|id| &self.cells[id.0])
    }

    /// Maximum depth of the tree; a lone root has depth 1.
    pub fn depth(&self) -> usize {
        let mut depth = vec![1usize; self.cells.len()];
        for cell in &self.cells {
            if let Some(parent) = cell.parent {
                depth[cell.id.0] = depth[parent.0] + 1;
            }
        }
        depth.into_iter().max().unwrap_or(0)
    }

    /// Descends from `start` to the leaf whose region contains `point`.
    pub fn descend(&self, start: CellId, point: &Point3<f64>) -> CellId {
        let mut current = start;
        while let Some(children) = &self.cells[current.0].children {
            current = children.select(point);
        }
        current
    }

    /// The leaf whose region contains `point`.
    ///
    /// Points outside the root box still reach a leaf by following the
    /// split planes.
    #[inline]
    pub fn locate(&self, point: &Point3<f64>) -> CellId {
        self.descend(CellId::ROOT, point)
    }

    /// Leaf id of the leaf containing `point`.
    pub fn leaf_of_point(&self, point: &Point3<f64>) -> Option<usize> {
        self.cells[self.locate(point).0].leaf_id
    }

    /// Leaf ids adjacent to `leaf_id` through shared triangles.
    pub fn neighbors(&self, leaf_id: usize) -> &BTreeSet<usize> {
        &self.leaf(leaf_id).neighbors
    }

    /// Leaf owning global vertex `vertex`. Only tracked for meshes.
    pub fn leaf_of_vertex(&self, vertex: u64) -> Option<usize> {
        self.vertex_leaf.get(vertex as usize).copied()
    }

    /// Boundary status of global vertex `vertex`. Only tracked for meshes.
    pub fn boundary_status(&self, vertex: u64) -> Option<BoundaryStatus> {
        self.vertex_boundary.get(vertex as usize).copied()
    }

    /// Coordinates of global vertex `vertex`. Only cached for meshes.
    pub fn vertex_point(&self, vertex: u64) -> Option<&Point3<f64>> {
        self.coordinates.get(vertex as usize)
    }

    /// Vertices referenced as boundary by two or more leaves, by vertex id.
    pub fn constrained_vertices(&self) -> impl Iterator<Item = &ConstrainedVertex> + '_ {
        self.constrained.values()
    }

    /// Records the finished tile of a leaf.
    pub(crate) fn set_tile(&mut self, leaf_id: usize, tile: TileFiles) {
        let handle = self.leaves[leaf_id];
        self.cells[handle.0].tile = Some(tile);
    }
}

/// Reads `count` points from a downsample file.
fn read_samples(path: &Path, count: u64) -> TilingResult<Vec<Point3<f64>>> {
    let mut reader = scratch::open_reader(path)?;
    let mut samples = Vec::with_capacity(count as usize);
    for i in 0..count {
        let point = scratch::read_point(&mut reader).map_err(|e| TilingError::io(path, i * POINT_BYTES, e))?;
        samples.push(point);
    }
    Ok(samples)
}
