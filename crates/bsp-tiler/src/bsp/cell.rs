//! BSP cell storage.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use nalgebra::Point3;

use crate::bounds::BoundingBox;
use crate::plane::{PlaneSide, SplitPlane};
use crate::scratch::CellFiles;

/// Stable handle of a cell inside a [`BinarySpacePartition`](super::BinarySpacePartition).
///
/// Ids are issued in creation order, starting with the root at 0, and never
/// reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId(pub(crate) usize);

impl CellId {
    /// The root cell.
    pub const ROOT: CellId = CellId(0);

    /// Numeric value of the id.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two halves of a split cell and the plane between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Children {
    pub plane: SplitPlane,
    pub lower: CellId,
    pub upper: CellId,
}

impl Children {
    /// The child on `point`'s side of the plane.
    #[inline]
    pub fn select(&self, point: &Point3<f64>) -> CellId {
        match self.plane.classify_point(point) {
            PlaneSide::Lower => self.lower,
            PlaneSide::Upper => self.upper,
        }
    }
}

/// Final files of a materialised leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileFiles {
    pub tile: PathBuf,
    pub local_to_global: PathBuf,
}

/// A node of the partition.
///
/// A cell is a leaf iff it has no children. While the tree is being built
/// `inner_vertex_count` counts downsample points; once the leaf set is
/// stable it is reset and counts full-resolution vertices.
#[derive(Debug, Clone)]
pub struct Cell {
    pub(crate) id: CellId,
    pub(crate) bbox: BoundingBox,
    pub(crate) leaf_id: Option<usize>,
    pub(crate) inner_vertex_count: u64,
    pub(crate) inner_triangle_count: u64,
    pub(crate) parent: Option<CellId>,
    pub(crate) children: Option<Children>,
    pub(crate) neighbors: BTreeSet<usize>,
    pub(crate) files: CellFiles,
    pub(crate) splittable: bool,
    pub(crate) tile: Option<TileFiles>,
}

impl Cell {
    pub(crate) fn new(
        id: CellId,
        bbox: BoundingBox,
        parent: Option<CellId>,
        files: CellFiles,
        inner_vertex_count: u64,
    ) -> Self {
        Self {
            id,
            bbox,
            leaf_id: None,
            inner_vertex_count,
            inner_triangle_count: 0,
            parent,
            children: None,
            neighbors: BTreeSet::new(),
            files,
            splittable: true,
            tile: None,
        }
    }

    #[inline]
    pub fn id(&self) -> CellId {
        self.id
    }

    #[inline]
    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Dense leaf index, assigned once the tree stops splitting.
    #[inline]
    pub fn leaf_id(&self) -> Option<usize> {
        self.leaf_id
    }

    #[inline]
    pub fn inner_vertex_count(&self) -> u64 {
        self.inner_vertex_count
    }

    #[inline]
    pub fn inner_triangle_count(&self) -> u64 {
        self.inner_triangle_count
    }

    #[inline]
    pub fn parent(&self) -> Option<CellId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> Option<&Children> {
        self.children.as_ref()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Leaf ids sharing at least one triangle with this leaf.
    #[inline]
    pub fn neighbors(&self) -> &BTreeSet<usize> {
        &self.neighbors
    }

    /// Scratch files owned by the cell.
    #[inline]
    pub fn files(&self) -> &CellFiles {
        &self.files
    }

    /// Tile and index files, once the leaf has been materialised.
    #[inline]
    pub fn tile(&self) -> Option<&TileFiles> {
        self.tile.as_ref()
    }

    /// `false` if the split policy found no plane separating its samples.
    #[inline]
    pub fn is_splittable(&self) -> bool {
        self.splittable
    }

    /// Exact membership test against the cell's region.
    #[inline]
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        self.bbox.contains(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plane::Axis;
    use std::path::Path;

    #[test]
    fn new_cell_is_leaf() {
        let bbox = BoundingBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let cell = Cell::new(CellId::ROOT, bbox, None, CellFiles::for_cell(Path::new("."), 0), 8);

        assert!(cell.is_leaf());
        assert!(cell.is_splittable());
        assert_eq!(cell.leaf_id(), None);
        assert_eq!(cell.inner_vertex_count(), 8);
        assert!(cell.neighbors().is_empty());
    }

    #[test]
    fn children_select_by_side() {
        let children = Children {
            plane: SplitPlane::new(Axis::X, 0.5),
            lower: CellId(1),
            upper: CellId(2),
        };
        assert_eq!(children.select(&Point3::new(0.1, 9.0, 9.0)), CellId(1));
        assert_eq!(children.select(&Point3::new(0.5, 0.0, 0.0)), CellId(2));
    }
}
