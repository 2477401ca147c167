//! Second pass: distributing the full-resolution stream to the leaves.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use crate::cancel::CancelToken;
use crate::error::{TilingError, TilingResult};
use crate::scratch::{self, CELL_VERTEX_BYTES, POINT_BYTES, TRIANGLE_BYTES};
use crate::util::{Progress, Timed};

use super::boundary::{BoundaryStatus, ConstrainedVertex, classify_triangle};
use super::cell::CellId;
use super::tree::BinarySpacePartition;

/// Totals of a fill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillSummary {
    pub vertices: u64,
    pub triangles: u64,
    /// Boundary vertex records written, duplicates included.
    pub boundary_references: u64,
}

/// Scratch writer opened on first write.
struct LazyWriter {
    out: Option<BufWriter<File>>,
    path: PathBuf,
    offset: u64,
}

impl LazyWriter {
    fn new(path: &Path) -> Self {
        Self {
            out: None,
            path: path.to_path_buf(),
            offset: 0,
        }
    }

    fn write<F>(&mut self, record_bytes: u64, f: F) -> TilingResult<()>
    where
        F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
    {
        let out = match self.out.take() {
            Some(out) => out,
            None => scratch::create_writer(&self.path)?,
        };
        let out = self.out.insert(out);
        f(out).map_err(|e| TilingError::io(&self.path, self.offset, e))?;
        self.offset += record_bytes;
        Ok(())
    }

    fn finish(self) -> TilingResult<()> {
        match self.out {
            Some(out) => scratch::finish_writer(out, &self.path),
            None => Ok(()),
        }
    }
}

/// Per-leaf inner vertex, triangle and boundary writers, by leaf id.
struct LeafWriters {
    vertices: Vec<LazyWriter>,
    triangles: Vec<LazyWriter>,
    boundary: Vec<LazyWriter>,
}

impl LeafWriters {
    fn new(bsp: &BinarySpacePartition) -> Self {
        let files: Vec<_> = bsp.leaves().map(|cell| cell.files()).collect();
        Self {
            vertices: files.iter().map(|f| LazyWriter::new(&f.inner_vertices)).collect(),
            triangles: files.iter().map(|f| LazyWriter::new(&f.inner_triangles)).collect(),
            boundary: files.iter().map(|f| LazyWriter::new(&f.boundary_vertices)).collect(),
        }
    }

    /// Flushes and closes every file opened during the fill.
    fn finish(self) -> TilingResult<()> {
        self.vertices
            .into_iter()
            .chain(self.triangles)
            .chain(self.boundary)
            .try_for_each(LazyWriter::finish)
    }
}

impl BinarySpacePartition {
    /// Streams the flattened binary file into the leaves.
    ///
    /// `binary` holds `file_count` per-file blocks as written by the
    /// scanner. Every vertex goes to the inner vertex file of the leaf
    /// containing it, tagged with its global id. With `with_triangles`
    /// each triangle goes to its owning leaf (see
    /// [`classify_triangle`](super::classify_triangle)), foreign vertices
    /// are logged as boundary vertices of the owner and the leaves become
    /// neighbors.
    ///
    /// All per-leaf files are closed before this returns.
    ///
    /// # Errors
    /// Fails if the stream is truncated, a triangle is degenerate or
    /// references a vertex not read yet, or a scratch file cannot be
    /// written.
    ///
    /// # Panics
    /// Panics if the tree has not been built.
    pub fn fill(
        &mut self,
        binary: &Path,
        file_count: usize,
        with_triangles: bool,
        cancel: &CancelToken,
    ) -> TilingResult<FillSummary> {
        assert!(self.is_built(), "fill requires a built partition");
        let _t = Timed::info("Fill BSP");

        let mut reader = scratch::open_reader(binary)?;
        let mut writers = LeafWriters::new(self);
        let mut summary = FillSummary::default();
        let mut offset = 0u64;
        let mut current = self.leaves[0];

        for file in 0..file_count {
            cancel.check()?;
            let vertex_count = scratch::read_u64(&mut reader).map_err(|e| TilingError::io(binary, offset, e))?;
            let triangle_count =
                scratch::read_u64(&mut reader).map_err(|e| TilingError::io(binary, offset + 8, e))?;
            offset += 16;
            if triangle_count > 0 && !with_triangles {
                return Err(TilingError::malformed(
                    binary,
                    offset,
                    format!("block {file} carries triangles in a point-only run"),
                ));
            }
            log::debug!("Filling block {file}: {vertex_count} vertices, {triangle_count} triangles");

            let progress = Progress::new("Filling vertices", Some(vertex_count));
            for i in 0..vertex_count {
                progress.tick(i);
                let point = scratch::read_point(&mut reader).map_err(|e| TilingError::io(binary, offset, e))?;
                offset += POINT_BYTES;

                // consecutive points tend to share a leaf
                if !self.cells[current.0].contains(&point) {
                    current = self.locate(&point);
                }
                let leaf = self.cells[current.0]
                    .leaf_id
                    .expect("built partition numbers every leaf");
                let id = summary.vertices;
                writers.vertices[leaf].write(CELL_VERTEX_BYTES, |w| scratch::write_cell_vertex(w, id, &point))?;
                self.cells[current.0].inner_vertex_count += 1;

                if with_triangles {
                    self.vertex_leaf.push(leaf);
                    self.vertex_boundary.push(BoundaryStatus::Unclaimed);
                    self.coordinates.push(point);
                }
                summary.vertices += 1;
            }

            for _ in 0..triangle_count {
                let triangle =
                    scratch::read_triangle(&mut reader).map_err(|e| TilingError::io(binary, offset, e))?;
                offset += TRIANGLE_BYTES;
                self.add_triangle(summary.triangles, triangle, summary.vertices, &mut writers, &mut summary)?;
                summary.triangles += 1;
            }
        }

        if scratch::try_read_u64(&mut reader)
            .map_err(|e| TilingError::io(binary, offset, e))?
            .is_some()
        {
            return Err(TilingError::malformed(binary, offset, "trailing data after last block"));
        }
        writers.finish()?;

        debug_assert_eq!(
            self.leaves().map(|c| c.inner_vertex_count).sum::<u64>(),
            summary.vertices
        );
        log::info!(
            "Filled {} leaves: {} vertices, {} triangles, {} boundary references, {} constrained vertices",
            self.leaf_count(),
            summary.vertices,
            summary.triangles,
            summary.boundary_references,
            self.constrained.len()
        );
        Ok(summary)
    }

    fn add_triangle(
        &mut self,
        index: u64,
        triangle: [u64; 3],
        vertices_read: u64,
        writers: &mut LeafWriters,
        summary: &mut FillSummary,
    ) -> TilingResult<()> {
        let [a, b, c] = triangle;
        if a == b || b == c || c == a {
            return Err(TilingError::DegenerateTriangle {
                index,
                vertices: triangle,
            });
        }
        if let Some(&vertex) = triangle.iter().find(|&&v| v >= vertices_read) {
            return Err(TilingError::VertexOutOfRange {
                index,
                vertex,
                count: vertices_read,
            });
        }

        let leaves = triangle.map(|v| self.vertex_leaf[v as usize]);
        let ownership = classify_triangle(triangle, leaves);
        let owner = ownership.owner;
        let owner_cell = self.leaves[owner];

        writers.triangles[owner].write(TRIANGLE_BYTES, |w| scratch::write_triangle(w, triangle))?;
        self.cells[owner_cell.0].inner_triangle_count += 1;

        for (vertex, leaf) in ownership.boundary() {
            writers.boundary[owner].write(8, |w| scratch::write_u64(w, vertex))?;
            summary.boundary_references += 1;
            self.register_boundary(vertex, owner);
            self.connect(owner_cell, self.leaves[leaf]);
        }
        Ok(())
    }

    /// Records that leaf `referencing` copies `vertex` as a boundary vertex.
    fn register_boundary(&mut self, vertex: u64, referencing: usize) {
        let status = &mut self.vertex_boundary[vertex as usize];
        match status.register(referencing) {
            Some(previous) => {
                self.constrained.insert(
                    vertex,
                    ConstrainedVertex {
                        vertex,
                        leaves: BTreeSet::from([previous, referencing]),
                    },
                );
            }
            None if *status == BoundaryStatus::Constrained => {
                if let Some(constrained) = self.constrained.get_mut(&vertex) {
                    constrained.leaves.insert(referencing);
                }
            }
            None => {}
        }
    }

    /// Makes two leaves neighbors of each other.
    fn connect(&mut self, a: CellId, b: CellId) {
        let (leaf_a, leaf_b) = (self.cells[a.0].leaf_id, self.cells[b.0].leaf_id);
        if let (Some(leaf_a), Some(leaf_b)) = (leaf_a, leaf_b) {
            self.cells[a.0].neighbors.insert(leaf_b);
            self.cells[b.0].neighbors.insert(leaf_a);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::BoundingBox;
    use crate::bsp::MedianSplit;
    use crate::plane::Axis;
    use nalgebra::Point3;
    use std::fs;

    /// One block of the flattened stream.
    fn block(points: &[Point3<f64>], triangles: &[[u64; 3]]) -> Vec<u8> {
        let mut buf = Vec::new();
        scratch::write_u64(&mut buf, points.len() as u64).unwrap();
        scratch::write_u64(&mut buf, triangles.len() as u64).unwrap();
        for p in points {
            scratch::write_point(&mut buf, p).unwrap();
        }
        for t in triangles {
            scratch::write_triangle(&mut buf, *t).unwrap();
        }
        buf
    }

    /// Builds a partition from `samples` and writes `stream` as `V_binary`.
    fn setup(
        dir: &Path,
        samples: &[Point3<f64>],
        threshold: u64,
        stream: &[u8],
    ) -> (BinarySpacePartition, PathBuf) {
        let downsample = dir.join(scratch::DOWNSAMPLE_FILE);
        let mut out = scratch::create_writer(&downsample).unwrap();
        let mut bbox = BoundingBox::empty();
        for p in samples {
            scratch::write_point(&mut out, p).unwrap();
            bbox.expand(p);
        }
        scratch::finish_writer(out, &downsample).unwrap();

        let mut bsp = BinarySpacePartition::new(bbox, &downsample, samples.len() as u64, dir);
        bsp.build(threshold, &MedianSplit, &CancelToken::new()).unwrap();

        let binary = dir.join(scratch::BINARY_FILE);
        fs::write(&binary, stream).unwrap();
        (bsp, binary)
    }

    fn read_cell_vertices(path: &Path) -> Vec<(u64, Point3<f64>)> {
        let bytes = fs::read(path).unwrap_or_default();
        let mut cursor = io::Cursor::new(bytes);
        let mut records = Vec::new();
        while (cursor.position() as usize) < cursor.get_ref().len() {
            records.push(scratch::read_cell_vertex(&mut cursor).unwrap());
        }
        records
    }

    fn read_ids(path: &Path) -> Vec<u64> {
        let bytes = fs::read(path).unwrap_or_default();
        bytes
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
            .collect()
    }

    /// Samples giving three leaves split along x at 1.5 and 2.5:
    /// leaf 0 is `x < 1.5`, leaf 1 is `1.5 <= x < 2.5`, leaf 2 is `x >= 2.5`.
    fn three_slabs() -> Vec<Point3<f64>> {
        (0..5).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect()
    }

    #[test]
    fn vertices_go_to_containing_leaf() {
        let dir = tempfile::tempdir().unwrap();
        let points: Vec<_> = (0..20).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let stream = [block(&points[..12], &[]), block(&points[12..], &[])].concat();
        let (mut bsp, binary) = setup(dir.path(), &points, 5, &stream);

        let summary = bsp.fill(&binary, 2, false, &CancelToken::new()).unwrap();
        assert_eq!(summary.vertices, 20);
        assert_eq!(summary.triangles, 0);

        let mut seen = Vec::new();
        for leaf in bsp.leaves() {
            let records = read_cell_vertices(&leaf.files().inner_vertices);
            assert_eq!(records.len() as u64, leaf.inner_vertex_count());
            for (id, p) in records {
                assert!(leaf.contains(&p));
                assert_eq!(p, points[id as usize]);
                seen.push(id);
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
        // no mesh state in point mode
        assert_eq!(bsp.leaf_of_vertex(0), None);
    }

    #[test]
    fn triangle_across_three_leaves() {
        let dir = tempfile::tempdir().unwrap();
        let samples = three_slabs();
        let vertices = [
            Point3::new(0.5, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
        ];
        let (mut bsp, binary) = setup(dir.path(), &samples, 2, &block(&vertices, &[[0, 1, 2]]));
        assert_eq!(bsp.leaf_count(), 3);
        assert_eq!(bsp.leaf_of_point(&vertices[0]), Some(0));
        assert_eq!(bsp.leaf_of_point(&vertices[1]), Some(1));
        assert_eq!(bsp.leaf_of_point(&vertices[2]), Some(2));

        let summary = bsp.fill(&binary, 1, true, &CancelToken::new()).unwrap();
        assert_eq!(summary.triangles, 1);
        assert_eq!(summary.boundary_references, 2);

        let leaves: Vec<_> = (0..3).map(|v| bsp.leaf_of_vertex(v).unwrap()).collect();
        let owner = *leaves.iter().min().unwrap();
        assert_eq!(bsp.leaf(owner).inner_triangle_count(), 1);

        let mut boundary = read_ids(&bsp.leaf(owner).files().boundary_vertices);
        boundary.sort_unstable();
        let expected: Vec<u64> = (0..3).filter(|&v| leaves[v as usize] != owner).collect();
        assert_eq!(boundary, expected);

        for v in expected {
            assert_eq!(bsp.boundary_status(v), Some(BoundaryStatus::ReferencedBy(owner)));
            let other = leaves[v as usize];
            assert!(bsp.neighbors(owner).contains(&other));
            assert!(bsp.neighbors(other).contains(&owner));
        }
        assert_eq!(bsp.constrained_vertices().count(), 0);
    }

    #[test]
    fn vertex_referenced_by_two_leaves_is_constrained() {
        let dir = tempfile::tempdir().unwrap();
        let samples = three_slabs();
        // vertex 0 sits in the middle slab and is borrowed by both outer ones
        let vertices = [
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.2, 0.0, 0.0),
            Point3::new(0.8, 0.0, 0.0),
            Point3::new(3.2, 0.0, 0.0),
            Point3::new(3.8, 0.0, 0.0),
        ];
        let triangles = [[1, 2, 0], [3, 4, 0]];
        let (mut bsp, binary) = setup(dir.path(), &samples, 2, &block(&vertices, &triangles));
        bsp.fill(&binary, 1, true, &CancelToken::new()).unwrap();

        assert_eq!(bsp.boundary_status(0), Some(BoundaryStatus::Constrained));
        let constrained: Vec<_> = bsp.constrained_vertices().collect();
        assert_eq!(constrained.len(), 1);
        assert_eq!(constrained[0].vertex, 0);
        let expected: BTreeSet<_> = [bsp.leaf_of_vertex(1).unwrap(), bsp.leaf_of_vertex(3).unwrap()].into();
        assert_eq!(constrained[0].leaves, expected);

        for leaf in 0..bsp.leaf_count() {
            for &n in bsp.neighbors(leaf) {
                assert!(bsp.neighbors(n).contains(&leaf));
            }
        }
    }

    #[test]
    fn degenerate_triangle_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let samples = three_slabs();
        let vertices = &samples[..3];
        let (mut bsp, binary) = setup(dir.path(), &samples, 2, &block(vertices, &[[0, 1, 1]]));

        let err = bsp.fill(&binary, 1, true, &CancelToken::new()).unwrap_err();
        assert!(matches!(
            err,
            TilingError::DegenerateTriangle {
                index: 0,
                vertices: [0, 1, 1]
            }
        ));
    }

    #[test]
    fn out_of_range_vertex_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let samples = three_slabs();
        let (mut bsp, binary) = setup(dir.path(), &samples, 2, &block(&samples[..3], &[[0, 1, 7]]));

        let err = bsp.fill(&binary, 1, true, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, TilingError::VertexOutOfRange { vertex: 7, count: 3, .. }));
    }

    #[test]
    fn truncated_stream_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let samples = three_slabs();
        let mut stream = block(&samples, &[]);
        stream.truncate(stream.len() - 4);
        let (mut bsp, binary) = setup(dir.path(), &samples, 2, &stream);

        let err = bsp.fill(&binary, 1, false, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, TilingError::Malformed { .. }));
    }

    #[test]
    fn split_plane_points_go_upper() {
        let dir = tempfile::tempdir().unwrap();
        let samples = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)];
        let on_plane = [Point3::new(1.0, 0.0, 0.0)];
        let (mut bsp, binary) = setup(dir.path(), &samples, 1, &block(&on_plane, &[]));
        let plane = bsp.root().children().unwrap().plane;
        assert_eq!(plane.axis(), Axis::X);

        bsp.fill(&binary, 1, false, &CancelToken::new()).unwrap();
        let upper = bsp.root().children().unwrap().upper;
        assert_eq!(bsp.cell(upper).inner_vertex_count(), 1);
    }
}
