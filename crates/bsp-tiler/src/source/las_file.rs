//! LAS point reader and global-id to source-file lookup.

use std::path::Path;

use nalgebra::Point3;

use super::{SourceCounts, SourceVisitor};
use crate::error::{TilingError, TilingResult};

/// Streams every point of a LAS file.
pub(super) fn read_las<V: SourceVisitor>(path: &Path, visitor: &mut V) -> TilingResult<SourceCounts> {
    let mut reader = las::Reader::from_path(path).map_err(|e| TilingError::las(path, e))?;
    let expected = reader.header().number_of_points();
    log::debug!("{}: {} points in header", path.display(), expected);

    let mut counts = SourceCounts::default();
    for point in reader.points() {
        let point = point.map_err(|e| TilingError::las(path, e))?;
        visitor.visit_vertex(Point3::new(point.x, point.y, point.z))?;
        counts.vertices += 1;
    }

    if counts.vertices != expected {
        return Err(TilingError::malformed(
            path,
            counts.vertices,
            format!("header declares {expected} points, read {}", counts.vertices),
        ));
    }

    Ok(counts)
}

/// Maps a global vertex id back to the input file it was read from.
///
/// Built from the cumulative vertex count of each file, in scan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceIndex {
    cumulative: Vec<u64>,
}

impl SourceIndex {
    /// Appends the next file with `vertices` vertices.
    pub fn push_file(&mut self, vertices: u64) {
        let total = self.total();
        self.cumulative.push(total + vertices);
    }

    /// Total number of vertices across all files.
    pub fn total(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// Number of files.
    pub fn file_count(&self) -> usize {
        self.cumulative.len()
    }

    /// Global id of the last vertex of `file`, or `None` if the file is
    /// empty.
    pub fn last_vertex(&self, file: usize) -> Option<u64> {
        let end = *self.cumulative.get(file)?;
        let start = self.first_vertex(file);
        (end > start).then(|| end - 1)
    }

    /// Global id of the first vertex of `file`.
    pub fn first_vertex(&self, file: usize) -> u64 {
        if file == 0 { 0 } else { self.cumulative[file - 1] }
    }

    /// Returns `(file, index within file)` for a global vertex id.
    pub fn locate(&self, id: u64) -> Option<(usize, u64)> {
        let file = self.cumulative.partition_point(|&end| end <= id);
        (file < self.cumulative.len()).then(|| (file, id - self.first_vertex(file)))
    }
}
