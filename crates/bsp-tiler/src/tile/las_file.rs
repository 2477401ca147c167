//! LAS tiles.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use nalgebra::Point3;

use super::TileWriter;
use crate::error::{TilingError, TilingResult};
use crate::source::SourceIndex;

/// Fetches full LAS points from the input files by global vertex id.
///
/// Keeps the last used file open and only seeks when ids are not
/// consecutive, so streaming a leaf's vertices in id order reads each
/// input sequentially.
pub struct LasSources {
    inputs: Vec<PathBuf>,
    index: SourceIndex,
    /// Open input: file number, next point within it, reader.
    current: Option<(usize, u64, las::Reader)>,
}

impl LasSources {
    /// `inputs` must be the scanned LAS files, in scan order, and `index`
    /// their cumulative vertex counts.
    pub fn new(inputs: Vec<PathBuf>, index: SourceIndex) -> Self {
        debug_assert_eq!(inputs.len(), index.file_count());
        Self {
            inputs,
            index,
            current: None,
        }
    }

    /// The input point with global id `id`.
    ///
    /// # Panics
    /// Panics if `id` is past the last scanned vertex.
    pub fn point(&mut self, id: u64) -> TilingResult<las::Point> {
        let (file, local) = self
            .index
            .locate(id)
            .unwrap_or_else(|| panic!("vertex {id} is past the last input ({} vertices)", self.index.total()));
        let path = &self.inputs[file];

        let (mut reader, next) = match self.current.take() {
            Some((open, next, reader)) if open == file => (reader, next),
            _ => {
                log::trace!("Re-reading {}", path.display());
                (las::Reader::from_path(path).map_err(|e| TilingError::las(path, e))?, 0)
            }
        };
        if next != local {
            reader.seek(local).map_err(|e| TilingError::las(path, e))?;
        }

        let point = reader
            .read_point()
            .map_err(|e| TilingError::las(path, e))?
            .ok_or_else(|| TilingError::malformed(path, local, "point vanished since the scan"))?;
        self.current = Some((file, local + 1, reader));
        Ok(point)
    }
}

/// Header and point source shared by all LAS tiles of a run.
pub struct LasOutput {
    header: las::Header,
    sources: Option<LasSources>,
}

impl LasOutput {
    /// Tiles with the given header, built from cached coordinates.
    pub fn new(header: las::Header) -> Self {
        Self { header, sources: None }
    }

    /// Tiles with the header of an existing LAS file.
    pub fn from_file(path: &Path) -> TilingResult<Self> {
        let reader = las::Reader::from_path(path).map_err(|e| TilingError::las(path, e))?;
        Ok(Self::new(reader.header().clone()))
    }

    /// Copies every point from the inputs instead of rebuilding it from
    /// its coordinates, keeping all point attributes.
    pub fn with_sources(mut self, sources: LasSources) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Returns `true` if points are re-read from the inputs.
    pub fn rereads_inputs(&self) -> bool {
        self.sources.is_some()
    }

    pub fn header(&self) -> &las::Header {
        &self.header
    }

    fn point(&mut self, id: u64, point: &Point3<f64>) -> TilingResult<las::Point> {
        match &mut self.sources {
            Some(sources) => sources.point(id),
            None => Ok(blank_point(self.header.point_format(), point)),
        }
    }
}

impl Default for LasOutput {
    fn default() -> Self {
        Self::new(las::Header::default())
    }
}

/// A point with only coordinates set, and every attribute the format
/// requires zeroed.
fn blank_point(format: &las::point::Format, point: &Point3<f64>) -> las::Point {
    las::Point {
        x: point.x,
        y: point.y,
        z: point.z,
        gps_time: format.has_gps_time.then_some(0.0),
        color: format.has_color.then(|| las::Color::new(0, 0, 0)),
        nir: format.has_nir.then_some(0),
        extra_bytes: vec![0; usize::from(format.extra_bytes)],
        ..Default::default()
    }
}

pub(super) struct LasTile<'a> {
    writer: las::Writer<BufWriter<File>>,
    path: PathBuf,
    output: &'a mut LasOutput,
}

impl<'a> LasTile<'a> {
    pub(super) fn create(path: &Path, output: &'a mut LasOutput) -> TilingResult<Self> {
        let writer = las::Writer::from_path(path, output.header.clone()).map_err(|e| TilingError::las_write(path, e))?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            output,
        })
    }
}

impl TileWriter for LasTile<'_> {
    fn write_vertex(&mut self, id: u64, point: &Point3<f64>) -> TilingResult<()> {
        let point = self.output.point(id, point)?;
        self.writer
            .write_point(point)
            .map_err(|e| TilingError::las_write(&self.path, e))
    }

    fn finish(mut self: Box<Self>) -> TilingResult<()> {
        self.writer.close().map_err(|e| TilingError::las_write(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_input(path: &Path, points: &[(f64, u16)]) {
        let mut writer = las::Writer::from_path(path, las::Header::default()).unwrap();
        for &(x, intensity) in points {
            writer
                .write_point(las::Point {
                    x,
                    y: 0.0,
                    z: 0.0,
                    intensity,
                    ..Default::default()
                })
                .unwrap();
        }
        writer.close().unwrap();
    }

    #[test]
    fn sources_follow_global_ids() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.las");
        let b = dir.path().join("b.las");
        write_input(&a, &[(1.0, 10), (2.0, 20)]);
        write_input(&b, &[(3.0, 30)]);

        let mut index = SourceIndex::default();
        index.push_file(2);
        index.push_file(1);
        let mut sources = LasSources::new(vec![a, b], index);

        // out of order, across files
        assert_eq!(sources.point(2).unwrap().intensity, 30);
        assert_eq!(sources.point(0).unwrap().intensity, 10);
        assert_eq!(sources.point(1).unwrap().intensity, 20);
        assert_eq!(sources.point(1).unwrap().x, 2.0);
    }

    #[test]
    fn unwritable_tile_is_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut output = LasOutput::default();
        let path = dir.path().join("missing").join("cell_0.las");

        let err = LasTile::create(&path, &mut output).err().unwrap();
        assert!(matches!(err, TilingError::LasWrite { .. }));
        assert_eq!(err.category(), crate::ErrorCategory::Resource);
    }

    #[test]
    fn blank_point_matches_format() {
        let mut format = las::point::Format::new(3).unwrap();
        format.extra_bytes = 2;
        let point = blank_point(&format, &Point3::new(1.0, 2.0, 3.0));

        assert_eq!(point.gps_time, Some(0.0));
        assert!(point.color.is_some());
        assert_eq!(point.extra_bytes.len(), 2);
        assert_eq!((point.x, point.y, point.z), (1.0, 2.0, 3.0));
    }
}
