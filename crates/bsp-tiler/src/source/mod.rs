//! Streaming readers for the supported input formats.
//!
//! Readers push records into a [`SourceVisitor`] one at a time, so no input
//! file is ever held in memory. Vertices always come before triangles, and
//! triangle indices are local to the file being read.

mod las_file;
mod off;
mod xyz;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use nalgebra::Point3;

use crate::error::{TilingError, TilingResult};

pub use las_file::SourceIndex;

/// Opens input file `path` for buffered reading.
fn open_input(path: &Path) -> TilingResult<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| TilingError::input(path, 0, e))
}

/// Receives the records of one input file in stream order.
pub trait SourceVisitor {
    /// Called once per vertex, in file order.
    fn visit_vertex(&mut self, point: Point3<f64>) -> TilingResult<()>;

    /// Called once per triangle after all vertices, with file-local indices.
    fn visit_triangle(&mut self, triangle: [u64; 3]) -> TilingResult<()>;
}

/// Number of records a reader delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceCounts {
    pub vertices: u64,
    pub triangles: u64,
}

/// Recognised input file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// ASCII `x y z` per line.
    Xyz,
    /// ASPRS LAS point cloud.
    Las,
    /// ASCII Object File Format triangle mesh.
    Off,
}

impl InputFormat {
    /// Detects the format from a file extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "xyz" => Some(Self::Xyz),
            "las" => Some(Self::Las),
            "off" => Some(Self::Off),
            _ => None,
        }
    }

    /// Detects the format from a file path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Detects the common format of a list of inputs.
    ///
    /// # Errors
    /// Fails if the list is empty, if the first file has an unknown
    /// extension, or if any file differs from the first.
    pub fn detect(paths: &[PathBuf]) -> TilingResult<Self> {
        let first = paths.first().ok_or(TilingError::NoInput)?;
        let format = Self::from_path(first).ok_or_else(|| TilingError::UnsupportedInput {
            path: first.clone(),
        })?;

        if let Some(other) = paths.iter().find(|p| Self::from_path(p) != Some(format)) {
            return Err(TilingError::MixedInputs {
                first: first.clone(),
                path: other.clone(),
            });
        }

        Ok(format)
    }

    /// Returns `true` if files of this format may carry triangles.
    pub fn has_triangles(self) -> bool {
        matches!(self, Self::Off)
    }

    /// Streams one file into `visitor`.
    pub fn read<V: SourceVisitor>(self, path: &Path, visitor: &mut V) -> TilingResult<SourceCounts> {
        match self {
            Self::Xyz => xyz::read_xyz(path, visitor),
            Self::Las => las_file::read_las(path, visitor),
            Self::Off => off::read_off(path, visitor),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Visitor that keeps everything it is given.
    #[derive(Debug, Default)]
    pub(crate) struct Collect {
        pub vertices: Vec<Point3<f64>>,
        pub triangles: Vec<[u64; 3]>,
    }

    impl SourceVisitor for Collect {
        fn visit_vertex(&mut self, point: Point3<f64>) -> TilingResult<()> {
            self.vertices.push(point);
            Ok(())
        }

        fn visit_triangle(&mut self, triangle: [u64; 3]) -> TilingResult<()> {
            self.triangles.push(triangle);
            Ok(())
        }
    }

    #[test]
    fn extension_detection() {
        assert_eq!(InputFormat::from_extension("XYZ"), Some(InputFormat::Xyz));
        assert_eq!(InputFormat::from_extension("las"), Some(InputFormat::Las));
        assert_eq!(InputFormat::from_extension("off"), Some(InputFormat::Off));
        assert_eq!(InputFormat::from_extension("ply"), None);
        assert_eq!(
            InputFormat::from_path(Path::new("/data/scan.las")),
            Some(InputFormat::Las)
        );
    }

    #[test]
    fn detect_rejects_mixed_inputs() {
        let paths = vec![PathBuf::from("a.xyz"), PathBuf::from("b.las")];
        let err = InputFormat::detect(&paths).unwrap_err();
        assert!(matches!(err, TilingError::MixedInputs { .. }));
    }

    #[test]
    fn detect_rejects_unknown_and_empty() {
        assert!(matches!(
            InputFormat::detect(&[PathBuf::from("a.ply")]),
            Err(TilingError::UnsupportedInput { .. })
        ));
        assert!(matches!(InputFormat::detect(&[]), Err(TilingError::NoInput)));
    }

    #[test]
    fn detect_accepts_uniform_inputs() {
        let paths = vec![PathBuf::from("a.off"), PathBuf::from("b.OFF")];
        assert_eq!(InputFormat::detect(&paths).unwrap(), InputFormat::Off);
        assert!(InputFormat::Off.has_triangles());
        assert!(!InputFormat::Las.has_triangles());
    }
}
