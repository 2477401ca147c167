//! Binary scratch records and scratch file naming.
//!
//! Every record is little-endian:
//!
//! - downsample file: `x y z` as `f64` triples, no header
//! - flattened stream: per source file a `(vertex_count, triangle_count)` pair of
//!   `u64`, then the vertex triples, then `u64` global vertex id triples
//! - cell vertex file: `(global_id: u64, x, y, z: f64)` records
//! - cell triangle file: `u64` global vertex id triples
//! - cell boundary file: `u64` global vertex ids

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use nalgebra::Point3;

use crate::error::{TilingError, TilingResult};

/// Size in bytes of a point record.
pub const POINT_BYTES: u64 = 24;

/// Size in bytes of an id-tagged cell vertex record.
pub const CELL_VERTEX_BYTES: u64 = 32;

/// Size in bytes of a triangle record.
pub const TRIANGLE_BYTES: u64 = 24;

/// Name of the downsample file in the scratch directory.
pub const DOWNSAMPLE_FILE: &str = "V_downsample";

/// Name of the flattened full-resolution stream in the scratch directory.
pub const BINARY_FILE: &str = "V_binary";

#[inline]
pub fn write_u64<W: Write>(w: &mut W, value: u64) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

#[inline]
pub fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Reads a `u64`, returning `None` on a clean end of file.
pub fn try_read_u64<R: Read>(r: &mut R) -> io::Result<Option<u64>> {
    let mut buf = [0u8; 8];
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(Some(u64::from_le_bytes(buf)))
}

#[inline]
pub fn write_f64<W: Write>(w: &mut W, value: f64) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

#[inline]
pub fn read_f64<R: Read>(r: &mut R) -> io::Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

pub fn write_point<W: Write>(w: &mut W, point: &Point3<f64>) -> io::Result<()> {
    write_f64(w, point.x)?;
    write_f64(w, point.y)?;
    write_f64(w, point.z)
}

pub fn read_point<R: Read>(r: &mut R) -> io::Result<Point3<f64>> {
    let x = read_f64(r)?;
    let y = read_f64(r)?;
    let z = read_f64(r)?;
    Ok(Point3::new(x, y, z))
}

pub fn write_cell_vertex<W: Write>(w: &mut W, id: u64, point: &Point3<f64>) -> io::Result<()> {
    write_u64(w, id)?;
    write_point(w, point)
}

pub fn read_cell_vertex<R: Read>(r: &mut R) -> io::Result<(u64, Point3<f64>)> {
    let id = read_u64(r)?;
    let point = read_point(r)?;
    Ok((id, point))
}

pub fn write_triangle<W: Write>(w: &mut W, triangle: [u64; 3]) -> io::Result<()> {
    triangle.iter().try_for_each(|&v| write_u64(w, v))
}

pub fn read_triangle<R: Read>(r: &mut R) -> io::Result<[u64; 3]> {
    Ok([read_u64(r)?, read_u64(r)?, read_u64(r)?])
}

/// Opens `path` for buffered reading.
pub fn open_reader(path: &Path) -> TilingResult<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| TilingError::open(path, e))
}

/// Creates (or truncates) `path` for buffered writing.
pub fn create_writer(path: &Path) -> TilingResult<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| TilingError::create(path, e))
}

/// Flushes and closes a writer. Dropping a `BufWriter` swallows flush errors.
pub fn finish_writer(writer: BufWriter<File>, path: &Path) -> TilingResult<()> {
    writer
        .into_inner()
        .map(drop)
        .map_err(|e| TilingError::io(path, 0, e.into_error()))
}

/// Deletes a scratch file. A file that was never created is not an error.
pub fn remove_scratch(path: &Path) -> TilingResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TilingError::io(path, 0, e)),
    }
}

/// Scratch paths owned by one BSP cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFiles {
    /// Downsample points during construction, then `(id, x, y, z)` records.
    pub inner_vertices: PathBuf,
    /// Owned triangles.
    pub inner_triangles: PathBuf,
    /// Ids of vertices owned elsewhere but referenced by owned triangles.
    pub boundary_vertices: PathBuf,
}

impl CellFiles {
    /// Scratch paths for the cell with the given id.
    pub fn for_cell(dir: &Path, id: usize) -> Self {
        Self {
            inner_vertices: dir.join(format!("V_cell_{id}")),
            inner_triangles: dir.join(format!("T_cell_{id}")),
            boundary_vertices: dir.join(format!("BV_cell_{id}")),
        }
    }

    /// Deletes all three files, ignoring ones that do not exist.
    pub fn remove_all(&self) -> TilingResult<()> {
        remove_scratch(&self.inner_vertices)?;
        remove_scratch(&self.inner_triangles)?;
        remove_scratch(&self.boundary_vertices)
    }
}
