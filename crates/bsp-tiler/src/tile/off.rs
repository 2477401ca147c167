//! OFF mesh tiles with tile-local triangle indices.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use nalgebra::Point3;

use super::TileWriter;
use super::xyz::format_point;
use crate::error::{TilingError, TilingResult};
use crate::scratch;

pub(super) struct OffTile {
    out: BufWriter<File>,
    path: PathBuf,
    line: u64,
}

impl OffTile {
    /// Creates the tile and writes its header; the counts must match
    /// what is written afterwards.
    pub(super) fn create(path: &Path, vertices: u64, triangles: u64) -> TilingResult<Self> {
        let mut out = scratch::create_writer(path)?;
        write!(out, "OFF\n{vertices} {triangles} 0\n").map_err(|e| TilingError::io(path, 1, e))?;
        Ok(Self {
            out,
            path: path.to_path_buf(),
            line: 2,
        })
    }
}

impl TileWriter for OffTile {
    fn write_vertex(&mut self, _id: u64, point: &Point3<f64>) -> TilingResult<()> {
        self.line += 1;
        writeln!(self.out, "{}", format_point(point)).map_err(|e| TilingError::io(&self.path, self.line, e))
    }

    fn write_triangle(&mut self, [a, b, c]: [u64; 3]) -> TilingResult<()> {
        self.line += 1;
        writeln!(self.out, "3 {a} {b} {c}").map_err(|e| TilingError::io(&self.path, self.line, e))
    }

    fn finish(self: Box<Self>) -> TilingResult<()> {
        scratch::finish_writer(self.out, &self.path)
    }
}
