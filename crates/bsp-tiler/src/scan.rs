//! First pass: bounding box, downsample and flattened binary stream.
//!
//! Every input file is read exactly once. Each vertex is appended to the
//! flattened stream and folded into the global bounding box; a jittered
//! stride sample of the vertices goes to the downsample file. Triangles are
//! rewritten with global vertex ids.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use nalgebra::Point3;
use rand::Rng;

use crate::bounds::BoundingBox;
use crate::cancel::CancelToken;
use crate::error::{TilingError, TilingResult};
use crate::sample::StridedSampler;
use crate::scratch::{self, BINARY_FILE, DOWNSAMPLE_FILE, POINT_BYTES, TRIANGLE_BYTES};
use crate::source::{InputFormat, SourceIndex, SourceVisitor};
use crate::util::{Progress, Timed};

/// Result of scanning the inputs.
#[derive(Debug, Clone)]
pub struct ScanSummary {
    /// Format shared by all inputs.
    pub format: InputFormat,
    /// Bounding box of every vertex read.
    pub bbox: BoundingBox,
    /// Total vertices across all files.
    pub vertex_count: u64,
    /// Total triangles across all files.
    pub triangle_count: u64,
    /// Vertices written to the downsample file.
    pub sample_count: u64,
    /// Cumulative vertex count per input file.
    pub source_index: SourceIndex,
    /// Downsample file (`x y z` triples).
    pub downsample_path: PathBuf,
    /// Flattened full-resolution stream.
    pub binary_path: PathBuf,
}

impl ScanSummary {
    /// Returns `true` if any input carried triangles.
    pub fn has_triangles(&self) -> bool {
        self.triangle_count > 0
    }
}

/// Visitor writing one input file into the scratch streams.
struct ScanSink<'a, R> {
    input: &'a Path,
    binary: &'a mut BufWriter<File>,
    binary_path: &'a Path,
    binary_offset: u64,
    downsample: &'a mut BufWriter<File>,
    downsample_path: &'a Path,
    sampler: &'a mut StridedSampler<R>,
    bbox: &'a mut BoundingBox,
    /// Global id of this file's first vertex.
    first_vertex: u64,
    vertices: u64,
    triangles: u64,
    samples: u64,
    progress: Progress,
}

impl<R: Rng> SourceVisitor for ScanSink<'_, R> {
    fn visit_vertex(&mut self, point: Point3<f64>) -> TilingResult<()> {
        self.progress.tick(self.vertices);
        if !point.iter().all(|c| c.is_finite()) {
            return Err(TilingError::malformed(
                self.input,
                self.vertices,
                format!("vertex {} has non-finite coordinates {:?}", self.vertices, point),
            ));
        }

        scratch::write_point(self.binary, &point)
            .map_err(|e| TilingError::io(self.binary_path, self.binary_offset, e))?;
        self.binary_offset += POINT_BYTES;

        self.bbox.expand(&point);

        if self.sampler.accept(self.vertices) {
            scratch::write_point(self.downsample, &point)
                .map_err(|e| TilingError::io(self.downsample_path, self.samples * POINT_BYTES, e))?;
            self.samples += 1;
        }

        self.vertices += 1;
        Ok(())
    }

    fn visit_triangle(&mut self, triangle: [u64; 3]) -> TilingResult<()> {
        let global = triangle.map(|v| v + self.first_vertex);
        scratch::write_triangle(self.binary, global)
            .map_err(|e| TilingError::io(self.binary_path, self.binary_offset, e))?;
        self.binary_offset += TRIANGLE_BYTES;
        self.triangles += 1;
        Ok(())
    }
}

/// Scans `inputs` into `scratch_dir`.
///
/// Produces `V_downsample` and `V_binary` in the scratch directory. The
/// sampler is reset at the start of every file.
///
/// # Errors
/// Fails on unreadable or malformed inputs, on mixed input formats and if
/// the scratch files cannot be written. Fails with
/// [`TilingError::NoVertices`] if the inputs are empty.
pub fn scan_inputs<R: Rng>(
    inputs: &[PathBuf],
    scratch_dir: &Path,
    sampler: &mut StridedSampler<R>,
    cancel: &CancelToken,
) -> TilingResult<ScanSummary> {
    let _t = Timed::info("Scan");
    let format = InputFormat::detect(inputs)?;

    let downsample_path = scratch_dir.join(DOWNSAMPLE_FILE);
    let binary_path = scratch_dir.join(BINARY_FILE);

    log::info!("Opening sample file {}", downsample_path.display());
    let mut downsample = scratch::create_writer(&downsample_path)?;
    log::info!("Opening binary file {}", binary_path.display());
    let mut binary = scratch::create_writer(&binary_path)?;

    let mut bbox = BoundingBox::empty();
    let mut source_index = SourceIndex::default();
    let mut binary_offset = 0u64;
    let mut triangle_count = 0u64;
    let mut sample_count = 0u64;

    for input in inputs {
        cancel.check()?;
        log::info!("Reading {}", input.display());

        // Placeholder header, patched once the counts are known.
        let header_offset = binary_offset;
        write_header(&mut binary, &binary_path, header_offset, 0, 0)?;
        binary_offset += 16;

        sampler.reset();
        let mut sink = ScanSink {
            input,
            binary: &mut binary,
            binary_path: &binary_path,
            binary_offset,
            downsample: &mut downsample,
            downsample_path: &downsample_path,
            sampler: &mut *sampler,
            bbox: &mut bbox,
            first_vertex: source_index.total(),
            vertices: 0,
            triangles: 0,
            samples: sample_count,
            progress: Progress::new("Reading vertices", None),
        };
        let counts = format.read(input, &mut sink)?;
        binary_offset = sink.binary_offset;
        sample_count = sink.samples;
        debug_assert_eq!(counts.vertices, sink.vertices);
        debug_assert_eq!(counts.triangles, sink.triangles);

        binary
            .seek(SeekFrom::Start(header_offset))
            .map_err(|e| TilingError::io(&binary_path, header_offset, e))?;
        write_header(&mut binary, &binary_path, header_offset, counts.vertices, counts.triangles)?;
        binary
            .seek(SeekFrom::End(0))
            .map_err(|e| TilingError::io(&binary_path, binary_offset, e))?;

        log::info!(
            "{}: {} vertices, {} triangles",
            input.display(),
            counts.vertices,
            counts.triangles
        );
        source_index.push_file(counts.vertices);
        triangle_count += counts.triangles;
    }

    scratch::finish_writer(downsample, &downsample_path)?;
    scratch::finish_writer(binary, &binary_path)?;

    let vertex_count = source_index.total();
    if vertex_count == 0 {
        return Err(TilingError::NoVertices);
    }

    log::info!(
        "Scanned {} files: {} vertices, {} triangles, {} sampled, bbox {:?} - {:?}",
        inputs.len(),
        vertex_count,
        triangle_count,
        sample_count,
        bbox.min,
        bbox.max
    );

    Ok(ScanSummary {
        format,
        bbox,
        vertex_count,
        triangle_count,
        sample_count,
        source_index,
        downsample_path,
        binary_path,
    })
}

fn write_header(
    binary: &mut BufWriter<File>,
    path: &Path,
    offset: u64,
    vertices: u64,
    triangles: u64,
) -> TilingResult<()> {
    scratch::write_u64(binary, vertices)
        .and_then(|()| scratch::write_u64(binary, triangles))
        .map_err(|e| TilingError::io(path, offset, e))
}
