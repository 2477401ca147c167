//! Error types for the tiling pipeline.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for tiling operations.
pub type TilingResult<T> = Result<T, TilingError>;

/// Broad class of a [`TilingError`], used to pick a process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Unreadable or malformed input, unsupported format, degenerate triangle.
    Input,
    /// Scratch or output file cannot be opened, written or deleted.
    Resource,
    /// The run was stopped through its [`CancelToken`](crate::CancelToken).
    Cancelled,
}

impl ErrorCategory {
    /// Distinguishing non-zero exit status for this category.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Input => 2,
            Self::Resource => 3,
            Self::Cancelled => 4,
        }
    }
}

/// Pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Bounding box, downsample and flattened stream.
    Scan,
    /// Partition construction from the downsample.
    Build,
    /// Distribution of the full stream to the leaves.
    Fill,
    /// Tile and index writing.
    Materialize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scan => "scan",
            Self::Build => "build",
            Self::Fill => "fill",
            Self::Materialize => "materialize",
        })
    }
}

/// Errors that can occur while tiling a dataset.
#[derive(Debug, Error)]
pub enum TilingError {
    /// A scratch file could not be opened for reading.
    #[error("cannot open {}: {source}", path.display())]
    Open {
        /// File that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A scratch or output file could not be created.
    #[error("cannot create {}: {source}", path.display())]
    Create {
        /// File that failed to be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A read or write on an already open file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An input file could not be opened or read.
    #[error("cannot read input {}: {source}", path.display())]
    Unreadable {
        /// Input file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The input file extension is not one of `xyz`, `las`, `off`.
    #[error("unsupported input format: {}", path.display())]
    UnsupportedInput {
        /// Offending input file.
        path: PathBuf,
    },

    /// Input files do not all share the same extension.
    #[error("mixed input formats: {} does not match {}", path.display(), first.display())]
    MixedInputs {
        /// First input file, which fixes the format.
        first: PathBuf,
        /// Input file with a different format.
        path: PathBuf,
    },

    /// The requested output format is not one of `xyz`, `las`, `off`.
    #[error("unsupported output format: {format}")]
    UnsupportedOutput {
        /// Requested format name.
        format: String,
    },

    /// An input or scratch file does not have the expected layout.
    #[error("malformed {} at {position}: {message}", path.display())]
    Malformed {
        /// File being parsed.
        path: PathBuf,
        /// Line number for text files, byte offset for binary files, vertex
        /// index within the file for bad coordinates.
        position: u64,
        /// What was wrong.
        message: String,
    },

    /// A triangle references the same vertex more than once.
    #[error("degenerate triangle {index}: vertices {vertices:?}")]
    DegenerateTriangle {
        /// Global triangle index.
        index: u64,
        /// The three global vertex ids.
        vertices: [u64; 3],
    },

    /// A triangle references a vertex id past the end of the dataset.
    #[error("triangle {index} references vertex {vertex}, but only {count} vertices exist")]
    VertexOutOfRange {
        /// Global triangle index.
        index: u64,
        /// Offending vertex id.
        vertex: u64,
        /// Number of vertices read so far.
        count: u64,
    },

    /// The LAS reader reported an error on an input file.
    #[error("LAS error on {}: {source}", path.display())]
    Las {
        /// Input file being read.
        path: PathBuf,
        /// Underlying LAS error.
        #[source]
        source: las::Error,
    },

    /// The LAS writer reported an error on a tile.
    #[error("cannot write LAS tile {}: {source}", path.display())]
    LasWrite {
        /// Tile being written.
        path: PathBuf,
        /// Underlying LAS error.
        #[source]
        source: las::Error,
    },

    /// No input files were given.
    #[error("no input files")]
    NoInput,

    /// The input files contain no vertices at all.
    #[error("input files contain no vertices")]
    NoVertices,

    /// A configuration value is out of range.
    #[error("invalid parameter: {reason}")]
    InvalidParameter {
        /// Why the parameter is invalid.
        reason: String,
    },

    /// The run was cancelled.
    #[error("tiling cancelled")]
    Cancelled,

    /// An error raised in a pipeline stage.
    #[error("{stage} stage failed")]
    Staged {
        /// Stage that failed.
        stage: Stage,
        /// The error itself.
        #[source]
        source: Box<TilingError>,
    },
}

impl TilingError {
    pub(crate) fn open(path: &Path, source: io::Error) -> Self {
        Self::Open {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn create(path: &Path, source: io::Error) -> Self {
        Self::Create {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Wraps an I/O error raised while streaming `path`.
    ///
    /// A premature end of file means the stream is shorter than its header
    /// claims, which is reported as malformed input at `position`.
    pub(crate) fn io(path: &Path, position: u64, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::UnexpectedEof {
            Self::Malformed {
                path: path.to_path_buf(),
                position,
                message: "unexpected end of file".to_string(),
            }
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// Wraps an I/O error raised while reading input file `path`.
    ///
    /// Truncated or undecodable content is malformed input; anything else
    /// means the file is unreadable.
    pub(crate) fn input(path: &Path, position: u64, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::UnexpectedEof => Self::malformed(path, position, "unexpected end of file"),
            io::ErrorKind::InvalidData => Self::malformed(path, position, source.to_string()),
            _ => Self::Unreadable {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    pub(crate) fn malformed(path: &Path, position: u64, message: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.to_path_buf(),
            position,
            message: message.into(),
        }
    }

    pub(crate) fn las(path: &Path, source: las::Error) -> Self {
        Self::Las {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn las_write(path: &Path, source: las::Error) -> Self {
        Self::LasWrite {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Tags the error with the stage it was raised in. Already tagged
    /// errors keep their stage.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            Self::Staged { .. } => self,
            other => Self::Staged {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage the error was raised in, if known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Staged { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The error without its stage tag.
    pub fn unstaged(&self) -> &TilingError {
        match self {
            Self::Staged { source, .. } => source,
            other => other,
        }
    }

    /// Returns the category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Open { .. } | Self::Create { .. } | Self::Io { .. } | Self::LasWrite { .. } => {
                ErrorCategory::Resource
            }
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Staged { source, .. } => source.category(),
            _ => ErrorCategory::Input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_eof_is_malformed_input() {
        let err = TilingError::io(
            Path::new("V_binary"),
            48,
            io::Error::new(io::ErrorKind::UnexpectedEof, "eof"),
        );
        assert!(matches!(err, TilingError::Malformed { position: 48, .. }));
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(format!("{err}"), "malformed V_binary at 48: unexpected end of file");
    }

    #[test]
    fn other_io_errors_are_resource_errors() {
        let err = TilingError::io(
            Path::new("V_cell_3"),
            0,
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.category(), ErrorCategory::Resource);
        assert_eq!(err.category().exit_code(), 3);
    }

    #[test]
    fn categories_have_distinct_exit_codes() {
        let codes = [
            ErrorCategory::Input.exit_code(),
            ErrorCategory::Resource.exit_code(),
            ErrorCategory::Cancelled.exit_code(),
        ];
        assert!(codes.iter().all(|&c| c != 0));
        assert_ne!(codes[0], codes[1]);
        assert_ne!(codes[1], codes[2]);
        assert_ne!(codes[0], codes[2]);
    }

    #[test]
    fn unreadable_input_is_input_error() {
        let missing = TilingError::input(
            Path::new("gone.xyz"),
            0,
            io::Error::new(io::ErrorKind::NotFound, "not found"),
        );
        assert!(matches!(missing, TilingError::Unreadable { .. }));
        assert_eq!(missing.category(), ErrorCategory::Input);

        let garbled = TilingError::input(
            Path::new("a.xyz"),
            3,
            io::Error::new(io::ErrorKind::InvalidData, "stream did not contain valid UTF-8"),
        );
        assert!(matches!(garbled, TilingError::Malformed { position: 3, .. }));
    }

    #[test]
    fn tile_write_failure_is_resource_error() {
        let err = TilingError::las_write(Path::new("cell_0.las"), las::Error::ClosedWriter);
        assert_eq!(err.category(), ErrorCategory::Resource);
    }

    #[test]
    fn stage_tag_keeps_category() {
        let err = TilingError::Cancelled.in_stage(Stage::Build).in_stage(Stage::Fill);
        assert_eq!(err.stage(), Some(Stage::Build));
        assert!(matches!(err.unstaged(), TilingError::Cancelled));
        assert_eq!(err.category(), ErrorCategory::Cancelled);
        assert_eq!(format!("{err}"), "build stage failed");
        assert_eq!(TilingError::NoInput.stage(), None);
    }

    #[test]
    fn degenerate_triangle_message() {
        let err = TilingError::DegenerateTriangle {
            index: 7,
            vertices: [1, 1, 2],
        };
        assert_eq!(format!("{err}"), "degenerate triangle 7: vertices [1, 1, 2]");
        assert_eq!(err.category(), ErrorCategory::Input);
    }
}
