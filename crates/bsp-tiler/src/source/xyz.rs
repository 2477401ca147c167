//! ASCII `x y z` point reader.

use std::io::BufRead;
use std::path::Path;

use nalgebra::Point3;

use super::{SourceCounts, SourceVisitor, open_input};
use crate::error::{TilingError, TilingResult};

/// Streams an XYZ file. Blank lines are skipped, columns past the third are
/// ignored.
pub(super) fn read_xyz<V: SourceVisitor>(path: &Path, visitor: &mut V) -> TilingResult<SourceCounts> {
    let reader = open_input(path)?;
    let mut counts = SourceCounts::default();

    for (line_no, line) in reader.lines().enumerate() {
        let line_no = line_no as u64 + 1;
        let line = line.map_err(|e| TilingError::input(path, line_no, e))?;
        let tokens: Vec<&str> = line.split_whitespace().take(3).collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() < 3 {
            return Err(TilingError::malformed(path, line_no, "expected three coordinates"));
        }

        let mut coords = [0.0f64; 3];
        for (c, token) in coords.iter_mut().zip(&tokens) {
            *c = token.parse().map_err(|_| {
                TilingError::malformed(path, line_no, format!("bad coordinate '{token}'"))
            })?;
        }

        visitor.visit_vertex(Point3::new(coords[0], coords[1], coords[2]))?;
        counts.vertices += 1;
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tests::Collect;
    use std::fs;

    #[test]
    fn reads_points_and_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.xyz");
        fs::write(&path, "0 0 0\n\n1.5 2 -3 255 0 0\n  4 5 6  \n").unwrap();

        let mut collect = Collect::default();
        let counts = read_xyz(&path, &mut collect).unwrap();

        assert_eq!(counts.vertices, 3);
        assert_eq!(counts.triangles, 0);
        assert_eq!(collect.vertices[1], Point3::new(1.5, 2.0, -3.0));
        assert_eq!(collect.vertices[2], Point3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn reports_line_of_bad_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.xyz");
        fs::write(&path, "0 0 0\n1 x 2\n").unwrap();

        let err = read_xyz(&path, &mut Collect::default()).unwrap_err();
        assert!(matches!(err, TilingError::Malformed { position: 2, .. }));
    }

    #[test]
    fn short_line_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.xyz");
        fs::write(&path, "1 2\n").unwrap();

        let err = read_xyz(&path, &mut Collect::default()).unwrap_err();
        assert!(matches!(err, TilingError::Malformed { position: 1, .. }));
    }

    #[test]
    fn missing_file_is_unreadable_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_xyz(&dir.path().join("none.xyz"), &mut Collect::default()).unwrap_err();
        assert!(matches!(err, TilingError::Unreadable { .. }));
        assert_eq!(err.category(), crate::ErrorCategory::Input);
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.xyz");
        fs::write(&path, b"0 0 0\n\xff\xfe 1 2\n").unwrap();

        let err = read_xyz(&path, &mut Collect::default()).unwrap_err();
        assert!(matches!(err, TilingError::Malformed { position: 2, .. }));
        assert_eq!(err.category(), crate::ErrorCategory::Input);
    }
}
