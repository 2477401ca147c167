//! ASCII OFF triangle mesh reader.
//!
//! Format:
//!
//! ```text
//! OFF
//! <vertices> <faces> <edges>
//! x y z            (one line per vertex)
//! 3 i j k          (one line per face, zero-based indices)
//! ```
//!
//! `#` starts a comment. Only triangular faces are accepted.

use std::io::{BufRead, Lines};
use std::path::Path;

use nalgebra::Point3;

use super::{SourceCounts, SourceVisitor, open_input};
use crate::error::{TilingError, TilingResult};

/// Non-empty, comment-stripped lines with their 1-based line numbers.
struct ContentLines<'p, B> {
    lines: Lines<B>,
    line_no: u64,
    path: &'p Path,
}

impl<'p, B: BufRead> ContentLines<'p, B> {
    fn next_line(&mut self) -> TilingResult<Option<(u64, String)>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line.map_err(|e| TilingError::input(self.path, self.line_no, e))?;
            let content = line.split('#').next().unwrap_or("").trim();
            if !content.is_empty() {
                return Ok(Some((self.line_no, content.to_string())));
            }
        }
        Ok(None)
    }

    fn expect_line(&mut self, what: &str) -> TilingResult<(u64, String)> {
        self.next_line()?.ok_or_else(|| {
            TilingError::malformed(self.path, self.line_no, format!("missing {what}"))
        })
    }
}

fn parse_token<T: std::str::FromStr>(
    path: &Path,
    line_no: u64,
    token: Option<&str>,
    what: &str,
) -> TilingResult<T> {
    let token = token.ok_or_else(|| TilingError::malformed(path, line_no, format!("missing {what}")))?;
    token
        .parse()
        .map_err(|_| TilingError::malformed(path, line_no, format!("bad {what} '{token}'")))
}

/// Streams an OFF mesh: all vertices first, then all triangles.
pub(super) fn read_off<V: SourceVisitor>(path: &Path, visitor: &mut V) -> TilingResult<SourceCounts> {
    let mut lines = ContentLines {
        lines: open_input(path)?.lines(),
        line_no: 0,
        path,
    };

    let (line_no, header) = lines.expect_line("OFF header")?;
    let mut tokens = header.split_whitespace();
    if tokens.next() != Some("OFF") {
        return Err(TilingError::malformed(path, line_no, "expected 'OFF'"));
    }

    // Counts may follow the keyword on the same line.
    let rest: Vec<String> = tokens.map(str::to_string).collect();
    let (line_no, counts_line) = if rest.is_empty() {
        lines.expect_line("element counts")?
    } else {
        (line_no, rest.join(" "))
    };
    let mut tokens = counts_line.split_whitespace();
    let vertex_count: u64 = parse_token(path, line_no, tokens.next(), "vertex count")?;
    let face_count: u64 = parse_token(path, line_no, tokens.next(), "face count")?;

    for _ in 0..vertex_count {
        let (line_no, line) = lines.expect_line("vertex")?;
        let mut tokens = line.split_whitespace();
        let x: f64 = parse_token(path, line_no, tokens.next(), "x")?;
        let y: f64 = parse_token(path, line_no, tokens.next(), "y")?;
        let z: f64 = parse_token(path, line_no, tokens.next(), "z")?;
        visitor.visit_vertex(Point3::new(x, y, z))?;
    }

    for _ in 0..face_count {
        let (line_no, line) = lines.expect_line("face")?;
        let mut tokens = line.split_whitespace();
        let arity: u64 = parse_token(path, line_no, tokens.next(), "face size")?;
        if arity != 3 {
            return Err(TilingError::malformed(
                path,
                line_no,
                format!("only triangles are supported, got a {arity}-gon"),
            ));
        }

        let mut triangle = [0u64; 3];
        for v in &mut triangle {
            *v = parse_token(path, line_no, tokens.next(), "vertex index")?;
            if *v >= vertex_count {
                return Err(TilingError::malformed(
                    path,
                    line_no,
                    format!("vertex index {v} out of range ({vertex_count} vertices)"),
                ));
            }
        }
        visitor.visit_triangle(triangle)?;
    }

    Ok(SourceCounts {
        vertices: vertex_count,
        triangles: face_count,
    })
}
