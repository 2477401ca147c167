//! ASCII `x y z` tiles.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use nalgebra::Point3;

use super::TileWriter;
use crate::error::{TilingError, TilingResult};
use crate::scratch;

/// Significant digits of every written coordinate.
pub const XYZ_PRECISION: usize = 10;

pub(super) struct XyzTile {
    out: BufWriter<File>,
    path: PathBuf,
    line: u64,
}

impl XyzTile {
    pub(super) fn create(path: &Path) -> TilingResult<Self> {
        Ok(Self {
            out: scratch::create_writer(path)?,
            path: path.to_path_buf(),
            line: 0,
        })
    }
}

impl TileWriter for XyzTile {
    fn write_vertex(&mut self, _id: u64, point: &Point3<f64>) -> TilingResult<()> {
        self.line += 1;
        writeln!(self.out, "{}", format_point(point)).map_err(|e| TilingError::io(&self.path, self.line, e))
    }

    fn finish(self: Box<Self>) -> TilingResult<()> {
        scratch::finish_writer(self.out, &self.path)
    }
}

/// `x y z` with [`XYZ_PRECISION`] significant digits each.
pub(super) fn format_point(point: &Point3<f64>) -> String {
    format!(
        "{} {} {}",
        format_general(point.x, XYZ_PRECISION),
        format_general(point.y, XYZ_PRECISION),
        format_general(point.z, XYZ_PRECISION)
    )
}

/// Formats `value` with `precision` significant digits, choosing plain or
/// exponent notation by magnitude and dropping trailing zeros.
///
/// This is the `%g` conversion of C's `printf`: exponent notation is used
/// when the decimal exponent is below -4 or at least `precision`.
pub fn format_general(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let precision = precision.max(1);
    // Rounding to `precision` digits may bump the exponent (9.99 -> 1e1).
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.unsigned_abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_notation() {
        assert_eq!(format_general(1.0, 10), "1");
        assert_eq!(format_general(0.5, 10), "0.5");
        assert_eq!(format_general(-2.25, 10), "-2.25");
        assert_eq!(format_general(1234567.891, 10), "1234567.891");
        assert_eq!(format_general(1.0 / 3.0, 10), "0.3333333333");
        assert_eq!(format_general(0.0001, 10), "0.0001");
        assert_eq!(format_general(100.0, 10), "100");
    }

    #[test]
    fn exponent_notation() {
        assert_eq!(format_general(0.00001, 10), "1e-05");
        assert_eq!(format_general(123456789012.0, 10), "1.23456789e+11");
        assert_eq!(format_general(-2.5e100, 10), "-2.5e+100");
    }

    #[test]
    fn rounding_carries_into_exponent() {
        assert_eq!(format_general(9999999999.6, 10), "1e+10");
        assert_eq!(format_general(0.99999999999, 10), "1");
    }

    #[test]
    fn special_values() {
        assert_eq!(format_general(0.0, 10), "0");
        assert_eq!(format_general(f64::NAN, 10), "nan");
        assert_eq!(format_general(f64::NEG_INFINITY, 10), "-inf");
    }

    #[test]
    fn point_line() {
        assert_eq!(format_point(&Point3::new(0.0, 1.5, -3.0)), "0 1.5 -3");
    }
}
