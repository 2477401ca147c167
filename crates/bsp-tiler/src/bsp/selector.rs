//! Split plane selection strategies.
//!
//! The builder only ever sees the downsample, so a selector works on the
//! handful of sampled points currently held by the cell being split.

use nalgebra::Point3;

use crate::bounds::BoundingBox;
use crate::plane::{Axis, SplitPlane};

/// Strategy for choosing the plane that splits a cell.
pub trait SplitSelector {
    /// Choose a plane for the cell with bounding box `bbox` holding the
    /// sampled points `samples`.
    ///
    /// The plane must put at least one sample on each side. Return `None`
    /// when no such plane exists, e.g. when every sample is the same point.
    fn select(&self, bbox: &BoundingBox, samples: &[Point3<f64>]) -> Option<SplitPlane>;
}

/// Splits across the longest axis that separates the samples, between the
/// two distinct sample coordinates closest to the median.
///
/// Axes are tried in order of decreasing cell extent (ties broken x, y, z).
/// On the chosen axis the samples are sorted, and the gap `v[j-1] < v[j]`
/// with `j` nearest to `n / 2` is cut at its midpoint, or at `v[j]` when the
/// two are adjacent doubles. Both halves are therefore non-empty and as
/// balanced as the duplicates allow.
#[derive(Debug, Clone, Copy, Default)]
pub struct MedianSplit;

impl SplitSelector for MedianSplit {
    fn select(&self, bbox: &BoundingBox, samples: &[Point3<f64>]) -> Option<SplitPlane> {
        if samples.len() < 2 {
            return None;
        }

        let mut axes = Axis::ALL;
        // stable: equal extents keep x, y, z order
        axes.sort_by(|a, b| bbox.extent(*b).total_cmp(&bbox.extent(*a)));

        let mut coords = Vec::with_capacity(samples.len());
        for axis in axes {
            coords.clear();
            coords.extend(samples.iter().map(|p| axis.coord(p)));
            coords.sort_by(f64::total_cmp);

            if let Some(offset) = median_gap(&coords) {
                return Some(SplitPlane::new(axis, offset));
            }
        }

        None
    }
}

/// Cut offset inside the gap between distinct sorted values nearest to the
/// middle.
fn median_gap(sorted: &[f64]) -> Option<f64> {
    let mid = sorted.len() / 2;
    (1..sorted.len())
        .filter(|&j| sorted[j - 1] < sorted[j])
        .min_by_key(|&j| j.abs_diff(mid))
        .map(|j| gap_offset(sorted[j - 1], sorted[j]))
}

/// An offset `o` with `a < o <= b`, so `a` falls below the plane and `b`
/// on or above it.
///
/// The midpoint is used when it is representable strictly above `a`; for
/// adjacent doubles it rounds onto `a` and `b` itself is the cut.
fn gap_offset(a: f64, b: f64) -> f64 {
    debug_assert!(a < b);
    // halves first: `a + b` overflows for gaps wider than f64::MAX
    let mid = a / 2.0 + b / 2.0;
    if a < mid && mid <= b { mid } else { b }
}
