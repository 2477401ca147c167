//! Axis-aligned bounding boxes with half-open membership.

use nalgebra::Point3;

use crate::plane::{Axis, SplitPlane};

/// An axis-aligned box with an exact point-membership test.
///
/// Membership is half-open on every axis (`min <= p < max`) unless the upper
/// face of that axis is marked closed, in which case `p <= max` is accepted.
/// The root box is closed on all three axes; splitting with [`BoundingBox::split`]
/// hands the closed faces to the upper child only, so the leaves of a tree
/// built this way partition the root box exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Point3<f64>,
    /// Maximum corner.
    pub max: Point3<f64>,
    closed_upper: [bool; 3],
}

impl BoundingBox {
    /// Creates a closed box from two corners.
    ///
    /// Corners are reordered per axis so that `min <= max` always holds.
    pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
        Self {
            min: Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
            closed_upper: [true; 3],
        }
    }

    /// Creates an empty box, ready to grow with [`BoundingBox::expand`].
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            closed_upper: [true; 3],
        }
    }

    /// Returns `true` if no point has been added yet.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grows the box to include `point`.
    pub fn expand(&mut self, point: &Point3<f64>) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(point[i]);
            self.max[i] = self.max[i].max(point[i]);
        }
    }

    /// Grows the box to include another box.
    pub fn union(&mut self, other: &BoundingBox) {
        if other.is_empty() {
            return;
        }
        self.expand(&other.min);
        self.expand(&other.max);
    }

    /// Extent along `axis`.
    #[inline]
    pub fn extent(&self, axis: Axis) -> f64 {
        axis.coord(&self.max) - axis.coord(&self.min)
    }

    /// Returns `true` if the upper face along `axis` is part of the box.
    #[inline]
    pub fn is_closed_upper(&self, axis: Axis) -> bool {
        self.closed_upper[axis.index()]
    }

    /// Exact membership test.
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        (0..3).all(|i| {
            let c = point[i];
            c >= self.min[i] && (c < self.max[i] || (self.closed_upper[i] && c <= self.max[i]))
        })
    }

    /// Splits the box with `plane` into `(lower, upper)` halves.
    ///
    /// The lower half is open at the plane; the upper half keeps the
    /// closure of the original upper face.
    pub fn split(&self, plane: &SplitPlane) -> (BoundingBox, BoundingBox) {
        let i = plane.axis().index();
        let offset = plane.offset().clamp(self.min[i], self.max[i]);

        let mut lower = *self;
        lower.max[i] = offset;
        lower.closed_upper[i] = false;

        let mut upper = *self;
        upper.min[i] = offset;

        (lower, upper)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_cube() -> BoundingBox {
        BoundingBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn new_orders_corners() {
        let b = BoundingBox::new(Point3::new(2.0, 0.0, 5.0), Point3::new(1.0, 3.0, 4.0));
        assert_eq!(b.min, Point3::new(1.0, 0.0, 4.0));
        assert_eq!(b.max, Point3::new(2.0, 3.0, 5.0));
    }

    #[test]
    fn empty_expands() {
        let mut b = BoundingBox::empty();
        assert!(b.is_empty());
        b.expand(&Point3::new(1.0, -2.0, 3.0));
        b.expand(&Point3::new(-1.0, 2.0, 0.0));
        assert!(!b.is_empty());
        assert_eq!(b.min, Point3::new(-1.0, -2.0, 0.0));
        assert_eq!(b.max, Point3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(b.extent(Axis::Y), 4.0);
    }

    #[test]
    fn root_box_is_closed() {
        let b = unit_cube();
        assert!(b.contains(&Point3::new(1.0, 1.0, 1.0)));
        assert!(b.contains(&Point3::origin()));
        assert!(!b.contains(&Point3::new(1.0 + 1e-12, 0.5, 0.5)));
        assert!(!b.contains(&Point3::new(-1e-12, 0.5, 0.5)));
    }

    #[test]
    fn split_partitions_plane_points() {
        let (lower, upper) = unit_cube().split(&SplitPlane::new(Axis::X, 0.5));

        let on_plane = Point3::new(0.5, 0.3, 0.3);
        assert!(!lower.contains(&on_plane));
        assert!(upper.contains(&on_plane));

        let corner = Point3::new(1.0, 1.0, 1.0);
        assert!(!lower.contains(&corner));
        assert!(upper.contains(&corner));

        assert!(lower.contains(&Point3::origin()));
        assert!(!upper.contains(&Point3::origin()));

        assert!(!lower.is_closed_upper(Axis::X));
        assert!(lower.is_closed_upper(Axis::Y));
        assert!(upper.is_closed_upper(Axis::X));
    }

    #[test]
    fn nested_splits_cover_grid_exactly() {
        let (lower, upper) = unit_cube().split(&SplitPlane::new(Axis::X, 0.5));
        let (ll, lu) = lower.split(&SplitPlane::new(Axis::Y, 0.25));
        let (ul, uu) = upper.split(&SplitPlane::new(Axis::Z, 0.75));
        let leaves = [ll, lu, ul, uu];

        for i in 0..=8 {
            for j in 0..=8 {
                for k in 0..=8 {
                    let p = Point3::new(i as f64 / 8.0, j as f64 / 8.0, k as f64 / 8.0);
                    let owners = leaves.iter().filter(|b| b.contains(&p)).count();
                    assert_eq!(owners, 1, "point {p:?} owned by {owners} leaves");
                }
            }
        }
    }
}
