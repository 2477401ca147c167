//! Axis-aligned splitting planes.

use nalgebra::Point3;

/// One of the three coordinate axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in index order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Coordinate index of this axis (0, 1 or 2).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Returns the coordinate of `point` along this axis.
    #[inline]
    pub fn coord(self, point: &Point3<f64>) -> f64 {
        point[self.index()]
    }
}

/// Which side of a [`SplitPlane`] a point falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    /// Strictly below the plane offset.
    Lower,
    /// On or above the plane offset.
    Upper,
}

/// An axis-aligned plane `coord(axis) = offset` splitting a cell in two.
///
/// Points lying exactly on the plane belong to the upper side, so every point
/// has exactly one side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitPlane {
    axis: Axis,
    offset: f64,
}

impl SplitPlane {
    /// Creates a plane perpendicular to `axis` at `offset`.
    ///
    /// # Panics
    /// Panics if `offset` is not finite.
    pub fn new(axis: Axis, offset: f64) -> Self {
        assert!(offset.is_finite(), "Split offset must be finite");
        Self { axis, offset }
    }

    /// The axis the plane is perpendicular to.
    #[inline]
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Position of the plane along its axis.
    #[inline]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Signed distance from the plane, positive on the upper side.
    #[inline]
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        self.axis.coord(point) - self.offset
    }

    /// Classifies which side of the plane a point lies on.
    #[inline]
    pub fn classify_point(&self, point: &Point3<f64>) -> PlaneSide {
        if self.axis.coord(point) < self.offset {
            PlaneSide::Lower
        } else {
            PlaneSide::Upper
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_indices() {
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(Axis::X.coord(&p), 1.0);
        assert_eq!(Axis::Y.coord(&p), 2.0);
        assert_eq!(Axis::Z.coord(&p), 3.0);
    }

    #[test]
    fn classify_sides() {
        let plane = SplitPlane::new(Axis::Y, 0.5);
        assert_eq!(plane.classify_point(&Point3::new(9.0, 0.2, -4.0)), PlaneSide::Lower);
        assert_eq!(plane.classify_point(&Point3::new(9.0, 0.7, -4.0)), PlaneSide::Upper);
        assert_eq!(plane.signed_distance(&Point3::new(0.0, 0.7, 0.0)), 0.7 - 0.5);
    }

    #[test]
    fn on_plane_points_go_up() {
        let plane = SplitPlane::new(Axis::Z, 2.0);
        assert_eq!(plane.classify_point(&Point3::new(0.0, 0.0, 2.0)), PlaneSide::Upper);
    }

    #[test]
    #[should_panic(expected = "finite")]
    fn rejects_nan_offset() {
        SplitPlane::new(Axis::X, f64::NAN);
    }
}
