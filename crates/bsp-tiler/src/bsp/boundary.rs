//! Triangle ownership and boundary vertex bookkeeping.
//!
//! Each triangle belongs to exactly one leaf. Its vertices owned by other
//! leaves are *boundary vertices* of the owning leaf: they are copied into
//! its tile after the leaf's own vertices so the triangle can be indexed
//! locally. A vertex referenced as boundary from two or more leaves is
//! *constrained*.

use std::collections::BTreeSet;

/// Boundary state of one global vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryStatus {
    /// No foreign leaf references the vertex.
    #[default]
    Unclaimed,
    /// Exactly one foreign leaf (by leaf id) references the vertex.
    ReferencedBy(usize),
    /// Two or more foreign leaves reference the vertex.
    Constrained,
}

impl BoundaryStatus {
    /// Records a reference from `leaf`.
    ///
    /// Returns the previously registered leaf when this reference makes the
    /// vertex constrained.
    pub(crate) fn register(&mut self, leaf: usize) -> Option<usize> {
        match *self {
            Self::Unclaimed => {
                *self = Self::ReferencedBy(leaf);
                None
            }
            Self::ReferencedBy(other) if other != leaf => {
                *self = Self::Constrained;
                Some(other)
            }
            Self::ReferencedBy(_) | Self::Constrained => None,
        }
    }
}

/// A vertex referenced as boundary by several leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstrainedVertex {
    /// Global vertex id.
    pub vertex: u64,
    /// Leaf ids referencing the vertex as boundary.
    pub leaves: BTreeSet<usize>,
}

/// Owner and boundary references of one triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriangleOwnership {
    /// Leaf that stores the triangle.
    pub owner: usize,
    /// `(vertex, leaf)` for each vertex owned by a leaf other than `owner`.
    pub boundary: [Option<(u64, usize)>; 2],
}

impl TriangleOwnership {
    /// Boundary references, in vertex order.
    pub fn boundary(&self) -> impl Iterator<Item = (u64, usize)> + '_ {
        self.boundary.iter().flatten().copied()
    }
}

/// Picks the owning leaf of a triangle.
///
/// `leaves[i]` is the leaf owning `vertices[i]`. If two vertices share a
/// leaf, that leaf owns the triangle and the third vertex (if elsewhere)
/// is its boundary. Pairs are tried in the order (0, 1), (1, 2), (2, 0).
/// If all three leaves differ, the smallest leaf id owns the triangle.
pub fn classify_triangle(vertices: [u64; 3], leaves: [usize; 3]) -> TriangleOwnership {
    for (a, b, c) in [(0, 1, 2), (1, 2, 0), (2, 0, 1)] {
        if leaves[a] == leaves[b] {
            let owner = leaves[a];
            let third = (leaves[c] != owner).then_some((vertices[c], leaves[c]));
            return TriangleOwnership {
                owner,
                boundary: [third, None],
            };
        }
    }

    let selected = (1..3).fold(0, |best, i| if leaves[i] < leaves[best] { i } else { best });
    let owner = leaves[selected];
    let mut others = (0..3)
        .filter(|&i| i != selected)
        .map(|i| Some((vertices[i], leaves[i])));

    TriangleOwnership {
        owner,
        boundary: [others.next().flatten(), others.next().flatten()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_triangle_has_no_boundary() {
        let t = classify_triangle([4, 5, 6], [2, 2, 2]);
        assert_eq!(t.owner, 2);
        assert_eq!(t.boundary().count(), 0);
    }

    #[test]
    fn shared_pair_owns_the_triangle() {
        let t = classify_triangle([10, 11, 12], [3, 1, 3]);
        assert_eq!(t.owner, 3);
        assert_eq!(t.boundary().collect::<Vec<_>>(), vec![(11, 1)]);

        let t = classify_triangle([10, 11, 12], [0, 5, 5]);
        assert_eq!(t.owner, 5);
        assert_eq!(t.boundary().collect::<Vec<_>>(), vec![(10, 0)]);
    }

    #[test]
    fn three_leaves_pick_smallest() {
        let t = classify_triangle([7, 8, 9], [4, 2, 6]);
        assert_eq!(t.owner, 2);
        assert_eq!(t.boundary().collect::<Vec<_>>(), vec![(7, 4), (9, 6)]);
    }

    #[test]
    fn status_transitions() {
        let mut status = BoundaryStatus::default();
        assert_eq!(status.register(3), None);
        assert_eq!(status, BoundaryStatus::ReferencedBy(3));

        // same leaf again changes nothing
        assert_eq!(status.register(3), None);
        assert_eq!(status, BoundaryStatus::ReferencedBy(3));

        assert_eq!(status.register(1), Some(3));
        assert_eq!(status, BoundaryStatus::Constrained);

        assert_eq!(status.register(8), None);
        assert_eq!(status, BoundaryStatus::Constrained);
    }
}
