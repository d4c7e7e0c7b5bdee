use num_traits::One;
use std::ops::Sub;

use nalgebra::{ClosedAddAssign, ClosedDivAssign, Point, Point2, Scalar};

use super::{FloatType, WorldPoint, WorldVector};

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AABB<Point> {
    pub min: Point,
    pub max: Point,
}

impl<Point> AABB<Point> {
    pub fn new(min: Point, max: Point) -> AABB<Point> {
        AABB { min, max }
    }
}

impl<Point: Sub + Copy> AABB<Point> {
    pub fn size(&self) -> Point::Output {
        self.max - self.min
    }
}

impl<T: Scalar + Copy + Sub> AABB<Point2<T>> {
    pub fn width(&self) -> T::Output {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> T::Output {
        self.max[1] - self.min[1]
    }
}

impl AABB<Point2<u32>> {
    /// Screen block with its min corner at the origin.
    pub fn with_size(size: &nalgebra::Vector2<u32>) -> Self {
        AABB {
            min: Point2::origin(),
            max: Point2::from(*size),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y
    }

    pub fn contains(&self, p: &Point2<u32>) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    pub fn area(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.width() * self.height()
        }
    }
}

impl<T: Scalar + ClosedAddAssign + ClosedDivAssign + One, const D: usize> AABB<Point<T, D>> {
    pub fn center(&self) -> Point<T, D> {
        let two = T::one() + T::one();
        let avg_coords = (&self.min.coords + &self.max.coords) / two;
        Point::from(avg_coords)
    }
}

impl AABB<WorldPoint> {
    /// Box that contains nothing, growing it by a point yields a box containing exactly
    /// that point.
    pub fn empty() -> Self {
        AABB {
            min: WorldPoint::from(WorldVector::repeat(FloatType::INFINITY)),
            max: WorldPoint::from(WorldVector::repeat(FloatType::NEG_INFINITY)),
        }
    }

    /// Smallest box containing all of the points, or None if the iterator is empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a WorldPoint>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut ret = AABB::new(*first, *first);
        for p in iter {
            ret.include_point(p);
        }
        Some(ret)
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.max[axis] < self.min[axis])
    }

    /// Grow the box so that it contains the point.
    pub fn include_point(&mut self, p: &WorldPoint) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Smallest box containing both boxes.
    pub fn merge(&self, other: &Self) -> Self {
        AABB {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Returns true if the point is inside or on the boundary of the box.
    pub fn contains(&self, p: &WorldPoint) -> bool {
        (0..3).all(|axis| self.min[axis] <= p[axis] && p[axis] <= self.max[axis])
    }

    /// Index of the axis with the largest extent.
    /// Equal extents are resolved in favor of the lower axis (x, then y, then z).
    pub fn longest_axis(&self) -> usize {
        let size = self.size();
        let mut best = 0;
        for axis in 1..3 {
            if size[axis] > size[best] {
                best = axis;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::WorldBox;
    use assert2::{assert, let_assert};
    use test_case::test_case;

    #[test]
    fn from_points_is_tight() {
        let points = [
            WorldPoint::new(1.0, -2.0, 3.0),
            WorldPoint::new(-1.0, 5.0, 0.5),
            WorldPoint::new(0.0, 0.0, 7.0),
        ];
        let_assert!(Some(b) = WorldBox::from_points(&points));
        assert!(b.min == WorldPoint::new(-1.0, -2.0, 0.5));
        assert!(b.max == WorldPoint::new(1.0, 5.0, 7.0));
    }

    #[test]
    fn from_no_points() {
        assert!(WorldBox::from_points(&[]).is_none());
    }

    #[test]
    fn empty_box_grows_to_point() {
        let mut b = WorldBox::empty();
        assert!(b.is_empty());
        b.include_point(&WorldPoint::new(1.0, 2.0, 3.0));
        assert!(!b.is_empty());
        assert!(b.min == b.max);
        assert!(b.min == WorldPoint::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn merge_boxes() {
        let a = WorldBox::new(WorldPoint::new(0.0, 0.0, 0.0), WorldPoint::new(1.0, 1.0, 1.0));
        let b = WorldBox::new(WorldPoint::new(-1.0, 0.5, 2.0), WorldPoint::new(0.5, 0.5, 3.0));
        let m = a.merge(&b);
        assert!(m.min == WorldPoint::new(-1.0, 0.0, 0.0));
        assert!(m.max == WorldPoint::new(1.0, 1.0, 3.0));
        assert!(m.contains(&WorldPoint::new(0.0, 0.5, 2.5)));
        assert!(!m.contains(&WorldPoint::new(0.0, 1.5, 2.5)));
    }

    #[test_case(3.0, 1.0, 1.0, 0 ; "x")]
    #[test_case(1.0, 3.0, 1.0, 1 ; "y")]
    #[test_case(1.0, 1.0, 3.0, 2 ; "z")]
    #[test_case(2.0, 2.0, 2.0, 0 ; "all_equal_prefers_x")]
    #[test_case(1.0, 2.0, 2.0, 1 ; "y_z_equal_prefers_y")]
    #[test_case(0.0, 0.0, 0.0, 0 ; "flat")]
    fn longest_axis(sx: FloatType, sy: FloatType, sz: FloatType, expected: usize) {
        let b = WorldBox::new(WorldPoint::origin(), WorldPoint::new(sx, sy, sz));
        assert!(b.longest_axis() == expected);
    }

    #[test]
    fn center() {
        let b = WorldBox::new(WorldPoint::new(-2.0, 0.0, 4.0), WorldPoint::new(2.0, 1.0, 8.0));
        assert!(b.center() == WorldPoint::new(0.0, 0.5, 6.0));
    }

    #[test]
    fn screen_block_area() {
        let b = AABB::new(Point2::new(2u32, 3), Point2::new(5u32, 7));
        assert!(b.width() == 3);
        assert!(b.height() == 4);
        assert!(b.area() == 12);
        assert!(b.contains(&Point2::new(4, 6)));
        assert!(!b.contains(&Point2::new(5, 6)));

        let empty = AABB::new(Point2::new(5u32, 3), Point2::new(5u32, 7));
        assert!(empty.is_empty());
        assert!(empty.area() == 0);
    }
}
