use std::ops::{Index, IndexMut, Mul};

use nalgebra::{ClosedAddAssign, Unit};

use super::{FloatType, WorldPoint, WorldVector};

/// Three vertices, either as positions or as indices into a vertex buffer.
///
/// Vertices are expected in counter-clockwise order when looking at the front side of the
/// triangle, the front side is the one the normal points to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Triangle<Point>([Point; 3]);

impl<Point> Triangle<Point> {
    pub fn new(a: Point, b: Point, c: Point) -> Triangle<Point> {
        Triangle([a, b, c])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.0.iter()
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        3
    }

    pub fn map<Point2, F: FnMut(&Point) -> Point2>(&self, mut f: F) -> Triangle<Point2> {
        Triangle([f(&self[0]), f(&self[1]), f(&self[2])])
    }
}

impl<Point: Default> Default for Triangle<Point> {
    fn default() -> Self {
        Triangle([Default::default(), Default::default(), Default::default()])
    }
}

impl<Point> Index<usize> for Triangle<Point> {
    type Output = Point;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<Point> IndexMut<usize> for Triangle<Point> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl Triangle<WorldPoint> {
    pub fn centroid(&self) -> WorldPoint {
        WorldPoint::from(self.iter().map(|p| p.coords).sum::<WorldVector>() / (self.len() as FloatType))
    }

    /// Returns edge vectors, coming from self[0]
    pub fn edges(&self) -> [WorldVector; 2] {
        [self[1] - self[0], self[2] - self[0]]
    }

    /// Returns a normal vector of the triangle, not normalized.
    pub fn normal(&self) -> WorldVector {
        let [e1, e2] = self.edges();
        e1.cross(&e2)
    }

    /// Normalized face normal, None for degenerate (zero area) triangles.
    pub fn unit_normal(&self) -> Option<Unit<WorldVector>> {
        Unit::try_new(self.normal(), 0.0)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BarycentricCoordinates<T> {
    pub u: T,
    pub v: T,
}

impl BarycentricCoordinates<FloatType> {
    /// Weight of the first vertex
    pub fn w(&self) -> FloatType {
        1.0 - self.u - self.v
    }

    pub fn interpolate<T2>(&self, a: &T2, b: &T2, c: &T2) -> T2
    where
        for<'a> &'a T2: Mul<FloatType, Output = T2>,
        T2: ClosedAddAssign,
    {
        a * self.w() + b * self.u + c * self.v
    }

    pub fn interpolate_triangle<T2>(&self, triangle: &Triangle<T2>) -> T2
    where
        for<'a> &'a T2: Mul<FloatType, Output = T2>,
        T2: ClosedAddAssign,
    {
        self.interpolate(&triangle[0], &triangle[1], &triangle[2])
    }
}
