mod aabb;
mod ray_box_intersection;
mod ray_triangle_intersection;
mod triangle;

use nalgebra::{Point2, Point3, Unit, Vector2, Vector3};

pub use aabb::AABB;
pub use ray_triangle_intersection::TriangleHit;
pub use triangle::{BarycentricCoordinates, Triangle};

pub type FloatType = f64;

/// Tolerance used for parallel-ray rejection and for discarding self-intersections
/// right at the ray origin.
pub const EPSILON: FloatType = 1e-7;

pub type ScreenPoint = Point2<u32>;
pub type ScreenSize = Vector2<u32>;
pub type ScreenBlock = AABB<ScreenPoint>;

pub type WorldPoint = Point3<FloatType>;
pub type WorldVector = Vector3<FloatType>;
pub type WorldBox = AABB<WorldPoint>;

#[derive(Copy, Clone, Debug)]
pub struct Ray {
    pub origin: WorldPoint,
    /// Normalized direction of the ray
    pub direction: Unit<WorldVector>,

    /// Componentwise inverse of the ray direction
    /// Zeros in direction get turned into positive infinity regardless of the sign of the zero
    pub inv_direction: WorldVector,
}

impl Ray {
    /// Creates a new ray, normalizing the direction.
    ///
    /// The direction must be non-zero. This is only checked in debug builds, a zero
    /// direction in release builds produces a ray with NaN components that misses everything.
    /// Use [`Ray::try_new`] when the direction comes from untrusted input.
    pub fn new(origin: WorldPoint, direction: WorldVector) -> Ray {
        debug_assert!(
            direction.norm_squared() > 0.0,
            "Ray direction must be non-zero"
        );
        Self::from_unit(origin, Unit::new_normalize(direction))
    }

    /// Creates a new ray, returns None if the direction is shorter than [`EPSILON`].
    pub fn try_new(origin: WorldPoint, direction: WorldVector) -> Option<Ray> {
        Unit::try_new(direction, EPSILON).map(|direction| Self::from_unit(origin, direction))
    }

    fn from_unit(origin: WorldPoint, direction: Unit<WorldVector>) -> Ray {
        let inv_direction = direction.map(|x| if x == 0.0 { FloatType::INFINITY } else { 1.0 / x });

        Ray {
            origin,
            direction,
            inv_direction,
        }
    }

    pub fn point_at(&self, distance: FloatType) -> WorldPoint {
        self.origin + self.direction.as_ref() * distance
    }
}

/// Result of a successful nearest-hit query.
#[derive(Clone, Debug)]
pub struct HitRecord {
    /// Distance along the ray
    pub t: FloatType,
    pub point: WorldPoint,
    pub normal: Unit<WorldVector>,
    /// Barycentric coordinates of the hit within the triangle
    pub uv: BarycentricCoordinates<FloatType>,
    pub mesh: crate::scene::MeshIdx,
    pub triangle: crate::scene::TriangleIdx,
}
