use bon::bon;
use nalgebra::Unit;
use rand_distr::Distribution as _;
use thiserror::Error;

use crate::geometry::{EPSILON, FloatType, Ray, ScreenPoint, ScreenSize, WorldPoint, WorldVector};

/// Thin lens camera.
#[derive(Copy, Clone, Debug)]
pub struct Camera {
    center: WorldPoint,

    resolution: ScreenSize,

    up: Unit<WorldVector>,
    right: Unit<WorldVector>,
    film_origin_offset: WorldVector,

    /// Distance between pixels in meters
    pixel_pitch: FloatType,

    /// Lens radius in meters
    lens_radius: FloatType,
    lens_weight: FloatType,
}

#[derive(Debug, Error, PartialEq)]
pub enum CameraError {
    #[error("Forward and up vectors must be non-zero and not parallel")]
    DegenerateOrientation,

    #[error("Resolution must be non-zero, got {0}x{1}")]
    EmptyResolution(u32, u32),

    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: FloatType },
}

#[bon]
impl Camera {
    #[builder]
    pub fn new(
        center: WorldPoint,
        forward: WorldVector,
        up: WorldVector,
        resolution: ScreenSize,
        film_width: FloatType,
        focal_length: FloatType,
        f_number: FloatType,
        focus_distance: FloatType,
    ) -> Result<Self, CameraError> {
        let forward =
            Unit::try_new(forward, EPSILON).ok_or(CameraError::DegenerateOrientation)?;
        let up = Unit::try_new(up, EPSILON).ok_or(CameraError::DegenerateOrientation)?;
        let right = Unit::try_new(forward.cross(&up), EPSILON)
            .ok_or(CameraError::DegenerateOrientation)?;
        let up = Unit::new_normalize(right.cross(&forward));

        if resolution.x == 0 || resolution.y == 0 {
            return Err(CameraError::EmptyResolution(resolution.x, resolution.y));
        }
        for (name, value) in [
            ("film_width", film_width),
            ("focal_length", focal_length),
            ("f_number", f_number),
            ("focus_distance", focus_distance),
        ] {
            // Written to also reject NaN
            if !(value > 0.0) {
                return Err(CameraError::NonPositive { name, value });
            }
        }

        let pixel_scale = film_width / (resolution.x as FloatType);
        let resolution_minus_one = ScreenSize::new(resolution.x - 1, resolution.y - 1);
        let film_origin_uv = resolution_minus_one.cast::<FloatType>() * pixel_scale / 2.0;
        let film_origin_offset = -forward.as_ref() * focal_length
            + right.as_ref() * film_origin_uv.x
            - up.as_ref() * film_origin_uv.y;

        Ok(Camera {
            center,

            resolution,

            up,
            right,
            film_origin_offset,
            pixel_pitch: pixel_scale,
            lens_radius: focal_length / (2.0 * f_number),
            lens_weight: focal_length / focus_distance,
        })
    }
}

impl Camera {
    pub fn resolution(&self) -> ScreenSize {
        self.resolution
    }

    /// Samples a new ray from the camera for the given image pixel.
    pub fn sample_ray(&self, point: &ScreenPoint, rng: &mut impl rand::Rng) -> Ray {
        let film_u = point.x as FloatType + rng.random_range(-0.5..=0.5);
        let film_v = point.y as FloatType + rng.random_range(-0.5..=0.5);
        let film_point_offset = self.film_origin_offset
            + self.up.as_ref() * (film_v * self.pixel_pitch)
            - self.right.as_ref() * (film_u * self.pixel_pitch);

        let lens_uv: [FloatType; 2] = rand_distr::UnitDisc.sample(rng);
        let lens_vector = self.right.as_ref() * (self.lens_radius * lens_uv[0])
            + self.up.as_ref() * (self.lens_radius * lens_uv[1]);

        // Always has a positive component along the forward axis
        let direction = lens_vector * self.lens_weight - film_point_offset;

        Ray::new(self.center + lens_vector, direction)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert2::{assert, let_assert};
    use rand::{SeedableRng, rngs::SmallRng};

    fn pinhole() -> Result<Camera, CameraError> {
        // X goes right, Y goes away, Z goes up
        Camera::builder()
            .center(WorldPoint::new(0.0, 0.0, 0.0))
            .forward(WorldVector::new(0.0, 1.0, 0.0))
            .up(WorldVector::new(0.0, 0.0, 1.0))
            .resolution(ScreenSize::new(800, 600))
            .film_width(36e-3)
            .focal_length(50e-3)
            .f_number(FloatType::INFINITY)
            .focus_distance(2.0)
            .build()
    }

    #[test]
    fn left_right_up_down() {
        let_assert!(Ok(camera) = pinhole());
        let mut rng = SmallRng::seed_from_u64(0);

        let ray_center = camera.sample_ray(&ScreenPoint::new(400, 300), &mut rng);
        let ray_left = camera.sample_ray(&ScreenPoint::new(0, 300), &mut rng);
        let ray_right = camera.sample_ray(&ScreenPoint::new(799, 300), &mut rng);
        let ray_up = camera.sample_ray(&ScreenPoint::new(400, 0), &mut rng);
        let ray_down = camera.sample_ray(&ScreenPoint::new(400, 599), &mut rng);

        assert!(ray_center.direction.x.abs() < 1e-3);
        assert!(ray_center.direction.z.abs() < 1e-3);
        assert!(ray_left.direction.x < ray_center.direction.x);
        assert!(ray_right.direction.x > ray_center.direction.x);
        assert!(ray_up.direction.z > ray_center.direction.z);
        assert!(ray_down.direction.z < ray_center.direction.z);
    }

    #[test]
    fn pinhole_rays_start_at_center() {
        let_assert!(Ok(camera) = pinhole());
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..10 {
            let ray = camera.sample_ray(&ScreenPoint::new(10, 20), &mut rng);
            assert!(ray.origin == WorldPoint::origin());
            assert!(ray.direction.y > 0.0);
        }
    }

    #[test]
    fn parallel_up_and_forward() {
        let result = Camera::builder()
            .center(WorldPoint::origin())
            .forward(WorldVector::new(0.0, 0.0, 1.0))
            .up(WorldVector::new(0.0, 0.0, 2.0))
            .resolution(ScreenSize::new(8, 6))
            .film_width(36e-3)
            .focal_length(50e-3)
            .f_number(2.0)
            .focus_distance(2.0)
            .build();
        let_assert!(Err(CameraError::DegenerateOrientation) = result);
    }

    #[test]
    fn zero_resolution() {
        let result = Camera::builder()
            .center(WorldPoint::origin())
            .forward(WorldVector::new(0.0, 1.0, 0.0))
            .up(WorldVector::new(0.0, 0.0, 1.0))
            .resolution(ScreenSize::new(0, 6))
            .film_width(36e-3)
            .focal_length(50e-3)
            .f_number(2.0)
            .focus_distance(2.0)
            .build();
        let_assert!(Err(CameraError::EmptyResolution(0, 6)) = result);
    }

    #[test]
    fn negative_focal_length() {
        let result = Camera::builder()
            .center(WorldPoint::origin())
            .forward(WorldVector::new(0.0, 1.0, 0.0))
            .up(WorldVector::new(0.0, 0.0, 1.0))
            .resolution(ScreenSize::new(8, 6))
            .film_width(36e-3)
            .focal_length(-50e-3)
            .f_number(2.0)
            .focus_distance(2.0)
            .build();
        let_assert!(Err(CameraError::NonPositive { name: "focal_length", .. }) = result);
    }
}
