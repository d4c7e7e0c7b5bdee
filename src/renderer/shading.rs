use std::{f64::consts::PI, num::NonZeroU32, path::Path};

use image::Rgb32FImage;
use nalgebra::Unit;
use rand::Rng;
use rand_distr::{Distribution as _, UnitSphere};
use serde::Deserialize;

use crate::{
    geometry::{FloatType, Ray, WorldPoint, WorldVector},
    renderer::background,
    scene::{Scene, TraversalStack},
    util::Rgb,
};

const FRESNEL_FALLOFF: FloatType = 10.0;
const BASE_REFLECTANCE: FloatType = 0.1;

/// Light transport parameters.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShadingSettings {
    /// Depth of indirect lighting, 0 means direct light only.
    pub bounces: u32,
    /// Rays sent out at each indirect bounce.
    pub scatters: NonZeroU32,
    /// Divides light coming from other surfaces, together with the squared distance.
    pub inverse_square_constant: FloatType,
    /// Blur of specular reflections, 0 is a perfect mirror.
    pub specular_spread: FloatType,
    /// Multiplies environment texels that are clipped to white.
    /// In low dynamic range maps these stand for the sun.
    pub saturated_boost: f32,
}

impl Default for ShadingSettings {
    fn default() -> Self {
        ShadingSettings {
            bounces: 0,
            scatters: NonZeroU32::MIN,
            inverse_square_constant: 1.0,
            specular_spread: 0.2,
            saturated_boost: 8.0,
        }
    }
}

/// Light arriving from infinitely far away, seen by rays that leave the scene.
#[derive(Clone, Debug, Default)]
pub enum Environment {
    /// The built in sky gradient.
    #[default]
    Sky,
    /// Equirectangular (latitude-longitude) map, +Y up. The left edge is +X,
    /// continuing through -Z.
    Image(Rgb32FImage),
}

impl Environment {
    pub fn load(path: impl AsRef<Path>) -> Result<Environment, image::ImageError> {
        let path = path.as_ref();
        let image = image::open(path)?.into_rgb32f();
        log::debug!(
            "Loaded {}x{} environment from {}",
            image.width(),
            image.height(),
            path.display()
        );
        Ok(Environment::Image(image))
    }

    /// Color of the environment in the given direction.
    pub fn radiance(&self, direction: &WorldVector) -> Rgb {
        match self {
            Environment::Sky => background(direction),
            Environment::Image(image) => {
                let pixel = image.get_pixel(
                    lat_long_coordinate(longitude(direction) / (2.0 * PI), image.width()),
                    lat_long_coordinate(polar_angle(direction) / PI, image.height()),
                );
                Rgb::new(pixel[0], pixel[1], pixel[2])
            }
        }
    }

    /// Light arriving from the given direction, used for illuminating surfaces.
    fn light(&self, direction: &WorldVector, saturated_boost: f32) -> Rgb {
        let color = self.radiance(direction);
        match self {
            Environment::Image(_) if color.r >= 1.0 && color.g >= 1.0 && color.b >= 1.0 => {
                color * saturated_boost
            }
            _ => color,
        }
    }
}

/// Angle around the vertical axis, counter clockwise from +X when looking down, in [0, 2pi).
fn longitude(direction: &WorldVector) -> FloatType {
    let angle = (-direction.z).atan2(direction.x);
    if angle < 0.0 { angle + 2.0 * PI } else { angle }
}

/// Angle from +Y, in [0, pi].
fn polar_angle(direction: &WorldVector) -> FloatType {
    (direction.y / direction.norm()).clamp(-1.0, 1.0).acos()
}

fn lat_long_coordinate(fraction: FloatType, size: u32) -> u32 {
    ((fraction * size as FloatType) as u32).min(size.saturating_sub(1))
}

/// Probability of a specular bounce, depends on how much the surface faces the ray.
fn fresnel_weight(cos: FloatType) -> FloatType {
    ((-FRESNEL_FALLOFF * cos).exp2() + BASE_REFLECTANCE) / (1.0 + BASE_REFLECTANCE)
}

fn diffuse_scatter(normal: &Unit<WorldVector>, rng: &mut impl Rng) -> Unit<WorldVector> {
    let sample: [FloatType; 3] = UnitSphere.sample(rng);
    let direction = WorldVector::from(sample);
    if direction.dot(normal.as_ref()) < 0.0 {
        Unit::new_normalize(-direction)
    } else {
        Unit::new_normalize(direction)
    }
}

fn specular_scatter(
    incoming: &Unit<WorldVector>,
    normal: &Unit<WorldVector>,
    spread: FloatType,
    rng: &mut impl Rng,
) -> Unit<WorldVector> {
    let reflected = incoming.as_ref() - normal.as_ref() * (2.0 * incoming.dot(normal.as_ref()));
    let jitter: [FloatType; 3] = UnitSphere.sample(rng);
    let jitter = WorldVector::from(jitter) * spread;
    Unit::try_new(reflected + jitter, crate::geometry::EPSILON)
        .unwrap_or_else(|| Unit::new_normalize(reflected))
}

/// Normal flipped to the side the ray came from.
fn facing(normal: &Unit<WorldVector>, incoming: &Unit<WorldVector>) -> Unit<WorldVector> {
    if normal.dot(incoming.as_ref()) > 0.0 {
        Unit::new_unchecked(-normal.into_inner())
    } else {
        *normal
    }
}

/// Estimates the light carried back along camera rays.
/// All surfaces are white, light comes only from the environment.
pub struct Shader<'a> {
    pub scene: &'a Scene,
    pub environment: &'a Environment,
    pub settings: &'a ShadingSettings,
}

impl Shader<'_> {
    /// Color seen along a camera ray, and whether the ray hit a surface.
    pub fn sample(
        &self,
        ray: &Ray,
        rng: &mut impl Rng,
        stack: &mut TraversalStack,
    ) -> (Rgb, bool) {
        let Some(hit) = self.scene.intersect(ray, stack) else {
            return (self.environment.radiance(&ray.direction), false);
        };

        let normal = facing(&hit.normal, &ray.direction);
        let scatter = self.scatter(&ray.direction, &normal, rng);
        let cos = normal.dot(scatter.as_ref()).abs() as f32;

        let mut color = Rgb::new(0.0, 0.0, 0.0);
        if !self.is_occluded(&hit.point, &scatter, stack) {
            color += self.environment.light(&scatter, self.settings.saturated_boost) * cos;
        }
        color += self.indirect(&hit.point, &normal, &ray.direction, 0, rng, stack) * cos;
        (color, true)
    }

    fn scatter(
        &self,
        incoming: &Unit<WorldVector>,
        normal: &Unit<WorldVector>,
        rng: &mut impl Rng,
    ) -> Unit<WorldVector> {
        let cos = incoming.dot(normal.as_ref()).abs();
        if rng.random::<FloatType>() > fresnel_weight(cos) {
            diffuse_scatter(normal, rng)
        } else {
            specular_scatter(incoming, normal, self.settings.specular_spread, rng)
        }
    }

    fn is_occluded(
        &self,
        point: &WorldPoint,
        direction: &Unit<WorldVector>,
        stack: &mut TraversalStack,
    ) -> bool {
        // Hits of the surface the point lies on are closer than EPSILON and get rejected
        let ray = Ray::new(*point, direction.into_inner());
        self.scene.intersect(&ray, stack).is_some()
    }

    /// Light reflected towards `point` by other surfaces.
    fn indirect(
        &self,
        point: &WorldPoint,
        normal: &Unit<WorldVector>,
        incoming: &Unit<WorldVector>,
        depth: u32,
        rng: &mut impl Rng,
        stack: &mut TraversalStack,
    ) -> Rgb {
        let mut total = Rgb::new(0.0, 0.0, 0.0);
        if depth >= self.settings.bounces {
            return total;
        }

        let scatters = self.settings.scatters.get();
        for _ in 0..scatters {
            let direction = self.scatter(incoming, normal, rng);
            let ray = Ray::new(*point, direction.into_inner());
            let Some(hit) = self.scene.intersect(&ray, stack) else {
                continue;
            };

            let hit_normal = facing(&hit.normal, &direction);
            let sun = diffuse_scatter(&hit_normal, rng);
            let mut received = Rgb::new(0.0, 0.0, 0.0);
            if !self.is_occluded(&hit.point, &sun, stack) {
                received += self.environment.light(&sun, self.settings.saturated_boost)
                    * (hit_normal.dot(sun.as_ref()).abs() as f32);
            }
            received += self.indirect(&hit.point, &hit_normal, &direction, depth + 1, rng, stack);

            let distance = hit.t + 1.0;
            let lambert = normal.dot(direction.as_ref()).abs();
            total += received
                * (lambert / (self.settings.inverse_square_constant * distance * distance)) as f32;
        }

        total * (1.0 / scatters as f32)
    }
}
