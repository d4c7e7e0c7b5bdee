mod machinery;
mod shading;
mod worker;

use std::num::NonZeroU32;

use crate::{geometry::WorldVector, util::Rgb};

pub use crate::renderer::machinery::{RenderProgress, render};
pub use crate::renderer::shading::{Environment, Shader, ShadingSettings};

#[derive(Copy, Clone, Debug)]
pub struct RenderSettings {
    pub tile_size: NonZeroU32,
    pub sample_count: NonZeroU32,
    pub shading: ShadingSettings,
}

/// Number of finished and total tiles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    pub finished: usize,
    pub total: usize,
}

/// Work done by all workers while rendering.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderCounters {
    pub rays: usize,
    pub hits: usize,
    pub nodes_visited: usize,
    pub triangles_tested: usize,
}

impl Progress {
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            100.0
        } else {
            100.0 * (self.finished as f32) / (self.total as f32)
        }
    }
}

/// Sky color of the default environment, depends only on the direction.
/// Vertical gradient from white straight down to light blue straight up, +Y is up.
pub fn background(direction: &WorldVector) -> Rgb {
    let t = 0.5 * (direction.normalize().y as f32 + 1.0);
    let below = Rgb::new(1.0, 1.0, 1.0);
    let above = Rgb::new(0.5, 0.7, 1.0);
    below * (1.0 - t) + above * t
}
