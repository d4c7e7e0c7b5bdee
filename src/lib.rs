mod camera;
pub mod config;
pub mod geometry;
mod renderer;
pub mod scene;
mod screen_block;
mod util;

pub use crate::renderer::{
    Environment, Progress, RenderCounters, RenderProgress, RenderSettings, Shader,
    ShadingSettings, background, render,
};
pub use camera::{Camera, CameraError};
pub use config::{ConfigError, RenderConfig};
pub use scene::{GeometryError, Mesh, Scene};
pub use util::{Rgb, Stats};
