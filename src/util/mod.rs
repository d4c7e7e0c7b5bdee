mod stats;

pub use stats::Stats;

/// Linear color, components nominally in 0-1.
pub type Rgb = rgb::RGB<f32>;
