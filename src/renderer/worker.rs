use image::RgbaImage;
use rand::{SeedableRng, rngs::SmallRng};

use crate::{
    camera::Camera,
    geometry::{ScreenBlock, ScreenPoint},
    renderer::{Environment, RenderCounters, RenderSettings, Shader},
    scene::{Scene, TraversalStack},
    screen_block::ScreenBlockExt as _,
    util::Rgb,
};

pub struct Worker {
    rng: SmallRng,
    stack: TraversalStack,
    rays: usize,
    hits: usize,
}

impl Worker {
    pub fn new(worker_id: usize) -> Self {
        log::trace!("Starting worker {worker_id}");
        Self {
            rng: SmallRng::from_os_rng(),
            stack: TraversalStack::new(),
            rays: 0,
            hits: 0,
        }
    }

    pub fn render_tile(
        &mut self,
        scene: &Scene,
        environment: &Environment,
        camera: &Camera,
        settings: &RenderSettings,
        tile: &ScreenBlock,
        buffer: &mut RgbaImage,
    ) {
        let shader = Shader {
            scene,
            environment,
            settings: &settings.shading,
        };
        for point in tile.internal_points() {
            let mut pixel_sum = Rgb::new(0.0, 0.0, 0.0);
            for _i in 0..settings.sample_count.get() {
                pixel_sum += self.render_sample(&shader, camera, &point);
            }
            let pixel = pixel_sum * (1.0 / settings.sample_count.get() as f32);

            let buffer_position = point - tile.min;
            buffer.put_pixel(buffer_position.x, buffer_position.y, color_to_image(pixel));
        }
    }

    fn render_sample(&mut self, shader: &Shader, camera: &Camera, point: &ScreenPoint) -> Rgb {
        let ray = camera.sample_ray(point, &mut self.rng);
        self.rays += 1;

        let (color, hit) = shader.sample(&ray, &mut self.rng, &mut self.stack);
        if hit {
            self.hits += 1;
        }
        color
    }

    pub fn add_counters_to(&self, counters: &mut RenderCounters) {
        let traversal = self.stack.counters();
        counters.rays += self.rays;
        counters.hits += self.hits;
        counters.nodes_visited += traversal.nodes_visited;
        counters.triangles_tested += traversal.triangles_tested;
    }
}

/// Maps a 0-1 f32 color to an opaque 8 bit pixel, clamping overexposed values.
pub fn color_to_image(color: Rgb) -> image::Rgba<u8> {
    let channel = |c: f32| (c * 255.0).round().clamp(0.0, 255.0) as u8;
    image::Rgba([channel(color.r), channel(color.g), channel(color.b), 255])
}
