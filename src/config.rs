use std::{
    fs::File,
    io::BufReader,
    num::NonZeroU32,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    camera::{Camera, CameraError},
    geometry::{FloatType, ScreenSize, WorldPoint, WorldVector},
    renderer::{Environment, RenderSettings, ShadingSettings},
    scene::{BvhSettings, GeometryError, Mesh, ObjOpenError, Scene},
};

/// Everything needed to render an image, as read from a JSON file.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    /// Image width and height in pixels
    pub resolution: [u32; 2],
    #[serde(default = "default_tile_size")]
    pub tile_size: NonZeroU32,
    #[serde(default = "default_sample_count")]
    pub sample_count: NonZeroU32,
    pub camera: CameraConfig,
    #[serde(default)]
    pub bvh: BvhSettings,
    #[serde(default)]
    pub shading: ShadingSettings,
    /// Equirectangular environment image, the built in sky when missing.
    /// Relative paths are relative to the config file
    #[serde(default)]
    pub environment: Option<PathBuf>,
    /// OBJ files, relative paths are relative to the config file
    pub meshes: Vec<PathBuf>,
    /// Output PNG, relative paths are relative to the config file
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CameraConfig {
    pub center: [FloatType; 3],
    pub forward: [FloatType; 3],
    #[serde(default = "default_up")]
    pub up: [FloatType; 3],
    #[serde(default = "default_film_width")]
    pub film_width: FloatType,
    #[serde(default = "default_focal_length")]
    pub focal_length: FloatType,
    /// Missing means a pinhole camera
    #[serde(default)]
    pub f_number: Option<FloatType>,
    #[serde(default = "default_focus_distance")]
    pub focus_distance: FloatType,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to load mesh {path}: {source}")]
    Mesh { path: PathBuf, source: ObjOpenError },

    #[error(transparent)]
    Scene(#[from] GeometryError),

    #[error("Invalid camera: {0}")]
    Camera(#[from] CameraError),

    #[error("Failed to load environment {path}: {source}")]
    Environment {
        path: PathBuf,
        source: image::ImageError,
    },
}

fn default_tile_size() -> NonZeroU32 {
    NonZeroU32::new(64).unwrap_or(NonZeroU32::MIN)
}

fn default_sample_count() -> NonZeroU32 {
    NonZeroU32::new(16).unwrap_or(NonZeroU32::MIN)
}

fn default_output() -> PathBuf {
    PathBuf::from("render.png")
}

fn default_up() -> [FloatType; 3] {
    [0.0, 1.0, 0.0]
}

fn default_film_width() -> FloatType {
    36e-3
}

fn default_focal_length() -> FloatType {
    50e-3
}

fn default_focus_distance() -> FloatType {
    10.0
}

impl RenderConfig {
    /// Reads the config file and resolves the paths inside relative to its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<RenderConfig, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let config: RenderConfig = serde_json::from_reader(BufReader::new(file)).map_err(
            |source| ConfigError::Parse {
                path: path.to_owned(),
                source,
            },
        )?;
        log::trace!("Loaded config from {}", path.display());

        let base = path.parent().unwrap_or(Path::new(""));
        Ok(config.relative_to(base))
    }

    fn relative_to(mut self, base: &Path) -> RenderConfig {
        for mesh in &mut self.meshes {
            *mesh = base.join(&mesh);
        }
        self.output = base.join(&self.output);
        if let Some(environment) = &mut self.environment {
            *environment = base.join(&environment);
        }
        self
    }

    pub fn resolution(&self) -> ScreenSize {
        ScreenSize::new(self.resolution[0], self.resolution[1])
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            tile_size: self.tile_size,
            sample_count: self.sample_count,
            shading: self.shading,
        }
    }

    pub fn camera(&self) -> Result<Camera, ConfigError> {
        let c = &self.camera;
        Ok(Camera::builder()
            .center(WorldPoint::from(c.center))
            .forward(WorldVector::from(c.forward))
            .up(WorldVector::from(c.up))
            .resolution(self.resolution())
            .film_width(c.film_width)
            .focal_length(c.focal_length)
            .f_number(c.f_number.unwrap_or(FloatType::INFINITY))
            .focus_distance(c.focus_distance)
            .build()?)
    }

    pub fn environment(&self) -> Result<Environment, ConfigError> {
        match &self.environment {
            None => Ok(Environment::Sky),
            Some(path) => {
                log::info!("Loading environment {}", path.display());
                Environment::load(path).map_err(|source| ConfigError::Environment {
                    path: path.clone(),
                    source,
                })
            }
        }
    }

    /// Loads all meshes and builds their hierarchies.
    pub fn load_scene(&self) -> Result<Scene, ConfigError> {
        let meshes = self
            .meshes
            .iter()
            .map(|path| {
                log::info!("Loading {}", path.display());
                Mesh::with_obj(path, &self.bvh).map_err(|source| ConfigError::Mesh {
                    path: path.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Scene::new(meshes)?)
    }
}
