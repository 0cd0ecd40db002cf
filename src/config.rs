//! Application configuration
//!
//! Configuration is loaded from multiple sources with the following priority (lowest to highest):
//! 1. `config/default.toml` (version controlled)
//! 2. `config/user.toml` (gitignored, user overrides)
//! 3. Environment variables (`R3D_SECTION__KEY`)

use figment::{Figment, providers::{Format, Toml, Env}};
use serde::{Serialize, Deserialize};
use std::path::Path;

use rust3d_render::{CameraSettings, ModelTransform, Projection, RenderSettings, Vec3};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub scene: SceneConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub lighting: LightingConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

impl AppConfig {
    /// Load configuration from default locations
    ///
    /// Priority (lowest to highest):
    /// 1. `config/default.toml`
    /// 2. `config/user.toml`
    /// 3. Environment variables (`R3D_*`)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific config directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        let mut figment = Figment::new();

        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }

        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // R3D_CAMERA__FOV=60 -> camera.fov = 60
        figment = figment.merge(Env::prefixed("R3D_").split("__"));

        figment.extract().map_err(ConfigError::from)
    }

    /// Build render settings around the given mesh text
    ///
    /// Angles are converted from degrees. Shaders and the vertex layout keep
    /// their built-in defaults.
    pub fn render_settings(&self, mesh_source: String) -> RenderSettings {
        RenderSettings {
            mesh_source,
            camera: self.camera.to_camera_settings(),
            model: self.model.to_model_transform(),
            light_position: Vec3::from(self.lighting.light_position),
            clear_color: self.lighting.clear_color,
            ..RenderSettings::default()
        }
    }
}

/// Window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    pub title: String,
    /// Window width in pixels
    pub width: u32,
    /// Window height in pixels
    pub height: u32,
    /// Start in fullscreen mode
    pub fullscreen: bool,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Rust3D".to_string(),
            width: 1280,
            height: 720,
            fullscreen: false,
            vsync: true,
        }
    }
}

/// Scene configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Mesh file in the `v` / `vn` / `f` text format
    pub mesh_path: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            mesh_path: "assets/cube.obj".to_string(),
        }
    }
}

/// Projection kind as written in config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionKind {
    #[default]
    Perspective,
    Orthographic,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub eye: [f32; 3],
    pub target: [f32; 3],
    pub up: [f32; 3],
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub projection: ProjectionKind,
    /// Visible height for the orthographic projection
    pub ortho_height: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            eye: [2.0, 2.0, 3.0],
            target: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
            fov: 45.0,
            near: 0.1,
            far: 100.0,
            projection: ProjectionKind::Perspective,
            ortho_height: 2.0,
        }
    }
}

impl CameraConfig {
    pub fn to_camera_settings(&self) -> CameraSettings {
        let projection = match self.projection {
            ProjectionKind::Perspective => Projection::Perspective {
                fov_y: self.fov.to_radians(),
            },
            ProjectionKind::Orthographic => Projection::Orthographic {
                height: self.ortho_height,
            },
        };
        CameraSettings {
            eye: Vec3::from(self.eye),
            target: Vec3::from(self.target),
            up: Vec3::from(self.up),
            projection,
            near: self.near,
            far: self.far,
        }
    }
}

/// Lighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightingConfig {
    /// World-space point light position
    pub light_position: [f32; 3],
    /// Background color [r, g, b, a]
    pub clear_color: [f32; 4],
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            light_position: [1.2, 1.0, 2.0],
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Model transform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub scale: [f32; 3],
    pub rotation_axis: [f32; 3],
    /// Degrees
    pub rotation_angle: f32,
    pub translation: [f32; 3],
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            scale: [1.0, 1.0, 1.0],
            rotation_axis: [0.0, 1.0, 0.0],
            rotation_angle: 0.0,
            translation: [0.0, 0.0, 0.0],
        }
    }
}

impl ModelConfig {
    pub fn to_model_transform(&self) -> ModelTransform {
        ModelTransform {
            scale: Vec3::from(self.scale),
            rotation_axis: Vec3::from(self.rotation_axis),
            rotation_angle: self.rotation_angle.to_radians(),
            translation: Vec3::from(self.translation),
        }
    }
}

/// Debug configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Configuration error
#[derive(Debug)]
pub struct ConfigError {
    message: String,
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError {
            message: e.to_string(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.camera.projection, ProjectionKind::Perspective);
        assert_eq!(config.scene.mesh_path, "assets/cube.obj");
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml = toml::to_string(&config).unwrap();
        assert!(toml.contains("title"));
        assert!(toml.contains("mesh_path"));
        assert!(toml.contains("projection = \"perspective\""));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [window]
            title = "Partial"
            width = 800
            height = 600
            fullscreen = false
            vsync = false
            "#,
        )
        .unwrap();
        assert_eq!(config.window.title, "Partial");
        assert_eq!(config.camera.fov, 45.0);
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn test_default_render_settings_match_renderer_defaults() {
        let settings = AppConfig::default().render_settings("v 0 0 0".to_string());
        let defaults = RenderSettings::default();
        assert_eq!(settings.mesh_source, "v 0 0 0");
        assert_eq!(settings.light_position, defaults.light_position);
        assert_eq!(settings.clear_color, defaults.clear_color);
        assert_eq!(settings.model, defaults.model);

        let Projection::Perspective { fov_y } = settings.camera.projection else {
            panic!("expected a perspective projection");
        };
        assert!((fov_y - std::f32::consts::FRAC_PI_4).abs() < EPSILON);
    }

    #[test]
    fn test_orthographic_projection() {
        let mut config = AppConfig::default();
        config.camera.projection = ProjectionKind::Orthographic;
        config.camera.ortho_height = 4.0;
        let camera = config.camera.to_camera_settings();
        assert_eq!(camera.projection, Projection::Orthographic { height: 4.0 });
    }

    #[test]
    fn test_model_angle_in_degrees() {
        let mut config = ModelConfig::default();
        config.rotation_angle = 90.0;
        let model = config.to_model_transform();
        assert!((model.rotation_angle - std::f32::consts::FRAC_PI_2).abs() < EPSILON);
    }
}
