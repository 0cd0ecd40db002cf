//! Integration tests for configuration loading
//!
//! Tests that verify config loading from files and environment variables.

use rust3d::config::{AppConfig, ProjectionKind};
use rust3d_core::ObjLoader;
use rust3d_render::Projection;
use serial_test::serial;

#[test]
#[serial]
fn test_env_override() {
    std::env::set_var("R3D_WINDOW__TITLE", "Test From Env");
    let config = AppConfig::load().unwrap();
    std::env::remove_var("R3D_WINDOW__TITLE");
    assert_eq!(config.window.title, "Test From Env");
}

#[test]
#[serial]
fn test_env_override_projection() {
    std::env::set_var("R3D_CAMERA__PROJECTION", "orthographic");
    std::env::set_var("R3D_CAMERA__ORTHO_HEIGHT", "5.0");
    let config = AppConfig::load().unwrap();
    std::env::remove_var("R3D_CAMERA__PROJECTION");
    std::env::remove_var("R3D_CAMERA__ORTHO_HEIGHT");

    assert_eq!(config.camera.projection, ProjectionKind::Orthographic);
    let settings = config.render_settings(String::new());
    assert_eq!(settings.camera.projection, Projection::Orthographic { height: 5.0 });
}

#[test]
#[serial]
fn test_default_file_loading() {
    let config = AppConfig::load().unwrap();
    assert_eq!(config.scene.mesh_path, "assets/cube.obj");
    assert_eq!(config.model.rotation_angle, 30.0);
}

#[test]
#[serial]
fn test_missing_config_dir_uses_defaults() {
    let config = AppConfig::load_from("does/not/exist").unwrap();
    assert_eq!(config.window.width, 1280);
    assert_eq!(config.debug.log_level, "info");
}

#[test]
fn test_default_toml_round_trips_through_toml() {
    let text = std::fs::read_to_string("config/default.toml").unwrap();
    let config: AppConfig = toml::from_str(&text).unwrap();
    let back = toml::to_string(&config).unwrap();
    assert!(back.contains("mesh_path = \"assets/cube.obj\""));
}

#[test]
fn test_bundled_mesh_is_a_cube() {
    let mesh = ObjLoader::new().load_file("assets/cube.obj").unwrap();
    assert_eq!(mesh.vertex_count(), 24);
    assert_eq!(mesh.triangle_count(), 12);
}
