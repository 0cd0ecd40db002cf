//! Rust3D application library
//!
//! Configuration loading and the winit systems the `rust3d` binary is built
//! from. Rendering itself lives in `rust3d_render`.

pub mod config;
pub mod systems;
