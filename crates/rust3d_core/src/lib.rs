//! Core types for the Rust3D renderer
//!
//! This crate turns mesh text into GPU-ready buffers:
//!
//! - [`Mesh`] - Interleaved position/normal vertices plus triangle indices
//! - [`VertexRecord`] - One deduplicated (position, normal) pair
//! - [`ObjLoader`] - Lenient parser for the `v` / `vn` / `f` text format
//! - [`AssetError`] - Failures reading mesh files from disk

mod asset_error;
mod mesh;
mod obj_loader;

pub use asset_error::AssetError;
pub use mesh::{Mesh, VertexRecord, FLOATS_PER_VERTEX};
pub use obj_loader::{DedupStrategy, ObjLoader, UNIT_CUBE_OBJ};

// Re-export commonly used types from rust3d_math for convenience
pub use rust3d_math::{Mat4, Vec3};
