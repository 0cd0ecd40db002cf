//! 3D Mathematics Library
//!
//! This crate provides the vector and matrix types used by the Rust3D renderer.
//!
//! ## Core Types
//!
//! - [`Vec3`] - 3D vector with x, y, z components
//! - [`Mat4`] - 4x4 column-major matrix for affine and projective transforms
//!
//! All matrix constructors live in the [`mat4`] module as free functions. They
//! never mutate their inputs; every call returns a fresh matrix.

mod vec3;
pub mod mat4;

pub use vec3::{cross, dot, normalize, subtract, Vec3};
pub use mat4::Mat4;
