//! 3D Rendering Library
//!
//! This crate drives a retained-mode GPU API to draw one lit mesh per frame.
//!
//! ## Key Components
//!
//! - [`gpu::GraphicsApi`] - The fixed set of GPU calls the renderer relies on
//! - [`gpu::HeadlessApi`] - In-memory backend that records every call
//! - [`gpu::WgpuApi`] - wgpu backend rendering to a window surface
//! - [`shader::CompiledProgram`] - Linked program with typed uniform setters
//! - [`layout::VertexLayout`] - Stride/offset description of interleaved vertices
//! - [`controller::RenderController`] - Start/stop lifecycle and the frame loop
//!
//! The controller never talks to a window directly. It receives a
//! [`surface::DrawSurface`] and a [`scheduler::FrameScheduler`] from the
//! host, so the same code runs under winit or under a test harness.

pub mod context;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod gpu;
pub mod layout;
pub mod scheduler;
pub mod shader;
pub mod surface;

pub use controller::{CameraSettings, ModelTransform, Projection, RenderController, RenderSettings};
pub use diagnostics::{Diagnostic, DiagnosticSink, LogSink};
pub use error::{GpuError, RenderError};
pub use gpu::{GraphicsApi, HeadlessApi, WgpuApi};
pub use layout::VertexLayout;
pub use scheduler::{FrameHandle, FrameScheduler, ManualScheduler};
pub use shader::{CompiledProgram, ShaderSources, ShaderStage, ShaderVariable, UniformValue, VariableKind};
pub use surface::{DrawSurface, HeadlessSurface, ResizeWatch};

// Re-export core types for convenience
pub use rust3d_core::{DedupStrategy, Mesh, ObjLoader};
pub use rust3d_math::{Mat4, Vec3};
