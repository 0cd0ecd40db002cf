//! GPU API abstraction
//!
//! [`GraphicsApi`] is the complete set of calls the renderer makes against the
//! GPU: shader objects, programs, buffers, vertex attributes, uniforms and a
//! handful of frame operations. It follows the classic retained-mode model:
//! objects are created and referred to by handle, and buffer/program bindings
//! are global state that later calls read.
//!
//! Shader sources are WGSL. Each backend discovers a stage's attribute and
//! uniform slots with [`reflect`].

pub mod headless;
pub mod reflect;
pub mod wgpu_api;

use bitflags::bitflags;
use slotmap::new_key_type;

use rust3d_math::Mat4;

use crate::error::GpuError;

pub use headless::HeadlessApi;
pub use wgpu_api::WgpuApi;

new_key_type! {
    /// Handle to a shader stage object
    pub struct ShaderKey;
    /// Handle to a program object
    pub struct ProgramKey;
    /// Handle to a buffer object
    pub struct BufferKey;
}

/// Pipeline stage a shader object compiles for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    /// Entry point function every stage of this kind must define
    pub fn entry_point(self) -> &'static str {
        match self {
            StageKind::Vertex => "vs_main",
            StageKind::Fragment => "fs_main",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageKind::Vertex => write!(f, "vertex"),
            StageKind::Fragment => write!(f, "fragment"),
        }
    }
}

/// Buffer binding point
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Per-vertex data read through attribute pointers
    Array,
    /// `u32` triangle indices
    ElementArray,
}

bitflags! {
    /// Which framebuffer planes a clear resets
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

/// Float attribute pointer configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AttribPointer {
    /// Components per vertex (1-4)
    pub size: u32,
    /// Bytes between consecutive vertices
    pub stride: u32,
    /// Byte offset of the first component
    pub offset: u32,
}

/// Handle to one uniform slot of a linked program
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub program: ProgramKey,
    pub binding: u32,
}

/// The GPU operations the renderer consumes
///
/// Compile and link never fail loudly: callers query
/// [`shader_compile_status`](GraphicsApi::shader_compile_status) and
/// [`program_link_status`](GraphicsApi::program_link_status) and read the
/// info logs. Only object creation and drawing return errors.
pub trait GraphicsApi {
    type Shader: Copy + Eq + std::fmt::Debug;
    type Program: Copy + Eq + std::fmt::Debug;
    type Buffer: Copy + Eq + std::fmt::Debug;
    type UniformLocation: Clone + std::fmt::Debug;

    // Shader stages
    fn create_shader(&mut self, kind: StageKind) -> Result<Self::Shader, GpuError>;
    fn shader_source(&mut self, shader: Self::Shader, source: &str);
    fn compile_shader(&mut self, shader: Self::Shader);
    fn shader_compile_status(&self, shader: Self::Shader) -> bool;
    fn shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&mut self, shader: Self::Shader);

    // Programs
    fn create_program(&mut self) -> Result<Self::Program, GpuError>;
    fn attach_shader(&mut self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&mut self, program: Self::Program, shader: Self::Shader);
    fn link_program(&mut self, program: Self::Program);
    fn program_link_status(&self, program: Self::Program) -> bool;
    fn program_info_log(&self, program: Self::Program) -> String;
    fn use_program(&mut self, program: Option<Self::Program>);
    fn delete_program(&mut self, program: Self::Program);

    // Buffers
    fn create_buffer(&mut self) -> Result<Self::Buffer, GpuError>;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<Self::Buffer>);
    /// Replace the contents of the buffer bound to `target`
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]);
    fn delete_buffer(&mut self, buffer: Self::Buffer);

    // Vertex attributes
    fn get_attrib_location(&self, program: Self::Program, name: &str) -> Option<u32>;
    fn enable_vertex_attrib_array(&mut self, index: u32);
    fn disable_vertex_attrib_array(&mut self, index: u32);
    /// Source attribute `index` from the bound array buffer
    fn vertex_attrib_pointer_f32(&mut self, index: u32, size: u32, stride: u32, offset: u32);

    // Uniforms (apply to the program the location belongs to)
    fn get_uniform_location(&self, program: Self::Program, name: &str) -> Option<Self::UniformLocation>;
    fn uniform_matrix_4_f32(&mut self, location: &Self::UniformLocation, value: &Mat4);
    fn uniform_3_f32(&mut self, location: &Self::UniformLocation, x: f32, y: f32, z: f32);

    // Frame
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32);
    fn clear(&mut self, mask: ClearFlags);
    fn enable_depth_test(&mut self);
    /// Draw `index_count` indices from the bound element buffer as triangles
    fn draw_indexed_triangles(&mut self, index_count: u32) -> Result<(), GpuError>;
    /// End the frame; a clear no draw consumed is submitted on its own
    fn finish_frame(&mut self) -> Result<(), GpuError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_points() {
        assert_eq!(StageKind::Vertex.entry_point(), "vs_main");
        assert_eq!(StageKind::Fragment.entry_point(), "fs_main");
    }

    #[test]
    fn test_clear_flags_combine() {
        let both = ClearFlags::COLOR | ClearFlags::DEPTH;
        assert!(both.contains(ClearFlags::COLOR));
        assert!(both.contains(ClearFlags::DEPTH));
        assert!(ClearFlags::default().is_empty());
    }

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::Vertex.to_string(), "vertex");
        assert_eq!(StageKind::Fragment.to_string(), "fragment");
    }
}
