//! Shader stages and linked programs
//!
//! A [`ShaderStage`] wraps one compiled vertex or fragment shader together
//! with the attribute and uniform declarations its author gave for it.
//! [`CompiledProgram::link`] consumes two stages, links them and resolves
//! every declared uniform to a backend location, so uniforms can afterwards
//! be set by name with [`Uniforms::set`].

use std::fmt;

use rust3d_math::{Mat4, Vec3};

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::RenderError;
use crate::gpu::{GraphicsApi, StageKind};
use crate::layout::VertexLayout;

/// Types a shader variable can have
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Mat4,
    Vec3,
}

impl VariableKind {
    /// Number of `f32` components
    pub fn components(self) -> u32 {
        match self {
            VariableKind::Mat4 => 16,
            VariableKind::Vec3 => 3,
        }
    }

    /// Bytes one value occupies in a uniform buffer (vec3 is padded to 16)
    pub fn uniform_size(self) -> u64 {
        match self {
            VariableKind::Mat4 => 64,
            VariableKind::Vec3 => 16,
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableKind::Mat4 => write!(f, "mat4"),
            VariableKind::Vec3 => write!(f, "vec3"),
        }
    }
}

/// A declared attribute or uniform
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderVariable {
    pub kind: VariableKind,
    pub name: String,
}

impl ShaderVariable {
    pub fn new(kind: VariableKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn mat4(name: impl Into<String>) -> Self {
        Self::new(VariableKind::Mat4, name)
    }

    pub fn vec3(name: impl Into<String>) -> Self {
        Self::new(VariableKind::Vec3, name)
    }
}

/// A value for a uniform upload
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Vec3(Vec3),
}

impl UniformValue {
    pub fn kind(&self) -> VariableKind {
        match self {
            UniformValue::Mat4(_) => VariableKind::Mat4,
            UniformValue::Vec3(_) => VariableKind::Vec3,
        }
    }
}

impl From<Mat4> for UniformValue {
    fn from(m: Mat4) -> Self {
        UniformValue::Mat4(m)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

/// Source text and declarations for a vertex/fragment pair
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
    /// Per-vertex inputs of the vertex stage
    pub attributes: Vec<ShaderVariable>,
    pub vertex_uniforms: Vec<ShaderVariable>,
    pub fragment_uniforms: Vec<ShaderVariable>,
}

impl ShaderSources {
    /// Model/view/projection transform with Phong lighting
    pub fn phong() -> Self {
        Self {
            vertex: include_str!("shaders/mesh.vert.wgsl").to_string(),
            fragment: include_str!("shaders/mesh.frag.wgsl").to_string(),
            attributes: vec![
                ShaderVariable::vec3("a_position"),
                ShaderVariable::vec3("a_normal"),
            ],
            vertex_uniforms: vec![
                ShaderVariable::mat4("u_model"),
                ShaderVariable::mat4("u_view"),
                ShaderVariable::mat4("u_projection"),
            ],
            fragment_uniforms: vec![
                ShaderVariable::vec3("u_light_position"),
                ShaderVariable::vec3("u_view_position"),
            ],
        }
    }

    /// Compile both stages, report their status and link them
    pub fn compile_program<G: GraphicsApi>(
        &self,
        api: &mut G,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<CompiledProgram<G>, RenderError> {
        let vertex = ShaderStage::compile(
            api,
            StageKind::Vertex,
            &self.vertex,
            self.attributes.clone(),
            self.vertex_uniforms.clone(),
        )?;
        let fragment = match ShaderStage::compile(
            api,
            StageKind::Fragment,
            &self.fragment,
            Vec::new(),
            self.fragment_uniforms.clone(),
        ) {
            Ok(stage) => stage,
            Err(e) => {
                vertex.delete(api);
                return Err(e);
            }
        };

        vertex.log_compile_status(api, sink);
        fragment.log_compile_status(api, sink);

        CompiledProgram::link(api, vertex, fragment, sink)
    }
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self::phong()
    }
}

/// One compiled shader stage and its declarations
pub struct ShaderStage<G: GraphicsApi> {
    handle: G::Shader,
    kind: StageKind,
    attributes: Vec<ShaderVariable>,
    uniforms: Vec<ShaderVariable>,
}

impl<G: GraphicsApi> ShaderStage<G> {
    /// Create a shader object, upload `source` and compile it
    ///
    /// Compilation failure is not an error here; check it with
    /// [`log_compile_status`](Self::log_compile_status).
    pub fn compile(
        api: &mut G,
        kind: StageKind,
        source: &str,
        attributes: Vec<ShaderVariable>,
        uniforms: Vec<ShaderVariable>,
    ) -> Result<Self, RenderError> {
        let handle = api.create_shader(kind)?;
        api.shader_source(handle, source);
        api.compile_shader(handle);
        Ok(Self {
            handle,
            kind,
            attributes,
            uniforms,
        })
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn handle(&self) -> G::Shader {
        self.handle
    }

    pub fn attributes(&self) -> &[ShaderVariable] {
        &self.attributes
    }

    pub fn uniforms(&self) -> &[ShaderVariable] {
        &self.uniforms
    }

    pub fn is_compiled(&self, api: &G) -> bool {
        api.shader_compile_status(self.handle)
    }

    /// Report a failed compile to `sink` and return whether it succeeded
    ///
    /// Emits exactly one diagnostic on failure and nothing on success.
    pub fn log_compile_status(&self, api: &G, sink: &mut dyn DiagnosticSink) -> bool {
        if api.shader_compile_status(self.handle) {
            return true;
        }
        sink.report(Diagnostic::StageCompile {
            stage: self.kind,
            log: api.shader_info_log(self.handle),
        });
        false
    }

    /// Release the shader object without linking it
    pub fn delete(self, api: &mut G) {
        api.delete_shader(self.handle);
    }
}

struct UniformBinding<G: GraphicsApi> {
    name: String,
    kind: VariableKind,
    location: Option<G::UniformLocation>,
}

impl<G: GraphicsApi> std::fmt::Debug for UniformBinding<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniformBinding")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("location", &self.location)
            .finish()
    }
}

/// Name-keyed uniform setters of a linked program
pub struct Uniforms<G: GraphicsApi> {
    bindings: Vec<UniformBinding<G>>,
}

impl<G: GraphicsApi> std::fmt::Debug for Uniforms<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uniforms")
            .field("bindings", &self.bindings)
            .finish()
    }
}

impl<G: GraphicsApi> Uniforms<G> {
    /// Upload `value` to the uniform called `name`
    ///
    /// Unknown names and kind mismatches are errors. A declared uniform the
    /// linker optimised away has no location and the upload is skipped.
    pub fn set(
        &self,
        api: &mut G,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> Result<(), RenderError> {
        let binding = self
            .bindings
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| RenderError::UnknownUniform(name.to_string()))?;

        let value = value.into();
        if value.kind() != binding.kind {
            return Err(RenderError::UniformKindMismatch {
                name: name.to_string(),
                expected: binding.kind,
                found: value.kind(),
            });
        }

        let Some(location) = &binding.location else {
            return Ok(());
        };
        match value {
            UniformValue::Mat4(m) => api.uniform_matrix_4_f32(location, &m),
            UniformValue::Vec3(v) => api.uniform_3_f32(location, v.x, v.y, v.z),
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.iter().any(|b| b.name == name)
    }

    pub fn kind(&self, name: &str) -> Option<VariableKind> {
        self.bindings.iter().find(|b| b.name == name).map(|b| b.kind)
    }

    /// Whether `name` resolved to a backend location
    pub fn is_active(&self, name: &str) -> bool {
        self.bindings
            .iter()
            .any(|b| b.name == name && b.location.is_some())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// A linked program with resolved uniform locations
pub struct CompiledProgram<G: GraphicsApi> {
    handle: G::Program,
    linked: bool,
    attributes: Vec<ShaderVariable>,
    uniforms: Uniforms<G>,
}

impl<G: GraphicsApi> std::fmt::Debug for CompiledProgram<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledProgram")
            .field("handle", &self.handle)
            .field("linked", &self.linked)
            .field("attributes", &self.attributes)
            .field("uniforms", &self.uniforms)
            .finish()
    }
}

impl<G: GraphicsApi> CompiledProgram<G> {
    /// Link a vertex and a fragment stage
    ///
    /// Both stages are consumed: they are detached and deleted once the
    /// program is linked. A link failure is reported to `sink` and the
    /// program is still returned; [`is_linked`](Self::is_linked) tells the
    /// caller whether it is usable.
    pub fn link(
        api: &mut G,
        vertex: ShaderStage<G>,
        fragment: ShaderStage<G>,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<Self, RenderError> {
        let checked = if vertex.kind != StageKind::Vertex {
            Err(RenderError::StageMismatch {
                expected: StageKind::Vertex,
                found: vertex.kind,
            })
        } else if fragment.kind != StageKind::Fragment {
            Err(RenderError::StageMismatch {
                expected: StageKind::Fragment,
                found: fragment.kind,
            })
        } else {
            merge_uniforms(&vertex.uniforms, &fragment.uniforms)
        };
        let declared = match checked {
            Ok(declared) => declared,
            Err(e) => {
                vertex.delete(api);
                fragment.delete(api);
                return Err(e);
            }
        };

        let program = match api.create_program() {
            Ok(program) => program,
            Err(e) => {
                vertex.delete(api);
                fragment.delete(api);
                return Err(e.into());
            }
        };

        api.attach_shader(program, vertex.handle);
        api.attach_shader(program, fragment.handle);
        api.link_program(program);
        api.detach_shader(program, vertex.handle);
        api.detach_shader(program, fragment.handle);

        let linked = api.program_link_status(program);
        if !linked {
            sink.report(Diagnostic::ProgramLink {
                log: api.program_info_log(program),
            });
        }

        let mut attributes = vertex.attributes;
        attributes.extend(fragment.attributes);
        api.delete_shader(vertex.handle);
        api.delete_shader(fragment.handle);

        let bindings = declared
            .into_iter()
            .map(|var| {
                let location = if linked {
                    api.get_uniform_location(program, &var.name)
                } else {
                    None
                };
                if linked && location.is_none() {
                    log::warn!("Uniform '{}' is declared but not active in the program", var.name);
                }
                UniformBinding {
                    name: var.name,
                    kind: var.kind,
                    location,
                }
            })
            .collect();

        log::debug!("Linked program {:?} (linked: {})", program, linked);
        Ok(Self {
            handle: program,
            linked,
            attributes,
            uniforms: Uniforms { bindings },
        })
    }

    pub fn handle(&self) -> G::Program {
        self.handle
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn attributes(&self) -> &[ShaderVariable] {
        &self.attributes
    }

    pub fn uniforms(&self) -> &Uniforms<G> {
        &self.uniforms
    }

    /// Make this the current program
    pub fn use_program(&self, api: &mut G) {
        api.use_program(Some(self.handle));
    }

    /// Point every declared attribute at its slice of the bound array buffer
    pub fn bind_attributes(&self, api: &mut G, layout: &VertexLayout) -> Result<(), RenderError> {
        layout.validate(&self.attributes)?;
        for attribute in &self.attributes {
            let entry = layout
                .attribute(&attribute.name)
                .ok_or_else(|| RenderError::InvalidLayout(format!("no entry for '{}'", attribute.name)))?;
            let location = api
                .get_attrib_location(self.handle, &attribute.name)
                .ok_or_else(|| RenderError::UnknownAttribute(attribute.name.clone()))?;
            api.enable_vertex_attrib_array(location);
            api.vertex_attrib_pointer_f32(location, entry.components, layout.stride(), entry.offset);
        }
        Ok(())
    }

    /// Disable the attribute slots [`bind_attributes`](Self::bind_attributes) enabled
    pub fn unbind_attributes(&self, api: &mut G) {
        for attribute in &self.attributes {
            if let Some(location) = api.get_attrib_location(self.handle, &attribute.name) {
                api.disable_vertex_attrib_array(location);
            }
        }
    }

    /// Release the program object
    pub fn delete(self, api: &mut G) {
        api.delete_program(self.handle);
    }
}

fn merge_uniforms(
    vertex: &[ShaderVariable],
    fragment: &[ShaderVariable],
) -> Result<Vec<ShaderVariable>, RenderError> {
    let mut merged: Vec<ShaderVariable> = Vec::with_capacity(vertex.len() + fragment.len());
    for var in vertex.iter().chain(fragment) {
        match merged.iter().find(|m| m.name == var.name) {
            Some(existing) if existing.kind == var.kind => {}
            Some(_) => return Err(RenderError::ConflictingUniform(var.name.clone())),
            None => merged.push(var.clone()),
        }
    }
    Ok(merged)
}
