//! In-memory GPU backend
//!
//! [`HeadlessApi`] implements [`GraphicsApi`] without a device. Objects live
//! in slot maps, shader sources are checked with [`reflect`](super::reflect),
//! and every draw, clear and uniform upload is recorded so tests can assert
//! on exactly what the renderer did.

use std::collections::{BTreeMap, HashMap};

use slotmap::SlotMap;

use rust3d_math::{Mat4, Vec3};

use super::reflect::{self, ProgramReflection, StageReflection};
use super::{
    AttribPointer, BufferKey, BufferTarget, ClearFlags, GraphicsApi, ProgramKey, ShaderKey,
    StageKind, UniformLocation,
};
use crate::error::GpuError;
use crate::shader::UniformValue;

struct HeadlessShader {
    kind: StageKind,
    source: String,
    compiled: bool,
    info_log: String,
    reflection: Option<StageReflection>,
}

#[derive(Default)]
struct HeadlessProgram {
    attached: Vec<ShaderKey>,
    linked: bool,
    info_log: String,
    reflection: ProgramReflection,
    uniforms: HashMap<u32, UniformValue>,
}

#[derive(Default)]
struct HeadlessBuffer {
    data: Vec<u8>,
}

#[derive(Clone, Copy, Debug, Default)]
struct AttribState {
    enabled: bool,
    pointer: Option<AttribPointer>,
}

/// One recorded indexed draw
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub program: ProgramKey,
    pub index_count: u32,
    pub depth_test: bool,
}

/// Viewport rectangle as last set
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Recording backend for tests and tooling
#[derive(Default)]
pub struct HeadlessApi {
    shaders: SlotMap<ShaderKey, HeadlessShader>,
    programs: SlotMap<ProgramKey, HeadlessProgram>,
    buffers: SlotMap<BufferKey, HeadlessBuffer>,

    array_binding: Option<BufferKey>,
    element_binding: Option<BufferKey>,
    current_program: Option<ProgramKey>,
    attributes: BTreeMap<u32, AttribState>,

    viewport: Viewport,
    clear_color: [f32; 4],
    depth_test: bool,

    draws: Vec<DrawCall>,
    clears: usize,
    clear_pending: bool,
    clear_only_frames: usize,
    handle_limit: Option<usize>,
}

impl HeadlessApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail object creation once `limit` objects are alive
    pub fn with_handle_limit(mut self, limit: usize) -> Self {
        self.handle_limit = Some(limit);
        self
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Shaders, programs and buffers still allocated
    pub fn live_handles(&self) -> usize {
        self.live_shaders() + self.live_programs() + self.live_buffers()
    }

    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn clear_count(&self) -> usize {
        self.clears
    }

    /// Frames that ended with a clear and no draw
    pub fn clear_only_frames(&self) -> usize {
        self.clear_only_frames
    }

    pub fn viewport_rect(&self) -> Viewport {
        self.viewport
    }

    pub fn clear_rgba(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn current_program(&self) -> Option<ProgramKey> {
        self.current_program
    }

    /// Last value uploaded to the uniform `name` of `program`
    pub fn uniform_value(&self, program: ProgramKey, name: &str) -> Option<UniformValue> {
        let program = self.programs.get(program)?;
        let slot = program.reflection.uniform(name)?;
        program.uniforms.get(&slot.binding).copied()
    }

    /// Pointer configured for an enabled attribute
    pub fn attrib_pointer(&self, index: u32) -> Option<AttribPointer> {
        self.attributes
            .get(&index)
            .filter(|a| a.enabled)
            .and_then(|a| a.pointer)
    }

    pub fn buffer_len(&self, buffer: BufferKey) -> Option<usize> {
        self.buffers.get(buffer).map(|b| b.data.len())
    }

    fn check_capacity(&self, kind: &'static str) -> Result<(), GpuError> {
        match self.handle_limit {
            Some(limit) if self.live_handles() >= limit => Err(GpuError::OutOfHandles(kind)),
            _ => Ok(()),
        }
    }

    fn binding(&self, target: BufferTarget) -> Option<BufferKey> {
        match target {
            BufferTarget::Array => self.array_binding,
            BufferTarget::ElementArray => self.element_binding,
        }
    }

    fn attached_stage(&self, attached: &[ShaderKey], kind: StageKind) -> Result<&StageReflection, String> {
        let mut found = attached
            .iter()
            .filter_map(|key| self.shaders.get(*key))
            .filter(|s| s.kind == kind);
        let shader = found
            .next()
            .ok_or_else(|| format!("error: no {} shader attached", kind))?;
        if found.next().is_some() {
            return Err(format!("error: more than one {} shader attached", kind));
        }
        match (&shader.reflection, shader.compiled) {
            (Some(reflection), true) => Ok(reflection),
            _ => Err(format!("error: {} shader is not compiled", kind)),
        }
    }

    fn link_attached(&self, attached: &[ShaderKey]) -> Result<ProgramReflection, String> {
        let vertex = self.attached_stage(attached, StageKind::Vertex)?;
        let fragment = self.attached_stage(attached, StageKind::Fragment)?;
        reflect::link_stages(vertex, fragment)
    }

    fn upload(&mut self, location: &UniformLocation, value: UniformValue) {
        if self.current_program != Some(location.program) {
            log::warn!("Uniform upload to {:?} while it is not the current program", location.program);
        }
        match self.programs.get_mut(location.program) {
            Some(program) => {
                program.uniforms.insert(location.binding, value);
            }
            None => log::warn!("Uniform upload to deleted program {:?}", location.program),
        }
    }
}

impl GraphicsApi for HeadlessApi {
    type Shader = ShaderKey;
    type Program = ProgramKey;
    type Buffer = BufferKey;
    type UniformLocation = UniformLocation;

    fn create_shader(&mut self, kind: StageKind) -> Result<ShaderKey, GpuError> {
        self.check_capacity("shader")?;
        Ok(self.shaders.insert(HeadlessShader {
            kind,
            source: String::new(),
            compiled: false,
            info_log: String::new(),
            reflection: None,
        }))
    }

    fn shader_source(&mut self, shader: ShaderKey, source: &str) {
        if let Some(s) = self.shaders.get_mut(shader) {
            s.source = source.to_string();
        }
    }

    fn compile_shader(&mut self, shader: ShaderKey) {
        let Some(s) = self.shaders.get_mut(shader) else {
            return;
        };
        match reflect::reflect_stage(&s.source, s.kind) {
            Ok(reflection) => {
                s.compiled = true;
                s.info_log.clear();
                s.reflection = Some(reflection);
            }
            Err(log) => {
                s.compiled = false;
                s.info_log = log;
                s.reflection = None;
            }
        }
    }

    fn shader_compile_status(&self, shader: ShaderKey) -> bool {
        self.shaders.get(shader).is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&self, shader: ShaderKey) -> String {
        self.shaders
            .get(shader)
            .map(|s| s.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderKey) {
        self.shaders.remove(shader);
    }

    fn create_program(&mut self) -> Result<ProgramKey, GpuError> {
        self.check_capacity("program")?;
        Ok(self.programs.insert(HeadlessProgram::default()))
    }

    fn attach_shader(&mut self, program: ProgramKey, shader: ShaderKey) {
        if let Some(p) = self.programs.get_mut(program) {
            if !p.attached.contains(&shader) {
                p.attached.push(shader);
            }
        }
    }

    fn detach_shader(&mut self, program: ProgramKey, shader: ShaderKey) {
        if let Some(p) = self.programs.get_mut(program) {
            p.attached.retain(|s| *s != shader);
        }
    }

    fn link_program(&mut self, program: ProgramKey) {
        let Some(attached) = self.programs.get(program).map(|p| p.attached.clone()) else {
            return;
        };
        let result = self.link_attached(&attached);
        if let Some(p) = self.programs.get_mut(program) {
            p.uniforms.clear();
            match result {
                Ok(reflection) => {
                    p.linked = true;
                    p.info_log.clear();
                    p.reflection = reflection;
                }
                Err(log) => {
                    p.linked = false;
                    p.info_log = log;
                    p.reflection = ProgramReflection::default();
                }
            }
        }
    }

    fn program_link_status(&self, program: ProgramKey) -> bool {
        self.programs.get(program).is_some_and(|p| p.linked)
    }

    fn program_info_log(&self, program: ProgramKey) -> String {
        self.programs
            .get(program)
            .map(|p| p.info_log.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<ProgramKey>) {
        self.current_program = program;
    }

    fn delete_program(&mut self, program: ProgramKey) {
        self.programs.remove(program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn create_buffer(&mut self) -> Result<BufferKey, GpuError> {
        self.check_capacity("buffer")?;
        Ok(self.buffers.insert(HeadlessBuffer::default()))
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferKey>) {
        match target {
            BufferTarget::Array => self.array_binding = buffer,
            BufferTarget::ElementArray => self.element_binding = buffer,
        }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]) {
        let bound = self.binding(target).and_then(|key| self.buffers.get_mut(key));
        match bound {
            Some(buffer) => buffer.data = data.to_vec(),
            None => log::warn!("buffer_data with no buffer bound to {:?}", target),
        }
    }

    fn delete_buffer(&mut self, buffer: BufferKey) {
        self.buffers.remove(buffer);
        if self.array_binding == Some(buffer) {
            self.array_binding = None;
        }
        if self.element_binding == Some(buffer) {
            self.element_binding = None;
        }
    }

    fn get_attrib_location(&self, program: ProgramKey, name: &str) -> Option<u32> {
        let p = self.programs.get(program).filter(|p| p.linked)?;
        p.reflection.attribute(name).map(|a| a.location)
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.attributes.entry(index).or_default().enabled = true;
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        if let Some(state) = self.attributes.get_mut(&index) {
            state.enabled = false;
        }
    }

    fn vertex_attrib_pointer_f32(&mut self, index: u32, size: u32, stride: u32, offset: u32) {
        if self.array_binding.is_none() {
            log::warn!("Attribute {} pointer set with no array buffer bound", index);
        }
        self.attributes.entry(index).or_default().pointer = Some(AttribPointer {
            size,
            stride,
            offset,
        });
    }

    fn get_uniform_location(&self, program: ProgramKey, name: &str) -> Option<UniformLocation> {
        let p = self.programs.get(program).filter(|p| p.linked)?;
        p.reflection.uniform(name).map(|u| UniformLocation {
            program,
            binding: u.binding,
        })
    }

    fn uniform_matrix_4_f32(&mut self, location: &UniformLocation, value: &Mat4) {
        self.upload(location, UniformValue::Mat4(*value));
    }

    fn uniform_3_f32(&mut self, location: &UniformLocation, x: f32, y: f32, z: f32) {
        self.upload(location, UniformValue::Vec3(Vec3::new(x, y, z)));
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = Viewport { x, y, width, height };
    }

    fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.clear_color = [r, g, b, a];
    }

    fn clear(&mut self, mask: ClearFlags) {
        if !mask.is_empty() {
            self.clears += 1;
            self.clear_pending = true;
        }
    }

    fn enable_depth_test(&mut self) {
        self.depth_test = true;
    }

    fn draw_indexed_triangles(&mut self, index_count: u32) -> Result<(), GpuError> {
        let program = self
            .current_program
            .ok_or_else(|| GpuError::InvalidOperation("no program in use".to_string()))?;
        if !self.program_link_status(program) {
            return Err(GpuError::InvalidOperation("current program is not linked".to_string()));
        }
        let elements = self
            .element_binding
            .and_then(|key| self.buffers.get(key))
            .ok_or_else(|| GpuError::InvalidOperation("no element buffer bound".to_string()))?;
        let needed = index_count as usize * std::mem::size_of::<u32>();
        if elements.data.len() < needed {
            return Err(GpuError::InvalidOperation(format!(
                "draw of {} indices reads past a {}-byte element buffer",
                index_count,
                elements.data.len()
            )));
        }

        self.draws.push(DrawCall {
            program,
            index_count,
            depth_test: self.depth_test,
        });
        self.clear_pending = false;
        Ok(())
    }

    fn finish_frame(&mut self) -> Result<(), GpuError> {
        if self.clear_pending {
            self.clear_pending = false;
            self.clear_only_frames += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::ShaderSources;

    fn compiled(api: &mut HeadlessApi, kind: StageKind, source: &str) -> ShaderKey {
        let shader = api.create_shader(kind).unwrap();
        api.shader_source(shader, source);
        api.compile_shader(shader);
        shader
    }

    fn linked_program(api: &mut HeadlessApi) -> ProgramKey {
        let sources = ShaderSources::phong();
        let vs = compiled(api, StageKind::Vertex, &sources.vertex);
        let fs = compiled(api, StageKind::Fragment, &sources.fragment);
        let program = api.create_program().unwrap();
        api.attach_shader(program, vs);
        api.attach_shader(program, fs);
        api.link_program(program);
        program
    }

    #[test]
    fn test_compile_valid_source() {
        let mut api = HeadlessApi::new();
        let shader = compiled(&mut api, StageKind::Vertex, &ShaderSources::phong().vertex);
        assert!(api.shader_compile_status(shader));
        assert!(api.shader_info_log(shader).is_empty());
    }

    #[test]
    fn test_compile_error_sets_log() {
        let mut api = HeadlessApi::new();
        let shader = compiled(&mut api, StageKind::Vertex, "fn main() {}");
        assert!(!api.shader_compile_status(shader));
        assert!(api.shader_info_log(shader).contains("vs_main"));
    }

    #[test]
    fn test_link_requires_both_stages() {
        let mut api = HeadlessApi::new();
        let vs = compiled(&mut api, StageKind::Vertex, &ShaderSources::phong().vertex);
        let program = api.create_program().unwrap();
        api.attach_shader(program, vs);
        api.link_program(program);
        assert!(!api.program_link_status(program));
        assert!(api.program_info_log(program).contains("no fragment shader"));
    }

    #[test]
    fn test_locations_after_link() {
        let mut api = HeadlessApi::new();
        let program = linked_program(&mut api);
        assert!(api.program_link_status(program));
        assert_eq!(api.get_attrib_location(program, "a_position"), Some(0));
        assert_eq!(api.get_attrib_location(program, "a_color"), None);
        let loc = api.get_uniform_location(program, "u_projection").unwrap();
        assert_eq!(loc.binding, 2);
    }

    #[test]
    fn test_draw_requires_element_buffer() {
        let mut api = HeadlessApi::new();
        let program = linked_program(&mut api);
        api.use_program(Some(program));
        assert!(api.draw_indexed_triangles(3).is_err());

        let indices = api.create_buffer().unwrap();
        api.bind_buffer(BufferTarget::ElementArray, Some(indices));
        api.buffer_data(BufferTarget::ElementArray, bytemuck::cast_slice(&[0u32, 1, 2]));
        api.draw_indexed_triangles(3).unwrap();
        assert!(api.draw_indexed_triangles(6).is_err());
        assert_eq!(api.draw_calls().len(), 1);
    }

    #[test]
    fn test_delete_unbinds() {
        let mut api = HeadlessApi::new();
        let buffer = api.create_buffer().unwrap();
        api.bind_buffer(BufferTarget::Array, Some(buffer));
        api.delete_buffer(buffer);
        assert_eq!(api.live_buffers(), 0);
        assert_eq!(api.binding(BufferTarget::Array), None);
    }

    #[test]
    fn test_handle_limit() {
        let mut api = HeadlessApi::new().with_handle_limit(2);
        api.create_buffer().unwrap();
        api.create_shader(StageKind::Vertex).unwrap();
        assert_eq!(api.create_program(), Err(GpuError::OutOfHandles("program")));
    }

    #[test]
    fn test_uniform_upload_recorded() {
        let mut api = HeadlessApi::new();
        let program = linked_program(&mut api);
        api.use_program(Some(program));
        let loc = api.get_uniform_location(program, "u_model").unwrap();
        let m = rust3d_math::mat4::translate(1.0, 2.0, 3.0);
        api.uniform_matrix_4_f32(&loc, &m);
        assert_eq!(api.uniform_value(program, "u_model"), Some(UniformValue::Mat4(m)));
        assert_eq!(api.uniform_value(program, "u_view"), None);
    }

    #[test]
    fn test_disable_hides_pointer() {
        let mut api = HeadlessApi::new();
        api.enable_vertex_attrib_array(0);
        api.vertex_attrib_pointer_f32(0, 3, 24, 0);
        assert!(api.attrib_pointer(0).is_some());
        api.disable_vertex_attrib_array(0);
        api.disable_vertex_attrib_array(7);
        assert_eq!(api.attrib_pointer(0), None);
    }

    #[test]
    fn test_finish_frame_counts_undrawn_clears() {
        let mut api = HeadlessApi::new();
        api.finish_frame().unwrap();
        assert_eq!(api.clear_only_frames(), 0);

        api.clear(ClearFlags::COLOR | ClearFlags::DEPTH);
        api.finish_frame().unwrap();
        api.finish_frame().unwrap();
        assert_eq!(api.clear_only_frames(), 1);

        let program = linked_program(&mut api);
        api.use_program(Some(program));
        let indices = api.create_buffer().unwrap();
        api.bind_buffer(BufferTarget::ElementArray, Some(indices));
        api.buffer_data(BufferTarget::ElementArray, bytemuck::cast_slice(&[0u32, 1, 2]));
        api.clear(ClearFlags::COLOR);
        api.draw_indexed_triangles(3).unwrap();
        api.finish_frame().unwrap();
        assert_eq!(api.clear_only_frames(), 1);
    }
}
