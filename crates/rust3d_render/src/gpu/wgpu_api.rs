//! wgpu backend
//!
//! Maps the retained-mode call set of [`GraphicsApi`] onto wgpu:
//!
//! - compiling creates a shader module inside a validation error scope
//! - linking creates one uniform buffer per `@binding` and a bind group
//! - the render pipeline is built on the first draw from the recorded
//!   attribute pointers and depth state, then cached per program
//! - clears are remembered and applied as load operations of the next pass;
//!   a frame that ends without a draw submits a clear-only pass

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use slotmap::SlotMap;
use wgpu::util::DeviceExt;

use rust3d_math::Mat4;

use super::reflect::{self, ProgramReflection, StageReflection};
use super::{
    AttribPointer, BufferKey, BufferTarget, ClearFlags, GraphicsApi, ProgramKey, ShaderKey,
    StageKind, UniformLocation,
};
use crate::context::RenderContext;
use crate::error::GpuError;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

struct GpuShader {
    kind: StageKind,
    source: String,
    compiled: bool,
    info_log: String,
    module: Option<Arc<wgpu::ShaderModule>>,
    reflection: Option<StageReflection>,
}

/// GPU objects that exist once a program links
struct LinkedProgram {
    vertex: Arc<wgpu::ShaderModule>,
    fragment: Arc<wgpu::ShaderModule>,
    reflection: ProgramReflection,
    uniform_buffers: BTreeMap<u32, wgpu::Buffer>,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

#[derive(Default)]
struct GpuProgram {
    attached: Vec<ShaderKey>,
    info_log: String,
    linked: Option<LinkedProgram>,
}

#[derive(Default)]
struct GpuBuffer {
    buffer: Option<wgpu::Buffer>,
}

#[derive(Clone, Copy, Debug, Default)]
struct AttribState {
    enabled: bool,
    pointer: Option<AttribPointer>,
}

/// Render state a pipeline is specialised for
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    stride: u32,
    /// `(location, components, offset)` of every enabled attribute
    attributes: Vec<(u32, u32, u32)>,
    depth_test: bool,
}

struct DepthTarget {
    view: wgpu::TextureView,
    size: (u32, u32),
}

/// [`GraphicsApi`] over a wgpu device and window surface
pub struct WgpuApi {
    context: RenderContext,

    shaders: SlotMap<ShaderKey, GpuShader>,
    programs: SlotMap<ProgramKey, GpuProgram>,
    buffers: SlotMap<BufferKey, GpuBuffer>,

    array_binding: Option<BufferKey>,
    element_binding: Option<BufferKey>,
    current_program: Option<ProgramKey>,
    attributes: BTreeMap<u32, AttribState>,

    viewport: Option<(i32, i32, u32, u32)>,
    clear_color: wgpu::Color,
    pending_clear: ClearFlags,
    depth_test: bool,
    depth: Option<DepthTarget>,
}

impl WgpuApi {
    pub fn new(context: RenderContext) -> Self {
        Self {
            context,
            shaders: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            array_binding: None,
            element_binding: None,
            current_program: None,
            attributes: BTreeMap::new(),
            viewport: None,
            clear_color: wgpu::Color::BLACK,
            pending_clear: ClearFlags::empty(),
            depth_test: false,
            depth: None,
        }
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Reconfigure the swap chain for a new window size
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        self.context.resize(width, height);
    }

    /// Next swap-chain texture, or `None` when this frame should be skipped
    fn acquire_frame(&self) -> Result<Option<wgpu::SurfaceTexture>, GpuError> {
        match self.context.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated; reconfiguring and skipping frame");
                self.context.reconfigure();
                Ok(None)
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface texture timed out; skipping frame");
                Ok(None)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(GpuError::OutOfMemory),
            Err(e) => Err(GpuError::Surface(e.to_string())),
        }
    }

    /// Color and depth load operations for the pending clear
    fn load_ops(&self) -> (wgpu::LoadOp<wgpu::Color>, wgpu::LoadOp<f32>) {
        let color = if self.pending_clear.contains(ClearFlags::COLOR) {
            wgpu::LoadOp::Clear(self.clear_color)
        } else {
            wgpu::LoadOp::Load
        };
        let depth = if self.pending_clear.contains(ClearFlags::DEPTH) {
            wgpu::LoadOp::Clear(1.0)
        } else {
            wgpu::LoadOp::Load
        };
        (color, depth)
    }

    fn binding(&self, target: BufferTarget) -> Option<BufferKey> {
        match target {
            BufferTarget::Array => self.array_binding,
            BufferTarget::ElementArray => self.element_binding,
        }
    }

    fn attached_stage(&self, attached: &[ShaderKey], kind: StageKind) -> Result<&GpuShader, String> {
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
        if !shader.compiled {
            return Err(format!("error: {} shader is not compiled", kind));
        }
        Ok(shader)
    }

    fn link_attached(&self, attached: &[ShaderKey]) -> Result<LinkedProgram, String> {
        let vertex = self.attached_stage(attached, StageKind::Vertex)?;
        let fragment = self.attached_stage(attached, StageKind::Fragment)?;
        let (Some(vs_module), Some(vs_reflection), Some(fs_module), Some(fs_reflection)) = (
            &vertex.module,
            &vertex.reflection,
            &fragment.module,
            &fragment.reflection,
        ) else {
            return Err("error: attached shader has no module".to_string());
        };
        let reflection = reflect::link_stages(vs_reflection, fs_reflection)?;

        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let uniform_buffers: BTreeMap<u32, wgpu::Buffer> = reflection
            .uniforms
            .iter()
            .map(|slot| {
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(slot.name.as_str()),
                    size: slot.kind.uniform_size(),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                (slot.binding, buffer)
            })
            .collect();

        let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = reflection
            .uniforms
            .iter()
            .map(|slot| wgpu::BindGroupLayoutEntry {
                binding: slot.binding,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Program Bind Group Layout"),
            entries: &layout_entries,
        });

        let group_entries: Vec<wgpu::BindGroupEntry> = uniform_buffers
            .iter()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Program Bind Group"),
            layout: &bind_group_layout,
            entries: &group_entries,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(err.to_string());
        }

        Ok(LinkedProgram {
            vertex: Arc::clone(vs_module),
            fragment: Arc::clone(fs_module),
            reflection,
            uniform_buffers,
            bind_group_layout,
            bind_group,
            pipelines: HashMap::new(),
        })
    }

    fn write_uniform(&mut self, location: &UniformLocation, bytes: &[u8]) {
        let buffer = self
            .programs
            .get(location.program)
            .and_then(|p| p.linked.as_ref())
            .and_then(|l| l.uniform_buffers.get(&location.binding));
        match buffer {
            Some(buffer) => self.context.queue.write_buffer(buffer, 0, bytes),
            None => log::warn!("Uniform upload to unlinked program {:?}", location.program),
        }
    }

    /// Vertex state of the enabled attributes
    fn pipeline_key(&self) -> Result<PipelineKey, GpuError> {
        let mut stride = None;
        let mut attributes = Vec::new();
        for (location, state) in self.attributes.iter().filter(|(_, s)| s.enabled) {
            let pointer = state.pointer.ok_or_else(|| {
                GpuError::InvalidOperation(format!("attribute {} is enabled without a pointer", location))
            })?;
            match stride {
                None => stride = Some(pointer.stride),
                Some(s) if s != pointer.stride => {
                    return Err(GpuError::InvalidOperation(
                        "attributes must share one interleaved buffer stride".to_string(),
                    ))
                }
                Some(_) => {}
            }
            attributes.push((*location, pointer.size, pointer.offset));
        }
        let stride = stride.ok_or_else(|| {
            GpuError::InvalidOperation("no vertex attributes are enabled".to_string())
        })?;
        Ok(PipelineKey {
            stride,
            attributes,
            depth_test: self.depth_test,
        })
    }

    fn ensure_depth_target(&mut self) {
        let size = self.context.size;
        if self.depth.as_ref().is_some_and(|d| d.size == size) {
            return;
        }
        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        self.depth = Some(DepthTarget {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            size,
        });
    }
}

fn vertex_format(components: u32) -> Result<wgpu::VertexFormat, GpuError> {
    match components {
        1 => Ok(wgpu::VertexFormat::Float32),
        2 => Ok(wgpu::VertexFormat::Float32x2),
        3 => Ok(wgpu::VertexFormat::Float32x3),
        4 => Ok(wgpu::VertexFormat::Float32x4),
        n => Err(GpuError::InvalidOperation(format!("{} components per attribute", n))),
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    program: &LinkedProgram,
    key: &PipelineKey,
    format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline, GpuError> {
    let attributes = key
        .attributes
        .iter()
        .map(|&(location, components, offset)| {
            Ok(wgpu::VertexAttribute {
                format: vertex_format(components)?,
                offset: offset as wgpu::BufferAddress,
                shader_location: location,
            })
        })
        .collect::<Result<Vec<_>, GpuError>>()?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Program Pipeline Layout"),
        bind_group_layouts: &[&program.bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Program Pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &program.vertex,
            entry_point: Some(StageKind::Vertex.entry_point()),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: key.stride as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &program.fragment,
            entry_point: Some(StageKind::Fragment.entry_point()),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: key.depth_test.then(|| wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    });

    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(GpuError::InvalidOperation(err.to_string())),
        None => Ok(pipeline),
    }
}

impl GraphicsApi for WgpuApi {
    type Shader = ShaderKey;
    type Program = ProgramKey;
    type Buffer = BufferKey;
    type UniformLocation = UniformLocation;

    fn create_shader(&mut self, kind: StageKind) -> Result<ShaderKey, GpuError> {
        Ok(self.shaders.insert(GpuShader {
            kind,
            source: String::new(),
            compiled: false,
            info_log: String::new(),
            module: None,
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
        s.module = None;
        s.compiled = false;

        match reflect::reflect_stage(&s.source, s.kind) {
            Ok(reflection) => s.reflection = Some(reflection),
            Err(log) => {
                s.info_log = log;
                s.reflection = None;
                return;
            }
        }

        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(s.kind.entry_point()),
            source: wgpu::ShaderSource::Wgsl(s.source.as_str().into()),
        });
        match pollster::block_on(device.pop_error_scope()) {
            Some(err) => s.info_log = err.to_string(),
            None => {
                s.compiled = true;
                s.info_log.clear();
                s.module = Some(Arc::new(module));
            }
        }
        log::debug!("Compiled {} shader (ok: {})", s.kind, s.compiled);
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
        Ok(self.programs.insert(GpuProgram::default()))
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
            match result {
                Ok(linked) => {
                    p.info_log.clear();
                    p.linked = Some(linked);
                }
                Err(log) => {
                    p.info_log = log;
                    p.linked = None;
                }
            }
        }
    }

    fn program_link_status(&self, program: ProgramKey) -> bool {
        self.programs.get(program).is_some_and(|p| p.linked.is_some())
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
        Ok(self.buffers.insert(GpuBuffer::default()))
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferKey>) {
        match target {
            BufferTarget::Array => self.array_binding = buffer,
            BufferTarget::ElementArray => self.element_binding = buffer,
        }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]) {
        let Some(entry) = self.binding(target).and_then(|key| self.buffers.get_mut(key)) else {
            log::warn!("buffer_data with no buffer bound to {:?}", target);
            return;
        };
        let usage = match target {
            BufferTarget::Array => wgpu::BufferUsages::VERTEX,
            BufferTarget::ElementArray => wgpu::BufferUsages::INDEX,
        };
        entry.buffer = Some(self.context.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(match target {
                BufferTarget::Array => "Vertex Buffer",
                BufferTarget::ElementArray => "Index Buffer",
            }),
            contents: data,
            usage: usage | wgpu::BufferUsages::COPY_DST,
        }));
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
        let linked = self.programs.get(program)?.linked.as_ref()?;
        linked.reflection.attribute(name).map(|a| a.location)
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
        self.attributes.entry(index).or_default().pointer = Some(AttribPointer {
            size,
            stride,
            offset,
        });
    }

    fn get_uniform_location(&self, program: ProgramKey, name: &str) -> Option<UniformLocation> {
        let linked = self.programs.get(program)?.linked.as_ref()?;
        linked.reflection.uniform(name).map(|u| UniformLocation {
            program,
            binding: u.binding,
        })
    }

    fn uniform_matrix_4_f32(&mut self, location: &UniformLocation, value: &Mat4) {
        self.write_uniform(location, bytemuck::cast_slice(value));
    }

    fn uniform_3_f32(&mut self, location: &UniformLocation, x: f32, y: f32, z: f32) {
        // vec3 occupies 16 bytes in a uniform buffer
        let padded = [x, y, z, 0.0];
        self.write_uniform(location, bytemuck::cast_slice(&padded));
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = Some((x, y, width, height));
    }

    fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.clear_color = wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: a as f64,
        };
    }

    fn clear(&mut self, mask: ClearFlags) {
        self.pending_clear |= mask;
    }

    fn enable_depth_test(&mut self) {
        self.depth_test = true;
    }

    fn draw_indexed_triangles(&mut self, index_count: u32) -> Result<(), GpuError> {
        let program_key = self
            .current_program
            .ok_or_else(|| GpuError::InvalidOperation("no program in use".to_string()))?;
        let key = self.pipeline_key()?;
        if key.depth_test {
            self.ensure_depth_target();
        }

        let Some(frame) = self.acquire_frame()? else {
            return Ok(());
        };
        let (color_load, depth_load) = self.load_ops();

        let format = self.context.config.format;
        let device = &self.context.device;
        let linked = self
            .programs
            .get_mut(program_key)
            .and_then(|p| p.linked.as_mut())
            .ok_or_else(|| GpuError::InvalidOperation("current program is not linked".to_string()))?;
        if !linked.pipelines.contains_key(&key) {
            let pipeline = build_pipeline(device, linked, &key, format)?;
            linked.pipelines.insert(key.clone(), pipeline);
        }
        let Some(pipeline) = linked.pipelines.get(&key) else {
            return Err(GpuError::InvalidOperation("pipeline cache miss".to_string()));
        };

        let vertex_buffer = self
            .array_binding
            .and_then(|k| self.buffers.get(k))
            .and_then(|b| b.buffer.as_ref())
            .ok_or_else(|| GpuError::InvalidOperation("no vertex buffer bound".to_string()))?;
        let index_buffer = self
            .element_binding
            .and_then(|k| self.buffers.get(k))
            .and_then(|b| b.buffer.as_ref())
            .ok_or_else(|| GpuError::InvalidOperation("no element buffer bound".to_string()))?;

        let depth_attachment = match (&self.depth, key.depth_test) {
            (Some(depth), true) => Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            _ => None,
        };

        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Draw Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Draw Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: depth_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some((x, y, width, height)) = self.viewport {
                let (target_w, target_h) = self.context.size;
                let x = (x.max(0) as u32).min(target_w);
                let y = (y.max(0) as u32).min(target_h);
                let width = width.min(target_w - x);
                let height = height.min(target_h - y);
                if width > 0 && height > 0 {
                    pass.set_viewport(x as f32, y as f32, width as f32, height as f32, 0.0, 1.0);
                }
            }

            if index_count > 0 {
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &linked.bind_group, &[]);
                pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..index_count, 0, 0..1);
            }
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        self.pending_clear = ClearFlags::empty();
        log::trace!("Submitted draw of {} indices", index_count);
        Ok(())
    }

    fn finish_frame(&mut self) -> Result<(), GpuError> {
        if self.pending_clear.is_empty() {
            return Ok(());
        }
        let Some(frame) = self.acquire_frame()? else {
            self.pending_clear = ClearFlags::empty();
            return Ok(());
        };
        if self.depth_test && self.pending_clear.contains(ClearFlags::DEPTH) {
            self.ensure_depth_target();
        }

        let (color_load, depth_load) = self.load_ops();
        let depth_attachment = match (&self.depth, self.depth_test) {
            (Some(depth), true) => Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            _ => None,
        };

        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        {
            // Load ops do the clearing; the pass records nothing
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: depth_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        self.pending_clear = ClearFlags::empty();
        log::trace!("Submitted clear-only frame");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_formats() {
        assert_eq!(vertex_format(3).unwrap(), wgpu::VertexFormat::Float32x3);
        assert_eq!(vertex_format(1).unwrap(), wgpu::VertexFormat::Float32);
        assert!(vertex_format(0).is_err());
        assert!(vertex_format(5).is_err());
    }

    #[test]
    fn test_pipeline_key_identity() {
        let a = PipelineKey {
            stride: 24,
            attributes: vec![(0, 3, 0), (1, 3, 12)],
            depth_test: true,
        };
        let mut b = a.clone();
        assert_eq!(a, b);
        b.depth_test = false;
        assert_ne!(a, b);
    }
}
