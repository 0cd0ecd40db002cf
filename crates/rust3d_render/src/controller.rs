//! Render loop controller
//!
//! [`RenderController`] is an `Idle → Running → Idle` state machine. While
//! running it owns one [`RenderSession`]: the linked program, the vertex and
//! index buffers, the resize subscription and the pending frame handle.
//! Dropping the session back to `None` is what makes the controller idle, so
//! a stale frame callback can never reach the GPU after [`stop`].
//!
//! [`stop`]: RenderController::stop

use rust3d_core::{DedupStrategy, Mesh, ObjLoader, UNIT_CUBE_OBJ};
use rust3d_math::{mat4, Mat4, Vec3};

use crate::diagnostics::Diagnostic;
use crate::error::RenderError;
use crate::gpu::{BufferTarget, ClearFlags, GraphicsApi};
use crate::layout::VertexLayout;
use crate::scheduler::{FrameHandle, FrameScheduler};
use crate::shader::{CompiledProgram, ShaderSources};
use crate::surface::{DrawSurface, ResizeWatch};

pub const MODEL_UNIFORM: &str = "u_model";
pub const VIEW_UNIFORM: &str = "u_view";
pub const PROJECTION_UNIFORM: &str = "u_projection";
pub const LIGHT_POSITION_UNIFORM: &str = "u_light_position";
pub const VIEW_POSITION_UNIFORM: &str = "u_view_position";

/// Projection used for the projection uniform
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    /// Vertical field of view in radians
    Perspective { fov_y: f32 },
    /// Visible height in world units; width follows the aspect ratio
    Orthographic { height: f32 },
}

/// Camera placement and lens
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraSettings {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
}

impl CameraSettings {
    pub fn view_matrix(&self) -> Mat4 {
        mat4::look_at(self.eye, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        match self.projection {
            Projection::Perspective { fov_y } => mat4::perspective(fov_y, aspect, self.near, self.far),
            Projection::Orthographic { height } => {
                let half_h = height * 0.5;
                let half_w = half_h * aspect;
                mat4::ortho(-half_w, half_w, -half_h, half_h, self.near, self.far)
            }
        }
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            eye: Vec3::new(2.0, 2.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            projection: Projection::Perspective {
                fov_y: std::f32::consts::FRAC_PI_4,
            },
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Scale, then rotate, then translate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelTransform {
    pub scale: Vec3,
    pub rotation_axis: Vec3,
    /// Radians
    pub rotation_angle: f32,
    pub translation: Vec3,
}

impl ModelTransform {
    pub fn matrix(&self) -> Mat4 {
        let scale = mat4::scale(self.scale.x, self.scale.y, self.scale.z);
        let translate = mat4::translate(self.translation.x, self.translation.y, self.translation.z);
        // rotate(0, axis) is the identity for any axis, but a zero axis
        // would turn it into NaNs
        let rotate = if self.rotation_angle == 0.0 {
            mat4::identity()
        } else {
            mat4::rotate(self.rotation_angle, self.rotation_axis)
        };
        mat4::multiply(&translate, &mat4::multiply(&rotate, &scale))
    }
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self {
            scale: Vec3::new(1.0, 1.0, 1.0),
            rotation_axis: Vec3::Y,
            rotation_angle: 0.0,
            translation: Vec3::ZERO,
        }
    }
}

/// Everything a session needs besides the surface
#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    /// Mesh text in the OBJ subset the loader understands
    pub mesh_source: String,
    pub dedup: DedupStrategy,
    pub shaders: ShaderSources,
    pub layout: VertexLayout,
    pub camera: CameraSettings,
    pub model: ModelTransform,
    pub light_position: Vec3,
    pub clear_color: [f32; 4],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            mesh_source: UNIT_CUBE_OBJ.to_string(),
            dedup: DedupStrategy::default(),
            shaders: ShaderSources::phong(),
            layout: VertexLayout::position_normal(),
            camera: CameraSettings::default(),
            model: ModelTransform::default(),
            light_position: Vec3::new(1.2, 1.0, 2.0),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// GPU state owned by a running controller
pub struct RenderSession<G: GraphicsApi> {
    program: CompiledProgram<G>,
    vertex_buffer: G::Buffer,
    index_buffer: G::Buffer,
    index_count: u32,
    resize_watch: ResizeWatch,
    pending_frame: Option<FrameHandle>,
}

impl<G: GraphicsApi> RenderSession<G> {
    fn build(
        api: &mut G,
        settings: &RenderSettings,
        mesh: &Mesh,
        aspect: f32,
        resize_watch: ResizeWatch,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Self, RenderError> {
        let vertex_buffer = upload(api, BufferTarget::Array, mesh.vertex_bytes())?;
        let index_buffer = match upload(api, BufferTarget::ElementArray, mesh.index_bytes()) {
            Ok(buffer) => buffer,
            Err(e) => {
                api.delete_buffer(vertex_buffer);
                return Err(e);
            }
        };

        let program = match settings.shaders.compile_program(api, diagnostics) {
            Ok(program) => program,
            Err(e) => {
                api.delete_buffer(vertex_buffer);
                api.delete_buffer(index_buffer);
                return Err(e);
            }
        };

        let session = Self {
            program,
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            resize_watch,
            pending_frame: None,
        };
        if let Err(e) = session.configure(api, settings, aspect) {
            session.release(api);
            return Err(e);
        }
        Ok(session)
    }

    /// Bind buffers and attributes and set the initial uniforms
    fn configure(&self, api: &mut G, settings: &RenderSettings, aspect: f32) -> Result<(), RenderError> {
        api.bind_buffer(BufferTarget::Array, Some(self.vertex_buffer));
        api.bind_buffer(BufferTarget::ElementArray, Some(self.index_buffer));
        if !self.program.is_linked() {
            log::warn!("Shader program failed to link; frames will clear without drawing");
            return Ok(());
        }

        self.program.use_program(api);
        self.program.bind_attributes(api, &settings.layout)?;

        let uniforms = self.program.uniforms();
        uniforms.set(api, MODEL_UNIFORM, settings.model.matrix())?;
        uniforms.set(api, VIEW_UNIFORM, settings.camera.view_matrix())?;
        uniforms.set(api, PROJECTION_UNIFORM, settings.camera.projection_matrix(aspect))?;
        uniforms.set(api, LIGHT_POSITION_UNIFORM, settings.light_position)?;
        uniforms.set(api, VIEW_POSITION_UNIFORM, settings.camera.eye)?;
        Ok(())
    }

    fn release(self, api: &mut G) {
        self.program.unbind_attributes(api);
        api.use_program(None);
        api.bind_buffer(BufferTarget::Array, None);
        api.bind_buffer(BufferTarget::ElementArray, None);
        api.delete_buffer(self.vertex_buffer);
        api.delete_buffer(self.index_buffer);
        self.program.delete(api);
    }
}

fn upload<G: GraphicsApi>(api: &mut G, target: BufferTarget, data: &[u8]) -> Result<G::Buffer, RenderError> {
    let buffer = api.create_buffer()?;
    api.bind_buffer(target, Some(buffer));
    api.buffer_data(target, data);
    Ok(buffer)
}

/// Width over height; 1 for a collapsed surface
fn aspect_ratio(width: u32, height: u32) -> f32 {
    if width == 0 || height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

/// Drives one mesh on one surface
pub struct RenderController<S: DrawSurface, F: FrameScheduler> {
    surface: S,
    scheduler: F,
    settings: RenderSettings,
    session: Option<RenderSession<S::Api>>,
    diagnostics: Vec<Diagnostic>,
    frames_drawn: u64,
}

impl<S: DrawSurface, F: FrameScheduler> RenderController<S, F> {
    pub fn new(surface: S, scheduler: F, settings: RenderSettings) -> Self {
        Self {
            surface,
            scheduler,
            settings,
            session: None,
            diagnostics: Vec::new(),
            frames_drawn: 0,
        }
    }

    /// Build a session and schedule the first frame
    ///
    /// On failure everything created so far is released, the surface size
    /// is left untouched and the controller stays idle.
    pub fn start(&mut self) -> Result<(), RenderError> {
        if self.session.is_some() {
            return Err(RenderError::AlreadyRunning);
        }
        self.diagnostics.clear();

        let watch = self.surface.watch_resize();
        let (width, height) = self.surface.client_size();

        let mesh = ObjLoader::new()
            .with_dedup(self.settings.dedup)
            .load(&self.settings.mesh_source);
        log::info!(
            "Loaded mesh: {} vertices, {} triangles",
            mesh.vertex_count(),
            mesh.triangle_count()
        );

        let built = self
            .settings
            .layout
            .validate_buffer(mesh.vertex_bytes().len())
            .and_then(|()| {
                RenderSession::build(
                    self.surface.graphics_mut(),
                    &self.settings,
                    &mesh,
                    aspect_ratio(width, height),
                    watch,
                    &mut self.diagnostics,
                )
            });

        for diagnostic in &self.diagnostics {
            log::warn!("{}", diagnostic);
        }

        match built {
            Ok(mut session) => {
                self.apply_size(width, height);
                session.pending_frame = Some(self.scheduler.request_frame());
                self.session = Some(session);
                log::info!("Render loop started at {}x{}", width, height);
                Ok(())
            }
            Err(e) => {
                self.surface.unwatch_resize(watch);
                log::error!("Failed to start render loop: {}", e);
                Err(e)
            }
        }
    }

    /// Run one frame if `handle` is the pending one
    ///
    /// Returns `Ok(false)` without touching the GPU for a stale handle or an
    /// idle controller.
    pub fn frame(&mut self, handle: FrameHandle) -> Result<bool, RenderError> {
        match &mut self.session {
            Some(session) if session.pending_frame == Some(handle) => session.pending_frame = None,
            Some(_) => {
                log::trace!("Ignoring stale frame {:?}", handle);
                return Ok(false);
            }
            None => {
                log::trace!("Ignoring frame {:?}: render loop is idle", handle);
                return Ok(false);
            }
        }

        self.update();
        let result = self.draw();

        if let Some(session) = &mut self.session {
            session.pending_frame = Some(self.scheduler.request_frame());
        }
        result.map(|()| true)
    }

    /// Per-frame state changes; nothing animates yet
    fn update(&mut self) {}

    fn draw(&mut self) -> Result<(), RenderError> {
        let Some(session) = &self.session else {
            return Ok(());
        };
        let api = self.surface.graphics_mut();
        let [r, g, b, a] = self.settings.clear_color;
        api.clear_color(r, g, b, a);
        api.clear(ClearFlags::COLOR | ClearFlags::DEPTH);
        api.enable_depth_test();

        if session.program.is_linked() {
            session.program.use_program(api);
            api.draw_indexed_triangles(session.index_count)?;
        }
        api.finish_frame()?;
        self.frames_drawn += 1;
        log::trace!("Frame {} drawn", self.frames_drawn);
        Ok(())
    }

    /// React to a new client size
    ///
    /// Ignored while idle.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let Some(session) = &self.session else {
            log::trace!("Ignoring resize to {}x{}: render loop is idle", width, height);
            return Ok(());
        };
        if !session.program.is_linked() {
            self.apply_size(width, height);
            return Ok(());
        }

        let projection = self.settings.camera.projection_matrix(aspect_ratio(width, height));
        let api = self.surface.graphics_mut();
        session.program.use_program(api);
        session.program.uniforms().set(api, PROJECTION_UNIFORM, projection)?;
        self.apply_size(width, height);
        Ok(())
    }

    fn apply_size(&mut self, width: u32, height: u32) {
        log::debug!("Resizing drawing buffer to {}x{}", width, height);
        self.surface.set_backing_size(width, height);
        self.surface.graphics_mut().viewport(0, 0, width, height);
    }

    /// Tear down the session; a no-op when idle
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        self.surface.unwatch_resize(session.resize_watch);
        if let Some(handle) = session.pending_frame {
            self.scheduler.cancel_frame(handle);
        }
        session.release(self.surface.graphics_mut());
        log::info!("Render loop stopped after {} frames", self.frames_drawn);
    }

    /// Stop and hand the surface and scheduler back
    pub fn release(mut self) -> (S, F) {
        self.stop();
        (self.surface, self.scheduler)
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.session.as_ref().and_then(|s| s.pending_frame)
    }

    /// Frames whose body ran, over the controller's lifetime
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Compile and link diagnostics of the last start
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn scheduler(&self) -> &F {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut F {
        &mut self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::reflect::parse_kind;
    use crate::scheduler::ManualScheduler;
    use crate::shader::UniformValue;
    use crate::surface::HeadlessSurface;

    const EPSILON: f32 = 1e-5;

    fn controller() -> RenderController<HeadlessSurface, ManualScheduler> {
        RenderController::new(
            HeadlessSurface::new(800, 600),
            ManualScheduler::new(),
            RenderSettings::default(),
        )
    }

    #[test]
    fn test_start_sets_initial_uniforms() {
        let mut c = controller();
        c.start().unwrap();
        let api = c.surface().api();
        let program = api.current_program().unwrap();

        assert_eq!(
            api.uniform_value(program, VIEW_POSITION_UNIFORM),
            Some(UniformValue::Vec3(c.settings().camera.eye))
        );
        assert_eq!(
            api.uniform_value(program, MODEL_UNIFORM),
            Some(UniformValue::Mat4(mat4::identity()))
        );
        let expected = c.settings().camera.projection_matrix(800.0 / 600.0);
        assert_eq!(
            api.uniform_value(program, PROJECTION_UNIFORM),
            Some(UniformValue::Mat4(expected))
        );
    }

    #[test]
    fn test_resize_updates_projection() {
        let mut c = controller();
        c.start().unwrap();
        c.resize(400, 400).unwrap();
        let api = c.surface().api();
        let program = api.current_program().unwrap();
        let Some(UniformValue::Mat4(m)) = api.uniform_value(program, PROJECTION_UNIFORM) else {
            panic!("projection not set");
        };
        // Square aspect: x and y scale agree
        assert!((mat4::at(&m, 0, 0) - mat4::at(&m, 1, 1)).abs() < EPSILON);
    }

    #[test]
    fn test_orthographic_projection_box() {
        let camera = CameraSettings {
            projection: Projection::Orthographic { height: 2.0 },
            near: -1.0,
            far: 1.0,
            ..CameraSettings::default()
        };
        let m = camera.projection_matrix(2.0);
        let corner = mat4::transform_point(&m, Vec3::new(2.0, 1.0, 0.0));
        assert!((corner.x - 1.0).abs() < EPSILON);
        assert!((corner.y - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_model_transform_order() {
        let model = ModelTransform {
            scale: Vec3::new(2.0, 2.0, 2.0),
            rotation_axis: Vec3::Y,
            rotation_angle: std::f32::consts::FRAC_PI_2,
            translation: Vec3::new(0.0, 0.0, 5.0),
        };
        // Scale (1,0,0) to (2,0,0), rotate to (0,0,-2), translate to (0,0,3)
        let p = mat4::transform_point(&model.matrix(), Vec3::X);
        assert!(p.x.abs() < EPSILON);
        assert!(p.y.abs() < EPSILON);
        assert!((p.z - 3.0).abs() < EPSILON);
    }

    #[test]
    fn test_zero_axis_without_rotation_is_finite() {
        let model = ModelTransform {
            rotation_axis: Vec3::ZERO,
            ..ModelTransform::default()
        };
        assert_eq!(model.matrix(), mat4::identity());
    }

    #[test]
    fn test_aspect_ratio_guards_collapsed_sizes() {
        assert_eq!(aspect_ratio(800, 0), 1.0);
        assert_eq!(aspect_ratio(0, 600), 1.0);
        assert_eq!(aspect_ratio(0, 0), 1.0);
        assert_eq!(aspect_ratio(800, 400), 2.0);
    }

    #[test]
    fn test_zero_width_surface_gets_finite_projection() {
        let mut c = RenderController::new(
            HeadlessSurface::new(0, 600),
            ManualScheduler::new(),
            RenderSettings::default(),
        );
        c.start().unwrap();
        let api = c.surface().api();
        let program = api.current_program().unwrap();
        let Some(UniformValue::Mat4(projection)) = api.uniform_value(program, PROJECTION_UNIFORM) else {
            panic!("projection uniform was not set");
        };
        assert!(projection.iter().all(|v| v.is_finite()));

        c.resize(0, 300).unwrap();
        let api = c.surface().api();
        let Some(UniformValue::Mat4(projection)) = api.uniform_value(program, PROJECTION_UNIFORM) else {
            panic!("projection uniform was not set");
        };
        assert!(projection.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_failed_link_still_runs() {
        let mut settings = RenderSettings::default();
        settings.shaders.fragment = "@fragment fn main() {}".to_string();
        let mut c = RenderController::new(HeadlessSurface::new(100, 100), ManualScheduler::new(), settings);
        c.start().unwrap();
        assert!(c.is_running());
        assert_eq!(c.diagnostics().len(), 2);

        let handle = c.scheduler_mut().take_next().unwrap();
        assert_eq!(c.frame(handle), Ok(true));
        assert!(c.surface().api().draw_calls().is_empty());
        assert_eq!(c.surface().api().clear_count(), 1);
        // The clear still reaches the screen without a draw
        assert_eq!(c.surface().api().clear_only_frames(), 1);
        c.stop();
        assert_eq!(c.surface().api().live_handles(), 0);
    }

    #[test]
    fn test_default_shaders_declare_supported_kinds() {
        let sources = ShaderSources::phong();
        for var in sources.vertex_uniforms.iter().chain(&sources.fragment_uniforms) {
            let ty = match var.kind {
                crate::shader::VariableKind::Mat4 => "mat4x4<f32>",
                crate::shader::VariableKind::Vec3 => "vec3<f32>",
            };
            assert_eq!(parse_kind(ty), Some(var.kind));
            assert!(sources.vertex.contains(&var.name) || sources.fragment.contains(&var.name));
        }
    }
}
