//! Rust3D - lit mesh viewer
//!
//! Loads a mesh, then renders it with a Phong shader until the window closes.

use winit::{
    application::ApplicationHandler,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowId,
};

use rust3d::config::AppConfig;
use rust3d::systems::{RedrawScheduler, WindowSurface, WindowSystem};
use rust3d_core::UNIT_CUBE_OBJ;
use rust3d_render::{context::RenderContext, RenderController, RenderSettings, WgpuApi};

type Controller = RenderController<WindowSurface, RedrawScheduler>;

/// Main application state
struct App {
    config: AppConfig,
    settings: RenderSettings,
    window: Option<WindowSystem>,
    controller: Option<Controller>,
}

impl App {
    fn new(config: AppConfig) -> Self {
        let mesh_source = read_mesh_source(&config.scene.mesh_path);
        let settings = config.render_settings(mesh_source);
        Self {
            config,
            settings,
            window: None,
            controller: None,
        }
    }

    /// Create the window, GPU context and controller on first resume
    fn create_controller(&mut self, event_loop: &ActiveEventLoop) -> Option<Controller> {
        let window = match WindowSystem::create(event_loop, &self.config.window) {
            Ok(window) => window,
            Err(e) => {
                log::error!("{}", e);
                return None;
            }
        };

        let context = match pollster::block_on(RenderContext::with_vsync(
            window.window().clone(),
            window.vsync(),
        )) {
            Ok(context) => context,
            Err(e) => {
                log::error!("Failed to create render context: {}", e);
                return None;
            }
        };

        let surface = WindowSurface::new(window.window().clone(), WgpuApi::new(context));
        let scheduler = RedrawScheduler::new(window.window().clone());
        self.window = Some(window);
        Some(RenderController::new(surface, scheduler, self.settings.clone()))
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(controller) = &mut self.controller {
            controller.stop();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let controller = match self.controller.take() {
            // Hand the surface to a fresh controller; nothing from the old
            // session survives
            Some(previous) => {
                let (surface, scheduler) = previous.release();
                RenderController::new(surface, scheduler, self.settings.clone())
            }
            None => match self.create_controller(event_loop) {
                Some(controller) => controller,
                None => {
                    event_loop.exit();
                    return;
                }
            },
        };
        self.controller = Some(controller);

        if let Some(controller) = &mut self.controller {
            if let Err(e) = controller.start() {
                log::error!("Failed to start renderer: {}", e);
            }
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(controller) = &mut self.controller {
            controller.stop();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),

            WindowEvent::Resized(size) => {
                // Only a running session holds a resize watch
                let Some(controller) = &mut self.controller else {
                    return;
                };
                if !controller.surface().is_watched() {
                    log::trace!("Ignoring resize to {}x{}: nothing is watching", size.width, size.height);
                    return;
                }
                if let Err(e) = controller.resize(size.width, size.height) {
                    log::error!("Resize failed: {}", e);
                }
            }

            WindowEvent::RedrawRequested => {
                let Some(controller) = &mut self.controller else {
                    return;
                };
                // A redraw nobody asked for (expose, cancelled frame) runs nothing
                let Some(handle) = controller.scheduler().pending() else {
                    return;
                };
                if let Err(e) = controller.frame(handle) {
                    log::error!("Frame failed: {}", e);
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return;
                }
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Escape) => self.shutdown(event_loop),
                    PhysicalKey::Code(KeyCode::F11) => {
                        if let Some(window) = &self.window {
                            window.toggle_fullscreen();
                        }
                    }
                    _ => {}
                }
            }

            _ => {}
        }
    }
}

/// Read the configured mesh, falling back to the built-in cube
fn read_mesh_source(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(source) => {
            log::info!("Loaded mesh source from '{}'", path);
            source
        }
        Err(e) => {
            log::warn!("Failed to read mesh '{}': {}. Using the unit cube.", path, e);
            UNIT_CUBE_OBJ.to_string()
        }
    }
}

fn main() {
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("{}. Using defaults.", e);
        AppConfig::default()
    });

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.debug.log_level.as_str()),
    )
    .init();
    log::info!("Starting Rust3D");

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {}", e);
            std::process::exit(1);
        }
    };
    // Frames are paced by request_redraw
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {}", e);
        std::process::exit(1);
    }
}
