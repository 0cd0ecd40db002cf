//! Window management system
//!
//! Creates the winit window the renderer draws into.

use std::sync::Arc;
use winit::{
    dpi::LogicalSize,
    event_loop::ActiveEventLoop,
    window::{Fullscreen, Window},
};
use crate::config::WindowConfig;

/// Owns the application window
pub struct WindowSystem {
    window: Arc<Window>,
    vsync: bool,
}

impl WindowSystem {
    /// Create window from config
    pub fn create(
        event_loop: &ActiveEventLoop,
        config: &WindowConfig,
    ) -> Result<Self, WindowError> {
        if config.width == 0 || config.height == 0 {
            return Err(WindowError::InvalidSize(config.width, config.height));
        }

        let mut attrs = Window::default_attributes()
            .with_title(&config.title)
            .with_inner_size(LogicalSize::new(config.width, config.height));

        if config.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .map_err(|e| WindowError::CreationFailed(e.to_string()))?,
        );
        log::info!("Created window '{}'", config.title);

        Ok(Self {
            window,
            vsync: config.vsync,
        })
    }

    /// Get window reference (for RenderContext creation)
    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn vsync(&self) -> bool {
        self.vsync
    }

    pub fn toggle_fullscreen(&self) {
        let next = if self.window.fullscreen().is_some() {
            None
        } else {
            Some(Fullscreen::Borderless(None))
        };
        self.window.set_fullscreen(next);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowError {
    CreationFailed(String),
    InvalidSize(u32, u32),
}

impl std::fmt::Display for WindowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowError::CreationFailed(msg) => write!(f, "Window creation failed: {}", msg),
            WindowError::InvalidSize(w, h) => write!(f, "Invalid window size {}x{}", w, h),
        }
    }
}

impl std::error::Error for WindowError {}
