//! Application systems
//!
//! Window creation plus the winit-backed surface and frame scheduler the
//! render controller runs on.

mod surface;
mod window;

pub use surface::{RedrawRequest, RedrawScheduler, ResizeWatches, WindowSurface};
pub use window::{WindowError, WindowSystem};
