//! winit adapters for the render controller
//!
//! [`WindowSurface`] exposes a window plus its wgpu backend as a
//! [`DrawSurface`]. [`RedrawScheduler`] turns frame requests into
//! `Window::request_redraw` calls; the host answers each `RedrawRequested`
//! event with the scheduler's pending handle.

use std::sync::Arc;

use rust3d_render::{DrawSurface, FrameHandle, FrameScheduler, ResizeWatch, WgpuApi};
use winit::window::Window;

/// Live resize subscriptions of a surface
#[derive(Debug, Default)]
pub struct ResizeWatches {
    active: Vec<ResizeWatch>,
    next_id: u64,
}

impl ResizeWatches {
    pub fn watch(&mut self) -> ResizeWatch {
        self.next_id += 1;
        let watch = ResizeWatch::new(self.next_id);
        self.active.push(watch);
        watch
    }

    /// Drop a subscription; unknown tokens are ignored
    pub fn unwatch(&mut self, watch: ResizeWatch) {
        self.active.retain(|w| *w != watch);
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// A window and the GPU backend drawing into it
pub struct WindowSurface {
    window: Arc<Window>,
    api: WgpuApi,
    watches: ResizeWatches,
}

impl WindowSurface {
    pub fn new(window: Arc<Window>, api: WgpuApi) -> Self {
        Self {
            window,
            api,
            watches: ResizeWatches::default(),
        }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Whether a running controller wants size changes
    ///
    /// The host forwards `Resized` events only while this holds.
    pub fn is_watched(&self) -> bool {
        !self.watches.is_empty()
    }
}

impl DrawSurface for WindowSurface {
    type Api = WgpuApi;

    fn client_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn set_backing_size(&mut self, width: u32, height: u32) {
        self.api.resize_surface(width, height);
    }

    fn graphics(&self) -> &WgpuApi {
        &self.api
    }

    fn graphics_mut(&mut self) -> &mut WgpuApi {
        &mut self.api
    }

    fn watch_resize(&mut self) -> ResizeWatch {
        self.watches.watch()
    }

    fn unwatch_resize(&mut self, watch: ResizeWatch) {
        self.watches.unwatch(watch);
    }
}

/// Something that can be asked to redraw
pub trait RedrawRequest {
    fn request_redraw(&self);
}

impl RedrawRequest for Window {
    fn request_redraw(&self) {
        Window::request_redraw(self);
    }
}

/// Frame scheduler driven by redraw events
///
/// At most one handle is pending. winit has no way to withdraw a redraw, so
/// cancelling only forgets the handle and the next `RedrawRequested` finds
/// nothing to run.
pub struct RedrawScheduler<W: RedrawRequest + ?Sized = Window> {
    window: Arc<W>,
    next_id: u64,
    pending: Option<FrameHandle>,
}

impl<W: RedrawRequest + ?Sized> RedrawScheduler<W> {
    pub fn new(window: Arc<W>) -> Self {
        Self {
            window,
            next_id: 0,
            pending: None,
        }
    }

    /// Handle to run on the next `RedrawRequested`
    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }
}

impl<W: RedrawRequest + ?Sized> FrameScheduler for RedrawScheduler<W> {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle::new(self.next_id);
        self.pending = Some(handle);
        self.window.request_redraw();
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingWindow {
        redraws: Cell<u32>,
    }

    impl RedrawRequest for CountingWindow {
        fn request_redraw(&self) {
            self.redraws.set(self.redraws.get() + 1);
        }
    }

    #[test]
    fn test_resize_watches_track_subscriptions() {
        let mut watches = ResizeWatches::default();
        assert!(watches.is_empty());

        let first = watches.watch();
        let second = watches.watch();
        assert_ne!(first, second);
        watches.unwatch(first);
        watches.unwatch(first);
        assert!(!watches.is_empty());
        watches.unwatch(second);
        assert!(watches.is_empty());
    }

    #[test]
    fn test_request_frame_asks_for_redraw() {
        let window = Arc::new(CountingWindow::default());
        let mut scheduler = RedrawScheduler::new(window.clone());

        let first = scheduler.request_frame();
        let second = scheduler.request_frame();
        assert_ne!(first, second);
        assert_eq!(scheduler.pending(), Some(second));
        assert_eq!(window.redraws.get(), 2);
    }

    #[test]
    fn test_cancel_only_forgets_matching_handle() {
        let mut scheduler = RedrawScheduler::new(Arc::new(CountingWindow::default()));
        let first = scheduler.request_frame();
        let second = scheduler.request_frame();

        scheduler.cancel_frame(first);
        assert_eq!(scheduler.pending(), Some(second));
        scheduler.cancel_frame(second);
        assert_eq!(scheduler.pending(), None);
    }
}
