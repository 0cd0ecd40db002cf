//! Drawing surfaces supplied by the host
//!
//! A [`DrawSurface`] owns the GPU backend, knows the displayed (client) size
//! of the drawing area and can resize its backing store. It also lets the
//! controller subscribe to size changes for the lifetime of a render session.

use crate::gpu::{GraphicsApi, HeadlessApi};

/// Token for one resize subscription
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResizeWatch(u64);

impl ResizeWatch {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// A drawing area with a GPU context
pub trait DrawSurface {
    type Api: GraphicsApi;

    /// Displayed size in pixels
    fn client_size(&self) -> (u32, u32);

    /// Resize the drawing buffer
    fn set_backing_size(&mut self, width: u32, height: u32);

    fn graphics(&self) -> &Self::Api;
    fn graphics_mut(&mut self) -> &mut Self::Api;

    /// Start delivering size changes to the controller
    fn watch_resize(&mut self) -> ResizeWatch;
    /// Stop a subscription made with [`watch_resize`](Self::watch_resize)
    fn unwatch_resize(&mut self, watch: ResizeWatch);
}

/// Surface backed by [`HeadlessApi`]
#[derive(Default)]
pub struct HeadlessSurface {
    api: HeadlessApi,
    client_size: (u32, u32),
    backing_size: (u32, u32),
    watches: Vec<ResizeWatch>,
    next_watch: u64,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_api(HeadlessApi::new(), width, height)
    }

    pub fn with_api(api: HeadlessApi, width: u32, height: u32) -> Self {
        Self {
            api,
            client_size: (width, height),
            ..Default::default()
        }
    }

    /// Change the displayed size, as a layout change would
    pub fn set_client_size(&mut self, width: u32, height: u32) {
        self.client_size = (width, height);
    }

    pub fn backing_size(&self) -> (u32, u32) {
        self.backing_size
    }

    pub fn active_watches(&self) -> usize {
        self.watches.len()
    }

    pub fn api(&self) -> &HeadlessApi {
        &self.api
    }
}

impl DrawSurface for HeadlessSurface {
    type Api = HeadlessApi;

    fn client_size(&self) -> (u32, u32) {
        self.client_size
    }

    fn set_backing_size(&mut self, width: u32, height: u32) {
        self.backing_size = (width, height);
    }

    fn graphics(&self) -> &HeadlessApi {
        &self.api
    }

    fn graphics_mut(&mut self) -> &mut HeadlessApi {
        &mut self.api
    }

    fn watch_resize(&mut self) -> ResizeWatch {
        self.next_watch += 1;
        let watch = ResizeWatch(self.next_watch);
        self.watches.push(watch);
        watch
    }

    fn unwatch_resize(&mut self, watch: ResizeWatch) {
        self.watches.retain(|w| *w != watch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_and_unwatch() {
        let mut surface = HeadlessSurface::new(640, 480);
        let a = surface.watch_resize();
        let b = surface.watch_resize();
        assert_ne!(a, b);
        assert_eq!(surface.active_watches(), 2);
        surface.unwatch_resize(a);
        surface.unwatch_resize(a);
        assert_eq!(surface.active_watches(), 1);
    }

    #[test]
    fn test_backing_size_is_separate() {
        let mut surface = HeadlessSurface::new(640, 480);
        assert_eq!(surface.backing_size(), (0, 0));
        surface.set_backing_size(640, 480);
        surface.set_client_size(800, 600);
        assert_eq!(surface.client_size(), (800, 600));
        assert_eq!(surface.backing_size(), (640, 480));
    }
}
