//! Frame callback scheduling
//!
//! The render loop never blocks. After each frame it asks the host for the
//! next callback through [`FrameScheduler::request_frame`] and keeps the
//! returned [`FrameHandle`]. Stopping cancels that handle, and a callback
//! whose handle is no longer pending does nothing.

use std::collections::VecDeque;

/// Identifies one requested frame callback
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// Host hook for display-synchronised callbacks
pub trait FrameScheduler {
    /// Ask for one more frame callback
    fn request_frame(&mut self) -> FrameHandle;
    /// Withdraw a callback that has not fired yet
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Scheduler driven by hand
///
/// Requests queue up until the host fires them with
/// [`take_next`](ManualScheduler::take_next).
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    queue: VecDeque<FrameHandle>,
    requested: usize,
    cancelled: usize,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest callback still waiting
    pub fn pending(&self) -> Option<FrameHandle> {
        self.queue.front().copied()
    }

    /// Fire the oldest callback: remove it and hand it to the caller
    pub fn take_next(&mut self) -> Option<FrameHandle> {
        self.queue.pop_front()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub fn requested_count(&self) -> usize {
        self.requested
    }

    pub fn cancelled_count(&self) -> usize {
        self.cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_id += 1;
        self.requested += 1;
        let handle = FrameHandle(self.next_id);
        self.queue.push_back(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let before = self.queue.len();
        self.queue.retain(|h| *h != handle);
        if self.queue.len() != before {
            self.cancelled += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let mut scheduler = ManualScheduler::new();
        let a = scheduler.request_frame();
        let b = scheduler.request_frame();
        assert_ne!(a, b);
        assert_eq!(scheduler.pending_count(), 2);
    }

    #[test]
    fn test_take_next_is_fifo() {
        let mut scheduler = ManualScheduler::new();
        let a = scheduler.request_frame();
        let b = scheduler.request_frame();
        assert_eq!(scheduler.take_next(), Some(a));
        assert_eq!(scheduler.pending(), Some(b));
    }

    #[test]
    fn test_cancel_removes_pending() {
        let mut scheduler = ManualScheduler::new();
        let a = scheduler.request_frame();
        scheduler.cancel_frame(a);
        assert_eq!(scheduler.pending(), None);
        assert_eq!(scheduler.cancelled_count(), 1);

        // Cancelling a fired or unknown handle is a no-op
        scheduler.cancel_frame(a);
        assert_eq!(scheduler.cancelled_count(), 1);
    }
}
