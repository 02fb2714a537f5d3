// SPDX-License-Identifier: CEPL-1.0
use crate::surface::Extent2D;

/// The window the presentation surface belongs to.
pub trait WindowSurface {
    /// Current drawable size in pixels. Zero while minimized.
    fn framebuffer_extent(&self) -> Extent2D;

    /// `false` once the user asked to close the window.
    fn should_continue(&self) -> bool;

    /// Returns whether the window was resized since the last call, and clears
    /// the flag.
    fn take_resized(&mut self) -> bool;

    /// Handles pending events without blocking.
    fn poll_events(&mut self);

    /// Blocks until at least one event arrived, then handles it.
    fn wait_events(&mut self);
}
