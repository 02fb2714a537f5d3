// SPDX-License-Identifier: CEPL-1.0
//! Backend-neutral presentation engine.
//!
//! Owns the swapchain, the per-image command buffers and the ring of
//! frames in flight, and rebuilds the chain when the surface goes stale.
//! The graphics API and the window are reached only through the
//! [`GpuDevice`] and [`WindowSurface`] traits.

mod commands;
mod config;
mod device;
mod error;
mod handle;
mod lifecycle;
mod presenter;
mod surface;
mod swapchain;
mod sync;
mod window;

#[cfg(test)]
mod mock;

pub use commands::{CommandRecorder, DrawCall, Rect2D, RenderPassBegin, Viewport};
pub use config::{EngineConfig, DEFAULT_FRAMES_IN_FLIGHT};
pub use device::{
    AcquireOutcome, DeviceError, GpuDevice, GraphicsPipeline, PresentOutcome, Submission,
    WaitStage,
};
pub use error::{FrameError, FrameResult};
pub use handle::{
    CommandBufferHandle, FenceHandle, FramebufferHandle, ImageHandle, ImageViewHandle,
    PipelineHandle, PipelineLayoutHandle, RenderPassHandle, SemaphoreHandle, SwapchainHandle,
};
pub use lifecycle::{LifecycleController, LifecycleState, Presentation, RebuildStatus};
pub use presenter::{FrameReport, Presenter};
pub use surface::{
    query_capabilities, ColorSpace, Extent2D, PixelFormat, PresentMode, QueueFamilies,
    SurfaceCapabilities, SurfaceFormat,
};
pub use swapchain::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format, SharingMode,
    SwapchainBuilder, SwapchainDesc, SwapchainState,
};
pub use sync::{FrameSlot, FrameStatus, FrameSynchronizer, FrameTarget, ImagesInFlight, SlotState};
pub use window::WindowSurface;
