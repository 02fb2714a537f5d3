// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

use crate::commands::{DrawCall, Rect2D, RenderPassBegin, Viewport};
use crate::handle::{
    CommandBufferHandle, FenceHandle, FramebufferHandle, ImageHandle, ImageViewHandle,
    PipelineHandle, PipelineLayoutHandle, RenderPassHandle, SemaphoreHandle, SwapchainHandle,
};
use crate::surface::{Extent2D, PixelFormat, QueueFamilies, SurfaceCapabilities};
use crate::swapchain::SwapchainDesc;

/// A failed call into the graphics API.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{call} failed: {detail}")]
pub struct DeviceError {
    call: &'static str,
    detail: String,
}

impl DeviceError {
    pub fn new(call: &'static str, detail: impl Into<String>) -> Self {
        Self {
            call,
            detail: detail.into(),
        }
    }

    pub fn call(&self) -> &'static str {
        self.call
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

/// Result of asking the presentation engine for the next image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    Ready(u32),
    /// Usable, but the chain no longer matches the surface exactly.
    Suboptimal(u32),
    /// The chain cannot be used any more; nothing was signalled.
    Stale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    Stale,
}

/// Pipeline stage at which a submission waits on its semaphore.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitStage {
    ColorAttachmentOutput,
}

/// One queue submission of a pre-recorded command buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Submission {
    pub command_buffer: CommandBufferHandle,
    pub wait: SemaphoreHandle,
    pub wait_stage: WaitStage,
    pub signal: SemaphoreHandle,
    pub fence: FenceHandle,
}

/// The pipeline and its layout. Extent-independent, so it outlives rebuilds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraphicsPipeline {
    pub layout: PipelineLayoutHandle,
    pub pipeline: PipelineHandle,
}

/// The device/queue collaborator.
///
/// The logical device, its queues and the surface are assumed valid for the
/// lifetime of the implementor. Destruction calls cannot fail; creation and
/// queue calls report a [`DeviceError`]. Staleness is reported through
/// [`AcquireOutcome`] and [`PresentOutcome`], never as an error.
pub trait GpuDevice {
    fn surface_capabilities(&self) -> Result<SurfaceCapabilities, DeviceError>;
    fn queue_families(&self) -> QueueFamilies;

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<SwapchainHandle, DeviceError>;
    fn swapchain_images(&mut self, swapchain: SwapchainHandle)
        -> Result<Vec<ImageHandle>, DeviceError>;
    fn destroy_swapchain(&mut self, swapchain: SwapchainHandle);

    fn create_image_view(
        &mut self,
        image: ImageHandle,
        format: PixelFormat,
    ) -> Result<ImageViewHandle, DeviceError>;
    fn destroy_image_view(&mut self, view: ImageViewHandle);

    fn create_render_pass(&mut self, format: PixelFormat) -> Result<RenderPassHandle, DeviceError>;
    fn destroy_render_pass(&mut self, render_pass: RenderPassHandle);

    fn create_framebuffer(
        &mut self,
        render_pass: RenderPassHandle,
        view: ImageViewHandle,
        extent: Extent2D,
    ) -> Result<FramebufferHandle, DeviceError>;
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle);

    /// Builds the pipeline against a render pass compatible with every
    /// render pass the builder will create later.
    fn create_graphics_pipeline(
        &mut self,
        render_pass: RenderPassHandle,
    ) -> Result<GraphicsPipeline, DeviceError>;
    fn destroy_graphics_pipeline(&mut self, pipeline: GraphicsPipeline);

    fn allocate_command_buffers(
        &mut self,
        count: u32,
    ) -> Result<Vec<CommandBufferHandle>, DeviceError>;
    fn free_command_buffers(&mut self, buffers: &[CommandBufferHandle]);
    fn begin_command_buffer(&mut self, cmd: CommandBufferHandle) -> Result<(), DeviceError>;
    fn end_command_buffer(&mut self, cmd: CommandBufferHandle) -> Result<(), DeviceError>;
    fn cmd_begin_render_pass(&mut self, cmd: CommandBufferHandle, begin: &RenderPassBegin);
    fn cmd_bind_pipeline(&mut self, cmd: CommandBufferHandle, pipeline: PipelineHandle);
    fn cmd_set_viewport(&mut self, cmd: CommandBufferHandle, viewport: &Viewport);
    fn cmd_set_scissor(&mut self, cmd: CommandBufferHandle, scissor: &Rect2D);
    fn cmd_draw(&mut self, cmd: CommandBufferHandle, draw: &DrawCall);
    fn cmd_end_render_pass(&mut self, cmd: CommandBufferHandle);

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle, DeviceError>;
    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle);
    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle, DeviceError>;
    fn destroy_fence(&mut self, fence: FenceHandle);
    /// Blocks until the fence is signalled.
    fn wait_for_fence(&mut self, fence: FenceHandle) -> Result<(), DeviceError>;
    fn reset_fence(&mut self, fence: FenceHandle) -> Result<(), DeviceError>;

    fn acquire_next_image(
        &mut self,
        swapchain: SwapchainHandle,
        signal: SemaphoreHandle,
    ) -> Result<AcquireOutcome, DeviceError>;
    fn submit(&mut self, submission: &Submission) -> Result<(), DeviceError>;
    fn present(
        &mut self,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait: SemaphoreHandle,
    ) -> Result<PresentOutcome, DeviceError>;

    /// Blocks until every queue of the device is idle.
    fn wait_idle(&mut self) -> Result<(), DeviceError>;
}

impl<D: GpuDevice + ?Sized> GpuDevice for &mut D {
    fn surface_capabilities(&self) -> Result<SurfaceCapabilities, DeviceError> {
        (**self).surface_capabilities()
    }
    fn queue_families(&self) -> QueueFamilies {
        (**self).queue_families()
    }
    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<SwapchainHandle, DeviceError> {
        (**self).create_swapchain(desc)
    }
    fn swapchain_images(
        &mut self,
        swapchain: SwapchainHandle,
    ) -> Result<Vec<ImageHandle>, DeviceError> {
        (**self).swapchain_images(swapchain)
    }
    fn destroy_swapchain(&mut self, swapchain: SwapchainHandle) {
        (**self).destroy_swapchain(swapchain)
    }
    fn create_image_view(
        &mut self,
        image: ImageHandle,
        format: PixelFormat,
    ) -> Result<ImageViewHandle, DeviceError> {
        (**self).create_image_view(image, format)
    }
    fn destroy_image_view(&mut self, view: ImageViewHandle) {
        (**self).destroy_image_view(view)
    }
    fn create_render_pass(&mut self, format: PixelFormat) -> Result<RenderPassHandle, DeviceError> {
        (**self).create_render_pass(format)
    }
    fn destroy_render_pass(&mut self, render_pass: RenderPassHandle) {
        (**self).destroy_render_pass(render_pass)
    }
    fn create_framebuffer(
        &mut self,
        render_pass: RenderPassHandle,
        view: ImageViewHandle,
        extent: Extent2D,
    ) -> Result<FramebufferHandle, DeviceError> {
        (**self).create_framebuffer(render_pass, view, extent)
    }
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        (**self).destroy_framebuffer(framebuffer)
    }
    fn create_graphics_pipeline(
        &mut self,
        render_pass: RenderPassHandle,
    ) -> Result<GraphicsPipeline, DeviceError> {
        (**self).create_graphics_pipeline(render_pass)
    }
    fn destroy_graphics_pipeline(&mut self, pipeline: GraphicsPipeline) {
        (**self).destroy_graphics_pipeline(pipeline)
    }
    fn allocate_command_buffers(
        &mut self,
        count: u32,
    ) -> Result<Vec<CommandBufferHandle>, DeviceError> {
        (**self).allocate_command_buffers(count)
    }
    fn free_command_buffers(&mut self, buffers: &[CommandBufferHandle]) {
        (**self).free_command_buffers(buffers)
    }
    fn begin_command_buffer(&mut self, cmd: CommandBufferHandle) -> Result<(), DeviceError> {
        (**self).begin_command_buffer(cmd)
    }
    fn end_command_buffer(&mut self, cmd: CommandBufferHandle) -> Result<(), DeviceError> {
        (**self).end_command_buffer(cmd)
    }
    fn cmd_begin_render_pass(&mut self, cmd: CommandBufferHandle, begin: &RenderPassBegin) {
        (**self).cmd_begin_render_pass(cmd, begin)
    }
    fn cmd_bind_pipeline(&mut self, cmd: CommandBufferHandle, pipeline: PipelineHandle) {
        (**self).cmd_bind_pipeline(cmd, pipeline)
    }
    fn cmd_set_viewport(&mut self, cmd: CommandBufferHandle, viewport: &Viewport) {
        (**self).cmd_set_viewport(cmd, viewport)
    }
    fn cmd_set_scissor(&mut self, cmd: CommandBufferHandle, scissor: &Rect2D) {
        (**self).cmd_set_scissor(cmd, scissor)
    }
    fn cmd_draw(&mut self, cmd: CommandBufferHandle, draw: &DrawCall) {
        (**self).cmd_draw(cmd, draw)
    }
    fn cmd_end_render_pass(&mut self, cmd: CommandBufferHandle) {
        (**self).cmd_end_render_pass(cmd)
    }
    fn create_semaphore(&mut self) -> Result<SemaphoreHandle, DeviceError> {
        (**self).create_semaphore()
    }
    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle) {
        (**self).destroy_semaphore(semaphore)
    }
    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle, DeviceError> {
        (**self).create_fence(signaled)
    }
    fn destroy_fence(&mut self, fence: FenceHandle) {
        (**self).destroy_fence(fence)
    }
    fn wait_for_fence(&mut self, fence: FenceHandle) -> Result<(), DeviceError> {
        (**self).wait_for_fence(fence)
    }
    fn reset_fence(&mut self, fence: FenceHandle) -> Result<(), DeviceError> {
        (**self).reset_fence(fence)
    }
    fn acquire_next_image(
        &mut self,
        swapchain: SwapchainHandle,
        signal: SemaphoreHandle,
    ) -> Result<AcquireOutcome, DeviceError> {
        (**self).acquire_next_image(swapchain, signal)
    }
    fn submit(&mut self, submission: &Submission) -> Result<(), DeviceError> {
        (**self).submit(submission)
    }
    fn present(
        &mut self,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait: SemaphoreHandle,
    ) -> Result<PresentOutcome, DeviceError> {
        (**self).present(swapchain, image_index, wait)
    }
    fn wait_idle(&mut self) -> Result<(), DeviceError> {
        (**self).wait_idle()
    }
}
