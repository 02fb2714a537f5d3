// SPDX-License-Identifier: CEPL-1.0
//! Swapchain rebuilds.
//!
//! A rebuild drains the device, tears down everything that depends on the
//! swapchain extent and builds it again from fresh surface capabilities. The
//! pipeline and the frame ring survive; only the image map of the ring is
//! reset.

use tracing::{debug, info, warn};

use crate::commands::CommandRecorder;
use crate::device::{DeviceError, GpuDevice, GraphicsPipeline};
use crate::error::{FrameError, FrameResult};
use crate::handle::{CommandBufferHandle, SwapchainHandle};
use crate::surface::{query_capabilities, Extent2D};
use crate::swapchain::{SwapchainBuilder, SwapchainState};
use crate::sync::{FrameSynchronizer, FrameTarget};
use crate::window::WindowSurface;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Ready,
    Draining,
    Rebuilding,
    /// A rebuild or a frame failed. Nothing can be presented any more.
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebuildStatus {
    Rebuilt,
    /// The window closed while minimized; nothing was torn down.
    Deferred,
}

/// A swapchain together with the command buffers recorded against it.
#[derive(Debug)]
pub struct Presentation {
    pub swapchain: SwapchainState,
    pub command_buffers: Vec<CommandBufferHandle>,
}

impl Presentation {
    pub fn target(&self) -> FrameTarget<'_> {
        FrameTarget {
            swapchain: self.swapchain.handle(),
            command_buffers: &self.command_buffers,
        }
    }

    /// Frees the command buffers and the whole chain. The device must be idle.
    pub fn release<D: GpuDevice>(mut self, device: &mut D) {
        CommandRecorder::release(device, &mut self.command_buffers);
        self.swapchain.release(device);
    }

    /// Releases everything but the chain handle, which is returned so the
    /// next build can hand it to the driver.
    fn retire<D: GpuDevice>(mut self, device: &mut D) -> SwapchainHandle {
        self.swapchain.release_framebuffers(device);
        CommandRecorder::release(device, &mut self.command_buffers);
        self.swapchain.release_render_pass(device);
        self.swapchain.release_views(device);
        self.swapchain.into_retired()
    }
}

#[derive(Debug)]
pub struct LifecycleController {
    state: LifecycleState,
    rebuilds: u64,
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleController {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Ready,
            rebuilds: 0,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Records a fatal error outside a rebuild. A slot fence may have been
    /// reset with nothing submitted, so no later frame may wait on it.
    pub(crate) fn mark_failed(&mut self) {
        self.state = LifecycleState::Failed;
    }

    /// Blocks on window events until the framebuffer has a non-zero extent.
    /// Returns `None` if the window stops while still zero-sized.
    pub fn wait_for_drawable_extent<W: WindowSurface + ?Sized>(window: &mut W) -> Option<Extent2D> {
        let mut logged = false;
        loop {
            let extent = window.framebuffer_extent();
            if !extent.is_zero() {
                return Some(extent);
            }
            if !window.should_continue() {
                return None;
            }
            if !logged {
                debug!("framebuffer is zero-sized, waiting for events");
                logged = true;
            }
            window.wait_events();
        }
    }

    /// Replaces `presentation` with a chain matching the window's current size.
    #[allow(clippy::too_many_arguments)]
    pub fn rebuild<D: GpuDevice, W: WindowSurface + ?Sized>(
        &mut self,
        device: &mut D,
        window: &mut W,
        builder: &SwapchainBuilder,
        recorder: &CommandRecorder,
        pipeline: &GraphicsPipeline,
        presentation: &mut Option<Presentation>,
        sync: &mut FrameSynchronizer,
    ) -> FrameResult<RebuildStatus> {
        if self.state == LifecycleState::Failed {
            return Err(FrameError::Unavailable);
        }

        let Some(extent) = Self::wait_for_drawable_extent(window) else {
            debug!("window closed while minimized, rebuild deferred");
            return Ok(RebuildStatus::Deferred);
        };

        match self.replace(device, extent, builder, recorder, pipeline, presentation, sync) {
            Ok(()) => {
                self.state = LifecycleState::Ready;
                self.rebuilds += 1;
                Ok(RebuildStatus::Rebuilt)
            }
            Err(e) => {
                warn!(error = %e, "swapchain rebuild failed");
                self.state = LifecycleState::Failed;
                Err(FrameError::SwapchainRebuild(Box::new(e)))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn replace<D: GpuDevice>(
        &mut self,
        device: &mut D,
        extent: Extent2D,
        builder: &SwapchainBuilder,
        recorder: &CommandRecorder,
        pipeline: &GraphicsPipeline,
        presentation: &mut Option<Presentation>,
        sync: &mut FrameSynchronizer,
    ) -> FrameResult<()> {
        self.state = LifecycleState::Draining;
        device.wait_idle().map_err(FrameError::Drain)?;

        self.state = LifecycleState::Rebuilding;
        let previous_format = presentation.as_ref().map(|p| p.swapchain.format());
        let retired = presentation
            .take()
            .map(|p| p.retire(device))
            .filter(|h| !h.is_null());

        // The pipeline was built against the first format; it must not change.
        let built = query_capabilities(&*device).and_then(|caps| {
            let builder = match previous_format {
                Some(format) if !caps.formats.contains(&format) => {
                    warn!(?format, "surface no longer offers the swapchain format");
                    return Err(FrameError::SwapchainCreation(DeviceError::new(
                        "choose_surface_format",
                        format!("surface no longer offers {format:?}"),
                    )));
                }
                Some(format) => builder.pinned_to(format),
                None => builder.clone(),
            };
            builder.build(device, &caps, extent, retired)
        });
        if let Some(old) = retired {
            device.destroy_swapchain(old);
        }
        let swapchain = built?;

        let command_buffers = match recorder.record_all(device, &swapchain, pipeline) {
            Ok(buffers) => buffers,
            Err(e) => {
                swapchain.release(device);
                return Err(e);
            }
        };
        sync.reset_images(swapchain.image_count());

        info!(
            "swapchain rebuilt ({}x{}, {} images)",
            swapchain.extent().width,
            swapchain.extent().height,
            swapchain.image_count()
        );
        *presentation = Some(Presentation {
            swapchain,
            command_buffers,
        });
        Ok(())
    }
}
