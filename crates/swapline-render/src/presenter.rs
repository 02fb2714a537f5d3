// SPDX-License-Identifier: CEPL-1.0
use tracing::{debug, info, warn};

use crate::commands::CommandRecorder;
use crate::config::EngineConfig;
use crate::device::{DeviceError, GpuDevice, GraphicsPipeline};
use crate::error::{FrameError, FrameResult};
use crate::handle::CommandBufferHandle;
use crate::lifecycle::{LifecycleController, LifecycleState, Presentation, RebuildStatus};
use crate::surface::query_capabilities;
use crate::swapchain::{SwapchainBuilder, SwapchainState};
use crate::sync::{FrameStatus, FrameSynchronizer};
use crate::window::WindowSurface;

/// What happened during one `draw_frame` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameReport {
    /// Ring slot the frame ran in.
    pub slot: usize,
    /// `None` when acquire found the swapchain stale and nothing was drawn.
    pub image_index: Option<u32>,
    pub rebuilt: bool,
}

/// Owns the device and everything created on it for presenting frames.
pub struct Presenter<D: GpuDevice> {
    device: D,
    builder: SwapchainBuilder,
    recorder: CommandRecorder,
    pipeline: GraphicsPipeline,
    presentation: Option<Presentation>,
    sync: FrameSynchronizer,
    lifecycle: LifecycleController,
    shut_down: bool,
}

impl<D: GpuDevice> Presenter<D> {
    pub fn new<W: WindowSurface + ?Sized>(
        mut device: D,
        window: &mut W,
        config: &EngineConfig,
    ) -> FrameResult<Self> {
        config.validate()?;

        let extent = LifecycleController::wait_for_drawable_extent(window).ok_or_else(|| {
            FrameError::SwapchainCreation(DeviceError::new(
                "framebuffer_extent",
                "window closed before it had a drawable size",
            ))
        })?;

        let builder = SwapchainBuilder::new(config);
        let recorder = CommandRecorder::new(config);
        let caps = query_capabilities(&device)?;
        let swapchain = builder.build(&mut device, &caps, extent, None)?;

        // Viewport and scissor are dynamic, so the pipeline stays valid for
        // every later chain built with the same format.
        let pipeline = match device.create_graphics_pipeline(swapchain.render_pass()) {
            Ok(p) => p,
            Err(e) => {
                swapchain.release(&mut device);
                return Err(FrameError::PipelineCreation(e));
            }
        };

        let command_buffers = match recorder.record_all(&mut device, &swapchain, &pipeline) {
            Ok(b) => b,
            Err(e) => {
                device.destroy_graphics_pipeline(pipeline);
                swapchain.release(&mut device);
                return Err(e);
            }
        };
        let presentation = Presentation {
            swapchain,
            command_buffers,
        };

        let sync = match FrameSynchronizer::new(
            &mut device,
            config.max_frames_in_flight,
            presentation.swapchain.image_count(),
        ) {
            Ok(s) => s,
            Err(e) => {
                presentation.release(&mut device);
                device.destroy_graphics_pipeline(pipeline);
                return Err(e);
            }
        };

        // The chain already matches the current size.
        window.take_resized();

        info!(
            frames_in_flight = config.max_frames_in_flight,
            "presenter ready"
        );
        Ok(Self {
            device,
            builder,
            recorder,
            pipeline,
            presentation: Some(presentation),
            sync,
            lifecycle: LifecycleController::new(),
            shut_down: false,
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn swapchain(&self) -> Option<&SwapchainState> {
        self.presentation.as_ref().map(|p| &p.swapchain)
    }

    pub fn command_buffers(&self) -> &[CommandBufferHandle] {
        self.presentation
            .as_ref()
            .map(|p| p.command_buffers.as_slice())
            .unwrap_or(&[])
    }

    pub fn pipeline(&self) -> &GraphicsPipeline {
        &self.pipeline
    }

    pub fn synchronizer(&self) -> &FrameSynchronizer {
        &self.sync
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    /// Draws and presents one frame, rebuilding the swapchain afterwards if
    /// the surface went stale or the window was resized.
    pub fn draw_frame<W: WindowSurface + ?Sized>(
        &mut self,
        window: &mut W,
    ) -> FrameResult<FrameReport> {
        if self.shut_down || self.lifecycle.state() == LifecycleState::Failed {
            return Err(FrameError::Unavailable);
        }
        let Some(presentation) = self.presentation.as_ref() else {
            return Err(FrameError::Unavailable);
        };

        let slot = self.sync.current_slot();
        let status = match self.sync.draw_frame(&mut self.device, presentation.target()) {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, slot, "frame failed, presenter stopped");
                self.lifecycle.mark_failed();
                return Err(e);
            }
        };
        let (image_index, stale) = match status {
            FrameStatus::Presented { image_index, stale } => (Some(image_index), stale),
            FrameStatus::Stale => (None, true),
        };

        let resized = window.take_resized();
        let mut rebuilt = false;
        if stale || resized {
            debug!(stale, resized, "rebuilding swapchain");
            let status = self.lifecycle.rebuild(
                &mut self.device,
                window,
                &self.builder,
                &self.recorder,
                &self.pipeline,
                &mut self.presentation,
                &mut self.sync,
            )?;
            if status == RebuildStatus::Rebuilt {
                rebuilt = true;
                // Resizes seen while waiting are covered by the new chain.
                window.take_resized();
            }
        }

        Ok(FrameReport {
            slot,
            image_index,
            rebuilt,
        })
    }

    /// Runs frames until the window closes or `on_frame` returns `false`, then
    /// drains the device. Returns the number of frames presented.
    pub fn run<W, F>(&mut self, window: &mut W, mut on_frame: F) -> FrameResult<u64>
    where
        W: WindowSurface + ?Sized,
        F: FnMut(&FrameReport) -> bool,
    {
        let mut frames = 0u64;
        while window.should_continue() {
            window.poll_events();
            if !window.should_continue() {
                break;
            }
            let report = self.draw_frame(window)?;
            if report.image_index.is_some() {
                frames += 1;
            }
            if !on_frame(&report) {
                break;
            }
        }

        self.device.wait_idle().map_err(FrameError::Drain)?;
        info!(frames, rebuilds = self.lifecycle.rebuild_count(), "frame loop finished");
        Ok(frames)
    }

    /// Drains the device and releases everything the presenter created.
    /// Later calls do nothing.
    pub fn shutdown(&mut self) -> FrameResult<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        let drained = self.device.wait_idle().map_err(FrameError::Drain);
        self.sync.destroy(&mut self.device);
        if let Some(presentation) = self.presentation.take() {
            presentation.release(&mut self.device);
        }
        self.device.destroy_graphics_pipeline(self.pipeline);
        debug!("presenter resources released");
        drained
    }
}

impl<D: GpuDevice> Drop for Presenter<D> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "presenter shutdown failed");
        }
    }
}
