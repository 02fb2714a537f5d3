// SPDX-License-Identifier: CEPL-1.0
use tracing::debug;

use crate::config::EngineConfig;
use crate::device::{DeviceError, GpuDevice, GraphicsPipeline};
use crate::error::{FrameError, FrameResult};
use crate::handle::{CommandBufferHandle, FramebufferHandle, RenderPassHandle};
use crate::surface::Extent2D;
use crate::swapchain::SwapchainState;

/// The fixed draw workload, issued as-is inside the render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

impl DrawCall {
    /// Three vertices generated by the vertex shader, one instance.
    pub const TRIANGLE: Self = Self {
        vertex_count: 3,
        instance_count: 1,
        first_vertex: 0,
        first_instance: 0,
    };
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn covering(extent: Extent2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub extent: Extent2D,
}

impl Rect2D {
    pub fn covering(extent: Extent2D) -> Self {
        Self { x: 0, y: 0, extent }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderPassBegin {
    pub render_pass: RenderPassHandle,
    pub framebuffer: FramebufferHandle,
    pub render_area: Rect2D,
    pub clear_color: [f32; 4],
}

/// Records one command buffer per framebuffer of a swapchain.
#[derive(Clone, Debug)]
pub struct CommandRecorder {
    clear_color: [f32; 4],
    draw: DrawCall,
}

impl CommandRecorder {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            clear_color: config.clear_color,
            draw: config.draw,
        }
    }

    pub fn record_all<D: GpuDevice>(
        &self,
        device: &mut D,
        swapchain: &SwapchainState,
        pipeline: &GraphicsPipeline,
    ) -> FrameResult<Vec<CommandBufferHandle>> {
        let count = swapchain.framebuffers().len() as u32;
        let buffers = device
            .allocate_command_buffers(count)
            .map_err(FrameError::CommandRecording)?;
        if buffers.len() != swapchain.framebuffers().len() {
            let got = buffers.len();
            device.free_command_buffers(&buffers);
            return Err(FrameError::CommandRecording(DeviceError::new(
                "allocate_command_buffers",
                format!("asked for {count} buffers, got {got}"),
            )));
        }

        for (&cmd, &fb) in buffers.iter().zip(swapchain.framebuffers()) {
            if let Err(e) = self.record_one(device, cmd, swapchain, fb, pipeline) {
                device.free_command_buffers(&buffers);
                return Err(e);
            }
        }
        debug!(count, "command buffers recorded");
        Ok(buffers)
    }

    /// Re-records a single buffer against `framebuffer`.
    pub fn record_one<D: GpuDevice>(
        &self,
        device: &mut D,
        cmd: CommandBufferHandle,
        swapchain: &SwapchainState,
        framebuffer: FramebufferHandle,
        pipeline: &GraphicsPipeline,
    ) -> FrameResult<()> {
        let extent = swapchain.extent();
        device
            .begin_command_buffer(cmd)
            .map_err(FrameError::CommandRecording)?;

        device.cmd_begin_render_pass(
            cmd,
            &RenderPassBegin {
                render_pass: swapchain.render_pass(),
                framebuffer,
                render_area: Rect2D::covering(extent),
                clear_color: self.clear_color,
            },
        );
        device.cmd_bind_pipeline(cmd, pipeline.pipeline);
        // Viewport and scissor are dynamic state: the pipeline survives rebuilds, the extent does not.
        device.cmd_set_viewport(cmd, &Viewport::covering(extent));
        device.cmd_set_scissor(cmd, &Rect2D::covering(extent));
        device.cmd_draw(cmd, &self.draw);
        device.cmd_end_render_pass(cmd);

        device
            .end_command_buffer(cmd)
            .map_err(FrameError::CommandRecording)
    }

    pub fn release<D: GpuDevice>(device: &mut D, buffers: &mut Vec<CommandBufferHandle>) {
        if !buffers.is_empty() {
            device.free_command_buffers(buffers);
            buffers.clear();
        }
    }
}
