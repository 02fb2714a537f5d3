// SPDX-License-Identifier: CEPL-1.0
//! Scripted in-memory device and window for engine tests.
//!
//! `MockDevice` keeps a trace of every call and tracks the state of fences,
//! semaphores and command buffers the way a driver's validation layer would.
//! Rule breaks are collected in `violations` instead of panicking so tests
//! can assert on them. A fence submitted to the queue stays pending until it
//! is waited on or the device is drained.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::commands::{DrawCall, Rect2D, RenderPassBegin, Viewport};
use crate::device::{
    AcquireOutcome, DeviceError, GpuDevice, GraphicsPipeline, PresentOutcome, Submission,
};
use crate::handle::{
    CommandBufferHandle, FenceHandle, FramebufferHandle, ImageHandle, ImageViewHandle,
    PipelineHandle, PipelineLayoutHandle, RenderPassHandle, SemaphoreHandle, SwapchainHandle,
};
use crate::surface::{
    ColorSpace, Extent2D, PixelFormat, PresentMode, QueueFamilies, SurfaceCapabilities,
    SurfaceFormat,
};
use crate::swapchain::SwapchainDesc;
use crate::window::WindowSurface;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptedAcquire {
    Stale,
    Suboptimal,
    Fail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptedPresent {
    Stale,
    Suboptimal,
    Fail,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    CreateSwapchain(SwapchainDesc),
    DestroySwapchain(SwapchainHandle),
    CreateImageView(ImageViewHandle),
    DestroyImageView(ImageViewHandle),
    CreateRenderPass(RenderPassHandle),
    DestroyRenderPass(RenderPassHandle),
    CreateFramebuffer(FramebufferHandle),
    DestroyFramebuffer(FramebufferHandle),
    CreatePipeline(PipelineHandle),
    DestroyPipeline(PipelineHandle),
    AllocateCommandBuffers(Vec<CommandBufferHandle>),
    FreeCommandBuffers(Vec<CommandBufferHandle>),
    CreateSemaphore(SemaphoreHandle),
    DestroySemaphore(SemaphoreHandle),
    CreateFence(FenceHandle),
    DestroyFence(FenceHandle),
    WaitFence(FenceHandle),
    ResetFence(FenceHandle),
    Acquire {
        swapchain: SwapchainHandle,
        image: Option<u32>,
    },
    /// `image` is the index of the swapchain image the buffer renders into.
    Submit {
        submission: Submission,
        image: usize,
    },
    Present {
        swapchain: SwapchainHandle,
        image_index: u32,
    },
    WaitIdle,
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::CreateSwapchain(_) => "create_swapchain",
            Event::DestroySwapchain(_) => "destroy_swapchain",
            Event::CreateImageView(_) => "create_image_view",
            Event::DestroyImageView(_) => "destroy_image_view",
            Event::CreateRenderPass(_) => "create_render_pass",
            Event::DestroyRenderPass(_) => "destroy_render_pass",
            Event::CreateFramebuffer(_) => "create_framebuffer",
            Event::DestroyFramebuffer(_) => "destroy_framebuffer",
            Event::CreatePipeline(_) => "create_graphics_pipeline",
            Event::DestroyPipeline(_) => "destroy_graphics_pipeline",
            Event::AllocateCommandBuffers(_) => "allocate_command_buffers",
            Event::FreeCommandBuffers(_) => "free_command_buffers",
            Event::CreateSemaphore(_) => "create_semaphore",
            Event::DestroySemaphore(_) => "destroy_semaphore",
            Event::CreateFence(_) => "create_fence",
            Event::DestroyFence(_) => "destroy_fence",
            Event::WaitFence(_) => "wait_fence",
            Event::ResetFence(_) => "reset_fence",
            Event::Acquire { .. } => "acquire",
            Event::Submit { .. } => "submit",
            Event::Present { .. } => "present",
            Event::WaitIdle => "wait_idle",
        }
    }
}

/// A command recorded into a buffer.
#[derive(Clone, Debug, PartialEq)]
pub enum Recorded {
    Begin,
    BeginRenderPass(RenderPassBegin),
    BindPipeline(PipelineHandle),
    SetViewport(Viewport),
    SetScissor(Rect2D),
    Draw(DrawCall),
    EndRenderPass,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FenceState {
    Signaled,
    Unsignaled,
    /// Attached to a submission the CPU has not observed finishing.
    Pending,
}

#[derive(Debug, Default)]
struct MockCommandBuffer {
    recorded: Vec<Recorded>,
    recording: bool,
    pending: Option<FenceHandle>,
}

#[derive(Debug)]
struct MockSwapchain {
    images: Vec<ImageHandle>,
    next: usize,
    retired: bool,
}

/// Number of objects currently alive, per kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiveCounts {
    pub swapchains: usize,
    pub image_views: usize,
    pub render_passes: usize,
    pub framebuffers: usize,
    pub pipelines: usize,
    pub command_buffers: usize,
    pub semaphores: usize,
    pub fences: usize,
}

impl LiveCounts {
    pub fn is_empty(&self) -> bool {
        *self == LiveCounts::default()
    }
}

#[derive(Debug)]
pub struct MockDevice {
    pub caps: SurfaceCapabilities,
    pub families: QueueFamilies,
    pub events: Vec<Event>,
    pub violations: Vec<String>,
    pub acquire_script: VecDeque<ScriptedAcquire>,
    pub present_script: VecDeque<ScriptedPresent>,
    failures: HashSet<&'static str>,
    next_id: u64,
    swapchains: HashMap<SwapchainHandle, MockSwapchain>,
    views: HashMap<ImageViewHandle, ImageHandle>,
    render_passes: HashSet<RenderPassHandle>,
    framebuffers: HashMap<FramebufferHandle, (RenderPassHandle, ImageViewHandle)>,
    pipelines: HashMap<PipelineHandle, PipelineLayoutHandle>,
    command_buffers: HashMap<CommandBufferHandle, MockCommandBuffer>,
    semaphores: HashMap<SemaphoreHandle, bool>,
    fences: HashMap<FenceHandle, FenceState>,
    image_writers: HashMap<ImageHandle, FenceHandle>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            caps: Self::default_capabilities(),
            families: QueueFamilies {
                graphics: 0,
                present: 0,
            },
            events: Vec::new(),
            violations: Vec::new(),
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            failures: HashSet::new(),
            next_id: 1,
            swapchains: HashMap::new(),
            views: HashMap::new(),
            render_passes: HashSet::new(),
            framebuffers: HashMap::new(),
            pipelines: HashMap::new(),
            command_buffers: HashMap::new(),
            semaphores: HashMap::new(),
            fences: HashMap::new(),
            image_writers: HashMap::new(),
        }
    }

    /// A surface that leaves the extent to the swapchain and supports both
    /// mailbox and FIFO.
    pub fn default_capabilities() -> SurfaceCapabilities {
        SurfaceCapabilities {
            formats: vec![
                SurfaceFormat::new(PixelFormat::B8G8R8A8_SRGB, ColorSpace::SRGB_NONLINEAR),
                SurfaceFormat::new(PixelFormat::B8G8R8A8_UNORM, ColorSpace::SRGB_NONLINEAR),
            ],
            present_modes: vec![PresentMode::Fifo, PresentMode::Mailbox, PresentMode::Immediate],
            min_extent: Extent2D::new(1, 1),
            max_extent: Extent2D::new(4096, 4096),
            current_extent: None,
            min_image_count: 2,
            max_image_count: None,
        }
    }

    /// Makes every later call named `call` fail.
    pub fn fail_on(&mut self, call: &'static str) {
        self.failures.insert(call);
    }

    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    pub fn recorded(&self, cmd: CommandBufferHandle) -> &[Recorded] {
        self.command_buffers
            .get(&cmd)
            .map(|c| c.recorded.as_slice())
            .unwrap_or(&[])
    }

    pub fn fence_signaled(&self, fence: FenceHandle) -> bool {
        self.fences.get(&fence) == Some(&FenceState::Signaled)
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }

    pub fn live(&self) -> LiveCounts {
        LiveCounts {
            swapchains: self.swapchains.len(),
            image_views: self.views.len(),
            render_passes: self.render_passes.len(),
            framebuffers: self.framebuffers.len(),
            pipelines: self.pipelines.len(),
            command_buffers: self.command_buffers.len(),
            semaphores: self.semaphores.len(),
            fences: self.fences.len(),
        }
    }

    fn check(&self, call: &'static str) -> Result<(), DeviceError> {
        if self.failures.contains(call) {
            Err(DeviceError::new(call, "injected failure"))
        } else {
            Ok(())
        }
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn violation(&mut self, msg: impl Into<String>) {
        self.violations.push(msg.into());
    }

    fn gpu_busy(&self) -> bool {
        self.fences.values().any(|&s| s == FenceState::Pending)
    }

    fn complete(&mut self, fence: FenceHandle) {
        self.fences.insert(fence, FenceState::Signaled);
        for cb in self.command_buffers.values_mut() {
            if cb.pending == Some(fence) {
                cb.pending = None;
            }
        }
    }

    /// Follows cmd → framebuffer → view → image → index in its swapchain.
    fn target_image(&self, cmd: CommandBufferHandle) -> Option<(ImageHandle, usize)> {
        let fb = self.recorded(cmd).iter().find_map(|r| match r {
            Recorded::BeginRenderPass(begin) => Some(begin.framebuffer),
            _ => None,
        })?;
        let (_, view) = self.framebuffers.get(&fb)?;
        let image = *self.views.get(view)?;
        let index = self
            .swapchains
            .values()
            .find_map(|sc| sc.images.iter().position(|&i| i == image))?;
        Some((image, index))
    }

    fn record(&mut self, cmd: CommandBufferHandle, op: Recorded) {
        match self.command_buffers.get_mut(&cmd).filter(|cb| cb.recording) {
            Some(cb) => cb.recorded.push(op),
            None => self.violation(format!("{op:?} recorded outside begin/end on {cmd:?}")),
        }
    }
}

impl GpuDevice for MockDevice {
    fn surface_capabilities(&self) -> Result<SurfaceCapabilities, DeviceError> {
        self.check("surface_capabilities")?;
        Ok(self.caps.clone())
    }

    fn queue_families(&self) -> QueueFamilies {
        self.families
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<SwapchainHandle, DeviceError> {
        self.check("create_swapchain")?;
        if let Some(prev) = desc.previous {
            match self.swapchains.get_mut(&prev) {
                Some(old) => old.retired = true,
                None => self.violation(format!("previous chain {prev:?} is not alive")),
            }
        }
        let handle = SwapchainHandle::from_raw(self.next());
        let images = (0..desc.image_count)
            .map(|_| ImageHandle::from_raw(self.next()))
            .collect();
        self.swapchains.insert(
            handle,
            MockSwapchain {
                images,
                next: 0,
                retired: false,
            },
        );
        self.events.push(Event::CreateSwapchain(*desc));
        Ok(handle)
    }

    fn swapchain_images(
        &mut self,
        swapchain: SwapchainHandle,
    ) -> Result<Vec<ImageHandle>, DeviceError> {
        self.check("swapchain_images")?;
        self.swapchains
            .get(&swapchain)
            .map(|sc| sc.images.clone())
            .ok_or_else(|| DeviceError::new("swapchain_images", "unknown swapchain"))
    }

    fn destroy_swapchain(&mut self, swapchain: SwapchainHandle) {
        if self.gpu_busy() {
            self.violation("swapchain destroyed while GPU work is pending");
        }
        match self.swapchains.remove(&swapchain) {
            Some(sc) => {
                if self.views.values().any(|img| sc.images.contains(img)) {
                    self.violation("swapchain destroyed before its image views");
                }
            }
            None => self.violation(format!("destroying unknown swapchain {swapchain:?}")),
        }
        self.events.push(Event::DestroySwapchain(swapchain));
    }

    fn create_image_view(
        &mut self,
        image: ImageHandle,
        _format: PixelFormat,
    ) -> Result<ImageViewHandle, DeviceError> {
        self.check("create_image_view")?;
        let view = ImageViewHandle::from_raw(self.next());
        self.views.insert(view, image);
        self.events.push(Event::CreateImageView(view));
        Ok(view)
    }

    fn destroy_image_view(&mut self, view: ImageViewHandle) {
        if self.gpu_busy() {
            self.violation("image view destroyed while GPU work is pending");
        }
        if self.framebuffers.values().any(|&(_, v)| v == view) {
            self.violation("image view destroyed before its framebuffer");
        }
        self.views.remove(&view);
        self.events.push(Event::DestroyImageView(view));
    }

    fn create_render_pass(&mut self, _format: PixelFormat) -> Result<RenderPassHandle, DeviceError> {
        self.check("create_render_pass")?;
        let rp = RenderPassHandle::from_raw(self.next());
        self.render_passes.insert(rp);
        self.events.push(Event::CreateRenderPass(rp));
        Ok(rp)
    }

    fn destroy_render_pass(&mut self, render_pass: RenderPassHandle) {
        if self.framebuffers.values().any(|&(rp, _)| rp == render_pass) {
            self.violation("render pass destroyed before its framebuffers");
        }
        self.render_passes.remove(&render_pass);
        self.events.push(Event::DestroyRenderPass(render_pass));
    }

    fn create_framebuffer(
        &mut self,
        render_pass: RenderPassHandle,
        view: ImageViewHandle,
        _extent: Extent2D,
    ) -> Result<FramebufferHandle, DeviceError> {
        self.check("create_framebuffer")?;
        if !self.render_passes.contains(&render_pass) || !self.views.contains_key(&view) {
            self.violation("framebuffer created from dead objects");
        }
        let fb = FramebufferHandle::from_raw(self.next());
        self.framebuffers.insert(fb, (render_pass, view));
        self.events.push(Event::CreateFramebuffer(fb));
        Ok(fb)
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if self.gpu_busy() {
            self.violation("framebuffer destroyed while GPU work is pending");
        }
        self.framebuffers.remove(&framebuffer);
        self.events.push(Event::DestroyFramebuffer(framebuffer));
    }

    fn create_graphics_pipeline(
        &mut self,
        render_pass: RenderPassHandle,
    ) -> Result<GraphicsPipeline, DeviceError> {
        self.check("create_graphics_pipeline")?;
        if !self.render_passes.contains(&render_pass) {
            self.violation("pipeline created against a dead render pass");
        }
        let layout = PipelineLayoutHandle::from_raw(self.next());
        let pipeline = PipelineHandle::from_raw(self.next());
        self.pipelines.insert(pipeline, layout);
        self.events.push(Event::CreatePipeline(pipeline));
        Ok(GraphicsPipeline { layout, pipeline })
    }

    fn destroy_graphics_pipeline(&mut self, pipeline: GraphicsPipeline) {
        if self.pipelines.remove(&pipeline.pipeline) != Some(pipeline.layout) {
            self.violation("destroying unknown pipeline");
        }
        self.events.push(Event::DestroyPipeline(pipeline.pipeline));
    }

    fn allocate_command_buffers(
        &mut self,
        count: u32,
    ) -> Result<Vec<CommandBufferHandle>, DeviceError> {
        self.check("allocate_command_buffers")?;
        let buffers: Vec<_> = (0..count)
            .map(|_| CommandBufferHandle::from_raw(self.next()))
            .collect();
        for &cmd in &buffers {
            self.command_buffers.insert(cmd, MockCommandBuffer::default());
        }
        self.events.push(Event::AllocateCommandBuffers(buffers.clone()));
        Ok(buffers)
    }

    fn free_command_buffers(&mut self, buffers: &[CommandBufferHandle]) {
        for cmd in buffers {
            match self.command_buffers.remove(cmd) {
                Some(cb) if cb.pending.is_some() => {
                    self.violation(format!("{cmd:?} freed while pending"))
                }
                Some(_) => {}
                None => self.violation(format!("freeing unknown {cmd:?}")),
            }
        }
        self.events.push(Event::FreeCommandBuffers(buffers.to_vec()));
    }

    fn begin_command_buffer(&mut self, cmd: CommandBufferHandle) -> Result<(), DeviceError> {
        self.check("begin_command_buffer")?;
        let Some(cb) = self.command_buffers.get_mut(&cmd) else {
            return Err(DeviceError::new("begin_command_buffer", "unknown buffer"));
        };
        let pending = cb.pending.is_some();
        cb.recorded.clear();
        cb.recorded.push(Recorded::Begin);
        cb.recording = true;
        if pending {
            self.violation(format!("{cmd:?} re-recorded while pending"));
        }
        Ok(())
    }

    fn end_command_buffer(&mut self, cmd: CommandBufferHandle) -> Result<(), DeviceError> {
        self.check("end_command_buffer")?;
        self.record(cmd, Recorded::End);
        if let Some(cb) = self.command_buffers.get_mut(&cmd) {
            cb.recording = false;
        }
        Ok(())
    }

    fn cmd_begin_render_pass(&mut self, cmd: CommandBufferHandle, begin: &RenderPassBegin) {
        self.record(cmd, Recorded::BeginRenderPass(*begin));
    }

    fn cmd_bind_pipeline(&mut self, cmd: CommandBufferHandle, pipeline: PipelineHandle) {
        self.record(cmd, Recorded::BindPipeline(pipeline));
    }

    fn cmd_set_viewport(&mut self, cmd: CommandBufferHandle, viewport: &Viewport) {
        self.record(cmd, Recorded::SetViewport(*viewport));
    }

    fn cmd_set_scissor(&mut self, cmd: CommandBufferHandle, scissor: &Rect2D) {
        self.record(cmd, Recorded::SetScissor(*scissor));
    }

    fn cmd_draw(&mut self, cmd: CommandBufferHandle, draw: &DrawCall) {
        self.record(cmd, Recorded::Draw(*draw));
    }

    fn cmd_end_render_pass(&mut self, cmd: CommandBufferHandle) {
        self.record(cmd, Recorded::EndRenderPass);
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle, DeviceError> {
        self.check("create_semaphore")?;
        let sem = SemaphoreHandle::from_raw(self.next());
        self.semaphores.insert(sem, false);
        self.events.push(Event::CreateSemaphore(sem));
        Ok(sem)
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle) {
        if self.gpu_busy() {
            self.violation("semaphore destroyed while GPU work is pending");
        }
        self.semaphores.remove(&semaphore);
        self.events.push(Event::DestroySemaphore(semaphore));
    }

    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle, DeviceError> {
        self.check("create_fence")?;
        let fence = FenceHandle::from_raw(self.next());
        let state = if signaled {
            FenceState::Signaled
        } else {
            FenceState::Unsignaled
        };
        self.fences.insert(fence, state);
        self.events.push(Event::CreateFence(fence));
        Ok(fence)
    }

    fn destroy_fence(&mut self, fence: FenceHandle) {
        if self.fences.remove(&fence) == Some(FenceState::Pending) {
            self.violation(format!("{fence:?} destroyed while pending"));
        }
        self.events.push(Event::DestroyFence(fence));
    }

    fn wait_for_fence(&mut self, fence: FenceHandle) -> Result<(), DeviceError> {
        self.check("wait_for_fence")?;
        self.events.push(Event::WaitFence(fence));
        match self.fences.get(&fence) {
            Some(FenceState::Signaled) => Ok(()),
            Some(FenceState::Pending) => {
                self.complete(fence);
                Ok(())
            }
            Some(FenceState::Unsignaled) => Err(DeviceError::new(
                "wait_for_fence",
                "fence has no pending submission, wait would never return",
            )),
            None => Err(DeviceError::new("wait_for_fence", "unknown fence")),
        }
    }

    fn reset_fence(&mut self, fence: FenceHandle) -> Result<(), DeviceError> {
        self.check("reset_fence")?;
        if self.fences.get(&fence) == Some(&FenceState::Pending) {
            self.violation(format!("{fence:?} reset while pending"));
        }
        self.fences.insert(fence, FenceState::Unsignaled);
        self.events.push(Event::ResetFence(fence));
        Ok(())
    }

    fn acquire_next_image(
        &mut self,
        swapchain: SwapchainHandle,
        signal: SemaphoreHandle,
    ) -> Result<AcquireOutcome, DeviceError> {
        self.check("acquire_next_image")?;
        let scripted = self.acquire_script.pop_front();
        if scripted == Some(ScriptedAcquire::Fail) {
            return Err(DeviceError::new("acquire_next_image", "scripted failure"));
        }
        if scripted == Some(ScriptedAcquire::Stale) {
            self.events.push(Event::Acquire {
                swapchain,
                image: None,
            });
            return Ok(AcquireOutcome::Stale);
        }

        let Some(sc) = self.swapchains.get_mut(&swapchain) else {
            return Err(DeviceError::new("acquire_next_image", "unknown swapchain"));
        };
        let retired = sc.retired;
        let index = (sc.next % sc.images.len()) as u32;
        sc.next += 1;
        if retired {
            self.violation("acquire from a retired swapchain");
        }
        if self.semaphores.insert(signal, true) == Some(true) {
            self.violation(format!("{signal:?} signalled twice by acquire"));
        }
        self.events.push(Event::Acquire {
            swapchain,
            image: Some(index),
        });
        Ok(match scripted {
            Some(ScriptedAcquire::Suboptimal) => AcquireOutcome::Suboptimal(index),
            _ => AcquireOutcome::Ready(index),
        })
    }

    fn submit(&mut self, submission: &Submission) -> Result<(), DeviceError> {
        self.check("submit")?;
        let Submission {
            command_buffer,
            wait,
            signal,
            fence,
            ..
        } = *submission;

        let state = self
            .command_buffers
            .get(&command_buffer)
            .map(|cb| (cb.recording, cb.pending.is_some()));
        match state {
            Some((true, _)) => self.violation("submitting a buffer still recording"),
            Some((_, true)) => {
                self.violation(format!("{command_buffer:?} resubmitted while pending"))
            }
            Some(_) => {}
            None => return Err(DeviceError::new("submit", "unknown command buffer")),
        }
        if self.semaphores.insert(wait, false) != Some(true) {
            self.violation(format!("submit waits on unsignalled {wait:?}"));
        }
        if self.semaphores.insert(signal, true) == Some(true) {
            self.violation(format!("submit signals already signalled {signal:?}"));
        }
        if self.fences.get(&fence) != Some(&FenceState::Unsignaled) {
            self.violation(format!("submit with {fence:?} not reset"));
        }
        self.fences.insert(fence, FenceState::Pending);
        if let Some(cb) = self.command_buffers.get_mut(&command_buffer) {
            cb.pending = Some(fence);
        }

        let image = match self.target_image(command_buffer) {
            Some((image, index)) => {
                if let Some(prev) = self.image_writers.insert(image, fence) {
                    if prev != fence && self.fences.get(&prev) == Some(&FenceState::Pending) {
                        self.violation(format!(
                            "image {index} written while {prev:?} is still pending"
                        ));
                    }
                }
                index
            }
            None => {
                self.violation("submitted buffer does not target a swapchain image");
                usize::MAX
            }
        };
        self.events.push(Event::Submit {
            submission: *submission,
            image,
        });
        Ok(())
    }

    fn present(
        &mut self,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait: SemaphoreHandle,
    ) -> Result<PresentOutcome, DeviceError> {
        self.check("present")?;
        let scripted = self.present_script.pop_front();
        if scripted == Some(ScriptedPresent::Fail) {
            return Err(DeviceError::new("present", "scripted failure"));
        }
        if self.semaphores.insert(wait, false) != Some(true) {
            self.violation(format!("present waits on unsignalled {wait:?}"));
        }
        self.events.push(Event::Present {
            swapchain,
            image_index,
        });
        Ok(match scripted {
            Some(ScriptedPresent::Stale) => PresentOutcome::Stale,
            Some(ScriptedPresent::Suboptimal) => PresentOutcome::Suboptimal,
            _ => PresentOutcome::Presented,
        })
    }

    fn wait_idle(&mut self) -> Result<(), DeviceError> {
        self.check("wait_idle")?;
        let pending: Vec<FenceHandle> = self
            .fences
            .iter()
            .filter(|(_, s)| **s == FenceState::Pending)
            .map(|(f, _)| *f)
            .collect();
        for fence in pending {
            self.complete(fence);
        }
        self.events.push(Event::WaitIdle);
        Ok(())
    }
}

/// Window whose size changes only when the test says so.
#[derive(Debug)]
pub struct MockWindow {
    extent: Extent2D,
    queued: VecDeque<Extent2D>,
    running: bool,
    resized: bool,
    close_after_polls: Option<usize>,
    pub polls: usize,
    pub waits: usize,
}

impl MockWindow {
    pub fn new(extent: Extent2D) -> Self {
        Self {
            extent,
            queued: VecDeque::new(),
            running: true,
            resized: false,
            close_after_polls: None,
            polls: 0,
            waits: 0,
        }
    }

    /// Changes the size without raising the resize flag.
    pub fn set_extent(&mut self, extent: Extent2D) {
        self.extent = extent;
    }

    /// Changes the size and raises the resize flag, like a user drag.
    pub fn resize(&mut self, extent: Extent2D) {
        self.extent = extent;
        self.resized = true;
    }

    /// Sizes delivered one per `wait_events` call. An empty queue closes the
    /// window so a blocking wait never hangs a test.
    pub fn queue_extents(&mut self, extents: impl IntoIterator<Item = Extent2D>) {
        self.queued.extend(extents);
    }

    pub fn close(&mut self) {
        self.running = false;
    }

    pub fn close_after_polls(&mut self, polls: usize) {
        self.close_after_polls = Some(polls);
    }

    pub fn resize_pending(&self) -> bool {
        self.resized
    }
}

impl WindowSurface for MockWindow {
    fn framebuffer_extent(&self) -> Extent2D {
        self.extent
    }

    fn should_continue(&self) -> bool {
        self.running
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    fn poll_events(&mut self) {
        self.polls += 1;
        if self.close_after_polls.is_some_and(|n| self.polls > n) {
            self.running = false;
        }
    }

    fn wait_events(&mut self) {
        self.waits += 1;
        match self.queued.pop_front() {
            Some(extent) => self.resize(extent),
            None => self.running = false,
        }
    }
}
