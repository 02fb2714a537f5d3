use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};

use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use swapline_render::{
  AcquireOutcome, CommandBufferHandle, DeviceError, DrawCall, Extent2D, FenceHandle,
  FramebufferHandle, GpuDevice, GraphicsPipeline, ImageHandle, ImageViewHandle, PipelineHandle,
  PipelineLayoutHandle, PixelFormat, PresentOutcome, QueueFamilies, Rect2D, RenderPassBegin,
  RenderPassHandle, SemaphoreHandle, SharingMode, Submission, SurfaceCapabilities, SwapchainDesc,
  SwapchainHandle, Viewport, WaitStage,
};

use ash::khr::{surface, swapchain};
use ash::vk::Handle;
use ash::{vk, Entry, Instance};

mod convert;
mod instance;
mod physical;
mod pipeline;
mod shaders;

use convert::{
  capabilities_from_vk, color_space_to_vk, extent_to_vk, format_to_vk, present_mode_to_vk, vk_err,
};
use instance::DebugMessenger;

/// Settings for bringing up the Vulkan device.
#[derive(Clone, Debug)]
pub struct VkDeviceConfig {
  pub app_name: String,
  /// Request the Khronos validation layer. Skipped with a warning when the
  /// layer is not installed.
  pub validation: bool,
}

impl Default for VkDeviceConfig {
  fn default() -> Self {
    Self { app_name: "swapline".to_owned(), validation: cfg!(debug_assertions) }
  }
}

/// Instance, surface, logical device and queues behind [`GpuDevice`].
pub struct VkDevice {
  _entry: Entry,
  instance: Instance,
  messenger: Option<DebugMessenger>,
  surface_loader: surface::Instance,
  surface: vk::SurfaceKHR,

  phys: vk::PhysicalDevice,
  device: ash::Device,
  families: QueueFamilies,
  graphics_queue: vk::Queue,
  present_queue: vk::Queue,

  swapchain_loader: swapchain::Device,
  cmd_pool: vk::CommandPool,
}

fn to_vk<T: Handle>(raw: u64) -> T {
  T::from_raw(raw)
}

/// Objects created so far during bring-up, torn down in reverse on failure.
struct Partial {
  entry: Entry,
  instance: Option<Instance>,
  messenger: Option<DebugMessenger>,
  surface: Option<(surface::Instance, vk::SurfaceKHR)>,
  device: Option<ash::Device>,
}

impl Drop for Partial {
  fn drop(&mut self) {
    unsafe {
      if let Some(d) = self.device.take() {
        d.destroy_device(None);
      }
      if let Some((loader, s)) = self.surface.take() {
        loader.destroy_surface(s, None);
      }
      if let Some(m) = self.messenger.take() {
        m.destroy();
      }
      if let Some(i) = self.instance.take() {
        i.destroy_instance(None);
      }
    }
  }
}

unsafe fn build_device(
  window: &dyn HasWindowHandle,
  display: &dyn HasDisplayHandle,
  cfg: &VkDeviceConfig,
) -> Result<VkDevice> {
  let dh: RawDisplayHandle = display.display_handle()?.as_raw();
  let wh: RawWindowHandle = window.window_handle()?.as_raw();

  let mut p = Partial {
    entry: Entry::linked(),
    instance: None,
    messenger: None,
    surface: None,
    device: None,
  };

  let (instance, validation) =
    unsafe { instance::create_instance(&p.entry, dh, &cfg.app_name, cfg.validation) }?;
  let instance = p.instance.insert(instance);
  if validation {
    p.messenger = Some(unsafe { instance::create_debug_messenger(&p.entry, instance) }?);
  }

  let surface = unsafe { ash_window::create_surface(&p.entry, instance, dh, wh, None) }
    .context("create_surface")?;
  let surface_loader = surface::Instance::new(&p.entry, instance);
  p.surface = Some((surface_loader.clone(), surface));

  let (phys, families) =
    unsafe { physical::select_physical_device(instance, &surface_loader, surface) }?;

  // One queue per distinct family.
  let priorities = [1.0_f32];
  let mut unique = vec![families.graphics];
  if !families.shared() {
    unique.push(families.present);
  }
  let qinfos: Vec<vk::DeviceQueueCreateInfo> = unique
    .iter()
    .map(|&family| vk::DeviceQueueCreateInfo {
      s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
      queue_family_index: family,
      queue_count: 1,
      p_queue_priorities: priorities.as_ptr(),
      ..Default::default()
    })
    .collect();

  let device_exts = [swapchain::NAME.as_ptr()];
  let features = vk::PhysicalDeviceFeatures::default();
  let dinfo = vk::DeviceCreateInfo {
    s_type: vk::StructureType::DEVICE_CREATE_INFO,
    queue_create_info_count: qinfos.len() as u32,
    p_queue_create_infos: qinfos.as_ptr(),
    enabled_extension_count: device_exts.len() as u32,
    pp_enabled_extension_names: device_exts.as_ptr(),
    p_enabled_features: &features,
    ..Default::default()
  };
  let device = unsafe { instance.create_device(phys, &dinfo, None) }.context("create_device")?;
  let device = p.device.insert(device);
  let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
  let present_queue = unsafe { device.get_device_queue(families.present, 0) };

  let swapchain_loader = swapchain::Device::new(instance, device);

  // Command buffers are re-recorded in place after every rebuild.
  let pool_info = vk::CommandPoolCreateInfo {
    s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
    flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
    queue_family_index: families.graphics,
    ..Default::default()
  };
  let cmd_pool =
    unsafe { device.create_command_pool(&pool_info, None) }.context("create_command_pool")?;

  let (Some(instance), Some(device), Some((surface_loader, surface))) =
    (p.instance.take(), p.device.take(), p.surface.take())
  else {
    return Err(anyhow!("device bring-up lost a created object"));
  };
  Ok(VkDevice {
    _entry: p.entry.clone(),
    instance,
    messenger: p.messenger.take(),
    surface_loader,
    surface,
    phys,
    device,
    families,
    graphics_queue,
    present_queue,
    swapchain_loader,
    cmd_pool,
  })
}

impl VkDevice {
  pub fn new(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    cfg: &VkDeviceConfig,
  ) -> Result<Self> {
    unsafe {
      let d = build_device(window, display, cfg)?;
      info!(
        "Vulkan device ready (graphics queue {}, present queue {}, validation {})",
        d.families.graphics,
        d.families.present,
        d.messenger.is_some()
      );
      Ok(d)
    }
  }

  pub fn validation_enabled(&self) -> bool {
    self.messenger.is_some()
  }
}

impl Drop for VkDevice {
  fn drop(&mut self) {
    unsafe {
      let d = &self.device;
      d.device_wait_idle().ok();

      d.destroy_command_pool(self.cmd_pool, None);
      d.destroy_device(None);

      if let Some(m) = self.messenger.take() {
        m.destroy();
      }
      self.surface_loader.destroy_surface(self.surface, None);
      self.instance.destroy_instance(None);
    }
    debug!("Vulkan device destroyed");
  }
}

fn wait_stage_to_vk(stage: WaitStage) -> vk::PipelineStageFlags {
  match stage {
    WaitStage::ColorAttachmentOutput => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
  }
}

impl GpuDevice for VkDevice {
  fn surface_capabilities(&self) -> Result<SurfaceCapabilities, DeviceError> {
    unsafe {
      let caps = self
        .surface_loader
        .get_physical_device_surface_capabilities(self.phys, self.surface)
        .map_err(vk_err("get_physical_device_surface_capabilities"))?;
      let formats = self
        .surface_loader
        .get_physical_device_surface_formats(self.phys, self.surface)
        .map_err(vk_err("get_physical_device_surface_formats"))?;
      let modes = self
        .surface_loader
        .get_physical_device_surface_present_modes(self.phys, self.surface)
        .map_err(vk_err("get_physical_device_surface_present_modes"))?;
      Ok(capabilities_from_vk(&caps, &formats, &modes))
    }
  }

  fn queue_families(&self) -> QueueFamilies {
    self.families
  }

  fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<SwapchainHandle, DeviceError> {
    // Transform and alpha mode come from the surface as it is now.
    let caps = unsafe {
      self
        .surface_loader
        .get_physical_device_surface_capabilities(self.phys, self.surface)
    }
    .map_err(vk_err("get_physical_device_surface_capabilities"))?;
    let composite_alpha = if caps
      .supported_composite_alpha
      .contains(vk::CompositeAlphaFlagsKHR::OPAQUE)
    {
      vk::CompositeAlphaFlagsKHR::OPAQUE
    } else {
      vk::CompositeAlphaFlagsKHR::INHERIT
    };

    let (image_sharing_mode, families) = match desc.sharing {
      SharingMode::Exclusive { .. } => (vk::SharingMode::EXCLUSIVE, None),
      SharingMode::Concurrent { families } => (vk::SharingMode::CONCURRENT, Some(families)),
    };
    let family_slice: &[u32] = families.as_ref().map_or(&[], |f| f.as_slice());

    let ci = vk::SwapchainCreateInfoKHR {
      s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
      surface: self.surface,
      min_image_count: desc.image_count,
      image_format: format_to_vk(desc.format.format),
      image_color_space: color_space_to_vk(desc.format.color_space),
      image_extent: extent_to_vk(desc.extent),
      image_array_layers: 1,
      image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
      image_sharing_mode,
      queue_family_index_count: family_slice.len() as u32,
      p_queue_family_indices: family_slice.as_ptr(),
      pre_transform: caps.current_transform,
      composite_alpha,
      present_mode: present_mode_to_vk(desc.present_mode),
      clipped: vk::TRUE,
      old_swapchain: desc
        .previous
        .map_or(vk::SwapchainKHR::null(), |old| to_vk(old.as_raw())),
      ..Default::default()
    };
    let sc = unsafe { self.swapchain_loader.create_swapchain(&ci, None) }
      .map_err(vk_err("create_swapchain"))?;
    Ok(SwapchainHandle::from_raw(sc.as_raw()))
  }

  fn swapchain_images(
    &mut self,
    swapchain: SwapchainHandle,
  ) -> Result<Vec<ImageHandle>, DeviceError> {
    let images = unsafe { self.swapchain_loader.get_swapchain_images(to_vk(swapchain.as_raw())) }
      .map_err(vk_err("get_swapchain_images"))?;
    Ok(images.into_iter().map(|i| ImageHandle::from_raw(i.as_raw())).collect())
  }

  fn destroy_swapchain(&mut self, swapchain: SwapchainHandle) {
    unsafe {
      self
        .swapchain_loader
        .destroy_swapchain(to_vk(swapchain.as_raw()), None)
    };
  }

  fn create_image_view(
    &mut self,
    image: ImageHandle,
    format: PixelFormat,
  ) -> Result<ImageViewHandle, DeviceError> {
    let ci = vk::ImageViewCreateInfo {
      s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
      image: to_vk(image.as_raw()),
      view_type: vk::ImageViewType::TYPE_2D,
      format: format_to_vk(format),
      components: vk::ComponentMapping {
        r: vk::ComponentSwizzle::IDENTITY,
        g: vk::ComponentSwizzle::IDENTITY,
        b: vk::ComponentSwizzle::IDENTITY,
        a: vk::ComponentSwizzle::IDENTITY,
      },
      subresource_range: vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
      },
      ..Default::default()
    };
    let iv = unsafe { self.device.create_image_view(&ci, None) }
      .map_err(vk_err("create_image_view"))?;
    Ok(ImageViewHandle::from_raw(iv.as_raw()))
  }

  fn destroy_image_view(&mut self, view: ImageViewHandle) {
    unsafe { self.device.destroy_image_view(to_vk(view.as_raw()), None) };
  }

  fn create_render_pass(&mut self, format: PixelFormat) -> Result<RenderPassHandle, DeviceError> {
    let rp = unsafe { pipeline::create_render_pass(&self.device, format_to_vk(format)) }?;
    Ok(RenderPassHandle::from_raw(rp.as_raw()))
  }

  fn destroy_render_pass(&mut self, render_pass: RenderPassHandle) {
    unsafe { self.device.destroy_render_pass(to_vk(render_pass.as_raw()), None) };
  }

  fn create_framebuffer(
    &mut self,
    render_pass: RenderPassHandle,
    view: ImageViewHandle,
    extent: Extent2D,
  ) -> Result<FramebufferHandle, DeviceError> {
    let attachments = [to_vk::<vk::ImageView>(view.as_raw())];
    let ci = vk::FramebufferCreateInfo {
      s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
      render_pass: to_vk(render_pass.as_raw()),
      attachment_count: attachments.len() as u32,
      p_attachments: attachments.as_ptr(),
      width: extent.width,
      height: extent.height,
      layers: 1,
      ..Default::default()
    };
    let fb = unsafe { self.device.create_framebuffer(&ci, None) }
      .map_err(vk_err("create_framebuffer"))?;
    Ok(FramebufferHandle::from_raw(fb.as_raw()))
  }

  fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
    unsafe { self.device.destroy_framebuffer(to_vk(framebuffer.as_raw()), None) };
  }

  fn create_graphics_pipeline(
    &mut self,
    render_pass: RenderPassHandle,
  ) -> Result<GraphicsPipeline, DeviceError> {
    let (layout, pipeline) =
      unsafe { pipeline::create_triangle_pipeline(&self.device, to_vk(render_pass.as_raw())) }?;
    Ok(GraphicsPipeline {
      layout: PipelineLayoutHandle::from_raw(layout.as_raw()),
      pipeline: PipelineHandle::from_raw(pipeline.as_raw()),
    })
  }

  fn destroy_graphics_pipeline(&mut self, pipeline: GraphicsPipeline) {
    unsafe {
      self.device.destroy_pipeline(to_vk(pipeline.pipeline.as_raw()), None);
      self
        .device
        .destroy_pipeline_layout(to_vk(pipeline.layout.as_raw()), None);
    }
  }

  fn allocate_command_buffers(
    &mut self,
    count: u32,
  ) -> Result<Vec<CommandBufferHandle>, DeviceError> {
    let alloc_info = vk::CommandBufferAllocateInfo {
      s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
      command_pool: self.cmd_pool,
      level: vk::CommandBufferLevel::PRIMARY,
      command_buffer_count: count,
      ..Default::default()
    };
    let bufs = unsafe { self.device.allocate_command_buffers(&alloc_info) }
      .map_err(vk_err("allocate_command_buffers"))?;
    Ok(bufs.into_iter().map(|b| CommandBufferHandle::from_raw(b.as_raw())).collect())
  }

  fn free_command_buffers(&mut self, buffers: &[CommandBufferHandle]) {
    if buffers.is_empty() {
      return;
    }
    let bufs: Vec<vk::CommandBuffer> = buffers.iter().map(|b| to_vk(b.as_raw())).collect();
    unsafe { self.device.free_command_buffers(self.cmd_pool, &bufs) };
  }

  fn begin_command_buffer(&mut self, cmd: CommandBufferHandle) -> Result<(), DeviceError> {
    let begin = vk::CommandBufferBeginInfo {
      s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
      ..Default::default()
    };
    unsafe { self.device.begin_command_buffer(to_vk(cmd.as_raw()), &begin) }
      .map_err(vk_err("begin_command_buffer"))
  }

  fn end_command_buffer(&mut self, cmd: CommandBufferHandle) -> Result<(), DeviceError> {
    unsafe { self.device.end_command_buffer(to_vk(cmd.as_raw())) }
      .map_err(vk_err("end_command_buffer"))
  }

  fn cmd_begin_render_pass(&mut self, cmd: CommandBufferHandle, begin: &RenderPassBegin) {
    let clears = [vk::ClearValue {
      color: vk::ClearColorValue { float32: begin.clear_color },
    }];
    let area = &begin.render_area;
    let rp_begin = vk::RenderPassBeginInfo {
      s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
      render_pass: to_vk(begin.render_pass.as_raw()),
      framebuffer: to_vk(begin.framebuffer.as_raw()),
      render_area: vk::Rect2D {
        offset: vk::Offset2D { x: area.x, y: area.y },
        extent: extent_to_vk(area.extent),
      },
      clear_value_count: clears.len() as u32,
      p_clear_values: clears.as_ptr(),
      ..Default::default()
    };
    unsafe {
      self
        .device
        .cmd_begin_render_pass(to_vk(cmd.as_raw()), &rp_begin, vk::SubpassContents::INLINE)
    };
  }

  fn cmd_bind_pipeline(&mut self, cmd: CommandBufferHandle, pipeline: PipelineHandle) {
    unsafe {
      self.device.cmd_bind_pipeline(
        to_vk(cmd.as_raw()),
        vk::PipelineBindPoint::GRAPHICS,
        to_vk(pipeline.as_raw()),
      )
    };
  }

  fn cmd_set_viewport(&mut self, cmd: CommandBufferHandle, viewport: &Viewport) {
    let vp = vk::Viewport {
      x: viewport.x,
      y: viewport.y,
      width: viewport.width,
      height: viewport.height,
      min_depth: viewport.min_depth,
      max_depth: viewport.max_depth,
    };
    unsafe { self.device.cmd_set_viewport(to_vk(cmd.as_raw()), 0, &[vp]) };
  }

  fn cmd_set_scissor(&mut self, cmd: CommandBufferHandle, scissor: &Rect2D) {
    let rect = vk::Rect2D {
      offset: vk::Offset2D { x: scissor.x, y: scissor.y },
      extent: extent_to_vk(scissor.extent),
    };
    unsafe { self.device.cmd_set_scissor(to_vk(cmd.as_raw()), 0, &[rect]) };
  }

  fn cmd_draw(&mut self, cmd: CommandBufferHandle, draw: &DrawCall) {
    unsafe {
      self.device.cmd_draw(
        to_vk(cmd.as_raw()),
        draw.vertex_count,
        draw.instance_count,
        draw.first_vertex,
        draw.first_instance,
      )
    };
  }

  fn cmd_end_render_pass(&mut self, cmd: CommandBufferHandle) {
    unsafe { self.device.cmd_end_render_pass(to_vk(cmd.as_raw())) };
  }

  fn create_semaphore(&mut self) -> Result<SemaphoreHandle, DeviceError> {
    let ci = vk::SemaphoreCreateInfo {
      s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
      ..Default::default()
    };
    let s = unsafe { self.device.create_semaphore(&ci, None) }
      .map_err(vk_err("create_semaphore"))?;
    Ok(SemaphoreHandle::from_raw(s.as_raw()))
  }

  fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle) {
    unsafe { self.device.destroy_semaphore(to_vk(semaphore.as_raw()), None) };
  }

  fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle, DeviceError> {
    let ci = vk::FenceCreateInfo {
      s_type: vk::StructureType::FENCE_CREATE_INFO,
      flags: if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() },
      ..Default::default()
    };
    let f = unsafe { self.device.create_fence(&ci, None) }.map_err(vk_err("create_fence"))?;
    Ok(FenceHandle::from_raw(f.as_raw()))
  }

  fn destroy_fence(&mut self, fence: FenceHandle) {
    unsafe { self.device.destroy_fence(to_vk(fence.as_raw()), None) };
  }

  fn wait_for_fence(&mut self, fence: FenceHandle) -> Result<(), DeviceError> {
    let fences = [to_vk::<vk::Fence>(fence.as_raw())];
    unsafe { self.device.wait_for_fences(&fences, true, u64::MAX) }
      .map_err(vk_err("wait_for_fences"))
  }

  fn reset_fence(&mut self, fence: FenceHandle) -> Result<(), DeviceError> {
    let fences = [to_vk::<vk::Fence>(fence.as_raw())];
    unsafe { self.device.reset_fences(&fences) }.map_err(vk_err("reset_fences"))
  }

  fn acquire_next_image(
    &mut self,
    swapchain: SwapchainHandle,
    signal: SemaphoreHandle,
  ) -> Result<AcquireOutcome, DeviceError> {
    let res = unsafe {
      self.swapchain_loader.acquire_next_image(
        to_vk(swapchain.as_raw()),
        u64::MAX,
        to_vk(signal.as_raw()),
        vk::Fence::null(),
      )
    };
    match res {
      Ok((index, false)) => Ok(AcquireOutcome::Ready(index)),
      Ok((index, true)) => Ok(AcquireOutcome::Suboptimal(index)),
      Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::Stale),
      Err(e) => Err(vk_err("acquire_next_image")(e)),
    }
  }

  fn submit(&mut self, submission: &Submission) -> Result<(), DeviceError> {
    let wait = [to_vk::<vk::Semaphore>(submission.wait.as_raw())];
    let stages = [wait_stage_to_vk(submission.wait_stage)];
    let cmds = [to_vk::<vk::CommandBuffer>(submission.command_buffer.as_raw())];
    let signal = [to_vk::<vk::Semaphore>(submission.signal.as_raw())];
    let info = vk::SubmitInfo {
      s_type: vk::StructureType::SUBMIT_INFO,
      wait_semaphore_count: wait.len() as u32,
      p_wait_semaphores: wait.as_ptr(),
      p_wait_dst_stage_mask: stages.as_ptr(),
      command_buffer_count: cmds.len() as u32,
      p_command_buffers: cmds.as_ptr(),
      signal_semaphore_count: signal.len() as u32,
      p_signal_semaphores: signal.as_ptr(),
      ..Default::default()
    };
    unsafe {
      self.device.queue_submit(
        self.graphics_queue,
        std::slice::from_ref(&info),
        to_vk(submission.fence.as_raw()),
      )
    }
    .map_err(vk_err("queue_submit"))
  }

  fn present(
    &mut self,
    swapchain: SwapchainHandle,
    image_index: u32,
    wait: SemaphoreHandle,
  ) -> Result<PresentOutcome, DeviceError> {
    let waits = [to_vk::<vk::Semaphore>(wait.as_raw())];
    let swapchains = [to_vk::<vk::SwapchainKHR>(swapchain.as_raw())];
    let indices = [image_index];
    let present = vk::PresentInfoKHR {
      s_type: vk::StructureType::PRESENT_INFO_KHR,
      wait_semaphore_count: waits.len() as u32,
      p_wait_semaphores: waits.as_ptr(),
      swapchain_count: swapchains.len() as u32,
      p_swapchains: swapchains.as_ptr(),
      p_image_indices: indices.as_ptr(),
      ..Default::default()
    };
    match unsafe { self.swapchain_loader.queue_present(self.present_queue, &present) } {
      Ok(false) => Ok(PresentOutcome::Presented),
      Ok(true) => Ok(PresentOutcome::Suboptimal),
      Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Stale),
      Err(e) => Err(vk_err("queue_present")(e)),
    }
  }

  fn wait_idle(&mut self) -> Result<(), DeviceError> {
    unsafe { self.device.device_wait_idle() }.map_err(vk_err("device_wait_idle"))
  }
}
