use ash::vk;
use swapline_render::{
  ColorSpace, DeviceError, Extent2D, PixelFormat, PresentMode, SurfaceCapabilities, SurfaceFormat,
};

pub(crate) fn vk_err(call: &'static str) -> impl FnOnce(vk::Result) -> DeviceError {
  move |e| DeviceError::new(call, format!("{e:?}"))
}

pub(crate) fn format_to_vk(f: PixelFormat) -> vk::Format {
  vk::Format::from_raw(f.0)
}

pub(crate) fn surface_format_from_vk(f: vk::SurfaceFormatKHR) -> SurfaceFormat {
  SurfaceFormat::new(PixelFormat(f.format.as_raw()), ColorSpace(f.color_space.as_raw()))
}

pub(crate) fn color_space_to_vk(cs: ColorSpace) -> vk::ColorSpaceKHR {
  vk::ColorSpaceKHR::from_raw(cs.0)
}

/// Modes outside the four core ones are dropped.
pub(crate) fn present_mode_from_vk(m: vk::PresentModeKHR) -> Option<PresentMode> {
  match m {
    vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
    vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
    vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
    vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
    _ => None,
  }
}

pub(crate) fn present_mode_to_vk(m: PresentMode) -> vk::PresentModeKHR {
  match m {
    PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
    PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
    PresentMode::Fifo => vk::PresentModeKHR::FIFO,
    PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
  }
}

pub(crate) fn extent_from_vk(e: vk::Extent2D) -> Extent2D {
  Extent2D::new(e.width, e.height)
}

pub(crate) fn extent_to_vk(e: Extent2D) -> vk::Extent2D {
  vk::Extent2D { width: e.width, height: e.height }
}

/// `u32::MAX` in the current extent means the swapchain decides; a zero
/// max image count means unbounded.
pub(crate) fn capabilities_from_vk(
  caps: &vk::SurfaceCapabilitiesKHR,
  formats: &[vk::SurfaceFormatKHR],
  modes: &[vk::PresentModeKHR],
) -> SurfaceCapabilities {
  let current = caps.current_extent;
  SurfaceCapabilities {
    formats: formats.iter().copied().map(surface_format_from_vk).collect(),
    present_modes: modes.iter().copied().filter_map(present_mode_from_vk).collect(),
    min_extent: extent_from_vk(caps.min_image_extent),
    max_extent: extent_from_vk(caps.max_image_extent),
    current_extent: (current.width != u32::MAX).then(|| extent_from_vk(current)),
    min_image_count: caps.min_image_count,
    max_image_count: (caps.max_image_count != 0).then_some(caps.max_image_count),
  }
}
