// SPDX-License-Identifier: CEPL-1.0
use crate::device::{DeviceError, GpuDevice};
use crate::error::{FrameError, FrameResult};

/// Size of a surface, swapchain image or framebuffer in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero extent in either dimension.
    pub const fn is_zero(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Componentwise clamp into `[min, max]`.
    pub fn clamp(self, min: Extent2D, max: Extent2D) -> Extent2D {
        Extent2D {
            width: self.width.clamp(min.width, max.width.max(min.width)),
            height: self.height.clamp(min.height, max.height.max(min.height)),
        }
    }
}

/// Raw pixel format value as understood by the graphics API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelFormat(pub i32);

impl PixelFormat {
    pub const UNDEFINED: Self = Self(0);
    pub const R8G8B8A8_UNORM: Self = Self(37);
    pub const R8G8B8A8_SRGB: Self = Self(43);
    pub const B8G8R8A8_UNORM: Self = Self(44);
    pub const B8G8R8A8_SRGB: Self = Self(50);
}

/// Raw colour space value as understood by the graphics API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColorSpace(pub i32);

impl ColorSpace {
    pub const SRGB_NONLINEAR: Self = Self(0);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    pub format: PixelFormat,
    pub color_space: ColorSpace,
}

impl SurfaceFormat {
    pub const fn new(format: PixelFormat, color_space: ColorSpace) -> Self {
        Self {
            format,
            color_space,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PresentMode {
    Immediate,
    /// Low-latency triple buffering.
    Mailbox,
    /// Always supported.
    Fifo,
    FifoRelaxed,
}

/// What the physical device / surface pair supports right now.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    /// Order as reported by the device; the fallback format is the first entry.
    pub formats: Vec<SurfaceFormat>,
    pub present_modes: Vec<PresentMode>,
    pub min_extent: Extent2D,
    pub max_extent: Extent2D,
    /// `None` when the surface leaves the extent up to the swapchain.
    pub current_extent: Option<Extent2D>,
    pub min_image_count: u32,
    /// `None` when unbounded.
    pub max_image_count: Option<u32>,
}

/// Queue family indices chosen at device creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub const fn shared(&self) -> bool {
        self.graphics == self.present
    }
}

/// Reads the surface capabilities fresh from the device.
pub fn query_capabilities<D: GpuDevice>(device: &D) -> FrameResult<SurfaceCapabilities> {
    let caps = device
        .surface_capabilities()
        .map_err(FrameError::DeviceQuery)?;
    if caps.formats.is_empty() {
        return Err(FrameError::DeviceQuery(DeviceError::new(
            "surface_capabilities",
            "surface reports no formats",
        )));
    }
    tracing::debug!(
        formats = caps.formats.len(),
        modes = ?caps.present_modes,
        current = ?caps.current_extent,
        min_images = caps.min_image_count,
        max_images = ?caps.max_image_count,
        "surface capabilities"
    );
    Ok(caps)
}
