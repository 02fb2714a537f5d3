// SPDX-License-Identifier: CEPL-1.0
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::device::{DeviceError, GpuDevice};
use crate::error::{FrameError, FrameResult};
use crate::handle::{
    FramebufferHandle, ImageHandle, ImageViewHandle, RenderPassHandle, SwapchainHandle,
};
use crate::surface::{Extent2D, PresentMode, QueueFamilies, SurfaceCapabilities, SurfaceFormat};

/// How swapchain images are shared between queue families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SharingMode {
    Exclusive { family: u32 },
    Concurrent { families: [u32; 2] },
}

impl SharingMode {
    pub fn for_families(families: QueueFamilies) -> Self {
        if families.shared() {
            SharingMode::Exclusive {
                family: families.graphics,
            }
        } else {
            SharingMode::Concurrent {
                families: [families.graphics, families.present],
            }
        }
    }
}

/// Everything the device needs to create a swapchain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainDesc {
    pub format: SurfaceFormat,
    pub present_mode: PresentMode,
    pub extent: Extent2D,
    pub image_count: u32,
    pub sharing: SharingMode,
    /// Retiring chain handed to the driver for resource reuse.
    pub previous: Option<SwapchainHandle>,
}

pub fn choose_surface_format(
    formats: &[SurfaceFormat],
    preferred: SurfaceFormat,
) -> Option<SurfaceFormat> {
    if formats.contains(&preferred) {
        return Some(preferred);
    }
    let first = formats.first().copied();
    if let Some(f) = first {
        warn!(?preferred, fallback = ?f, "preferred surface format unavailable");
    }
    first
}

pub fn choose_present_mode(available: &[PresentMode], priority: &[PresentMode]) -> PresentMode {
    priority
        .iter()
        .copied()
        .find(|m| available.contains(m))
        .unwrap_or(PresentMode::Fifo)
}

/// `framebuffer` must be the window's size right now, not the size it was
/// created with.
pub fn choose_extent(caps: &SurfaceCapabilities, framebuffer: Extent2D) -> Extent2D {
    match caps.current_extent {
        Some(extent) => extent,
        None => framebuffer.clamp(caps.min_extent, caps.max_extent),
    }
}

pub fn choose_image_count(caps: &SurfaceCapabilities) -> u32 {
    let wanted = caps.min_image_count.saturating_add(1).max(caps.min_image_count);
    match caps.max_image_count {
        Some(max) => wanted.min(max),
        None => wanted,
    }
}

/// A built presentation chain and the per-image objects that target it.
///
/// Views, framebuffers and the render pass belong to this struct and must be
/// released through the `release_*` steps before the handle is destroyed.
#[derive(Debug)]
pub struct SwapchainState {
    handle: SwapchainHandle,
    format: SurfaceFormat,
    present_mode: PresentMode,
    extent: Extent2D,
    render_pass: RenderPassHandle,
    images: Vec<ImageHandle>,
    image_views: Vec<ImageViewHandle>,
    framebuffers: Vec<FramebufferHandle>,
}

impl SwapchainState {
    pub fn handle(&self) -> SwapchainHandle {
        self.handle
    }

    pub fn format(&self) -> SurfaceFormat {
        self.format
    }

    pub fn present_mode(&self) -> PresentMode {
        self.present_mode
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn render_pass(&self) -> RenderPassHandle {
        self.render_pass
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[ImageHandle] {
        &self.images
    }

    pub fn image_views(&self) -> &[ImageViewHandle] {
        &self.image_views
    }

    pub fn framebuffers(&self) -> &[FramebufferHandle] {
        &self.framebuffers
    }

    /// Images, views and framebuffers line up one to one.
    pub fn is_consistent(&self) -> bool {
        !self.images.is_empty()
            && self.images.len() == self.image_views.len()
            && self.images.len() == self.framebuffers.len()
    }

    pub fn release_framebuffers<D: GpuDevice>(&mut self, device: &mut D) {
        for fb in self.framebuffers.drain(..) {
            device.destroy_framebuffer(fb);
        }
    }

    pub fn release_render_pass<D: GpuDevice>(&mut self, device: &mut D) {
        if !self.render_pass.is_null() {
            device.destroy_render_pass(self.render_pass);
            self.render_pass = RenderPassHandle::NULL;
        }
    }

    pub fn release_views<D: GpuDevice>(&mut self, device: &mut D) {
        for view in self.image_views.drain(..) {
            device.destroy_image_view(view);
        }
        self.images.clear();
    }

    /// Gives up the chain handle without destroying it, for use as the
    /// `previous` hint of the next build. Call after the other releases.
    pub fn into_retired(mut self) -> SwapchainHandle {
        debug_assert!(self.framebuffers.is_empty() && self.image_views.is_empty());
        std::mem::take(&mut self.handle)
    }

    /// Releases everything, chain handle included, in dependency order.
    pub fn release<D: GpuDevice>(mut self, device: &mut D) {
        self.release_framebuffers(device);
        self.release_render_pass(device);
        self.release_views(device);
        let handle = self.into_retired();
        if !handle.is_null() {
            device.destroy_swapchain(handle);
        }
    }

    fn populate<D: GpuDevice>(&mut self, device: &mut D) -> Result<(), DeviceError> {
        self.images = device.swapchain_images(self.handle)?;
        if self.images.is_empty() {
            return Err(DeviceError::new(
                "swapchain_images",
                "swapchain reports no images",
            ));
        }
        for &image in &self.images {
            let view = device.create_image_view(image, self.format.format)?;
            self.image_views.push(view);
        }
        self.render_pass = device.create_render_pass(self.format.format)?;
        for &view in &self.image_views {
            let fb = device.create_framebuffer(self.render_pass, view, self.extent)?;
            self.framebuffers.push(fb);
        }
        Ok(())
    }
}

/// Negotiates and creates presentation chains with fixed preferences.
#[derive(Clone, Debug)]
pub struct SwapchainBuilder {
    preferred_format: SurfaceFormat,
    present_modes: Vec<PresentMode>,
}

impl SwapchainBuilder {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            preferred_format: config.preferred_format,
            present_modes: config.present_modes.clone(),
        }
    }

    /// Same preferences, but asking for `format` first.
    pub fn pinned_to(&self, format: SurfaceFormat) -> Self {
        Self {
            preferred_format: format,
            ..self.clone()
        }
    }

    /// Resolves the creation parameters without touching the device.
    pub fn describe(
        &self,
        caps: &SurfaceCapabilities,
        families: QueueFamilies,
        framebuffer: Extent2D,
        previous: Option<SwapchainHandle>,
    ) -> FrameResult<SwapchainDesc> {
        let format = choose_surface_format(&caps.formats, self.preferred_format).ok_or_else(
            || {
                FrameError::SwapchainCreation(DeviceError::new(
                    "choose_surface_format",
                    "surface reports no formats",
                ))
            },
        )?;
        let extent = choose_extent(caps, framebuffer);
        if extent.is_zero() {
            return Err(FrameError::SwapchainCreation(DeviceError::new(
                "choose_extent",
                format!("zero-sized extent {}x{}", extent.width, extent.height),
            )));
        }
        Ok(SwapchainDesc {
            format,
            present_mode: choose_present_mode(&caps.present_modes, &self.present_modes),
            extent,
            image_count: choose_image_count(caps),
            sharing: SharingMode::for_families(families),
            previous,
        })
    }

    pub fn build<D: GpuDevice>(
        &self,
        device: &mut D,
        caps: &SurfaceCapabilities,
        framebuffer: Extent2D,
        previous: Option<SwapchainHandle>,
    ) -> FrameResult<SwapchainState> {
        let desc = self.describe(caps, device.queue_families(), framebuffer, previous)?;
        let handle = device
            .create_swapchain(&desc)
            .map_err(FrameError::SwapchainCreation)?;

        let mut state = SwapchainState {
            handle,
            format: desc.format,
            present_mode: desc.present_mode,
            extent: desc.extent,
            render_pass: RenderPassHandle::NULL,
            images: Vec::new(),
            image_views: Vec::new(),
            framebuffers: Vec::new(),
        };
        if let Err(e) = state.populate(device) {
            state.release(device);
            return Err(FrameError::SwapchainCreation(e));
        }

        info!(
            "swapchain ready ({}x{}, {} images, {:?}, fmt {:?})",
            state.extent.width,
            state.extent.height,
            state.image_count(),
            state.present_mode,
            state.format.format
        );
        debug!(sharing = ?desc.sharing, reused = previous.is_some(), "swapchain sharing");
        Ok(state)
    }
}
