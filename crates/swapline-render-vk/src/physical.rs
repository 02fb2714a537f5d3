use anyhow::{anyhow, Context, Result};
use ash::khr::{surface, swapchain};
use ash::{vk, Instance};
use swapline_render::QueueFamilies;
use tracing::{debug, info};

/// Picks graphics and present families, preferring one family that does both.
pub(crate) fn find_queue_families(
  props: &[vk::QueueFamilyProperties],
  mut supports_present: impl FnMut(u32) -> bool,
) -> Option<QueueFamilies> {
  let mut graphics = None;
  let mut present = None;
  for (i, q) in props.iter().enumerate() {
    let i = i as u32;
    let g = q.queue_count > 0 && q.queue_flags.contains(vk::QueueFlags::GRAPHICS);
    let p = supports_present(i);
    if g && p {
      return Some(QueueFamilies { graphics: i, present: i });
    }
    if g && graphics.is_none() {
      graphics = Some(i);
    }
    if p && present.is_none() {
      present = Some(i);
    }
  }
  Some(QueueFamilies { graphics: graphics?, present: present? })
}

pub(crate) fn device_rank(kind: vk::PhysicalDeviceType) -> u32 {
  match kind {
    vk::PhysicalDeviceType::DISCRETE_GPU => 3,
    vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
    vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
    _ => 0,
  }
}

unsafe fn has_swapchain_extension(instance: &Instance, phys: vk::PhysicalDevice) -> bool {
  match unsafe { instance.enumerate_device_extension_properties(phys) } {
    Ok(exts) => exts
      .iter()
      .any(|e| e.extension_name_as_c_str().is_ok_and(|n| n == swapchain::NAME)),
    Err(_) => false,
  }
}

/// Returns the families if `phys` can present to `surface`, else `None`.
unsafe fn suitability(
  instance: &Instance,
  surface_loader: &surface::Instance,
  surface: vk::SurfaceKHR,
  phys: vk::PhysicalDevice,
) -> Option<QueueFamilies> {
  if !unsafe { has_swapchain_extension(instance, phys) } {
    return None;
  }
  let qprops = unsafe { instance.get_physical_device_queue_family_properties(phys) };
  let families = find_queue_families(&qprops, |i| unsafe {
    surface_loader
      .get_physical_device_surface_support(phys, i, surface)
      .unwrap_or(false)
  })?;
  let formats = unsafe { surface_loader.get_physical_device_surface_formats(phys, surface) }
    .unwrap_or_default();
  let modes = unsafe { surface_loader.get_physical_device_surface_present_modes(phys, surface) }
    .unwrap_or_default();
  if formats.is_empty() || modes.is_empty() {
    return None;
  }
  Some(families)
}

pub(crate) unsafe fn select_physical_device(
  instance: &Instance,
  surface_loader: &surface::Instance,
  surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
  let devices =
    unsafe { instance.enumerate_physical_devices() }.context("enumerate_physical_devices")?;
  if devices.is_empty() {
    return Err(anyhow!("failed to find GPUs with Vulkan support"));
  }

  let mut best: Option<(u32, vk::PhysicalDevice, QueueFamilies)> = None;
  for phys in devices {
    let props = unsafe { instance.get_physical_device_properties(phys) };
    let name = props
      .device_name_as_c_str()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();
    let Some(families) = (unsafe { suitability(instance, surface_loader, surface, phys) }) else {
      debug!("skipping {name}: cannot present to this surface");
      continue;
    };
    let rank = device_rank(props.device_type);
    if best.map_or(true, |(r, _, _)| rank > r) {
      best = Some((rank, phys, families));
    }
    debug!(rank, ?families, "candidate {name}");
  }

  let (_, phys, families) = best.ok_or_else(|| anyhow!("failed to find a suitable GPU"))?;
  let props = unsafe { instance.get_physical_device_properties(phys) };
  info!(
    "using {} (graphics family {}, present family {})",
    props
      .device_name_as_c_str()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default(),
    families.graphics,
    families.present
  );
  Ok((phys, families))
}
