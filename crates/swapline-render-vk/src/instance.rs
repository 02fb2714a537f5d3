use std::ffi::{c_void, CStr, CString};

use anyhow::{Context, Result};
use ash::ext::debug_utils;
use ash::{vk, Entry, Instance};
use raw_window_handle::RawDisplayHandle;
use tracing::{debug, error, info, trace, warn};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

pub(crate) struct DebugMessenger {
  loader: debug_utils::Instance,
  messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
  pub(crate) unsafe fn destroy(self) {
    unsafe { self.loader.destroy_debug_utils_messenger(self.messenger, None) };
  }
}

unsafe extern "system" fn debug_callback(
  severity: vk::DebugUtilsMessageSeverityFlagsEXT,
  types: vk::DebugUtilsMessageTypeFlagsEXT,
  data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
  _user: *mut c_void,
) -> vk::Bool32 {
  if data.is_null() {
    return vk::FALSE;
  }
  let p_message = unsafe { (*data).p_message };
  if p_message.is_null() {
    return vk::FALSE;
  }
  let msg = unsafe { CStr::from_ptr(p_message) }.to_string_lossy();
  if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
    error!(?types, "[Vulkan] {msg}");
  } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
    warn!(?types, "[Vulkan] {msg}");
  } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
    debug!(?types, "[Vulkan] {msg}");
  } else {
    trace!(?types, "[Vulkan] {msg}");
  }
  vk::FALSE
}

fn validation_available(entry: &Entry) -> bool {
  let layers = match unsafe { entry.enumerate_instance_layer_properties() } {
    Ok(l) => l,
    Err(e) => {
      warn!("enumerate_instance_layer_properties failed: {e:?}");
      return false;
    }
  };
  layers
    .iter()
    .any(|l| l.layer_name_as_c_str().is_ok_and(|n| n == VALIDATION_LAYER))
}

/// One line per available extension, `*` marking the enabled ones.
fn extension_report(available: &[vk::ExtensionProperties], enabled: &[&CStr]) -> Vec<String> {
  available
    .iter()
    .filter_map(|e| e.extension_name_as_c_str().ok())
    .map(|n| {
      let mark = if enabled.contains(&n) { '*' } else { ' ' };
      format!("{mark} {}", n.to_string_lossy())
    })
    .collect()
}

/// Creates the instance with the window system's extensions. Returns whether
/// the validation layer ended up enabled.
pub(crate) unsafe fn create_instance(
  entry: &Entry,
  display_raw: RawDisplayHandle,
  app_name: &str,
  want_validation: bool,
) -> Result<(Instance, bool)> {
  let app = CString::new(app_name).context("application name")?;
  let engine = c"swapline";

  let app_info = vk::ApplicationInfo {
    s_type: vk::StructureType::APPLICATION_INFO,
    p_application_name: app.as_ptr(),
    application_version: vk::make_api_version(0, 1, 0, 0),
    p_engine_name: engine.as_ptr(),
    engine_version: vk::make_api_version(0, 1, 0, 0),
    api_version: vk::API_VERSION_1_0,
    ..Default::default()
  };

  let validation = want_validation && validation_available(entry);
  if want_validation && !validation {
    warn!("validation layers requested, but not available");
  }

  let mut ext_vec = ash_window::enumerate_required_extensions(display_raw)
    .context("enumerate_required_extensions")?
    .to_vec();
  if validation {
    ext_vec.push(debug_utils::NAME.as_ptr());
  }
  let layers = [VALIDATION_LAYER.as_ptr()];
  let (enabled_layer_count, pp_enabled_layer_names) = if validation {
    (layers.len() as u32, layers.as_ptr())
  } else {
    (0, std::ptr::null())
  };

  let available = unsafe { entry.enumerate_instance_extension_properties(None) }
    .unwrap_or_else(|e| {
      warn!("enumerate_instance_extension_properties failed: {e:?}");
      Vec::new()
    });
  let enabled: Vec<&CStr> = ext_vec.iter().map(|&p| unsafe { CStr::from_ptr(p) }).collect();
  debug!(
    "instance extensions (* = enabled):\n{}",
    extension_report(&available, &enabled).join("\n")
  );
  if validation {
    debug!("instance layers: {}", VALIDATION_LAYER.to_string_lossy());
  } else {
    debug!("instance layers: none");
  }

  let create_info = vk::InstanceCreateInfo {
    s_type: vk::StructureType::INSTANCE_CREATE_INFO,
    p_application_info: &app_info,
    enabled_extension_count: ext_vec.len() as u32,
    pp_enabled_extension_names: ext_vec.as_ptr(),
    enabled_layer_count,
    pp_enabled_layer_names,
    ..Default::default()
  };

  let instance = unsafe { entry.create_instance(&create_info, None) }.context("create_instance")?;
  info!(validation, "Vulkan instance created");
  Ok((instance, validation))
}

pub(crate) unsafe fn create_debug_messenger(
  entry: &Entry,
  instance: &Instance,
) -> Result<DebugMessenger> {
  let loader = debug_utils::Instance::new(entry, instance);
  let ci = vk::DebugUtilsMessengerCreateInfoEXT {
    s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
      | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
      | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
      | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
      | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
    pfn_user_callback: Some(debug_callback),
    ..Default::default()
  };
  let messenger = unsafe { loader.create_debug_utils_messenger(&ci, None) }
    .context("create_debug_utils_messenger")?;
  Ok(DebugMessenger { loader, messenger })
}
