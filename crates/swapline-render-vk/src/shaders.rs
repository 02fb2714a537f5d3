use swapline_render::DeviceError;

const SPIRV_MAGIC: u32 = 0x0723_0203;
/// Magic, version, generator, bound, schema.
const SPIRV_HEADER_BYTES: usize = 20;

pub(crate) const TRIANGLE_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.vert.spv"));
pub(crate) const TRIANGLE_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.frag.spv"));

/// Checks a compiled blob and converts it to the word stream Vulkan expects.
pub(crate) fn spirv_words(name: &str, bytes: &[u8]) -> Result<Vec<u32>, DeviceError> {
  if bytes.len() < SPIRV_HEADER_BYTES {
    return Err(DeviceError::new(
      "create_shader_module",
      format!("{name}: {} bytes is shorter than a SPIR-V header", bytes.len()),
    ));
  }
  if bytes.len() % 4 != 0 {
    return Err(DeviceError::new(
      "create_shader_module",
      format!("{name}: length {} is not a multiple of 4", bytes.len()),
    ));
  }
  // include_bytes! gives no alignment guarantee, so copy instead of casting.
  let words: Vec<u32> = bytemuck::allocation::pod_collect_to_vec(bytes);
  if words[0] != SPIRV_MAGIC {
    return Err(DeviceError::new(
      "create_shader_module",
      format!("{name}: bad magic 0x{:08x}", words[0]),
    ));
  }
  Ok(words)
}
