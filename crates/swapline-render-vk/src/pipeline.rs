use ash::{vk, Device};
use swapline_render::DeviceError;

use crate::convert::vk_err;
use crate::shaders::{spirv_words, TRIANGLE_FRAG, TRIANGLE_VERT};

/// One color attachment, cleared on load and handed to the presentation
/// engine at the end of the pass.
pub(crate) unsafe fn create_render_pass(
  device: &Device,
  format: vk::Format,
) -> Result<vk::RenderPass, DeviceError> {
  let color = vk::AttachmentDescription {
    format,
    samples: vk::SampleCountFlags::TYPE_1,
    load_op: vk::AttachmentLoadOp::CLEAR,
    store_op: vk::AttachmentStoreOp::STORE,
    stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
    stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
    initial_layout: vk::ImageLayout::UNDEFINED,
    final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
    ..Default::default()
  };
  let color_ref = vk::AttachmentReference {
    attachment: 0,
    layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
  };
  let subpass = vk::SubpassDescription {
    pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
    color_attachment_count: 1,
    p_color_attachments: &color_ref,
    ..Default::default()
  };
  // The image may still be read by the presentation engine until the
  // acquire semaphore fires, which the submit waits on at this stage.
  let dependency = vk::SubpassDependency {
    src_subpass: vk::SUBPASS_EXTERNAL,
    dst_subpass: 0,
    src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
    dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
    src_access_mask: vk::AccessFlags::empty(),
    dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
    ..Default::default()
  };
  let ci = vk::RenderPassCreateInfo {
    s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
    attachment_count: 1,
    p_attachments: &color,
    subpass_count: 1,
    p_subpasses: &subpass,
    dependency_count: 1,
    p_dependencies: &dependency,
    ..Default::default()
  };
  unsafe { device.create_render_pass(&ci, None) }.map_err(vk_err("create_render_pass"))
}

unsafe fn shader_module(
  device: &Device,
  name: &str,
  bytes: &[u8],
) -> Result<vk::ShaderModule, DeviceError> {
  let words = spirv_words(name, bytes)?;
  let ci = vk::ShaderModuleCreateInfo {
    s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
    code_size: words.len() * 4,
    p_code: words.as_ptr(),
    ..Default::default()
  };
  unsafe { device.create_shader_module(&ci, None) }.map_err(vk_err("create_shader_module"))
}

/// The triangle pipeline. Viewport and scissor are dynamic so the pipeline
/// survives swapchain rebuilds.
pub(crate) unsafe fn create_triangle_pipeline(
  device: &Device,
  render_pass: vk::RenderPass,
) -> Result<(vk::PipelineLayout, vk::Pipeline), DeviceError> {
  let vert = unsafe { shader_module(device, "triangle.vert", TRIANGLE_VERT) }?;
  let frag = match unsafe { shader_module(device, "triangle.frag", TRIANGLE_FRAG) } {
    Ok(m) => m,
    Err(e) => {
      unsafe { device.destroy_shader_module(vert, None) };
      return Err(e);
    }
  };

  let out = unsafe { build_pipeline(device, render_pass, vert, frag) };

  unsafe {
    device.destroy_shader_module(frag, None);
    device.destroy_shader_module(vert, None);
  }
  out
}

unsafe fn build_pipeline(
  device: &Device,
  render_pass: vk::RenderPass,
  vert: vk::ShaderModule,
  frag: vk::ShaderModule,
) -> Result<(vk::PipelineLayout, vk::Pipeline), DeviceError> {
  let entry = c"main";
  let stages = [
    vk::PipelineShaderStageCreateInfo {
      s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
      stage: vk::ShaderStageFlags::VERTEX,
      module: vert,
      p_name: entry.as_ptr(),
      ..Default::default()
    },
    vk::PipelineShaderStageCreateInfo {
      s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
      stage: vk::ShaderStageFlags::FRAGMENT,
      module: frag,
      p_name: entry.as_ptr(),
      ..Default::default()
    },
  ];

  // Positions and colors live in the vertex shader.
  let vertex_input = vk::PipelineVertexInputStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
    ..Default::default()
  };
  let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
    topology: vk::PrimitiveTopology::TRIANGLE_LIST,
    primitive_restart_enable: vk::FALSE,
    ..Default::default()
  };
  let viewport_state = vk::PipelineViewportStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
    viewport_count: 1,
    scissor_count: 1,
    ..Default::default()
  };
  let raster = vk::PipelineRasterizationStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
    depth_clamp_enable: vk::FALSE,
    rasterizer_discard_enable: vk::FALSE,
    polygon_mode: vk::PolygonMode::FILL,
    line_width: 1.0,
    cull_mode: vk::CullModeFlags::BACK,
    front_face: vk::FrontFace::CLOCKWISE,
    depth_bias_enable: vk::FALSE,
    ..Default::default()
  };
  let multisample = vk::PipelineMultisampleStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
    rasterization_samples: vk::SampleCountFlags::TYPE_1,
    sample_shading_enable: vk::FALSE,
    ..Default::default()
  };
  let blend_attachment = vk::PipelineColorBlendAttachmentState {
    blend_enable: vk::FALSE,
    color_write_mask: vk::ColorComponentFlags::RGBA,
    ..Default::default()
  };
  let blend = vk::PipelineColorBlendStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
    logic_op_enable: vk::FALSE,
    attachment_count: 1,
    p_attachments: &blend_attachment,
    ..Default::default()
  };
  let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
  let dynamic = vk::PipelineDynamicStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
    dynamic_state_count: dynamic_states.len() as u32,
    p_dynamic_states: dynamic_states.as_ptr(),
    ..Default::default()
  };

  let layout_ci = vk::PipelineLayoutCreateInfo {
    s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
    ..Default::default()
  };
  let layout = unsafe { device.create_pipeline_layout(&layout_ci, None) }
    .map_err(vk_err("create_pipeline_layout"))?;

  let ci = vk::GraphicsPipelineCreateInfo {
    s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
    stage_count: stages.len() as u32,
    p_stages: stages.as_ptr(),
    p_vertex_input_state: &vertex_input,
    p_input_assembly_state: &input_assembly,
    p_viewport_state: &viewport_state,
    p_rasterization_state: &raster,
    p_multisample_state: &multisample,
    p_color_blend_state: &blend,
    p_dynamic_state: &dynamic,
    layout,
    render_pass,
    subpass: 0,
    ..Default::default()
  };

  match unsafe { device.create_graphics_pipelines(vk::PipelineCache::null(), &[ci], None) } {
    Ok(pipelines) => match pipelines.first() {
      Some(&p) => Ok((layout, p)),
      None => {
        unsafe { device.destroy_pipeline_layout(layout, None) };
        Err(DeviceError::new("create_graphics_pipelines", "no pipeline returned"))
      }
    },
    Err((partial, e)) => {
      unsafe {
        for p in partial {
          if p != vk::Pipeline::null() {
            device.destroy_pipeline(p, None);
          }
        }
        device.destroy_pipeline_layout(layout, None);
      }
      Err(vk_err("create_graphics_pipelines")(e))
    }
  }
}
