//! Graphics pipelines for dynamic rendering, and linked shader objects

use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;
use bitflags::bitflags;

use super::api::RenderApi;
use crate::error::{KvfError, KvfResult};

const ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

bitflags! {
    /// Fixed function toggles for [`PipelineState`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineFlags: u32 {
        /// Blend colour by source alpha
        const ALPHA_BLEND = 1 << 0;
        /// Test and write depth
        const DEPTH_TEST = 1 << 1;
    }
}

impl Default for PipelineFlags {
    fn default() -> Self {
        Self::ALPHA_BLEND | Self::DEPTH_TEST
    }
}

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    module: vk::ShaderModule,
    api: Arc<RenderApi>,
}

impl ShaderModule {
    /// Create a shader module from SPIR-V words
    pub fn new(api: Arc<RenderApi>, spirv: &[u32]) -> KvfResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(spirv);
        let module = unsafe { api.device().create_shader_module(&create_info, None).map_err(KvfError::Api)? };
        Ok(Self { module, api })
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe { self.api.device().destroy_shader_module(self.module, None) };
    }
}

/// Everything about a graphics pipeline except its attachment formats
#[derive(Debug, Clone)]
pub struct PipelineState {
    /// Vertex buffer bindings
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    /// Vertex attributes
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    /// Vertex stage
    pub vertex_shader: vk::ShaderModule,
    /// Fragment stage
    pub fragment_shader: vk::ShaderModule,
    /// Primitive topology
    pub topology: vk::PrimitiveTopology,
    /// Fill, line or point rasterization
    pub polygon_mode: vk::PolygonMode,
    /// Face culling
    pub cull_mode: vk::CullModeFlags,
    /// Depth comparison when [`PipelineFlags::DEPTH_TEST`] is set
    pub depth_compare: vk::CompareOp,
    /// Fixed function toggles
    pub flags: PipelineFlags,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            vertex_shader: vk::ShaderModule::null(),
            fragment_shader: vk::ShaderModule::null(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            depth_compare: vk::CompareOp::LESS,
            flags: PipelineFlags::default(),
        }
    }
}

/// Attachment formats and sample count a pipeline renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineFormat {
    /// Rasterization samples
    pub samples: vk::SampleCountFlags,
    /// Colour attachment format, `UNDEFINED` for none
    pub color: vk::Format,
    /// Depth attachment format, `UNDEFINED` for none
    pub depth: vk::Format,
}

impl Default for PipelineFormat {
    fn default() -> Self {
        Self {
            samples: vk::SampleCountFlags::TYPE_1,
            color: vk::Format::UNDEFINED,
            depth: vk::Format::UNDEFINED,
        }
    }
}

/// Graphics pipeline wrapper with RAII cleanup
pub struct Pipeline {
    pipeline: vk::Pipeline,
    api: Arc<RenderApi>,
}

impl Pipeline {
    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe { self.api.device().destroy_pipeline(self.pipeline, None) };
    }
}

fn color_blend_attachment(flags: PipelineFlags) -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState {
        blend_enable: flags.contains(PipelineFlags::ALPHA_BLEND).into(),
        src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
        dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        color_blend_op: vk::BlendOp::ADD,
        src_alpha_blend_factor: vk::BlendFactor::ONE,
        dst_alpha_blend_factor: vk::BlendFactor::ZERO,
        alpha_blend_op: vk::BlendOp::ADD,
        color_write_mask: vk::ColorComponentFlags::RGBA,
    }
}

/// Create a graphics pipeline for dynamic rendering into `format`
pub fn create_pipeline(
    api: &Arc<RenderApi>,
    layout: vk::PipelineLayout,
    state: &PipelineState,
    format: &PipelineFormat,
) -> KvfResult<Pipeline> {
    let shader_stages = [
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(state.vertex_shader)
            .name(ENTRY_POINT)
            .build(),
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(state.fragment_shader)
            .name(ENTRY_POINT)
            .build(),
    ];

    let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&state.vertex_bindings)
        .vertex_attribute_descriptions(&state.vertex_attributes);
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder().topology(state.topology);
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);

    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .polygon_mode(state.polygon_mode)
        .cull_mode(state.cull_mode)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0);

    let sample_shading = api.gpu().features.sample_rate_shading == vk::TRUE
        && format.samples != vk::SampleCountFlags::TYPE_1;
    let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .rasterization_samples(format.samples)
        .sample_shading_enable(sample_shading)
        .min_sample_shading(if sample_shading { 1.0 } else { 0.0 });

    let depth_test = state.flags.contains(PipelineFlags::DEPTH_TEST);
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(depth_test)
        .depth_write_enable(depth_test)
        .depth_compare_op(state.depth_compare);

    let color_blend_attachments = [color_blend_attachment(state.flags)];
    let color_count = usize::from(format.color != vk::Format::UNDEFINED);
    let color_blending =
        vk::PipelineColorBlendStateCreateInfo::builder().attachments(&color_blend_attachments[..color_count]);

    let dynamic_states = [
        vk::DynamicState::VIEWPORT,
        vk::DynamicState::SCISSOR,
        vk::DynamicState::LINE_WIDTH,
    ];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    let color_formats = [format.color];
    let mut rendering_info = vk::PipelineRenderingCreateInfo::builder()
        .color_attachment_formats(&color_formats[..color_count])
        .depth_attachment_format(format.depth);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .push_next(&mut rendering_info)
        .build();

    let pipelines = unsafe {
        api.device()
            .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
            .map_err(|(_, err)| KvfError::Api(err))?
    };
    Ok(Pipeline {
        pipeline: pipelines[0],
        api: Arc::clone(api),
    })
}

/// Linked vertex and fragment `VK_EXT_shader_object` shaders
pub struct ShaderObjects {
    vertex: vk::ShaderEXT,
    fragment: vk::ShaderEXT,
    api: Arc<RenderApi>,
}

impl ShaderObjects {
    /// Vertex shader handle
    pub fn vertex(&self) -> vk::ShaderEXT {
        self.vertex
    }

    /// Fragment shader handle
    pub fn fragment(&self) -> vk::ShaderEXT {
        self.fragment
    }

    /// Bind both shaders to `cmd`
    pub fn bind(&self, cmd: vk::CommandBuffer) {
        if let Some(loader) = self.api.shader_object() {
            let stages = [vk::ShaderStageFlags::VERTEX, vk::ShaderStageFlags::FRAGMENT];
            unsafe { loader.cmd_bind_shaders(cmd, &stages, &[self.vertex, self.fragment]) };
        }
    }
}

impl Drop for ShaderObjects {
    fn drop(&mut self) {
        if let Some(loader) = self.api.shader_object() {
            unsafe {
                loader.destroy_shader(self.vertex, None);
                loader.destroy_shader(self.fragment, None);
            }
        }
    }
}

/// Create a linked vertex/fragment pair. Requires the shader object feature.
pub fn create_shader_objects(
    api: &Arc<RenderApi>,
    vertex_spirv: &[u32],
    fragment_spirv: &[u32],
    set_layouts: &[vk::DescriptorSetLayout],
) -> KvfResult<ShaderObjects> {
    let loader = api
        .shader_object()
        .ok_or_else(|| KvfError::invalid("shader objects require the shader object feature"))?;

    let create_infos = [
        vk::ShaderCreateInfoEXT::builder()
            .flags(vk::ShaderCreateFlagsEXT::LINK_STAGE)
            .stage(vk::ShaderStageFlags::VERTEX)
            .next_stage(vk::ShaderStageFlags::FRAGMENT)
            .code_type(vk::ShaderCodeTypeEXT::SPIRV)
            .code(bytemuck::cast_slice(vertex_spirv))
            .name(ENTRY_POINT)
            .set_layouts(set_layouts)
            .build(),
        vk::ShaderCreateInfoEXT::builder()
            .flags(vk::ShaderCreateFlagsEXT::LINK_STAGE)
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .code_type(vk::ShaderCodeTypeEXT::SPIRV)
            .code(bytemuck::cast_slice(fragment_spirv))
            .name(ENTRY_POINT)
            .set_layouts(set_layouts)
            .build(),
    ];
    let shaders = unsafe { loader.create_shaders(&create_infos, None).map_err(KvfError::Api)? };
    Ok(ShaderObjects {
        vertex: shaders[0],
        fragment: shaders[1],
        api: Arc::clone(api),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = PipelineState::default();
        assert_eq!(state.flags, PipelineFlags::ALPHA_BLEND | PipelineFlags::DEPTH_TEST);
        assert_eq!(state.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(state.cull_mode, vk::CullModeFlags::NONE);
        assert_eq!(state.depth_compare, vk::CompareOp::LESS);
        assert_eq!(PipelineFormat::default().samples, vk::SampleCountFlags::TYPE_1);
    }

    #[test]
    fn test_blend_attachment() {
        let blend = color_blend_attachment(PipelineFlags::default());
        assert_eq!(blend.blend_enable, vk::TRUE);
        assert_eq!(blend.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(blend.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
        assert_eq!(blend.src_alpha_blend_factor, vk::BlendFactor::ONE);
        assert_eq!(blend.dst_alpha_blend_factor, vk::BlendFactor::ZERO);
        assert_eq!(blend.color_write_mask, vk::ColorComponentFlags::RGBA);

        assert_eq!(color_blend_attachment(PipelineFlags::DEPTH_TEST).blend_enable, vk::FALSE);
    }
}
