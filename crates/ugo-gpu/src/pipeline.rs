//! Graphics pipeline creation.

use std::path::Path;
use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::{GpuError, Result};
use crate::shader::ShaderModule;

/// Graphics pipeline wrapper. Destroys the pipeline and its layout on drop.
pub struct GraphicsPipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Get the raw pipeline handle.
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get the pipeline layout.
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        // SAFETY: owners wait for the device to go idle before dropping.
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Builds a vertex-input-free graphics pipeline for dynamic rendering.
///
/// Fixed state: triangle list, fill, no culling, one sample, no depth test,
/// one unblended color attachment, dynamic viewport and scissor.
pub struct GraphicsPipelineBuilder {
    device: Arc<Device>,
    vertex_shader: Option<ShaderModule>,
    fragment_shader: Option<ShaderModule>,
    color_format: vk::Format,
    depth_format: vk::Format,
}

impl GraphicsPipelineBuilder {
    /// Create a builder with no shaders and undefined formats.
    pub fn new(device: &Arc<Device>) -> Self {
        Self {
            device: Arc::clone(device),
            vertex_shader: None,
            fragment_shader: None,
            color_format: vk::Format::UNDEFINED,
            depth_format: vk::Format::UNDEFINED,
        }
    }

    /// Load the vertex shader from a SPIR-V file.
    pub fn vertex_shader_from_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.vertex_shader = Some(ShaderModule::from_file(&self.device, path)?);
        Ok(self)
    }

    /// Load the fragment shader from a SPIR-V file.
    pub fn fragment_shader_from_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.fragment_shader = Some(ShaderModule::from_file(&self.device, path)?);
        Ok(self)
    }

    /// Use an already-created vertex shader module.
    pub fn vertex_shader(mut self, module: ShaderModule) -> Self {
        self.vertex_shader = Some(module);
        self
    }

    /// Use an already-created fragment shader module.
    pub fn fragment_shader(mut self, module: ShaderModule) -> Self {
        self.fragment_shader = Some(module);
        self
    }

    /// Set the color attachment format. Required.
    pub fn color_format(mut self, format: vk::Format) -> Self {
        self.color_format = format;
        self
    }

    /// Set the depth attachment format. `UNDEFINED` means no depth attachment.
    pub fn depth_format(mut self, format: vk::Format) -> Self {
        self.depth_format = format;
        self
    }

    /// Create the pipeline. Shader modules are released afterwards.
    pub fn build(self) -> Result<GraphicsPipeline> {
        let (Some(vertex), Some(fragment)) = (&self.vertex_shader, &self.fragment_shader) else {
            return Err(GpuError::InvalidState(
                "Vertex and fragment shader must be set.".into(),
            ));
        };

        if self.color_format == vk::Format::UNDEFINED {
            return Err(GpuError::InvalidState("Color format must be set.".into()));
        }

        let device = self.device.handle();

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex.handle())
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment.handle())
                .name(c"main"),
        ];

        // Geometry is generated in the vertex shader
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE)
            .line_width(1.0);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false)
            .min_sample_shading(1.0);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(false)
            .depth_write_enable(false)
            .depth_compare_op(vk::CompareOp::NEVER)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)];

        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        // No descriptor sets or push constants
        let layout_info = vk::PipelineLayoutCreateInfo::default();

        // SAFETY: the device is valid.
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(|e| GpuError::PipelineCreation(e.to_string()))?;

        let color_formats = [self.color_format];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(self.depth_format);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .push_next(&mut rendering_info);

        // SAFETY: every state struct referenced by pipeline_info lives until the call returns.
        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };

        let pipeline = match pipelines {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                // SAFETY: the layout is not referenced by any pipeline.
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(GpuError::PipelineCreation(e.to_string()));
            }
        };

        tracing::debug!("Graphics pipeline created for {:?}", self.color_format);

        Ok(GraphicsPipeline {
            device: Arc::clone(&self.device),
            pipeline,
            layout,
        })
    }
}
