//! Graphics pipelines and pipeline layouts.
//!
//! Pipelines are built against a render pass and subpass index. Viewport and
//! scissor are always dynamic, so a pipeline survives swapchain resizes as
//! long as its render pass stays compatible.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use sable_rhi::device::Device;
//! use sable_rhi::pipeline::{CullMode, GraphicsPipelineBuilder, PipelineLayout};
//! use sable_rhi::shader::Shader;
//! use sable_rhi::vertex::Vertex;
//!
//! # fn example(device: Arc<Device>, vs: &Shader, fs: &Shader, pass: vk::RenderPass)
//! #     -> sable_rhi::RhiResult<()> {
//! let layout = PipelineLayout::new(device.clone(), &[], &[])?;
//! let pipeline = GraphicsPipelineBuilder::new()
//!     .vertex_shader(vs)
//!     .fragment_shader(fs)
//!     .vertex_input(Vertex::binding_description(), &Vertex::attribute_descriptions())
//!     .render_pass(pass, 0)
//!     .cull_mode(CullMode::Back)
//!     .build(device, &layout)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::Shader;

/// Descriptor set layouts plus push constant ranges.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    pub fn new(
        device: Arc<Device>,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe {
            device
                .handle()
                .create_pipeline_layout(&create_info, None)
                .map_err(|e| RhiError::PipelineError(format!("pipeline layout creation: {e}")))?
        };

        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// A graphics pipeline.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        debug!("Graphics pipeline destroyed");
    }
}

/// Face culling mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

impl CullMode {
    pub fn to_vk(self) -> vk::CullModeFlags {
        match self {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
        }
    }
}

/// Builder for graphics pipelines used by subpasses.
pub struct GraphicsPipelineBuilder<'a> {
    vertex_shader: Option<&'a Shader>,
    fragment_shader: Option<&'a Shader>,
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    render_pass: vk::RenderPass,
    subpass: u32,
    color_attachment_count: usize,
    cull_mode: CullMode,
    depth_test: bool,
    depth_write: bool,
}

impl Default for GraphicsPipelineBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> GraphicsPipelineBuilder<'a> {
    /// Triangle lists, counter-clockwise front faces, back-face culling,
    /// depth test and write on, one opaque color attachment.
    pub fn new() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            render_pass: vk::RenderPass::null(),
            subpass: 0,
            color_attachment_count: 1,
            cull_mode: CullMode::Back,
            depth_test: true,
            depth_write: true,
        }
    }

    pub fn vertex_shader(mut self, shader: &'a Shader) -> Self {
        self.vertex_shader = Some(shader);
        self
    }

    pub fn fragment_shader(mut self, shader: &'a Shader) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    /// Single interleaved vertex binding. Omit for vertex-less passes.
    pub fn vertex_input(
        mut self,
        binding: vk::VertexInputBindingDescription,
        attributes: &[vk::VertexInputAttributeDescription],
    ) -> Self {
        self.vertex_bindings = vec![binding];
        self.vertex_attributes = attributes.to_vec();
        self
    }

    /// Render pass and subpass the pipeline is used in.
    pub fn render_pass(mut self, render_pass: vk::RenderPass, subpass: u32) -> Self {
        self.render_pass = render_pass;
        self.subpass = subpass;
        self
    }

    /// Number of color attachments written by the fragment shader.
    pub fn color_attachment_count(mut self, count: usize) -> Self {
        self.color_attachment_count = count;
        self
    }

    pub fn cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    pub fn depth(mut self, test: bool, write: bool) -> Self {
        self.depth_test = test;
        self.depth_write = write;
        self
    }

    fn check(&self) -> RhiResult<(&'a Shader, &'a Shader)> {
        let vertex = self
            .vertex_shader
            .ok_or_else(|| RhiError::PipelineError(String::from("vertex shader is required")))?;
        let fragment = self
            .fragment_shader
            .ok_or_else(|| RhiError::PipelineError(String::from("fragment shader is required")))?;
        if self.render_pass == vk::RenderPass::null() {
            return Err(RhiError::PipelineError(String::from("render pass is required")));
        }
        if self.color_attachment_count == 0 {
            return Err(RhiError::PipelineError(String::from(
                "at least one color attachment is required",
            )));
        }
        Ok((vertex, fragment))
    }

    /// Create the pipeline.
    ///
    /// # Errors
    ///
    /// Missing shaders or render pass, or driver failure. Fatal for callers.
    pub fn build(self, device: Arc<Device>, layout: &PipelineLayout) -> RhiResult<Pipeline> {
        let (vertex_shader, fragment_shader) = self.check()?;

        let stages = [
            vertex_shader.stage_create_info(),
            fragment_shader.stage_create_info(),
        ];
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST);
        let viewport = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(self.cull_mode.to_vk())
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);
        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_write)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL);

        let blend_attachments = vec![
            vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA);
            self.color_attachment_count
        ];
        let color_blend =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .render_pass(self.render_pass)
            .subpass(self.subpass);

        let pipelines = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| RhiError::PipelineError(format!("graphics pipeline creation: {e}")))?
        };
        let pipeline = pipelines
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::PipelineError(String::from("driver returned no pipeline")))?;

        Ok(Pipeline { device, pipeline })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_cull_mode_to_vk() {
        assert_eq!(CullMode::None.to_vk(), vk::CullModeFlags::NONE);
        assert_eq!(CullMode::Front.to_vk(), vk::CullModeFlags::FRONT);
        assert_eq!(CullMode::Back.to_vk(), vk::CullModeFlags::BACK);
        assert_eq!(CullMode::default(), CullMode::Back);
    }

    #[test]
    fn test_builder_defaults() {
        let builder = GraphicsPipelineBuilder::new();
        assert_eq!(builder.color_attachment_count, 1);
        assert!(builder.depth_test);
        assert!(builder.depth_write);
        assert!(builder.vertex_bindings.is_empty());
    }

    #[test]
    fn test_builder_requires_shaders() {
        let builder = GraphicsPipelineBuilder::new().render_pass(vk::RenderPass::from_raw(1), 0);
        match builder.check() {
            Err(RhiError::PipelineError(msg)) => assert!(msg.contains("vertex shader")),
            _ => panic!("expected missing shader error"),
        }
    }

    #[test]
    fn test_builder_settings() {
        let builder = GraphicsPipelineBuilder::new()
            .render_pass(vk::RenderPass::from_raw(7), 0)
            .color_attachment_count(3)
            .cull_mode(CullMode::None)
            .depth(false, false);

        assert_eq!(builder.render_pass.as_raw(), 7);
        assert_eq!(builder.color_attachment_count, 3);
        assert_eq!(builder.cull_mode, CullMode::None);
        assert!(!builder.depth_test);
    }
}
