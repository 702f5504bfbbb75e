//! Lights the G-buffer onto the swapchain image with a fullscreen triangle.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use sable_rhi::{RhiError, RhiResult};
use sable_rhi::command::CommandRecorder;
use sable_rhi::descriptor::{
    DescriptorPool, DescriptorSetLayout, combined_image_sampler_bindings, sampled_image_info,
    write_combined_image_samplers,
};
use sable_rhi::device::Device;
use sable_rhi::pipeline::{CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use sable_rhi::shader::Shader;

use super::gbuffer::{GBUFFER_SAMPLED_COUNT, GBuffer};
use crate::backend::{RecordTarget, TargetInfo};
use crate::subpass::{SceneView, Subpass};

pub struct CompositeSubpass {
    device: Arc<Device>,
    gbuffer: Rc<RefCell<GBuffer>>,
    pipeline: Pipeline,
    layout: PipelineLayout,
    descriptor_set: vk::DescriptorSet,
    _descriptor_pool: DescriptorPool,
    _set_layout: DescriptorSetLayout,
    // Kept to rebuild the pipeline against a new global render pass.
    vertex_shader: Shader,
    fragment_shader: Shader,
}

impl CompositeSubpass {
    pub fn new(
        device: Arc<Device>,
        gbuffer: Rc<RefCell<GBuffer>>,
        vertex_shader: Shader,
        fragment_shader: Shader,
        target: &TargetInfo,
    ) -> RhiResult<Self> {
        let set_layout = DescriptorSetLayout::new(
            device.clone(),
            &combined_image_sampler_bindings(
                GBUFFER_SAMPLED_COUNT as u32,
                vk::ShaderStageFlags::FRAGMENT,
            ),
        )?;
        let descriptor_pool = DescriptorPool::new(
            device.clone(),
            1,
            &[vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: GBUFFER_SAMPLED_COUNT as u32,
            }],
        )?;
        let descriptor_set = descriptor_pool
            .allocate(&[set_layout.handle()])?
            .into_iter()
            .next()
            .ok_or(RhiError::vulkan(
                "vkAllocateDescriptorSets",
                vk::Result::ERROR_OUT_OF_POOL_MEMORY,
            ))?;

        let layout = PipelineLayout::new(device.clone(), &[set_layout.handle()], &[])?;
        let pipeline = build_pipeline(
            &device,
            &layout,
            &vertex_shader,
            &fragment_shader,
            target.render_pass,
        )?;

        let composite = Self {
            device,
            gbuffer,
            pipeline,
            layout,
            descriptor_set,
            _descriptor_pool: descriptor_pool,
            _set_layout: set_layout,
            vertex_shader,
            fragment_shader,
        };
        composite.write_descriptors()?;
        Ok(composite)
    }

    /// Point the descriptor set at the current G-buffer views.
    fn write_descriptors(&self) -> RhiResult<()> {
        let gbuffer = self.gbuffer.borrow();
        let sampler = gbuffer.sampler();
        let images: Vec<vk::DescriptorImageInfo> = gbuffer
            .sampled_views()?
            .into_iter()
            .map(|view| sampled_image_info(sampler, view))
            .collect();
        write_combined_image_samplers(&self.device, self.descriptor_set, &images);
        Ok(())
    }
}

fn build_pipeline(
    device: &Arc<Device>,
    layout: &PipelineLayout,
    vertex_shader: &Shader,
    fragment_shader: &Shader,
    render_pass: vk::RenderPass,
) -> RhiResult<Pipeline> {
    GraphicsPipelineBuilder::new()
        .vertex_shader(vertex_shader)
        .fragment_shader(fragment_shader)
        .render_pass(render_pass, 0)
        .color_attachment_count(1)
        .cull_mode(CullMode::None)
        .depth(false, false)
        .build(device.clone(), layout)
}

impl Subpass for CompositeSubpass {
    fn name(&self) -> &str {
        "composite"
    }

    fn record(&self, target: &RecordTarget, _scene: &SceneView<'_>) -> RhiResult<()> {
        let recorder = CommandRecorder::new(&self.device, target.command_buffer);
        recorder.set_viewport_and_scissor(target.extent);
        recorder.bind_graphics_pipeline(self.pipeline.handle());
        recorder.bind_descriptor_set(self.layout.handle(), 0, self.descriptor_set);
        // Fullscreen triangle generated from gl_VertexIndex.
        recorder.draw(3);
        Ok(())
    }

    fn on_swapchain_rebuilt(&mut self, target: &TargetInfo) -> RhiResult<()> {
        self.pipeline = build_pipeline(
            &self.device,
            &self.layout,
            &self.vertex_shader,
            &self.fragment_shader,
            target.render_pass,
        )?;
        self.write_descriptors()?;
        debug!("Composite pipeline rebuilt for {:?}", target.extent);
        Ok(())
    }
}
