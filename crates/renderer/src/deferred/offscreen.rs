//! Fills the G-buffer from every renderable entity.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, trace, warn};

use sable_rhi::command::{CommandPool, CommandRecorder};
use sable_rhi::device::Device;
use sable_rhi::pipeline::{CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use sable_rhi::shader::Shader;
use sable_rhi::sync::{MAX_FRAMES_IN_FLIGHT, Semaphore};
use sable_rhi::vertex::Vertex;
use sable_rhi::{RhiError, RhiResult};

use super::gbuffer::{GBUFFER_COLOR_FORMATS, GBuffer};
use crate::backend::{RecordTarget, TargetInfo};
use crate::push_constants::DrawPushConstants;
use crate::subpass::{FrameRef, PresentDependencies, SceneView, Subpass};

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

/// Records the G-buffer fill into its own per-image command buffers and
/// signals a per-slot semaphore the composite submission waits on.
pub struct OffscreenSubpass {
    device: Arc<Device>,
    gbuffer: Rc<RefCell<GBuffer>>,
    pipeline: Pipeline,
    layout: PipelineLayout,
    command_buffers: Vec<vk::CommandBuffer>,
    command_pool: CommandPool,
    signal_semaphores: Vec<Semaphore>,
}

impl OffscreenSubpass {
    pub fn new(
        device: Arc<Device>,
        gbuffer: Rc<RefCell<GBuffer>>,
        vertex_shader: &Shader,
        fragment_shader: &Shader,
        image_count: u32,
    ) -> RhiResult<Self> {
        let layout = PipelineLayout::new(device.clone(), &[], &[DrawPushConstants::range()])?;
        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(vertex_shader)
            .fragment_shader(fragment_shader)
            .vertex_input(Vertex::binding_description(), &Vertex::attribute_descriptions())
            .render_pass(gbuffer.borrow().render_pass().handle(), 0)
            .color_attachment_count(GBUFFER_COLOR_FORMATS.len())
            .cull_mode(CullMode::Back)
            .depth(true, true)
            .build(device.clone(), &layout)?;

        let graphics_family = device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;
        let command_buffers = command_pool.allocate(image_count as usize)?;

        let signal_semaphores = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| Semaphore::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;

        debug!(
            "Offscreen subpass created: {} command buffer(s), {} semaphore(s)",
            command_buffers.len(),
            signal_semaphores.len()
        );

        Ok(Self {
            device,
            gbuffer,
            pipeline,
            layout,
            command_buffers,
            command_pool,
            signal_semaphores,
        })
    }

    fn command_buffer(&self, image_index: u32) -> RhiResult<vk::CommandBuffer> {
        self.command_buffers
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| {
                RhiError::SwapchainError(format!(
                    "no offscreen command buffer for image {image_index}"
                ))
            })
    }
}

impl Subpass for OffscreenSubpass {
    fn name(&self) -> &str {
        "offscreen"
    }

    fn record(&self, target: &RecordTarget, scene: &SceneView<'_>) -> RhiResult<()> {
        let gbuffer = self.gbuffer.borrow();
        let recorder = CommandRecorder::new(&self.device, self.command_buffer(target.image_index)?);
        let clear_values = gbuffer.render_pass().clear_values(CLEAR_COLOR);

        recorder.begin()?;
        recorder.begin_render_pass(
            gbuffer.render_pass().handle(),
            gbuffer.framebuffer()?,
            gbuffer.extent(),
            &clear_values,
        );
        recorder.set_viewport_and_scissor(gbuffer.extent());
        recorder.bind_graphics_pipeline(self.pipeline.handle());

        let view_projection = scene.camera.view_projection_matrix();
        for (entity, transform, renderer) in scene.registry.renderables() {
            let Some(mesh) = scene.meshes.get(renderer.mesh) else {
                trace!("Entity {:?} references missing mesh {:?}", entity, renderer.mesh);
                continue;
            };
            let constants = DrawPushConstants::new(view_projection, transform.matrix());
            recorder.push_constants(
                self.layout.handle(),
                vk::ShaderStageFlags::VERTEX,
                &constants,
            );
            recorder.bind_vertex_buffer(mesh.vertex_buffer.handle());
            recorder.bind_index_buffer(mesh.index_buffer.handle());
            recorder.draw_indexed(mesh.index_count());
        }

        recorder.end_render_pass();
        recorder.end()
    }

    fn gather_present_dependencies(&self, frame: FrameRef, deps: &mut PresentDependencies) {
        let (Some(&cmd), Some(semaphore)) = (
            self.command_buffers.get(frame.image_index as usize),
            self.signal_semaphores.get(frame.slot),
        ) else {
            warn!(
                "Offscreen subpass has nothing for slot {} image {}",
                frame.slot, frame.image_index
            );
            return;
        };
        deps.command_buffers.push(cmd);
        deps.semaphores.push(semaphore.handle());
    }

    fn on_swapchain_rebuilt(&mut self, target: &TargetInfo) -> RhiResult<()> {
        self.gbuffer.borrow_mut().resize(target.extent)?;

        if self.command_buffers.len() != target.image_count as usize {
            self.command_pool.free(&self.command_buffers);
            self.command_buffers = self.command_pool.allocate(target.image_count as usize)?;
            debug!(
                "Offscreen command buffers reallocated for {} image(s)",
                target.image_count
            );
        }
        Ok(())
    }
}
