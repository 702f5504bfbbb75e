//! The per-tick frame loop.

use ash::vk;
use tracing::{debug, trace, warn};

use sable_rhi::RhiResult;
use sable_rhi::swapchain::AcquiredImage;

use crate::backend::{FrameBackend, SubmitBatch};
use crate::frame::FrameCounter;
use crate::render_pipeline::RenderPipeline;
use crate::subpass::{FrameRef, PresentDependencies, SceneView};

/// What one call to [`FrameOrchestrator::tick`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and presented.
    Presented { frame_slot: usize, image_index: u32 },
    /// The swapchain was out of date; nothing was submitted and the slot was
    /// not advanced.
    Skipped,
}

/// Drives acquire, record, submit, present and slot advance.
///
/// Pipelines are declared before the backend so their GPU objects are
/// destroyed while the device is still alive.
pub struct FrameOrchestrator<B: FrameBackend> {
    pipelines: Vec<RenderPipeline>,
    backend: B,
    frames: FrameCounter,
    needs_rebuild: bool,
    deps: PresentDependencies,
}

impl<B: FrameBackend> FrameOrchestrator<B> {
    pub fn new(backend: B, pipelines: Vec<RenderPipeline>) -> Self {
        Self {
            pipelines,
            backend,
            frames: FrameCounter::default(),
            needs_rebuild: false,
            deps: PresentDependencies::default(),
        }
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Slot the next tick will use.
    #[inline]
    pub fn current_slot(&self) -> usize {
        self.frames.current()
    }

    #[inline]
    pub fn pipelines(&self) -> &[RenderPipeline] {
        &self.pipelines
    }

    /// Rebuild the swapchain at the start of the next tick.
    pub fn request_rebuild(&mut self) {
        self.needs_rebuild = true;
    }

    #[inline]
    pub fn rebuild_pending(&self) -> bool {
        self.needs_rebuild
    }

    pub fn wait_idle(&self) -> RhiResult<()> {
        self.backend.wait_idle()
    }

    /// Run one frame.
    ///
    /// # Errors
    ///
    /// Any `Err` is fatal. An out-of-date swapchain is not an error: it
    /// yields [`FrameOutcome::Skipped`] and schedules a rebuild.
    pub fn tick(&mut self, scene: &SceneView<'_>) -> RhiResult<FrameOutcome> {
        if self.needs_rebuild {
            self.rebuild()?;
        }

        let slot = self.frames.current();
        let handles = self.backend.frame_slot(slot);

        let image_index = match self.backend.acquire_next_image(handles.present_complete)? {
            AcquiredImage::Ready {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    debug!("Acquired image {} is suboptimal", image_index);
                    self.needs_rebuild = true;
                }
                image_index
            }
            AcquiredImage::OutOfDate => {
                warn!("Swapchain out of date on acquire, skipping frame");
                self.needs_rebuild = true;
                return Ok(FrameOutcome::Skipped);
            }
        };

        // Only reset once the frame is certain to submit.
        self.backend.reset_fence(slot)?;

        let final_command_buffer = self.record_all(scene, image_index)?;

        self.deps.clear();
        let frame = FrameRef { slot, image_index };
        for pipeline in &self.pipelines {
            pipeline.gather_present_dependencies(frame, &mut self.deps);
        }

        let final_waits = if self.deps.is_submittable() {
            self.backend.submit(
                &SubmitBatch {
                    wait_semaphores: vec![handles.present_complete],
                    wait_stages: vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
                    command_buffers: self.deps.command_buffers.clone(),
                    signal_semaphores: self.deps.semaphores.clone(),
                },
                None,
            )?;
            let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::FRAGMENT_SHADER;
            (
                self.deps.semaphores.clone(),
                vec![stages; self.deps.semaphores.len()],
            )
        } else {
            (
                vec![handles.present_complete],
                vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
            )
        };

        let (wait_semaphores, wait_stages) = final_waits;
        self.backend.submit(
            &SubmitBatch {
                wait_semaphores,
                wait_stages,
                command_buffers: vec![final_command_buffer],
                signal_semaphores: vec![handles.render_finished],
            },
            Some(slot),
        )?;

        // Unbounded wait: caps the frames in flight.
        self.backend.wait_for_fence(slot)?;

        let status = self.backend.present(handles.render_finished)?;
        if status.needs_rebuild() {
            debug!("Present reported {:?}, rebuild scheduled", status);
            self.needs_rebuild = true;
        }

        self.frames.advance();
        trace!("Frame presented: slot {} image {}", slot, image_index);
        Ok(FrameOutcome::Presented {
            frame_slot: slot,
            image_index,
        })
    }

    /// Re-record every swapchain image. Returns the acquired image's command
    /// buffer.
    fn record_all(&mut self, scene: &SceneView<'_>, acquired: u32) -> RhiResult<vk::CommandBuffer> {
        let mut acquired_command_buffer = vk::CommandBuffer::null();
        for image_index in 0..self.backend.image_count() {
            let target = self.backend.begin_image(image_index)?;
            for pipeline in &self.pipelines {
                pipeline.draw(&target, scene)?;
            }
            self.backend.end_image(image_index)?;
            if image_index == acquired {
                acquired_command_buffer = target.command_buffer;
            }
        }
        Ok(acquired_command_buffer)
    }

    fn rebuild(&mut self) -> RhiResult<()> {
        self.backend.wait_idle()?;
        let target = self.backend.rebuild_swapchain()?;
        for pipeline in &mut self.pipelines {
            pipeline.on_swapchain_rebuilt(&target)?;
        }
        self.needs_rebuild = false;
        Ok(())
    }
}

impl<B: FrameBackend> Drop for FrameOrchestrator<B> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.wait_idle() {
            warn!("Device wait idle failed during shutdown: {}", e);
        }
        self.pipelines.clear();
    }
}
