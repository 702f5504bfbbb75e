//! The GPU side of the frame loop, as seen by the orchestrator.
//!
//! [`FrameOrchestrator`](crate::orchestrator::FrameOrchestrator) only talks
//! to a [`FrameBackend`]: it never touches the device, swapchain or queues
//! directly. [`VulkanBackend`](crate::vulkan_backend::VulkanBackend) is the
//! real implementation; tests substitute a scripted one.

use ash::vk;

use sable_rhi::RhiResult;
use sable_rhi::swapchain::{AcquiredImage, PresentStatus};

/// Semaphores of one frame slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSlotHandles {
    /// Signaled by image acquisition.
    pub present_complete: vk::Semaphore,
    /// Signaled by the final submission, waited on by present.
    pub render_finished: vk::Semaphore,
}

/// What a subpass records against for one swapchain image.
///
/// When handed to a subpass, `command_buffer` is recording and the global
/// render pass has begun on `framebuffer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordTarget {
    pub image_index: u32,
    pub command_buffer: vk::CommandBuffer,
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
}

/// Current swapchain generation, for building or rebuilding subpass
/// resources that depend on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetInfo {
    /// Global render pass: one color attachment in `color_format` plus depth.
    pub render_pass: vk::RenderPass,
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
    pub extent: vk::Extent2D,
    pub image_count: u32,
}

/// One queue submission.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmitBatch {
    pub wait_semaphores: Vec<vk::Semaphore>,
    /// One stage mask per entry in `wait_semaphores`.
    pub wait_stages: Vec<vk::PipelineStageFlags>,
    pub command_buffers: Vec<vk::CommandBuffer>,
    pub signal_semaphores: Vec<vk::Semaphore>,
}

/// Operations the frame loop needs from the GPU.
///
/// Recoverable swapchain states come back as [`AcquiredImage::OutOfDate`]
/// and [`PresentStatus`] values; every `Err` is fatal.
pub trait FrameBackend {
    /// Number of swapchain images in the current generation.
    fn image_count(&self) -> u32;

    fn frame_slot(&self, slot: usize) -> FrameSlotHandles;

    /// Description of the current swapchain generation.
    fn target_info(&self) -> TargetInfo;

    /// Acquire the next image, signaling `present_complete` when it is ready.
    fn acquire_next_image(&mut self, present_complete: vk::Semaphore) -> RhiResult<AcquiredImage>;

    /// Reset the in-flight fence of `slot`.
    fn reset_fence(&mut self, slot: usize) -> RhiResult<()>;

    /// Begin recording image `image_index`'s command buffer and its global
    /// render pass.
    fn begin_image(&mut self, image_index: u32) -> RhiResult<RecordTarget>;

    /// End the render pass and the command buffer begun by `begin_image`.
    fn end_image(&mut self, image_index: u32) -> RhiResult<()>;

    /// Submit to the graphics queue, arming the in-flight fence of
    /// `fence_slot` if given.
    fn submit(&mut self, batch: &SubmitBatch, fence_slot: Option<usize>) -> RhiResult<()>;

    /// Block until the in-flight fence of `slot` signals.
    fn wait_for_fence(&mut self, slot: usize) -> RhiResult<()>;

    /// Present the acquired image once `render_finished` signals.
    fn present(&mut self, render_finished: vk::Semaphore) -> RhiResult<PresentStatus>;

    /// Recreate the swapchain and everything sized to it. Frame slots are
    /// preserved. The caller guarantees the device is idle.
    fn rebuild_swapchain(&mut self) -> RhiResult<TargetInfo>;

    /// Block until the device has no pending work.
    fn wait_idle(&self) -> RhiResult<()>;
}
