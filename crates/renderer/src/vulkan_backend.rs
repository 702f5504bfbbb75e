//! [`FrameBackend`] over a real device, surface and swapchain.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use sable_platform::Surface;
use sable_rhi::command::{CommandPool, CommandRecorder};
use sable_rhi::device::Device;
use sable_rhi::image::select_depth_format;
use sable_rhi::instance::Instance;
use sable_rhi::swapchain::{AcquiredImage, PresentStatus, Swapchain};
use sable_rhi::sync::FrameSlot;
use sable_rhi::{RhiError, RhiResult};

use crate::backend::{FrameBackend, FrameSlotHandles, RecordTarget, SubmitBatch, TargetInfo};
use crate::targets::{SwapchainBound, SwapchainTargets};

const CLEAR_COLOR: [f32; 4] = [0.01, 0.01, 0.02, 1.0];

/// Owns the device layer and everything sized to the swapchain.
///
/// Fields drop top to bottom: swapchain-bound targets, command buffers and
/// their pool, frame slots, swapchain, surface, device, instance.
pub struct VulkanBackend {
    targets: SwapchainBound<SwapchainTargets>,
    command_buffers: Vec<vk::CommandBuffer>,
    command_pool: CommandPool,
    frame_slots: Vec<FrameSlot>,
    swapchain: Swapchain,
    _surface: Surface,
    device: Arc<Device>,
    instance: Instance,
    depth_format: vk::Format,
    window_size: (u32, u32),
}

impl VulkanBackend {
    /// Create the swapchain, global targets, command buffers and frame slots
    /// for a window of `width` x `height`.
    pub fn new(
        instance: Instance,
        surface: Surface,
        device: Arc<Device>,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let swapchain = Swapchain::new(&instance, device.clone(), surface.handle(), width, height)?;
        let depth_format = select_depth_format(&device)?;
        let targets = SwapchainTargets::new(
            &device,
            swapchain.format(),
            depth_format,
            swapchain.extent(),
            swapchain.image_views(),
        )?;

        let graphics_family = device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;
        let command_buffers = command_pool.allocate(swapchain.image_count())?;
        let frame_slots = FrameSlot::create_all(&device)?;

        info!(
            "Frame backend ready: {} swapchain image(s), {} frame slot(s), depth {:?}",
            swapchain.image_count(),
            frame_slots.len(),
            depth_format
        );

        Ok(Self {
            targets: SwapchainBound::new(targets),
            command_buffers,
            command_pool,
            frame_slots,
            swapchain,
            _surface: surface,
            device,
            instance,
            depth_format,
            window_size: (width, height),
        })
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Size used by the next swapchain rebuild.
    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_size = (width, height);
    }

    fn targets(&self) -> RhiResult<&SwapchainTargets> {
        self.targets.current().ok_or_else(|| {
            RhiError::SwapchainError(String::from("swapchain targets missing after failed rebuild"))
        })
    }

    fn command_buffer(&self, image_index: u32) -> RhiResult<vk::CommandBuffer> {
        self.command_buffers
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| {
                RhiError::SwapchainError(format!("no command buffer for image {image_index}"))
            })
    }

    fn describe(&self, render_pass: vk::RenderPass) -> TargetInfo {
        TargetInfo {
            render_pass,
            color_format: self.swapchain.format(),
            depth_format: self.depth_format,
            extent: self.swapchain.extent(),
            image_count: self.swapchain.image_count() as u32,
        }
    }
}

impl FrameBackend for VulkanBackend {
    fn image_count(&self) -> u32 {
        self.swapchain.image_count() as u32
    }

    fn frame_slot(&self, slot: usize) -> FrameSlotHandles {
        let frame = &self.frame_slots[slot];
        FrameSlotHandles {
            present_complete: frame.present_complete(),
            render_finished: frame.render_finished(),
        }
    }

    fn target_info(&self) -> TargetInfo {
        let render_pass = self
            .targets
            .current()
            .map_or(vk::RenderPass::null(), |targets| targets.render_pass().handle());
        self.describe(render_pass)
    }

    fn acquire_next_image(&mut self, present_complete: vk::Semaphore) -> RhiResult<AcquiredImage> {
        self.swapchain.acquire_next_image(present_complete)
    }

    fn reset_fence(&mut self, slot: usize) -> RhiResult<()> {
        self.frame_slots[slot].in_flight_fence().reset()
    }

    fn begin_image(&mut self, image_index: u32) -> RhiResult<RecordTarget> {
        let command_buffer = self.command_buffer(image_index)?;
        let targets = self.targets()?;
        let framebuffer = targets.framebuffer(image_index).ok_or_else(|| {
            RhiError::SwapchainError(format!("no framebuffer for image {image_index}"))
        })?;
        let render_pass = targets.render_pass();

        let recorder = CommandRecorder::new(&self.device, command_buffer);
        recorder.begin()?;
        recorder.begin_render_pass(
            render_pass.handle(),
            framebuffer.handle(),
            framebuffer.extent(),
            &render_pass.clear_values(CLEAR_COLOR),
        );

        Ok(RecordTarget {
            image_index,
            command_buffer,
            render_pass: render_pass.handle(),
            framebuffer: framebuffer.handle(),
            extent: framebuffer.extent(),
        })
    }

    fn end_image(&mut self, image_index: u32) -> RhiResult<()> {
        let recorder = CommandRecorder::new(&self.device, self.command_buffer(image_index)?);
        recorder.end_render_pass();
        recorder.end()
    }

    fn submit(&mut self, batch: &SubmitBatch, fence_slot: Option<usize>) -> RhiResult<()> {
        let fence = fence_slot.map_or(vk::Fence::null(), |slot| {
            self.frame_slots[slot].in_flight_fence().handle()
        });
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&batch.wait_semaphores)
            .wait_dst_stage_mask(&batch.wait_stages)
            .command_buffers(&batch.command_buffers)
            .signal_semaphores(&batch.signal_semaphores);

        // Safety: every command buffer was ended by end_image or its subpass,
        // and each semaphore belongs to exactly one pending submission.
        unsafe { self.device.submit_graphics(&[submit_info], fence) }
    }

    fn wait_for_fence(&mut self, slot: usize) -> RhiResult<()> {
        self.frame_slots[slot].in_flight_fence().wait(u64::MAX)
    }

    fn present(&mut self, render_finished: vk::Semaphore) -> RhiResult<PresentStatus> {
        self.swapchain
            .present(self.device.present_queue(), render_finished)
    }

    fn rebuild_swapchain(&mut self) -> RhiResult<TargetInfo> {
        let (width, height) = self.window_size;
        debug!("Rebuilding swapchain for {}x{}", width, height);

        self.targets.release();
        self.swapchain.recreate(width, height)?;

        let (device, swapchain, depth_format) = (&self.device, &self.swapchain, self.depth_format);
        let render_pass = self
            .targets
            .rebuild(|| {
                SwapchainTargets::new(
                    device,
                    swapchain.format(),
                    depth_format,
                    swapchain.extent(),
                    swapchain.image_views(),
                )
            })?
            .render_pass()
            .handle();

        self.command_pool.free(&self.command_buffers);
        self.command_buffers = self.command_pool.allocate(self.swapchain.image_count())?;

        let info = self.describe(render_pass);
        info!(
            "Swapchain rebuilt: {}x{}, {} image(s), generation {}",
            info.extent.width,
            info.extent.height,
            info.image_count,
            self.targets.generation()
        );
        Ok(info)
    }

    fn wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }
}
