//! Semaphores, fences and frame slots.
//!
//! A frame slot is one of [`MAX_FRAMES_IN_FLIGHT`] independent tracks of
//! synchronization objects. Each slot owns:
//!
//! - a present-complete semaphore, signaled by swapchain image acquisition
//! - a render-finished semaphore, signaled by the final submission and
//!   waited on by presentation
//! - an in-flight fence, armed by the final submission and waited on by the
//!   host before the slot is used again
//!
//! ```text
//! acquire(present_complete) -> reset(in_flight) -> record
//!   -> submit(wait present_complete, signal render_finished, fence in_flight)
//!   -> wait(in_flight) -> present(wait render_finished)
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiResult, VkResultExt};

/// Number of frame slots.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// GPU-to-GPU signal.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create an unsignaled binary semaphore.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None) }
            .context("vkCreateSemaphore")?;
        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// GPU-to-host signal.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled.
    ///
    /// # Errors
    ///
    /// Fence creation failure is fatal for the caller.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { device.handle().create_fence(&create_info, None) }
            .context("vkCreateFence")?;
        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Block until signaled. `u64::MAX` waits without a timeout.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.fence], true, timeout)
        }
        .context("vkWaitForFences")
    }

    /// Return the fence to the unsignaled state.
    ///
    /// Must not be called while a pending submission still references it.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe { self.device.handle().reset_fences(&[self.fence]) }.context("vkResetFences")
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects of one frame slot.
pub struct FrameSlot {
    present_complete: Semaphore,
    render_finished: Semaphore,
    in_flight: Fence,
}

impl FrameSlot {
    /// Create the slot's objects. The fence starts signaled so a slot that
    /// was never submitted reads as idle.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        Ok(Self {
            present_complete: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device, true)?,
        })
    }

    /// Create all [`MAX_FRAMES_IN_FLIGHT`] slots.
    pub fn create_all(device: &Arc<Device>) -> RhiResult<Vec<Self>> {
        let slots = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| Self::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;
        debug!("Created {} frame slots", slots.len());
        Ok(slots)
    }

    #[inline]
    pub fn present_complete(&self) -> vk::Semaphore {
        self.present_complete.handle()
    }

    #[inline]
    pub fn render_finished(&self) -> vk::Semaphore {
        self.render_finished.handle()
    }

    #[inline]
    pub fn in_flight_fence(&self) -> &Fence {
        &self.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_buffered() {
        assert_eq!(MAX_FRAMES_IN_FLIGHT, 2);
    }

    #[test]
    fn test_sync_objects_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
        assert_send_sync::<FrameSlot>();
    }
}
