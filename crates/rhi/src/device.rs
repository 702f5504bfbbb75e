//! Logical device, queues and memory allocation.
//!
//! [`Device`] is the explicitly constructed device context every GPU object
//! receives through its constructor as an `Arc<Device>`. It owns the logical
//! device, the graphics and present queues (which may be the same queue),
//! and the `gpu-allocator` instance used for buffers.
//!
//! # Example
//!
//! ```no_run
//! use ash::vk;
//! use sable_rhi::device::Device;
//! use sable_rhi::instance::Instance;
//! use sable_rhi::physical_device::select_physical_device;
//!
//! let instance = Instance::new(c"Sable", false, &[]).expect("instance");
//! let surface = vk::SurfaceKHR::null(); // created by the window
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//! let info = select_physical_device(instance.handle(), surface, &surface_loader).expect("gpu");
//!
//! let device = Device::new(&instance, &info).expect("device");
//! let _queue = device.graphics_queue();
//! ```

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, error, info};

use crate::error::{RhiError, RhiResult, VkResultExt};
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices, REQUIRED_DEVICE_EXTENSIONS};

/// Vulkan logical device with its queues and allocator.
pub struct Device {
    device: ash::Device,
    instance: ash::Instance,
    physical: PhysicalDeviceInfo,
    allocator: ManuallyDrop<Mutex<Allocator>>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl Device {
    /// Create the logical device on the selected GPU.
    ///
    /// # Errors
    ///
    /// Fails when the queue families are incomplete, device creation fails,
    /// or the allocator cannot be initialized. All of these are fatal.
    pub fn new(instance: &Instance, physical: &PhysicalDeviceInfo) -> RhiResult<Arc<Self>> {
        let families = physical.queue_families;
        let (Some(graphics_family), Some(present_family)) =
            (families.graphics_family, families.present_family)
        else {
            return Err(RhiError::NoSuitableGpu);
        };

        let queue_priorities = [1.0f32];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .unique_families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        let extension_names: Vec<_> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical.device, &create_info, None)
        }
        .context("vkCreateDevice")?;
        info!(
            "Logical device created on '{}' ({} queue famil{})",
            physical.device_name(),
            queue_create_infos.len(),
            if queue_create_infos.len() == 1 { "y" } else { "ies" }
        );

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        debug!(
            "Queues: graphics family {}, present family {}",
            graphics_family, present_family
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: physical.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };

        Ok(Arc::new(Self {
            device,
            instance: instance.handle().clone(),
            physical: physical.clone(),
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
        }))
    }

    /// Returns the logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical.device
    }

    /// Returns the capabilities recorded at selection time.
    #[inline]
    pub fn physical_info(&self) -> &PhysicalDeviceInfo {
        &self.physical
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.physical.queue_families
    }

    /// Allocator used for vertex, index and staging buffers.
    #[inline]
    pub fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    /// First memory type matching `type_bits` and `properties`.
    ///
    /// # Errors
    ///
    /// [`RhiError::NoSuitableMemoryType`] when nothing matches.
    pub fn find_memory_type(
        &self,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> RhiResult<u32> {
        self.physical.find_memory_type(type_bits, properties)
    }

    /// Format capabilities of the physical device.
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical.device, format)
        }
    }

    /// Block until every queue is idle.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle() }.context("vkDeviceWaitIdle")
    }

    /// Submit work to the graphics queue.
    ///
    /// # Safety
    ///
    /// Command buffers must be fully recorded, semaphores and the fence must
    /// not be in use by another pending submission.
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> RhiResult<()> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)
        }
        .context("vkQueueSubmit")
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                error!("Failed to wait for device idle during drop: {:?}", e);
            }
            // The allocator frees its memory blocks through the device.
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: handles are plain integers, ash function tables are immutable and
// the allocator is behind a Mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }

    #[test]
    fn test_swapchain_extension_required() {
        assert!(REQUIRED_DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
    }
}
