//! Host-visible vertex and index buffers.
//!
//! Mesh data is written once at upload time and read by the GPU every frame.
//! Buffers are sub-allocated from `gpu-allocator` in `CpuToGpu` memory, which
//! keeps uploads a plain `memcpy` without staging.

use std::sync::{Arc, MutexGuard};

use ash::vk;
use bytemuck::Pod;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::{AllocationError, MemoryLocation};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult, VkResultExt};

/// What a buffer is bound as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
}

impl BufferUsage {
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
        }
    }

    fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex buffer",
            BufferUsage::Index => "index buffer",
        }
    }
}

/// A buffer and its allocation.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    len: u32,
}

impl Buffer {
    /// Create a buffer holding `data`.
    ///
    /// # Errors
    ///
    /// Empty data, buffer creation or allocation failure. Allocation failure
    /// is fatal for the caller.
    pub fn with_data<T: Pod>(device: Arc<Device>, usage: BufferUsage, data: &[T]) -> RhiResult<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.is_empty() {
            return Err(RhiError::AllocatorError(AllocationError::InvalidAllocationCreateDesc));
        }
        let size = bytes.len() as vk::DeviceSize;

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None) }
            .context("vkCreateBuffer")?;
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = lock_allocator(&device).and_then(|mut allocator| {
            Ok(allocator.allocate(&AllocationCreateDesc {
                name: usage.name(),
                requirements,
                location: MemoryLocation::CpuToGpu,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?)
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let mut this = Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            len: data.len() as u32,
        };

        unsafe {
            let allocation = this.allocation.as_ref().ok_or(RhiError::AllocatorError(
                AllocationError::InvalidAllocationCreateDesc,
            ))?;
            this.device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .context("vkBindBufferMemory")?;
        }
        this.write(bytes)?;

        debug!("Created {} ({} bytes)", usage.name(), size);
        Ok(this)
    }

    fn write(&mut self, bytes: &[u8]) -> RhiResult<()> {
        let mapped = self
            .allocation
            .as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
            .ok_or_else(|| {
                RhiError::AllocatorError(AllocationError::Internal(String::from(
                    "buffer memory is not host mapped",
                )))
            })?;
        mapped[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Number of elements written at creation.
    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match lock_allocator(&self.device) {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free buffer allocation: {:?}", e);
                    }
                }
                Err(e) => error!("Leaking buffer allocation: {}", e),
            }
        }
        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }
    }
}

fn lock_allocator(device: &Device) -> RhiResult<MutexGuard<'_, Allocator>> {
    device.allocator().lock().map_err(|_| {
        RhiError::AllocatorError(AllocationError::Internal(String::from(
            "allocator mutex poisoned",
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_flags() {
        assert_eq!(
            BufferUsage::Vertex.to_vk_usage(),
            vk::BufferUsageFlags::VERTEX_BUFFER
        );
        assert_eq!(
            BufferUsage::Index.to_vk_usage(),
            vk::BufferUsageFlags::INDEX_BUFFER
        );
    }

    #[test]
    fn test_buffer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Buffer>();
    }
}
