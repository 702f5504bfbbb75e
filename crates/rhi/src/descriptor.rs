//! Descriptor set layouts, pools and sampled-image writes.
//!
//! The frame layer only binds sampled attachments (the G-buffer read by the
//! composite subpass), so the helpers here are shaped around combined image
//! samplers. Geometry data reaches shaders through push constants.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiResult, VkResultExt};

/// Descriptor set layout wrapper.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)
        }
        .context("vkCreateDescriptorSetLayout")?;
        debug!("Descriptor set layout created with {} binding(s)", bindings.len());

        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool that descriptor sets are allocated from. Sets live as long as the
/// pool and are never freed individually.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);
        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None) }
            .context("vkCreateDescriptorPool")?;
        debug!("Descriptor pool created: max_sets={}", max_sets);

        Ok(Self { device, pool })
    }

    /// Allocate one set per entry in `layouts`.
    pub fn allocate(&self, layouts: &[vk::DescriptorSetLayout]) -> RhiResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);
        unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info) }
            .context("vkAllocateDescriptorSets")
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
        debug!("Descriptor pool destroyed");
    }
}

/// Binding `binding` as a single combined image sampler.
#[inline]
pub fn combined_image_sampler_binding(
    binding: u32,
    stage_flags: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding<'static> {
    vk::DescriptorSetLayoutBinding::default()
        .binding(binding)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .descriptor_count(1)
        .stage_flags(stage_flags)
}

/// Bindings `0..count`, each a combined image sampler.
pub fn combined_image_sampler_bindings(
    count: u32,
    stage_flags: vk::ShaderStageFlags,
) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
    (0..count)
        .map(|binding| combined_image_sampler_binding(binding, stage_flags))
        .collect()
}

/// Sampled view in `SHADER_READ_ONLY_OPTIMAL`.
#[inline]
pub fn sampled_image_info(sampler: vk::Sampler, view: vk::ImageView) -> vk::DescriptorImageInfo {
    vk::DescriptorImageInfo::default()
        .sampler(sampler)
        .image_view(view)
        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
}

/// Point `set` bindings `0..images.len()` at `images`, one per binding.
pub fn write_combined_image_samplers(
    device: &Device,
    set: vk::DescriptorSet,
    images: &[vk::DescriptorImageInfo],
) {
    if images.is_empty() {
        return;
    }
    let writes: Vec<vk::WriteDescriptorSet<'_>> = images
        .iter()
        .enumerate()
        .map(|(binding, info)| {
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(binding as u32)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(std::slice::from_ref(info))
        })
        .collect();

    unsafe {
        device.handle().update_descriptor_sets(&writes, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_image_sampler_binding() {
        let binding = combined_image_sampler_binding(2, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(binding.binding, 2);
        assert_eq!(
            binding.descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
        assert_eq!(binding.descriptor_count, 1);
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_bindings_are_contiguous() {
        let bindings = combined_image_sampler_bindings(3, vk::ShaderStageFlags::FRAGMENT);
        let indices: Vec<u32> = bindings.iter().map(|b| b.binding).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_sampled_image_info_layout() {
        let info = sampled_image_info(vk::Sampler::null(), vk::ImageView::null());
        assert_eq!(info.image_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }
}
