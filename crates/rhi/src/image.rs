//! Render-target images and samplers.
//!
//! Attachments are sized to the swapchain and rebuilt with it, so each one
//! gets a dedicated `DEVICE_LOCAL` allocation picked with
//! [`Device::find_memory_type`] instead of going through the sub-allocator.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult, VkResultExt};

/// Depth formats in order of preference.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// First candidate whose optimal-tiling features include depth attachment use.
///
/// # Errors
///
/// [`RhiError::NoSupportedDepthFormat`] when none qualifies.
pub fn select_depth_format(device: &Device) -> RhiResult<vk::Format> {
    pick_depth_format(|format| device.format_properties(format).optimal_tiling_features)
}

fn pick_depth_format(
    features_of: impl Fn(vk::Format) -> vk::FormatFeatureFlags,
) -> RhiResult<vk::Format> {
    DEPTH_FORMAT_CANDIDATES
        .into_iter()
        .find(|&format| {
            features_of(format).contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or(RhiError::NoSupportedDepthFormat)
}

/// Whether a depth format carries a stencil component.
pub fn has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT
    )
}

/// How an attachment image is used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Color target that a later pass samples.
    SampledColor,
    /// Depth target.
    Depth,
}

impl AttachmentKind {
    fn usage(self) -> vk::ImageUsageFlags {
        match self {
            AttachmentKind::SampledColor => {
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED
            }
            AttachmentKind::Depth => vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        }
    }

    fn aspect(self) -> vk::ImageAspectFlags {
        match self {
            AttachmentKind::SampledColor => vk::ImageAspectFlags::COLOR,
            AttachmentKind::Depth => vk::ImageAspectFlags::DEPTH,
        }
    }
}

/// 2D image with its own memory and a full view.
pub struct AttachmentImage {
    device: Arc<Device>,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl AttachmentImage {
    /// # Errors
    ///
    /// Zero extent, no matching memory type, or driver failure. Partially
    /// created handles are released before returning.
    pub fn new(
        device: Arc<Device>,
        extent: vk::Extent2D,
        format: vk::Format,
        kind: AttachmentKind,
    ) -> RhiResult<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::RenderPassError(format!(
                "attachment extent {}x{} is empty",
                extent.width, extent.height
            )));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(kind.usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let handle = device.handle();
        let image = unsafe { handle.create_image(&image_info, None) }.context("vkCreateImage")?;

        let memory = match Self::allocate_memory(&device, image) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { handle.destroy_image(image, None) };
                return Err(e);
            }
        };

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: kind.aspect(),
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view = match unsafe { handle.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    handle.destroy_image(image, None);
                    handle.free_memory(memory, None);
                }
                return Err(RhiError::vulkan("vkCreateImageView", e));
            }
        };

        debug!(
            "Attachment {:?} created: {}x{} {:?}",
            kind, extent.width, extent.height, format
        );

        Ok(Self {
            device,
            image,
            memory,
            view,
        })
    }

    fn allocate_memory(device: &Device, image: vk::Image) -> RhiResult<vk::DeviceMemory> {
        let handle = device.handle();
        let requirements = unsafe { handle.get_image_memory_requirements(image) };
        let memory_type = device.find_memory_type(
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        let memory =
            unsafe { handle.allocate_memory(&alloc_info, None) }.context("vkAllocateMemory")?;

        if let Err(e) = unsafe { handle.bind_image_memory(image, memory, 0) } {
            unsafe { handle.free_memory(memory, None) };
            return Err(RhiError::vulkan("vkBindImageMemory", e));
        }
        Ok(memory)
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for AttachmentImage {
    fn drop(&mut self) {
        let handle = self.device.handle();
        unsafe {
            handle.destroy_image_view(self.view, None);
            handle.destroy_image(self.image, None);
            handle.free_memory(self.memory, None);
        }
    }
}

/// Linear clamp-to-edge sampler for reading attachments.
pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    pub fn linear_clamp(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .max_lod(1.0)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK);
        let sampler = unsafe { device.handle().create_sampler(&create_info, None) }
            .context("vkCreateSampler")?;

        Ok(Self { device, sampler })
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_d32() {
        let format = pick_depth_format(|_| vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT);
        assert_eq!(format.unwrap(), vk::Format::D32_SFLOAT);
    }

    #[test]
    fn test_falls_back_in_order() {
        let format = pick_depth_format(|format| {
            if format == vk::Format::D24_UNORM_S8_UINT {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::FormatFeatureFlags::SAMPLED_IMAGE
            }
        });
        assert_eq!(format.unwrap(), vk::Format::D24_UNORM_S8_UINT);
    }

    #[test]
    fn test_no_depth_format() {
        let result = pick_depth_format(|_| vk::FormatFeatureFlags::empty());
        assert!(matches!(result, Err(RhiError::NoSupportedDepthFormat)));
    }

    #[test]
    fn test_has_stencil() {
        assert!(!has_stencil(vk::Format::D32_SFLOAT));
        assert!(has_stencil(vk::Format::D32_SFLOAT_S8_UINT));
        assert!(has_stencil(vk::Format::D24_UNORM_S8_UINT));
    }

    #[test]
    fn test_attachment_usage() {
        assert!(AttachmentKind::SampledColor
            .usage()
            .contains(vk::ImageUsageFlags::SAMPLED));
        assert_eq!(AttachmentKind::Depth.aspect(), vk::ImageAspectFlags::DEPTH);
    }
}
