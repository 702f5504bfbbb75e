//! Swapchain creation, acquisition and presentation.
//!
//! Acquire and present report the recoverable swapchain states as values:
//! [`AcquiredImage::OutOfDate`] means the frame must be skipped and the
//! swapchain rebuilt; a suboptimal result is still usable but the caller
//! should schedule a rebuild. Every other failure is an [`RhiError`].
//!
//! The active image index is only meaningful between a successful
//! [`Swapchain::acquire_next_image`] and the following [`Swapchain::present`].

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult, VkResultExt};
use crate::instance::Instance;

/// Result of an image acquisition that the caller can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquiredImage {
    /// An image is ready. `suboptimal` recommends a rebuild after this frame.
    Ready { image_index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface; nothing was acquired.
    OutOfDate,
}

/// Result of a presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Optimal,
    /// Presented, but the swapchain should be rebuilt.
    Suboptimal,
    /// Not presented, the swapchain must be rebuilt.
    OutOfDate,
}

impl PresentStatus {
    /// True when the swapchain should be rebuilt before the next frame.
    #[inline]
    pub fn needs_rebuild(self) -> bool {
        !matches!(self, PresentStatus::Optimal)
    }
}

/// Surface capabilities, formats and present modes.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        unsafe {
            Ok(Self {
                capabilities: surface_loader
                    .get_physical_device_surface_capabilities(physical_device, surface)
                    .context("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?,
                formats: surface_loader
                    .get_physical_device_surface_formats(physical_device, surface)
                    .context("vkGetPhysicalDeviceSurfaceFormatsKHR")?,
                present_modes: surface_loader
                    .get_physical_device_surface_present_modes(physical_device, surface)
                    .context("vkGetPhysicalDeviceSurfacePresentModesKHR")?,
            })
        }
    }

    /// At least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Handles produced by one swapchain creation.
struct Generation {
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
}

/// Presentable images and their views.
pub struct Swapchain {
    device: Arc<Device>,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
    active_image: Option<u32>,
}

impl Swapchain {
    /// Create a swapchain for `surface`.
    ///
    /// `width` and `height` are the window's size, used only when the
    /// surface does not dictate its own extent.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());

        let mut swapchain = Self {
            device,
            surface,
            surface_loader,
            swapchain_loader,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            format: vk::Format::UNDEFINED,
            extent: vk::Extent2D::default(),
            active_image: None,
        };
        let generation = swapchain.create_generation(width, height, vk::SwapchainKHR::null())?;
        swapchain.install(generation);
        Ok(swapchain)
    }

    /// Rebuild for a new window size.
    ///
    /// The caller must ensure no pending GPU work references the current
    /// images. Old image views and the old swapchain are destroyed exactly
    /// once, after the replacement has been created.
    pub fn recreate(&mut self, width: u32, height: u32) -> RhiResult<()> {
        let generation = self.create_generation(width, height, self.swapchain)?;
        self.destroy_current();
        self.install(generation);
        Ok(())
    }

    fn install(&mut self, generation: Generation) {
        self.swapchain = generation.swapchain;
        self.images = generation.images;
        self.image_views = generation.image_views;
        self.format = generation.format;
        self.extent = generation.extent;
        self.active_image = None;
    }

    fn create_generation(
        &self,
        width: u32,
        height: u32,
        old_swapchain: vk::SwapchainKHR,
    ) -> RhiResult<Generation> {
        let support = SwapchainSupportDetails::query(
            self.device.physical_device(),
            self.surface,
            &self.surface_loader,
        )?;
        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(String::from(
                "surface reports no formats or present modes",
            )));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_swap_extent(&support.capabilities, width, height);
        let image_count = determine_image_count(&support.capabilities);

        let families = self.device.queue_families();
        let (Some(graphics_family), Some(present_family)) =
            (families.graphics_family, families.present_family)
        else {
            return Err(RhiError::SwapchainError(String::from(
                "device has no graphics or present queue family",
            )));
        };
        let family_indices = [graphics_family, present_family];
        let (sharing_mode, shared_families) = if graphics_family != present_family {
            (vk::SharingMode::CONCURRENT, &family_indices[..])
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(shared_families)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }
            .context("vkCreateSwapchainKHR")?;
        let images = match unsafe { self.swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(RhiError::vulkan("vkGetSwapchainImagesKHR", e));
            }
        };
        let image_views = match create_image_views(&self.device, &images, surface_format.format) {
            Ok(views) => views,
            Err(e) => {
                unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e);
            }
        };

        info!(
            "Swapchain created: {}x{}, {:?}, {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            present_mode,
            images.len()
        );

        Ok(Generation {
            swapchain,
            images,
            image_views,
            format: surface_format.format,
            extent,
        })
    }

    /// Acquire the next image, signaling `semaphore` when it is ready.
    ///
    /// Blocks until an image is available.
    pub fn acquire_next_image(&mut self, semaphore: vk::Semaphore) -> RhiResult<AcquiredImage> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, suboptimal)) => {
                self.active_image = Some(image_index);
                Ok(AcquiredImage::Ready {
                    image_index,
                    suboptimal,
                })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.active_image = None;
                Ok(AcquiredImage::OutOfDate)
            }
            Err(e) => Err(RhiError::SwapchainError(format!(
                "failed to acquire swapchain image: {e}"
            ))),
        }
    }

    /// Present the active image once `wait_semaphore` signals.
    ///
    /// The active image index is cleared whatever the outcome.
    pub fn present(
        &mut self,
        queue: vk::Queue,
        wait_semaphore: vk::Semaphore,
    ) -> RhiResult<PresentStatus> {
        let Some(image_index) = self.active_image.take() else {
            return Err(RhiError::SwapchainError(String::from(
                "present called without an acquired image",
            )));
        };

        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.swapchain_loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(PresentStatus::Optimal),
            Ok(true) => Ok(PresentStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentStatus::OutOfDate),
            Err(e) => Err(RhiError::SwapchainError(format!(
                "failed to present image {image_index}: {e}"
            ))),
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    fn destroy_current(&mut self) {
        unsafe {
            for view in self.image_views.drain(..) {
                self.device.handle().destroy_image_view(view, None);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader
                    .destroy_swapchain(self.swapchain, None);
            }
        }
        self.swapchain = vk::SwapchainKHR::null();
        self.images.clear();
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_current();
        debug!("Swapchain destroyed");
    }
}

/// Pick the swapchain extent.
///
/// A surface that reports a defined current extent (width other than
/// `u32::MAX`) gets it back unchanged. Otherwise the window size is clamped
/// to the surface's min/max image extent, each axis on its own.
pub fn choose_swap_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: width.max(min.width).min(max.width.max(min.width)),
        height: height.max(min.height).min(max.height.max(min.height)),
    }
}

/// Prefer `B8G8R8A8_SRGB`/`SRGB_NONLINEAR`, then `B8G8R8A8_UNORM`, then the
/// first reported format.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let find = |format: vk::Format| {
        formats.iter().copied().find(|f| {
            f.format == format && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
    };

    find(vk::Format::B8G8R8A8_SRGB)
        .or_else(|| find(vk::Format::B8G8R8A8_UNORM))
        .unwrap_or_else(|| {
            warn!("Preferred surface formats unavailable, using {:?}", formats[0].format);
            formats[0]
        })
}

/// MAILBOX when available, FIFO otherwise (always supported).
fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// One more than the minimum, capped by the maximum (0 means unbounded).
fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());

    for (i, &image) in images.iter().enumerate() {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .level_count(1)
                    .layer_count(1),
            );

        match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => views.push(view),
            Err(e) => {
                for view in views {
                    unsafe { device.handle().destroy_image_view(view, None) };
                }
                return Err(RhiError::SwapchainError(format!(
                    "failed to create view for swapchain image {i}: {e}"
                )));
            }
        }
    }

    Ok(views)
}
