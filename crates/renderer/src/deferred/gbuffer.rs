//! Geometry buffer written by the offscreen pass and sampled by the composite.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use sable_rhi::device::Device;
use sable_rhi::framebuffer::Framebuffer;
use sable_rhi::image::{AttachmentImage, AttachmentKind, Sampler};
use sable_rhi::render_pass::{RenderPass, RenderPassDesc};
use sable_rhi::{RhiError, RhiResult};

use crate::targets::SwapchainBound;

/// World position, world normal, albedo.
pub const GBUFFER_COLOR_FORMATS: [vk::Format; 3] = [
    vk::Format::R16G16B16A16_SFLOAT,
    vk::Format::R16G16B16A16_SFLOAT,
    vk::Format::R8G8B8A8_UNORM,
];

/// Number of sampled G-buffer attachments.
pub const GBUFFER_SAMPLED_COUNT: usize = GBUFFER_COLOR_FORMATS.len();

struct Attachments {
    // Destroyed before the views it references.
    framebuffer: Framebuffer,
    colors: Vec<AttachmentImage>,
    _depth: AttachmentImage,
}

impl Attachments {
    fn new(
        device: &Arc<Device>,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        depth_format: vk::Format,
    ) -> RhiResult<Self> {
        let colors = GBUFFER_COLOR_FORMATS
            .iter()
            .map(|&format| {
                AttachmentImage::new(device.clone(), extent, format, AttachmentKind::SampledColor)
            })
            .collect::<RhiResult<Vec<_>>>()?;
        let depth = AttachmentImage::new(device.clone(), extent, depth_format, AttachmentKind::Depth)?;

        let mut views: Vec<vk::ImageView> = colors.iter().map(AttachmentImage::view).collect();
        views.push(depth.view());
        let framebuffer = Framebuffer::new(device.clone(), render_pass, &views, extent)?;

        Ok(Self {
            framebuffer,
            colors,
            _depth: depth,
        })
    }
}

/// G-buffer attachments, their render pass and the sampler used to read them.
///
/// The render pass is created once; attachments and framebuffer follow the
/// swapchain extent through [`GBuffer::resize`].
pub struct GBuffer {
    device: Arc<Device>,
    attachments: SwapchainBound<Attachments>,
    render_pass: RenderPass,
    sampler: Sampler,
    depth_format: vk::Format,
    extent: vk::Extent2D,
}

impl GBuffer {
    pub fn new(device: Arc<Device>, extent: vk::Extent2D, depth_format: vk::Format) -> RhiResult<Self> {
        let render_pass = RenderPass::new(
            device.clone(),
            RenderPassDesc::sampled(&GBUFFER_COLOR_FORMATS, depth_format),
        )?;
        let attachments = Attachments::new(&device, render_pass.handle(), extent, depth_format)?;
        let sampler = Sampler::linear_clamp(device.clone())?;
        debug!("G-buffer created at {}x{}", extent.width, extent.height);

        Ok(Self {
            device,
            attachments: SwapchainBound::new(attachments),
            render_pass,
            sampler,
            depth_format,
            extent,
        })
    }

    /// Recreate the attachments at `extent`. The GPU must be idle.
    pub fn resize(&mut self, extent: vk::Extent2D) -> RhiResult<()> {
        let (device, render_pass, depth_format) =
            (&self.device, self.render_pass.handle(), self.depth_format);
        self.attachments
            .rebuild(|| Attachments::new(device, render_pass, extent, depth_format))?;
        self.extent = extent;
        debug!("G-buffer resized to {}x{}", extent.width, extent.height);
        Ok(())
    }

    #[inline]
    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    pub fn framebuffer(&self) -> RhiResult<vk::Framebuffer> {
        Ok(self.current()?.framebuffer.handle())
    }

    /// Color views in binding order: position, normal, albedo.
    pub fn sampled_views(&self) -> RhiResult<Vec<vk::ImageView>> {
        Ok(self.current()?.colors.iter().map(AttachmentImage::view).collect())
    }

    fn current(&self) -> RhiResult<&Attachments> {
        self.attachments.current().ok_or_else(|| {
            RhiError::RenderPassError(String::from("G-buffer attachments missing after failed resize"))
        })
    }
}
