//! Framebuffers binding image views to a render pass.

use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::{RhiError, RhiResult, VkResultExt};

pub struct Framebuffer {
    device: Arc<Device>,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
}

impl Framebuffer {
    /// `attachments` must be in the render pass's attachment order.
    pub fn new(
        device: Arc<Device>,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        if attachments.is_empty() {
            return Err(RhiError::RenderPassError(String::from(
                "framebuffer needs at least one attachment",
            )));
        }
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        let framebuffer = unsafe { device.handle().create_framebuffer(&create_info, None) }
            .context("vkCreateFramebuffer")?;

        Ok(Self {
            device,
            framebuffer,
            extent,
        })
    }

    /// One framebuffer per swapchain view, each sharing `depth_view`.
    pub fn for_swapchain(
        device: &Arc<Device>,
        render_pass: vk::RenderPass,
        color_views: &[vk::ImageView],
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RhiResult<Vec<Self>> {
        color_views
            .iter()
            .map(|&view| Self::new(device.clone(), render_pass, &[view, depth_view], extent))
            .collect()
    }

    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_framebuffer(self.framebuffer, None);
        }
    }
}
