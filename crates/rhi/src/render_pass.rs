//! Single-subpass render passes.
//!
//! Two shapes are used by the frame layer:
//!
//! - the global pass rendering into the swapchain, whose color attachment
//!   ends in `PRESENT_SRC_KHR`,
//! - offscreen passes (the G-buffer) whose color attachments end in
//!   `SHADER_READ_ONLY_OPTIMAL` so a later pass can sample them.
//!
//! Both clear every attachment on load and discard depth on store. Attachment
//! and dependency descriptions are computed by plain functions so they can be
//! checked without a device.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult, VkResultExt};

/// Where the color attachments of a pass end up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassTarget {
    /// Swapchain image, presented afterwards.
    Present,
    /// Offscreen image, sampled by a later pass.
    Sampled,
}

impl PassTarget {
    fn final_color_layout(self) -> vk::ImageLayout {
        match self {
            PassTarget::Present => vk::ImageLayout::PRESENT_SRC_KHR,
            PassTarget::Sampled => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }
}

/// Formats and target of a render pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderPassDesc {
    pub color_formats: Vec<vk::Format>,
    pub depth_format: vk::Format,
    pub target: PassTarget,
}

impl RenderPassDesc {
    /// One swapchain color attachment plus depth.
    pub fn present(color_format: vk::Format, depth_format: vk::Format) -> Self {
        Self {
            color_formats: vec![color_format],
            depth_format,
            target: PassTarget::Present,
        }
    }

    /// Several sampled color attachments plus depth.
    pub fn sampled(color_formats: &[vk::Format], depth_format: vk::Format) -> Self {
        Self {
            color_formats: color_formats.to_vec(),
            depth_format,
            target: PassTarget::Sampled,
        }
    }

    /// Index of the depth attachment; it always follows the color attachments.
    #[inline]
    pub fn depth_attachment_index(&self) -> u32 {
        self.color_formats.len() as u32
    }

    fn validate(&self) -> RhiResult<()> {
        if self.color_formats.is_empty() {
            return Err(RhiError::RenderPassError(String::from(
                "at least one color attachment is required",
            )));
        }
        if self.color_formats.contains(&vk::Format::UNDEFINED)
            || self.depth_format == vk::Format::UNDEFINED
        {
            return Err(RhiError::RenderPassError(String::from(
                "attachment format is undefined",
            )));
        }
        Ok(())
    }
}

/// Attachment descriptions: colors in order, then depth.
pub fn attachment_descriptions(desc: &RenderPassDesc) -> Vec<vk::AttachmentDescription> {
    let final_color = desc.target.final_color_layout();
    let mut attachments: Vec<vk::AttachmentDescription> = desc
        .color_formats
        .iter()
        .map(|&format| {
            vk::AttachmentDescription::default()
                .format(format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(final_color)
        })
        .collect();

    attachments.push(
        vk::AttachmentDescription::default()
            .format(desc.depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
    );
    attachments
}

/// External dependencies of the single subpass.
///
/// Color writes wait for the previous user of the image: presentation
/// (signalled through the acquire semaphore at `COLOR_ATTACHMENT_OUTPUT`) or
/// a fragment shader sampling last frame's G-buffer. Depth clears wait on
/// the early fragment tests of earlier work. Sampled passes also make their
/// writes visible to fragment shader reads afterwards.
pub fn subpass_dependencies(target: PassTarget) -> Vec<vk::SubpassDependency> {
    let attachment_stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    let attachment_access = vk::AccessFlags::COLOR_ATTACHMENT_WRITE
        | vk::AccessFlags::COLOR_ATTACHMENT_READ
        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;

    match target {
        PassTarget::Present => vec![
            vk::SubpassDependency::default()
                .src_subpass(vk::SUBPASS_EXTERNAL)
                .dst_subpass(0)
                .src_stage_mask(attachment_stages)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_stage_mask(attachment_stages)
                .dst_access_mask(attachment_access),
        ],
        PassTarget::Sampled => vec![
            vk::SubpassDependency::default()
                .src_subpass(vk::SUBPASS_EXTERNAL)
                .dst_subpass(0)
                .src_stage_mask(vk::PipelineStageFlags::FRAGMENT_SHADER)
                .src_access_mask(vk::AccessFlags::SHADER_READ)
                .dst_stage_mask(attachment_stages)
                .dst_access_mask(attachment_access),
            vk::SubpassDependency::default()
                .src_subpass(0)
                .dst_subpass(vk::SUBPASS_EXTERNAL)
                .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
                .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
                .dst_stage_mask(vk::PipelineStageFlags::FRAGMENT_SHADER)
                .dst_access_mask(vk::AccessFlags::SHADER_READ),
        ],
    }
}

/// A `vk::RenderPass` with one graphics subpass.
pub struct RenderPass {
    device: Arc<Device>,
    render_pass: vk::RenderPass,
    desc: RenderPassDesc,
}

impl RenderPass {
    /// # Errors
    ///
    /// [`RhiError::RenderPassError`] for an empty or undefined attachment
    /// list, [`RhiError::VulkanError`] if the driver rejects it.
    pub fn new(device: Arc<Device>, desc: RenderPassDesc) -> RhiResult<Self> {
        desc.validate()?;

        let attachments = attachment_descriptions(&desc);
        let color_refs: Vec<vk::AttachmentReference> = (0..desc.color_formats.len() as u32)
            .map(|attachment| vk::AttachmentReference {
                attachment,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            })
            .collect();
        let depth_ref = vk::AttachmentReference {
            attachment: desc.depth_attachment_index(),
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)];
        let dependencies = subpass_dependencies(desc.target);

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { device.handle().create_render_pass(&create_info, None) }
            .context("vkCreateRenderPass")?;
        debug!(
            "Render pass created: {} color attachment(s), {:?}",
            desc.color_formats.len(),
            desc.target
        );

        Ok(Self {
            device,
            render_pass,
            desc,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// One clear value per attachment: `color` for colors, depth 1.0.
    pub fn clear_values(&self, color: [f32; 4]) -> Vec<vk::ClearValue> {
        clear_values(&self.desc, color)
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_render_pass(self.render_pass, None);
        }
        debug!("Render pass destroyed");
    }
}

fn clear_values(desc: &RenderPassDesc, color: [f32; 4]) -> Vec<vk::ClearValue> {
    let mut values = vec![
        vk::ClearValue {
            color: vk::ClearColorValue { float32: color },
        };
        desc.color_formats.len()
    ];
    values.push(vk::ClearValue {
        depth_stencil: vk::ClearDepthStencilValue {
            depth: 1.0,
            stencil: 0,
        },
    });
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_attachments() {
        let desc = RenderPassDesc::present(vk::Format::B8G8R8A8_SRGB, vk::Format::D32_SFLOAT);
        let attachments = attachment_descriptions(&desc);

        assert_eq!(attachments.len(), 2);
        let color = attachments[0];
        assert_eq!(color.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(color.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(color.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(color.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(color.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);

        let depth = attachments[1];
        assert_eq!(depth.format, vk::Format::D32_SFLOAT);
        assert_eq!(depth.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(depth.store_op, vk::AttachmentStoreOp::DONT_CARE);
        assert_eq!(
            depth.final_layout,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        );
    }

    #[test]
    fn test_sampled_attachments_end_shader_readable() {
        let desc = RenderPassDesc::sampled(
            &[
                vk::Format::R16G16B16A16_SFLOAT,
                vk::Format::R16G16B16A16_SFLOAT,
                vk::Format::R8G8B8A8_UNORM,
            ],
            vk::Format::D32_SFLOAT,
        );
        let attachments = attachment_descriptions(&desc);

        assert_eq!(attachments.len(), 4);
        assert_eq!(desc.depth_attachment_index(), 3);
        for color in &attachments[..3] {
            assert_eq!(color.final_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        }
    }

    #[test]
    fn test_present_dependency_waits_on_color_output() {
        let deps = subpass_dependencies(PassTarget::Present);
        assert_eq!(deps.len(), 1);

        let dep = deps[0];
        assert_eq!(dep.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(dep.dst_subpass, 0);
        assert!(dep
            .src_stage_mask
            .contains(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT));
        assert!(dep
            .dst_access_mask
            .contains(vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::COLOR_ATTACHMENT_READ));
    }

    #[test]
    fn test_sampled_dependency_publishes_writes() {
        let deps = subpass_dependencies(PassTarget::Sampled);
        let outgoing = deps
            .iter()
            .find(|d| d.dst_subpass == vk::SUBPASS_EXTERNAL)
            .expect("outgoing dependency");
        assert_eq!(outgoing.dst_access_mask, vk::AccessFlags::SHADER_READ);
    }

    #[test]
    fn test_validate_rejects_empty_colors() {
        let desc = RenderPassDesc::sampled(&[], vk::Format::D32_SFLOAT);
        assert!(matches!(desc.validate(), Err(RhiError::RenderPassError(_))));

        let desc = RenderPassDesc::present(vk::Format::UNDEFINED, vk::Format::D32_SFLOAT);
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_clear_values_match_attachments() {
        let desc = RenderPassDesc::sampled(
            &[vk::Format::R8G8B8A8_UNORM, vk::Format::R8G8B8A8_UNORM],
            vk::Format::D32_SFLOAT,
        );
        let values = clear_values(&desc, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(values.len(), 3);
        let depth = unsafe { values[2].depth_stencil };
        assert_eq!(depth.depth, 1.0);
    }
}
