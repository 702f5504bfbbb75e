//! Deferred shading: an offscreen G-buffer fill followed by a composite
//! into the swapchain image.

mod composite;
pub mod gbuffer;
mod offscreen;

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use tracing::info;

use sable_rhi::RhiResult;
use sable_rhi::shader::{Shader, ShaderStage};

pub use composite::CompositeSubpass;
pub use gbuffer::GBuffer;
pub use offscreen::OffscreenSubpass;

use crate::render_pipeline::PipelineContext;
use crate::subpass::Subpass;

const GBUFFER_VERT: &str = "deferred/gbuffer.vert.spv";
const GBUFFER_FRAG: &str = "deferred/gbuffer.frag.spv";
const COMPOSITE_VERT: &str = "deferred/composite.vert.spv";
const COMPOSITE_FRAG: &str = "deferred/composite.frag.spv";

/// Offscreen then composite, sharing one G-buffer.
pub fn build_deferred_subpasses(context: &PipelineContext) -> RhiResult<Vec<Box<dyn Subpass>>> {
    let device = &context.device;
    let target = &context.target;
    let shader = |name: &str, stage: ShaderStage| {
        Shader::load(device.clone(), &shader_path(&context.shader_dir, name), stage)
    };

    let gbuffer = Rc::new(RefCell::new(GBuffer::new(
        device.clone(),
        target.extent,
        target.depth_format,
    )?));

    let gbuffer_vert = shader(GBUFFER_VERT, ShaderStage::Vertex)?;
    let gbuffer_frag = shader(GBUFFER_FRAG, ShaderStage::Fragment)?;
    let offscreen = OffscreenSubpass::new(
        device.clone(),
        gbuffer.clone(),
        &gbuffer_vert,
        &gbuffer_frag,
        target.image_count,
    )?;

    let composite = CompositeSubpass::new(
        device.clone(),
        gbuffer,
        shader(COMPOSITE_VERT, ShaderStage::Vertex)?,
        shader(COMPOSITE_FRAG, ShaderStage::Fragment)?,
        target,
    )?;

    info!("Deferred subpasses created");
    let subpasses: Vec<Box<dyn Subpass>> = vec![Box::new(offscreen), Box::new(composite)];
    Ok(subpasses)
}

fn shader_path(shader_dir: &Path, name: &str) -> std::path::PathBuf {
    shader_dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_paths_nest_under_deferred() {
        let path = shader_path(Path::new("shaders"), GBUFFER_VERT);
        assert_eq!(path, Path::new("shaders/deferred/gbuffer.vert.spv"));
        assert!(COMPOSITE_FRAG.ends_with(".frag.spv"));
    }
}
