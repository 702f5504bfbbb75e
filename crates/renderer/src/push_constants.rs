//! Push constant blocks shared with the GLSL shaders.
//!
//! Structures use `#[repr(C)]` and derive `Pod` so they can be pushed with
//! [`CommandRecorder::push_constants`](sable_rhi::command::CommandRecorder::push_constants).

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Per-draw matrices for the G-buffer pass.
///
/// Matches `layout(push_constant) uniform Draw` in `deferred/gbuffer.vert`.
///
/// # Memory Layout
///
/// - Offset 0: view-projection matrix (64 bytes)
/// - Offset 64: model matrix (64 bytes)
/// - Total size: 128 bytes, the minimum every implementation guarantees
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct DrawPushConstants {
    pub view_projection: Mat4,
    pub model: Mat4,
}

impl DrawPushConstants {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(view_projection: Mat4, model: Mat4) -> Self {
        Self {
            view_projection,
            model,
        }
    }

    /// Vertex-stage range covering the whole block.
    pub fn range() -> vk::PushConstantRange {
        vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX,
            offset: 0,
            size: Self::SIZE as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_fits_guaranteed_minimum() {
        assert_eq!(DrawPushConstants::SIZE, 128);
        assert_eq!(DrawPushConstants::range().size, 128);
    }

    #[test]
    fn test_field_order() {
        let block = DrawPushConstants::new(Mat4::from_scale(glam::Vec3::splat(2.0)), Mat4::IDENTITY);
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&block));
        assert_eq!(floats[0], 2.0);
        assert_eq!(floats[16], 1.0);
    }
}
