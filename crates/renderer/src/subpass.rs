//! The unit of recorded GPU work composed into render pipelines.

use ash::vk;

use sable_rhi::RhiResult;
use sable_scene::{Camera, Registry};

use crate::backend::{RecordTarget, TargetInfo};
use crate::mesh::MeshLibrary;

/// Read-only scene state handed to every subpass while recording.
#[derive(Clone, Copy)]
pub struct SceneView<'a> {
    pub registry: &'a Registry,
    pub camera: &'a Camera,
    pub meshes: &'a MeshLibrary,
}

/// Frame being submitted: the frame slot and the acquired image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRef {
    pub slot: usize,
    pub image_index: u32,
}

/// Work the final on-screen submission must wait for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PresentDependencies {
    pub command_buffers: Vec<vk::CommandBuffer>,
    /// Signaled by `command_buffers`, waited on by the final submission.
    pub semaphores: Vec<vk::Semaphore>,
}

impl PresentDependencies {
    pub fn clear(&mut self) {
        self.command_buffers.clear();
        self.semaphores.clear();
    }

    /// True when there is anything to submit ahead of the final pass.
    pub fn is_submittable(&self) -> bool {
        !self.command_buffers.is_empty() && !self.semaphores.is_empty()
    }
}

/// A unit of rendering work.
pub trait Subpass {
    fn name(&self) -> &str;

    /// Record commands for `target.image_index`.
    ///
    /// Subpasses drawing to the swapchain record into `target.command_buffer`
    /// inside the global render pass. Subpasses producing intermediate
    /// results record into their own command buffers and report them from
    /// [`Subpass::gather_present_dependencies`].
    fn record(&self, target: &RecordTarget, scene: &SceneView<'_>) -> RhiResult<()>;

    /// Add the command buffers and semaphores that the final submission of
    /// `frame` must wait for. Subpasses without intermediate output add none.
    fn gather_present_dependencies(&self, _frame: FrameRef, _deps: &mut PresentDependencies) {}

    /// Recreate resources sized to or built against the swapchain.
    fn on_swapchain_rebuilt(&mut self, _target: &TargetInfo) -> RhiResult<()> {
        Ok(())
    }
}
