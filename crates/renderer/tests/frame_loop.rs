//! Drives the frame loop through the public API with a headless backend.

use ash::vk;
use ash::vk::Handle;

use sable_renderer::backend::FrameSlotHandles;
use sable_renderer::{
    FrameBackend, FrameOrchestrator, FrameOutcome, MeshLibrary, RecordTarget, SceneView,
    SubmitBatch, TargetInfo,
};
use sable_rhi::RhiResult;
use sable_rhi::swapchain::{AcquiredImage, PresentStatus};
use sable_scene::{Camera, Registry};

/// Two images; the swapchain goes out of date once the window "resizes".
struct ResizingBackend {
    extent: vk::Extent2D,
    out_of_date_at: usize,
    acquires: usize,
    rebuilds: usize,
    next_image: u32,
}

impl FrameBackend for ResizingBackend {
    fn image_count(&self) -> u32 {
        2
    }

    fn frame_slot(&self, slot: usize) -> FrameSlotHandles {
        FrameSlotHandles {
            present_complete: vk::Semaphore::from_raw(10 + slot as u64),
            render_finished: vk::Semaphore::from_raw(20 + slot as u64),
        }
    }

    fn target_info(&self) -> TargetInfo {
        TargetInfo {
            render_pass: vk::RenderPass::from_raw(1),
            color_format: vk::Format::B8G8R8A8_SRGB,
            depth_format: vk::Format::D32_SFLOAT,
            extent: self.extent,
            image_count: 2,
        }
    }

    fn acquire_next_image(&mut self, _present_complete: vk::Semaphore) -> RhiResult<AcquiredImage> {
        self.acquires += 1;
        if self.acquires == self.out_of_date_at {
            return Ok(AcquiredImage::OutOfDate);
        }
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % 2;
        Ok(AcquiredImage::Ready {
            image_index,
            suboptimal: false,
        })
    }

    fn reset_fence(&mut self, _slot: usize) -> RhiResult<()> {
        Ok(())
    }

    fn begin_image(&mut self, image_index: u32) -> RhiResult<RecordTarget> {
        Ok(RecordTarget {
            image_index,
            command_buffer: vk::CommandBuffer::from_raw(100 + u64::from(image_index)),
            render_pass: vk::RenderPass::from_raw(1),
            framebuffer: vk::Framebuffer::from_raw(200 + u64::from(image_index)),
            extent: self.extent,
        })
    }

    fn end_image(&mut self, _image_index: u32) -> RhiResult<()> {
        Ok(())
    }

    fn submit(&mut self, _batch: &SubmitBatch, _fence_slot: Option<usize>) -> RhiResult<()> {
        Ok(())
    }

    fn wait_for_fence(&mut self, _slot: usize) -> RhiResult<()> {
        Ok(())
    }

    fn present(&mut self, _render_finished: vk::Semaphore) -> RhiResult<PresentStatus> {
        Ok(PresentStatus::Optimal)
    }

    fn rebuild_swapchain(&mut self) -> RhiResult<TargetInfo> {
        self.rebuilds += 1;
        self.extent = vk::Extent2D {
            width: 1024,
            height: 768,
        };
        Ok(self.target_info())
    }

    fn wait_idle(&self) -> RhiResult<()> {
        Ok(())
    }
}

#[test]
fn test_resize_skips_one_frame_then_recovers() {
    let backend = ResizingBackend {
        extent: vk::Extent2D {
            width: 800,
            height: 600,
        },
        out_of_date_at: 2,
        acquires: 0,
        rebuilds: 0,
        next_image: 0,
    };
    let mut orchestrator = FrameOrchestrator::new(backend, Vec::new());

    let registry = Registry::new();
    let camera = Camera::default();
    let meshes = MeshLibrary::new();
    let scene = SceneView {
        registry: &registry,
        camera: &camera,
        meshes: &meshes,
    };

    let outcomes: Vec<FrameOutcome> = (0..4)
        .map(|_| orchestrator.tick(&scene).expect("tick failed"))
        .collect();

    assert_eq!(
        outcomes,
        vec![
            FrameOutcome::Presented {
                frame_slot: 0,
                image_index: 0
            },
            FrameOutcome::Skipped,
            FrameOutcome::Presented {
                frame_slot: 1,
                image_index: 1
            },
            FrameOutcome::Presented {
                frame_slot: 0,
                image_index: 0
            },
        ]
    );
    assert_eq!(orchestrator.backend().rebuilds, 1);
    assert_eq!(orchestrator.backend().target_info().extent.width, 1024);
}
