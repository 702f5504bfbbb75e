//! Resources sized to one swapchain generation.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use sable_rhi::RhiResult;
use sable_rhi::device::Device;
use sable_rhi::framebuffer::Framebuffer;
use sable_rhi::image::{AttachmentImage, AttachmentKind};
use sable_rhi::render_pass::{RenderPass, RenderPassDesc};

/// Holds the current generation of a swapchain-dependent resource set.
///
/// A rebuild drops the previous generation before building the next, so
/// no two generations are alive at once and each is destroyed exactly once.
pub struct SwapchainBound<T> {
    current: Option<T>,
    generation: u64,
}

impl<T> SwapchainBound<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: Some(initial),
            generation: 0,
        }
    }

    /// Current generation. `None` only after `release` or a failed rebuild.
    #[inline]
    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// Number of completed rebuilds.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop the current generation now.
    pub fn release(&mut self) {
        self.current = None;
    }

    /// Drop the current generation, then install the result of `build`.
    pub fn rebuild<E>(&mut self, build: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        self.release();
        let next = build()?;
        self.generation += 1;
        Ok(self.current.insert(next))
    }
}

/// Global render pass, shared depth buffer and one framebuffer per
/// swapchain image.
pub struct SwapchainTargets {
    // Framebuffers reference the render pass and the depth view.
    framebuffers: Vec<Framebuffer>,
    depth: AttachmentImage,
    render_pass: RenderPass,
}

impl SwapchainTargets {
    pub fn new(
        device: &Arc<Device>,
        color_format: vk::Format,
        depth_format: vk::Format,
        extent: vk::Extent2D,
        color_views: &[vk::ImageView],
    ) -> RhiResult<Self> {
        let render_pass = RenderPass::new(
            device.clone(),
            RenderPassDesc::present(color_format, depth_format),
        )?;
        let depth = AttachmentImage::new(device.clone(), extent, depth_format, AttachmentKind::Depth)?;
        let framebuffers = Framebuffer::for_swapchain(
            device,
            render_pass.handle(),
            color_views,
            depth.view(),
            extent,
        )?;
        debug!(
            "Swapchain targets created: {} framebuffer(s) at {}x{}",
            framebuffers.len(),
            extent.width,
            extent.height
        );

        Ok(Self {
            framebuffers,
            depth,
            render_pass,
        })
    }

    #[inline]
    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }

    pub fn framebuffer(&self, image_index: u32) -> Option<&Framebuffer> {
        self.framebuffers.get(image_index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Logs its own construction and destruction.
    struct Tracked {
        id: u32,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Tracked {
        fn new(id: u32, log: &Rc<RefCell<Vec<String>>>) -> Self {
            log.borrow_mut().push(format!("create {id}"));
            Self {
                id,
                log: log.clone(),
            }
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.log.borrow_mut().push(format!("destroy {}", self.id));
        }
    }

    #[test]
    fn test_rebuild_destroys_previous_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bound = SwapchainBound::new(Tracked::new(0, &log));

        bound
            .rebuild(|| Ok::<_, ()>(Tracked::new(1, &log)))
            .unwrap();
        bound
            .rebuild(|| Ok::<_, ()>(Tracked::new(2, &log)))
            .unwrap();
        drop(bound);

        assert_eq!(
            *log.borrow(),
            vec![
                "create 0",
                "destroy 0",
                "create 1",
                "destroy 1",
                "create 2",
                "destroy 2",
            ]
        );
    }

    #[test]
    fn test_each_generation_destroyed_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bound = SwapchainBound::new(Tracked::new(0, &log));
        for id in 1..=5 {
            bound
                .rebuild(|| Ok::<_, ()>(Tracked::new(id, &log)))
                .unwrap();
        }
        assert_eq!(bound.generation(), 5);
        drop(bound);

        for id in 0..=5 {
            let destroyed = log
                .borrow()
                .iter()
                .filter(|entry| **entry == format!("destroy {id}"))
                .count();
            assert_eq!(destroyed, 1, "generation {id}");
        }
    }

    #[test]
    fn test_failed_rebuild_leaves_nothing() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bound = SwapchainBound::new(Tracked::new(0, &log));

        let result = bound.rebuild(|| Err::<Tracked, _>("out of memory"));
        assert!(result.is_err());
        assert!(bound.current().is_none());
        assert_eq!(bound.generation(), 0);
        assert_eq!(*log.borrow(), vec!["create 0", "destroy 0"]);
    }

    #[test]
    fn test_release_then_rebuild() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bound = SwapchainBound::new(Tracked::new(0, &log));
        bound.release();
        assert!(bound.current().is_none());

        let current = bound
            .rebuild(|| Ok::<_, ()>(Tracked::new(1, &log)))
            .unwrap();
        assert_eq!(current.id, 1);
    }
}
