//! Ordered subpass chains and their construction from configuration.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use sable_core::{PipelineConfig, PipelineFeature};
use sable_rhi::RhiResult;
use sable_rhi::device::Device;

use crate::backend::{RecordTarget, TargetInfo};
use crate::deferred::build_deferred_subpasses;
use crate::subpass::{FrameRef, PresentDependencies, SceneView, Subpass};

/// A named sequence of subpasses.
///
/// Subpasses run in declaration order: a producer (the G-buffer fill) must
/// come before its consumer (the composite).
pub struct RenderPipeline {
    name: String,
    subpasses: Vec<Box<dyn Subpass>>,
}

impl RenderPipeline {
    pub fn new(name: impl Into<String>, subpasses: Vec<Box<dyn Subpass>>) -> Self {
        Self {
            name: name.into(),
            subpasses,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subpass_count(&self) -> usize {
        self.subpasses.len()
    }

    /// Record every subpass for `target.image_index`, in order.
    pub fn draw(&self, target: &RecordTarget, scene: &SceneView<'_>) -> RhiResult<()> {
        for subpass in &self.subpasses {
            subpass.record(target, scene)?;
        }
        Ok(())
    }

    pub fn gather_present_dependencies(&self, frame: FrameRef, deps: &mut PresentDependencies) {
        for subpass in &self.subpasses {
            subpass.gather_present_dependencies(frame, deps);
        }
    }

    pub fn on_swapchain_rebuilt(&mut self, target: &TargetInfo) -> RhiResult<()> {
        for subpass in &mut self.subpasses {
            debug!("Rebuilding subpass {} of {}", subpass.name(), self.name);
            subpass.on_swapchain_rebuilt(target)?;
        }
        Ok(())
    }
}

/// What pipeline construction needs from the device layer.
pub struct PipelineContext {
    pub device: Arc<Device>,
    pub target: TargetInfo,
    pub shader_dir: PathBuf,
}

/// Build the pipelines named by `config`.
///
/// # Errors
///
/// Shader, pipeline or attachment creation failures. These are fatal.
pub fn build_render_pipelines(
    config: &PipelineConfig,
    context: &PipelineContext,
) -> RhiResult<Vec<RenderPipeline>> {
    let mut pipelines = Vec::new();

    for feature in config.iter() {
        match feature {
            PipelineFeature::Deferred => {
                let subpasses = build_deferred_subpasses(context)?;
                pipelines.push(RenderPipeline::new(feature.name(), subpasses));
            }
            PipelineFeature::Reflections => {
                warn!("Reflections pipeline is not implemented; skipping");
            }
            PipelineFeature::DebugUi => {
                if cfg!(feature = "debug-ui") {
                    warn!("Debug overlay pipeline has no subpasses yet; skipping");
                } else {
                    error!(
                        "Debug overlay requested but sable-renderer was built without the debug-ui feature"
                    );
                }
            }
        }
    }

    info!(
        "Built {} render pipeline(s): [{}]",
        pipelines.len(),
        pipelines
            .iter()
            .map(RenderPipeline::name)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(pipelines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use ash::vk;
    use ash::vk::Handle;
    use sable_scene::{Camera, Registry};

    use crate::mesh::MeshLibrary;

    struct Logging {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        dependency: Option<(u64, u64)>,
    }

    impl Subpass for Logging {
        fn name(&self) -> &str {
            self.name
        }

        fn record(&self, target: &RecordTarget, _scene: &SceneView<'_>) -> RhiResult<()> {
            self.log
                .borrow_mut()
                .push(format!("{}:{}", self.name, target.image_index));
            Ok(())
        }

        fn gather_present_dependencies(&self, _frame: FrameRef, deps: &mut PresentDependencies) {
            if let Some((cmd, sem)) = self.dependency {
                deps.command_buffers.push(vk::CommandBuffer::from_raw(cmd));
                deps.semaphores.push(vk::Semaphore::from_raw(sem));
            }
        }
    }

    fn logging(
        name: &'static str,
        log: &Rc<RefCell<Vec<String>>>,
        dependency: Option<(u64, u64)>,
    ) -> Box<dyn Subpass> {
        Box::new(Logging {
            name,
            log: log.clone(),
            dependency,
        })
    }

    fn target(image_index: u32) -> RecordTarget {
        RecordTarget {
            image_index,
            command_buffer: vk::CommandBuffer::from_raw(1),
            render_pass: vk::RenderPass::from_raw(2),
            framebuffer: vk::Framebuffer::from_raw(3),
            extent: vk::Extent2D {
                width: 8,
                height: 8,
            },
        }
    }

    #[test]
    fn test_draw_in_declaration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let pipeline = RenderPipeline::new(
            "test",
            vec![logging("a", &log, None), logging("b", &log, None)],
        );
        let registry = Registry::new();
        let camera = Camera::default();
        let meshes = MeshLibrary::new();
        let scene = SceneView {
            registry: &registry,
            camera: &camera,
            meshes: &meshes,
        };

        pipeline.draw(&target(0), &scene).unwrap();
        pipeline.draw(&target(1), &scene).unwrap();

        assert_eq!(*log.borrow(), vec!["a:0", "b:0", "a:1", "b:1"]);
    }

    #[test]
    fn test_empty_pipeline_draws_and_gathers_nothing() {
        let pipeline = RenderPipeline::new("empty", Vec::new());
        let registry = Registry::new();
        let camera = Camera::default();
        let meshes = MeshLibrary::new();
        let scene = SceneView {
            registry: &registry,
            camera: &camera,
            meshes: &meshes,
        };

        assert!(pipeline.draw(&target(0), &scene).is_ok());
        let mut deps = PresentDependencies::default();
        pipeline.gather_present_dependencies(
            FrameRef {
                slot: 0,
                image_index: 0,
            },
            &mut deps,
        );
        assert_eq!(deps, PresentDependencies::default());
        assert!(!deps.is_submittable());
    }

    #[test]
    fn test_gather_collects_producers_only() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let pipeline = RenderPipeline::new(
            "deferred",
            vec![
                logging("producer", &log, Some((10, 20))),
                logging("consumer", &log, None),
            ],
        );

        let mut deps = PresentDependencies::default();
        pipeline.gather_present_dependencies(
            FrameRef {
                slot: 1,
                image_index: 2,
            },
            &mut deps,
        );
        assert_eq!(deps.command_buffers, vec![vk::CommandBuffer::from_raw(10)]);
        assert_eq!(deps.semaphores, vec![vk::Semaphore::from_raw(20)]);
        assert!(deps.is_submittable());
    }
}
