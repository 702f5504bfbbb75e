//! Frame orchestration for the Sable engine.
//!
//! This crate drives the render loop:
//! - [`FrameOrchestrator`]: acquire, record, submit, present, advance
//! - [`RenderPipeline`]: ordered [`Subpass`] chains built from configuration
//! - [`deferred`]: the G-buffer fill and composite subpasses
//! - [`Renderer`]: device bootstrap, camera and mesh ownership

pub mod backend;
pub mod deferred;
pub mod frame;
pub mod mesh;
pub mod orchestrator;
pub mod push_constants;
pub mod render_pipeline;
mod renderer;
pub mod subpass;
pub mod targets;
pub mod vulkan_backend;

pub use backend::{FrameBackend, RecordTarget, SubmitBatch, TargetInfo};
pub use frame::FrameCounter;
pub use mesh::{MeshLibrary, cube};
pub use orchestrator::{FrameOrchestrator, FrameOutcome};
pub use render_pipeline::{PipelineContext, RenderPipeline, build_render_pipelines};
pub use renderer::Renderer;
pub use subpass::{FrameRef, PresentDependencies, SceneView, Subpass};
pub use vulkan_backend::VulkanBackend;
