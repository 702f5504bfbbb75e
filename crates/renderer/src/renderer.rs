//! Top-level renderer: device bootstrap, camera and the frame loop.
//!
//! [`Renderer`] wires the window to a [`VulkanBackend`], builds the render
//! pipelines named in the configuration and hands each tick to the
//! [`FrameOrchestrator`].

use tracing::{debug, info, warn};

use sable_core::EngineConfig;
use sable_platform::{InputState, Window};
use sable_rhi::device::Device;
use sable_rhi::instance::Instance;
use sable_rhi::physical_device::select_physical_device;
use sable_rhi::vertex::Vertex;
use sable_rhi::{RhiError, RhiResult};
use sable_scene::{Camera, FirstPersonCamera, MeshId, Registry};

use crate::backend::FrameBackend;
use crate::mesh::MeshLibrary;
use crate::orchestrator::{FrameOrchestrator, FrameOutcome};
use crate::render_pipeline::{PipelineContext, build_render_pipelines};
use crate::subpass::SceneView;
use crate::vulkan_backend::VulkanBackend;

/// Owns every GPU resource of the engine.
///
/// # Resource Destruction Order
///
/// 1. Wait for the device to go idle
/// 2. Destroy meshes
/// 3. Destroy pipelines and their subpass resources
/// 4. Destroy the backend: swapchain targets, command pool, frame slots,
///    swapchain, surface, device, instance
pub struct Renderer {
    meshes: MeshLibrary,
    orchestrator: FrameOrchestrator<VulkanBackend>,
    camera: FirstPersonCamera,
}

impl Renderer {
    /// Create the instance, surface, device, swapchain and pipelines.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal: missing loader, no suitable GPU, shader
    /// files not found, or resource creation errors.
    pub fn new(window: &Window, config: &EngineConfig) -> RhiResult<Self> {
        let width = window.width();
        let height = window.height();
        info!("Initializing renderer ({}x{})", width, height);

        let extensions = window
            .required_extensions()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let instance = Instance::new(c"Sable", config.render.validation, extensions)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device_info)?;

        let backend = VulkanBackend::new(instance, surface, device.clone(), width, height)?;

        let context = PipelineContext {
            device,
            target: backend.target_info(),
            shader_dir: config.render.shader_dir.clone(),
        };
        let pipelines = build_render_pipelines(&config.render.pipelines, &context)?;

        let camera = FirstPersonCamera::new(
            window.aspect_ratio(),
            config.camera.move_speed,
            config.camera.rotation_speed,
        );

        info!(
            "Renderer initialized: {} swapchain image(s), {} pipeline(s)",
            backend.image_count(),
            pipelines.len()
        );

        Ok(Self {
            meshes: MeshLibrary::new(),
            orchestrator: FrameOrchestrator::new(backend, pipelines),
            camera,
        })
    }

    /// Poll the window, move the camera and render one frame.
    ///
    /// A minimized window renders nothing and returns
    /// [`FrameOutcome::Skipped`].
    ///
    /// # Errors
    ///
    /// Every error is fatal; recoverable swapchain states are handled here.
    pub fn update(
        &mut self,
        window: &mut Window,
        input: &InputState,
        delta_time: f32,
        registry: &Registry,
    ) -> RhiResult<FrameOutcome> {
        if window.update() {
            self.resize(window.width(), window.height());
        }
        if window.is_minimized() {
            debug!("Window minimized, skipping frame");
            return Ok(FrameOutcome::Skipped);
        }

        self.camera.set_movement(input.movement_axis());
        self.camera.add_look(input.look_delta());
        self.camera.update(delta_time);

        let scene = SceneView {
            registry,
            camera: self.camera.camera(),
            meshes: &self.meshes,
        };
        self.orchestrator.tick(&scene)
    }

    /// Schedule a swapchain rebuild at the new size.
    ///
    /// Zero sizes are ignored; the window is minimized and the rebuild
    /// happens once it is restored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            debug!("Ignoring resize to zero dimensions");
            return;
        }
        debug!("Resize to {}x{} scheduled", width, height);
        self.orchestrator.backend_mut().set_window_size(width, height);
        self.orchestrator.request_rebuild();
        self.camera.set_aspect(width as f32 / height as f32);
    }

    /// Upload a triangle mesh for use by [`MeshRenderer`](sable_scene::MeshRenderer) components.
    pub fn upload_mesh(&mut self, vertices: &[Vertex], indices: &[u32]) -> RhiResult<MeshId> {
        let device = self.orchestrator.backend().device();
        self.meshes.upload(device, vertices, indices)
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        self.camera.camera()
    }

    #[inline]
    pub fn camera_mut(&mut self) -> &mut Camera {
        self.camera.camera_mut()
    }

    #[inline]
    pub fn meshes(&self) -> &MeshLibrary {
        &self.meshes
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        info!("Shutting down renderer");
        if let Err(e) = self.orchestrator.wait_idle() {
            warn!("Device wait idle failed during shutdown: {}", e);
        }
        self.meshes.clear();
    }
}
