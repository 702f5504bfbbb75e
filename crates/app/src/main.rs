//! Sable sample application.
//!
//! Opens a window, spawns a grid of spinning cubes and drives the frame
//! orchestrator once per redraw.

use anyhow::Result;
use glam::{Vec3, vec3};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use sable_core::{EngineConfig, FrameTimer};
use sable_platform::{InputState, Window};
use sable_renderer::{Renderer, cube};
use sable_scene::{MeshRenderer, Registry, Transform};

const CONFIG_PATH: &str = "config/engine.toml";
const GRID_HALF_EXTENT: i32 = 2;
const GRID_SPACING: f32 = 2.0;
const SPIN_RADIANS_PER_SEC: f32 = 0.5;

struct App {
    config: EngineConfig,
    // Declared before the window: GPU resources go first.
    renderer: Option<Renderer>,
    window: Option<Window>,
    registry: Registry,
    input: InputState,
    timer: FrameTimer,
}

impl App {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            registry: Registry::new(),
            input: InputState::new(),
            timer: FrameTimer::new(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(event_loop, &self.config.window)?;
        let mut renderer = Renderer::new(&window, &self.config)?;

        let (vertices, indices) = cube(1.0, vec3(0.8, 0.5, 0.3));
        let mesh = renderer.upload_mesh(&vertices, &indices)?;
        populate_grid(&mut self.registry, mesh)?;

        info!(
            "Initialization complete: {} entities, entering main loop",
            self.registry.len()
        );
        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let delta_time = self.timer.tick();
        for (_, transform) in self.registry.transforms_mut() {
            transform.rotate(Vec3::Y, SPIN_RADIANS_PER_SEC * delta_time);
        }

        let (Some(renderer), Some(window)) = (self.renderer.as_mut(), self.window.as_mut()) else {
            return;
        };
        if let Err(e) = renderer.update(window, &self.input, delta_time, &self.registry) {
            error!("Fatal render error: {}", e);
            event_loop.exit();
        }
        self.input.begin_frame();
    }
}

fn populate_grid(registry: &mut Registry, mesh: sable_scene::MeshId) -> Result<()> {
    for x in -GRID_HALF_EXTENT..=GRID_HALF_EXTENT {
        for z in -GRID_HALF_EXTENT..=GRID_HALF_EXTENT {
            let entity = registry.spawn();
            let position = vec3(x as f32 * GRID_SPACING, 0.0, z as f32 * GRID_SPACING - 6.0);
            registry.insert_transform(entity, Transform::from_position(position))?;
            registry.insert_mesh_renderer(entity, MeshRenderer { mesh })?;
        }
    }
    Ok(())
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            error!("Failed to initialize: {:#}", e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if self.input.handle_event(&event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!(
                    "Close requested after {} frames ({:.1} fps average)",
                    self.timer.frame_count(),
                    self.timer.average_fps()
                );
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(window) = self.window.as_mut() {
                    window.resize(size.width, size.height);
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    sable_core::init_logging();
    info!("Starting Sable {}", env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::load(CONFIG_PATH).inspect_err(|e| {
        error!("Failed to load {}: {}", CONFIG_PATH, e);
    })?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
