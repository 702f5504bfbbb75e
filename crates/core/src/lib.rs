//! Core utilities shared by every Sable crate.
//!
//! - [`Error`] / [`Result`] for configuration and platform failures
//! - [`init_logging`] to install the `tracing` subscriber
//! - [`FrameTimer`] for per-tick delta time
//! - [`EngineConfig`] and the validated [`PipelineConfig`]

mod config;
mod error;
mod logging;
mod timer;

pub use config::{
    CameraConfig, DEFAULT_WINDOW_HEIGHT, DEFAULT_WINDOW_WIDTH, EngineConfig, MAX_WINDOW_DIMENSION,
    PipelineConfig, PipelineFeature, RenderConfig, WindowConfig,
};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::FrameTimer;
