//! Engine configuration loaded once at startup.
//!
//! The configuration lives in a TOML file with three sections:
//!
//! ```toml
//! [window]
//! width = 1280
//! height = 720
//! title = "Sable"
//! display_version_in_title = true
//!
//! [camera]
//! move_speed = 10.0
//! rotation_speed = 40.0
//!
//! [render]
//! pipelines = ["deferred"]
//! validation = true
//! shader_dir = "shaders"
//! ```
//!
//! Every key is optional. Window dimensions outside `(0, 5000)` are replaced
//! by their defaults; unknown or conflicting pipeline names are rejected.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{Error, Result};

/// Window width used when the configured one is missing or invalid.
pub const DEFAULT_WINDOW_WIDTH: u32 = 1280;
/// Window height used when the configured one is missing or invalid.
pub const DEFAULT_WINDOW_HEIGHT: u32 = 720;
/// Exclusive upper bound for a configured window dimension.
pub const MAX_WINDOW_DIMENSION: u32 = 5000;

/// `[window]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    /// Append the engine version to the window title.
    pub display_version_in_title: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WINDOW_WIDTH,
            height: DEFAULT_WINDOW_HEIGHT,
            title: String::from("Sable"),
            display_version_in_title: true,
        }
    }
}

impl WindowConfig {
    /// Replace out-of-range dimensions with their defaults.
    ///
    /// Width and height are checked independently.
    fn sanitize(&mut self) {
        if !is_valid_dimension(self.width) {
            error!(
                "Window width of {} is invalid, using default {}",
                self.width, DEFAULT_WINDOW_WIDTH
            );
            self.width = DEFAULT_WINDOW_WIDTH;
        }
        if !is_valid_dimension(self.height) {
            error!(
                "Window height of {} is invalid, using default {}",
                self.height, DEFAULT_WINDOW_HEIGHT
            );
            self.height = DEFAULT_WINDOW_HEIGHT;
        }
    }

    /// Title shown by the window, including the version suffix when enabled.
    pub fn full_title(&self) -> String {
        if self.display_version_in_title {
            format!("{} // Version: {}", self.title, env!("CARGO_PKG_VERSION"))
        } else {
            self.title.clone()
        }
    }
}

fn is_valid_dimension(value: u32) -> bool {
    value > 0 && value < MAX_WINDOW_DIMENSION
}

/// `[camera]` section.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Translation speed in world units per second.
    pub move_speed: f32,
    /// Rotation speed in degrees per second of look input.
    pub rotation_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            move_speed: 10.0,
            rotation_speed: 40.0,
        }
    }
}

impl CameraConfig {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("move_speed", self.move_speed),
            ("rotation_speed", self.rotation_speed),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "camera.{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// A render pipeline that can be requested in `[render] pipelines`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineFeature {
    /// Offscreen G-buffer fill followed by a full-screen composite.
    Deferred,
    /// Screen-space reflections. Reserved, builds nothing yet.
    Reflections,
    /// Debug overlay, only available with the renderer's `debug-ui` feature.
    DebugUi,
}

impl PipelineFeature {
    /// Name used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            PipelineFeature::Deferred => "deferred",
            PipelineFeature::Reflections => "reflections",
            PipelineFeature::DebugUi => "debug_ui",
        }
    }
}

impl fmt::Display for PipelineFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PipelineFeature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deferred" => Ok(PipelineFeature::Deferred),
            "reflections" => Ok(PipelineFeature::Reflections),
            "debug_ui" | "debug-ui" | "imgui" => Ok(PipelineFeature::DebugUi),
            other => Err(Error::Config(format!("unknown render pipeline '{other}'"))),
        }
    }
}

/// Validated set of requested render pipelines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    features: BTreeSet<PipelineFeature>,
}

impl PipelineConfig {
    /// Build a configuration from features, rejecting conflicting sets.
    pub fn new(features: impl IntoIterator<Item = PipelineFeature>) -> Result<Self> {
        let features: BTreeSet<_> = features.into_iter().collect();

        if features.contains(&PipelineFeature::Reflections)
            && !features.contains(&PipelineFeature::Deferred)
        {
            return Err(Error::Config(String::from(
                "the reflections pipeline requires the deferred pipeline",
            )));
        }

        Ok(Self { features })
    }

    /// Parse feature names as written in the configuration file.
    pub fn from_names<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Result<Self> {
        let features = names
            .into_iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<PipelineFeature>>>()?;
        Self::new(features)
    }

    /// Check whether a feature was requested.
    pub fn contains(&self, feature: PipelineFeature) -> bool {
        self.features.contains(&feature)
    }

    /// Requested features in build order.
    pub fn iter(&self) -> impl Iterator<Item = PipelineFeature> + '_ {
        self.features.iter().copied()
    }

    /// True when no pipeline was requested.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// `[render]` section after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub pipelines: PipelineConfig,
    /// Enable the Vulkan validation layers.
    pub validation: bool,
    /// Directory holding compiled SPIR-V shaders.
    pub shader_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            pipelines: PipelineConfig {
                features: BTreeSet::from([PipelineFeature::Deferred]),
            },
            validation: cfg!(debug_assertions),
            shader_dir: PathBuf::from("shaders"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawRenderConfig {
    pipelines: Vec<String>,
    validation: bool,
    shader_dir: PathBuf,
}

impl Default for RawRenderConfig {
    fn default() -> Self {
        let defaults = RenderConfig::default();
        Self {
            pipelines: defaults
                .pipelines
                .iter()
                .map(|feature| feature.name().to_owned())
                .collect(),
            validation: defaults.validation,
            shader_dir: defaults.shader_dir,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawEngineConfig {
    window: WindowConfig,
    camera: CameraConfig,
    render: RawRenderConfig,
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub render: RenderConfig,
}

impl EngineConfig {
    /// Load the configuration file at `path`.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file
    /// is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("No config found at '{}', using defaults", path.display());
            return Ok(Self::default());
        }

        info!("Loading config from '{}'", path.display());
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let raw: RawEngineConfig = toml::from_str(source)?;

        let mut window = raw.window;
        window.sanitize();
        raw.camera.validate()?;

        Ok(Self {
            window,
            camera: raw.camera,
            render: RenderConfig {
                pipelines: PipelineConfig::from_names(&raw.render.pipelines)?,
                validation: raw.render.validation,
                shader_dir: raw.render.shader_dir,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.window.width, DEFAULT_WINDOW_WIDTH);
        assert_eq!(config.window.height, DEFAULT_WINDOW_HEIGHT);
        assert_eq!(config.camera.move_speed, 10.0);
        assert_eq!(config.camera.rotation_speed, 40.0);
        assert!(config.render.pipelines.contains(PipelineFeature::Deferred));
    }

    #[test]
    fn test_window_section() {
        let config = EngineConfig::from_toml_str(
            "[window]\nwidth = 1920\nheight = 1080\ntitle = \"Demo\"\n",
        )
        .unwrap();
        assert_eq!(config.window.width, 1920);
        assert_eq!(config.window.height, 1080);
        assert_eq!(config.window.title, "Demo");
    }

    #[test]
    fn test_invalid_width_keeps_valid_height() {
        let config =
            EngineConfig::from_toml_str("[window]\nwidth = 0\nheight = 900\n").unwrap();
        assert_eq!(config.window.width, DEFAULT_WINDOW_WIDTH);
        assert_eq!(config.window.height, 900);
    }

    #[test]
    fn test_invalid_height_keeps_valid_width() {
        let config =
            EngineConfig::from_toml_str("[window]\nwidth = 1024\nheight = 5000\n").unwrap();
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, DEFAULT_WINDOW_HEIGHT);
    }

    #[test]
    fn test_dimension_bounds() {
        assert!(!is_valid_dimension(0));
        assert!(is_valid_dimension(1));
        assert!(is_valid_dimension(MAX_WINDOW_DIMENSION - 1));
        assert!(!is_valid_dimension(MAX_WINDOW_DIMENSION));
    }

    #[test]
    fn test_full_title() {
        let mut window = WindowConfig::default();
        window.display_version_in_title = false;
        assert_eq!(window.full_title(), "Sable");

        window.display_version_in_title = true;
        assert!(window.full_title().starts_with("Sable // Version: "));
    }

    #[test]
    fn test_camera_speeds() {
        let config =
            EngineConfig::from_toml_str("[camera]\nmove_speed = 4.5\nrotation_speed = 90.0\n")
                .unwrap();
        assert_eq!(config.camera.move_speed, 4.5);
        assert_eq!(config.camera.rotation_speed, 90.0);
    }

    #[test]
    fn test_negative_camera_speed_rejected() {
        let result = EngineConfig::from_toml_str("[camera]\nmove_speed = -1.0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_pipeline_names() {
        let config =
            PipelineConfig::from_names(["deferred", "reflections", "imgui"]).unwrap();
        assert!(config.contains(PipelineFeature::Deferred));
        assert!(config.contains(PipelineFeature::Reflections));
        assert!(config.contains(PipelineFeature::DebugUi));
    }

    #[test]
    fn test_duplicate_pipeline_names_collapse() {
        let config = PipelineConfig::from_names(["deferred", "Deferred"]).unwrap();
        assert_eq!(config.iter().count(), 1);
    }

    #[test]
    fn test_unknown_pipeline_rejected() {
        let result = EngineConfig::from_toml_str("[render]\npipelines = [\"raytraced\"]\n");
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("raytraced")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_reflections_without_deferred_rejected() {
        let result = PipelineConfig::from_names(["reflections"]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_pipeline_list_allowed() {
        let config = EngineConfig::from_toml_str("[render]\npipelines = []\n").unwrap();
        assert!(config.render.pipelines.is_empty());
    }

    #[test]
    fn test_build_order_is_stable() {
        let config = PipelineConfig::from_names(["debug_ui", "deferred"]).unwrap();
        let order: Vec<_> = config.iter().collect();
        assert_eq!(order, vec![PipelineFeature::Deferred, PipelineFeature::DebugUi]);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let result = EngineConfig::from_toml_str("[window\nwidth = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result = EngineConfig::from_toml_str("[audio]\nvolume = 1.0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = EngineConfig::load("definitely/not/here/engine.toml").unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
