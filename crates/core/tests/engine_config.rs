//! Integration tests for the shipped engine configuration.

use std::path::Path;

use sable_core::{EngineConfig, PipelineFeature};

#[test]
fn test_shipped_config_loads() {
    let path = Path::new("../../config/engine.toml");

    // Skip when run outside the workspace checkout
    if !path.exists() {
        println!("Skipping test: config not found at {:?}", path);
        return;
    }

    let config = EngineConfig::load(path).expect("Failed to load shipped config");

    assert_eq!(config.window.width, 1280);
    assert_eq!(config.window.height, 720);
    assert!(config.window.full_title().starts_with("Sable // Version: "));
    assert_eq!(config.camera.move_speed, 10.0);
    assert_eq!(config.camera.rotation_speed, 40.0);
    assert!(config.render.pipelines.contains(PipelineFeature::Deferred));
    assert_eq!(config.render.shader_dir, Path::new("shaders"));
}

#[test]
fn test_conflicting_pipelines_fail_whole_load() {
    let source = r#"
        [window]
        width = 800

        [render]
        pipelines = ["reflections"]
    "#;

    let err = EngineConfig::from_toml_str(source).unwrap_err();
    assert!(
        err.to_string().starts_with("Config error"),
        "unexpected error: {err}"
    );
}
