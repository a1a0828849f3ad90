// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use depth_probe::backends::camera::SourceKind;
use depth_probe::depth::Palette;
use depth_probe::{AppError, Config};
use std::path::PathBuf;

fn temp_config(name: &str, content: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("depth-probe-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_config_default() {
    let config = Config::default();

    // Check sensible defaults
    assert_eq!(config.source, SourceKind::V4l2);
    assert_eq!((config.stream.width, config.stream.height), (640, 480));
    assert_eq!(config.stream.fps, 30);
    assert!((config.depth_scale - 0.001).abs() < f32::EPSILON);
    assert!((config.colormap_alpha - 0.08).abs() < f32::EPSILON);
    assert_eq!(config.palette, Palette::Jet);
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_uses_defaults() {
    let path = std::env::temp_dir().join("depth-probe-does-not-exist.json");
    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_partial_file_fills_defaults() {
    let path = temp_config(
        "partial.json",
        r#"{ "source": "Synthetic", "depth_scale": 0.0001 }"#,
    );
    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.source, SourceKind::Synthetic);
    assert!((config.depth_scale - 0.0001).abs() < f32::EPSILON);
    assert_eq!(config.stream, Config::default().stream);
}

#[test]
fn test_malformed_file_is_config_error() {
    let path = temp_config("broken.json", "{ not json");
    let err = Config::load(Some(&path)).unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
    assert!(err.is_precondition());
}

#[test]
fn test_invalid_values_rejected() {
    let mut config = Config::default();
    config.depth_scale = 0.0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.stream.width = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.colormap_alpha = f32::NAN;
    assert!(config.validate().is_err());
}

#[test]
fn test_snapshot_dir_override() {
    let config = Config {
        snapshot_dir: Some(PathBuf::from("/tmp/shots")),
        ..Config::default()
    };
    assert_eq!(config.snapshot_directory(), PathBuf::from("/tmp/shots"));
}
