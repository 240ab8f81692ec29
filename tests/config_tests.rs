// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use pose_stream::config::{BackendKind, PipelineConfig};
use pose_stream::errors::ConfigError;
use pose_stream::media::formats::{ChannelOrder, ChromaOrder, ColorRange, TargetPlatform};
use std::path::PathBuf;

fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("pose-stream-test-{}", std::process::id()))
        .join(name)
}

#[test]
fn test_config_default() {
    let config = PipelineConfig::default();

    assert_eq!(config.target, TargetPlatform::Android);
    assert_eq!(config.backend, BackendKind::Cpu);
    assert_eq!(
        config.channel_order(),
        ChannelOrder::Rgba,
        "Android preset should produce RGBA"
    );
    assert_eq!(config.color_range(), ColorRange::Limited);
    assert_eq!(config.engine.num_poses, 1);
}

#[test]
fn test_config_save_and_load() {
    let path = scratch_path("nested/config.json");
    let mut config = PipelineConfig::for_target(TargetPlatform::Ios);
    config.backend = BackendKind::Gpu;
    config.engine.min_detection_confidence = 0.7;

    config.save(&path).unwrap();
    let loaded = PipelineConfig::load(&path).unwrap();
    assert_eq!(loaded, config);

    let _ = std::fs::remove_dir_all(scratch_path("nested"));
}

#[test]
fn test_missing_file_uses_defaults() {
    let path = scratch_path("does-not-exist.json");
    let config = PipelineConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(config, PipelineConfig::default());
}

#[test]
fn test_malformed_file_is_parse_error() {
    let path = scratch_path("broken.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    let err = PipelineConfig::load_or_default(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_wire_format_is_lowercase() {
    let config = PipelineConfig {
        target: TargetPlatform::Ios,
        channel_order: Some(ChannelOrder::Rgba),
        ..Default::default()
    };
    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["target"], "ios");
    assert_eq!(json["channel_order"], "rgba");
    assert_eq!(json["backend"], "cpu");
    assert_eq!(json["engine"]["model_path"], "pose_landmarker.task");
}

#[test]
fn test_interleaved_chroma_follows_target_unless_overridden() {
    assert_eq!(PipelineConfig::default().interleaved_chroma(), ChromaOrder::Vu);
    assert_eq!(
        PipelineConfig::for_target(TargetPlatform::Ios).interleaved_chroma(),
        ChromaOrder::Uv
    );

    let config: PipelineConfig =
        serde_json::from_str(r#"{"target":"android","interleaved_chroma":"uv"}"#).unwrap();
    assert_eq!(config.interleaved_chroma(), ChromaOrder::Uv);
    assert_eq!(config.channel_order(), ChannelOrder::Rgba);
}

#[test]
fn test_require_default_path_matches_default_path() {
    match (PipelineConfig::default_path(), PipelineConfig::require_default_path()) {
        (Some(path), Ok(required)) => assert_eq!(path, required),
        (None, Err(err)) => assert!(matches!(err, ConfigError::NoConfigDir)),
        (path, required) => panic!("inconsistent default paths: {:?} / {:?}", path, required),
    }
}
