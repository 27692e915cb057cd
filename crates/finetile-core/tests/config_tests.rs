//! Tests for configuration loading and the shared error surface

use finetile_core::config::{get_config_manager, init_config_with};
use finetile_core::{
    ErrorContext, FinetileConfig, FinetileError, OverflowPolicy, TileError, TILE_BUF_SIZE,
};
use pretty_assertions::assert_eq;

#[test]
fn test_full_json_document() {
    let json = r#"{
        "tiles": { "capacity": 128, "tile_size": 8, "max_tiles_width": 512, "max_tiles_height": 64 },
        "raster": { "overflow_policy": "truncate", "worker_threads": 2, "antialias": false },
        "logging": {
            "category_levels": { "grid": "debug" },
            "rate_limit_seconds": 1,
            "max_rate_limit_count": 3
        }
    }"#;

    let config = FinetileConfig::from_json(json).unwrap();
    assert_eq!(config.tiles.capacity, 128);
    assert_eq!(config.tiles.tile_size, 8);
    assert_eq!(config.tiles.max_tiles_height, 64);
    assert_eq!(config.raster.overflow_policy, OverflowPolicy::Truncate);
    assert!(!config.raster.antialias);
    assert_eq!(config.logging.max_rate_limit_count, 3);
}

#[test]
fn test_malformed_json_is_a_serialization_error() {
    let err = FinetileConfig::from_json("{ tiles: }").unwrap_err();
    assert!(matches!(err, FinetileError::Serialization(_)));
}

#[test]
fn test_global_manager() {
    let mut config = FinetileConfig::default();
    config.raster.worker_threads = 4;

    let manager = init_config_with(config);
    assert!(get_config_manager().is_some());
    assert_eq!(manager.tile_config().capacity, TILE_BUF_SIZE);
}

#[test]
fn test_errors_carry_context() {
    let err = FinetileError::raster(
        "worker thread failed: boom",
        ErrorContext::new("render", "FineRasterizer").with_metadata("tiles", 12),
    );
    let log = err.format_for_log();
    assert!(log.starts_with("Raster error: worker thread failed: boom"));
    assert!(log.contains("render"));
    assert!(log.contains("tiles=12"));

    let tile: FinetileError = TileError::AlreadyTerminated.into();
    assert_eq!(tile.as_tile_error(), Some(&TileError::AlreadyTerminated));
    assert!(tile.context().is_none());
}
