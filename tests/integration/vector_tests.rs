//! Vector renderer integration tests.
//!
//! Tests verify:
//! - Construction fails without a style, but not with a malformed one
//! - Malformed styles fail on the first tile with the parser's message
//! - Tiles are gzipped protobuf, and empty tiles are flagged
//! - Pool size grows lazily and drops to zero on close

use std::sync::Arc;

use metatile_renderer::config::RendererConfig;
use metatile_renderer::engine::DebugEngine;
use metatile_renderer::error::RenderError;
use metatile_renderer::tile::{
    CacheStatus, TileRenderer, CONTAINS_DATA, CONTENT_ENCODING, CONTENT_TYPE,
};

use super::test_utils::{gunzip, MockEngine, DEBUG_STYLE};

fn vector(metatile: u32) -> TileRenderer<DebugEngine> {
    let config = RendererConfig::default()
        .with_style(DEBUG_STYLE)
        .with_metatile(metatile)
        .with_base("/styles/world");
    TileRenderer::vector(Arc::new(DebugEngine::new()), &config).unwrap()
}

#[test]
fn test_fails_without_style() {
    let err = TileRenderer::vector(Arc::new(DebugEngine::new()), &RendererConfig::default())
        .err()
        .unwrap();
    assert_eq!(err, RenderError::Validation("No style provided".to_string()));
}

#[tokio::test]
async fn test_fails_with_invalid_style_on_get_tile() {
    let config = RendererConfig::default().with_style("bogus");
    let renderer = TileRenderer::vector(Arc::new(DebugEngine::new()), &config).unwrap();

    let err = renderer.get_tile("mvt", 0, 0, 0).await.unwrap_err();
    assert_eq!(err.to_string(), "expected value at line 1 column 1");

    renderer.close().await;
}

#[tokio::test]
async fn test_fails_with_out_of_bounds_y() {
    let renderer = vector(1);

    let err = renderer.get_tile("mvt", 0, 0, 1).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "required parameter y is out of range of possible values based on z value"
    );

    renderer.close().await;
}

#[tokio::test]
async fn test_raster_formats_are_not_allowed() {
    let renderer = vector(1);
    for format in ["png", "jpeg", "webp"] {
        let err = renderer.get_tile(format, 0, 0, 0).await.unwrap_err();
        assert_eq!(err.to_string(), format!("Format '{}' not allowed", format));
    }
}

#[tokio::test]
async fn test_tiles_are_gzipped_protobuf() {
    let renderer = vector(1);

    for (z, x, y) in [(0, 0, 0), (1, 0, 0), (1, 0, 1)] {
        let tile = renderer.get_tile("mvt", z, x, y).await.unwrap();

        assert_eq!(
            tile.headers.text(CONTENT_TYPE),
            Some("application/x-protobuf")
        );
        assert_eq!(tile.headers.text(CONTENT_ENCODING), Some("gzip"));
        assert_eq!(tile.headers.flag(CONTAINS_DATA), Some(true));
        assert_eq!(tile.headers.cache_status(), Some(CacheStatus::Miss));

        let raw = gunzip(&tile.data);
        // Tile.layers, length delimited
        assert_eq!(raw[0], 0x1a);
    }

    assert_eq!(renderer.pool().size(), 1);
    renderer.close().await;
    assert_eq!(renderer.pool().size(), 0);
}

#[tokio::test]
async fn test_empty_tile_above_maxzoom() {
    let renderer = vector(1);

    let tile = renderer.get_tile("mvt", 10, 0, 0).await.unwrap();
    assert_eq!(tile.data.len(), 0);
    assert_eq!(tile.headers.flag(CONTAINS_DATA), Some(false));
    assert_eq!(tile.headers.text(CONTENT_ENCODING), None);

    let tile = renderer.get_tile("mvt", 10, 765, 295).await.unwrap();
    assert!(tile.data.is_empty());
}

#[tokio::test]
async fn test_vector_metatile_slices_each_member() {
    let engine = Arc::new(MockEngine::new());
    let config = RendererConfig::default().with_style("{}").with_metatile(2);
    let renderer = TileRenderer::vector(Arc::clone(&engine), &config).unwrap();

    let tiles = renderer.get_metatile("pbf", 2, 1, 1).await.unwrap();
    assert_eq!(tiles.len(), 4);
    for (coord, tile) in &tiles {
        assert_eq!(gunzip(&tile.data), coord.to_string().into_bytes());
    }
    assert_eq!(engine.renders(), 1);
}

#[tokio::test]
async fn test_headers_serialize_as_json() {
    let renderer = vector(1);
    let tile = renderer.get_tile("mvt", 10, 0, 0).await.unwrap();

    let json = serde_json::to_value(&tile.headers).unwrap();
    assert_eq!(json["x-tilelive-contains-data"], false);
    assert_eq!(json["Content-Type"], "application/x-protobuf");
    assert_eq!(json["Carto-Metatile-Cache"], "MISS");
}
