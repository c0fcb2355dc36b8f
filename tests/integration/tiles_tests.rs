//! Batch facade integration tests.
//!
//! Tests verify:
//! - Unknown formats are rejected with `Format '<fmt>' not allowed`
//! - Without metatiling a batch holds only the requested tile
//! - With metatiling a batch holds every member, keyed `z/x/y` in order
//! - Styles get independent renderers
//! - Renderers past `registrySize` are evicted and their handles destroyed

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use metatile_renderer::config::RendererConfig;
use metatile_renderer::engine::DebugEngine;
use metatile_renderer::error::RenderError;
use metatile_renderer::tile::{CacheStatus, TileCoord};
use metatile_renderer::tiler::{Tiler, TilesRequest};

use super::test_utils::{is_valid_png, MockEngine, DEBUG_STYLE};

fn tiler(metatile: u32) -> Tiler<DebugEngine> {
    let config = RendererConfig::default()
        .with_metatile(metatile)
        .with_tile_size(32);
    Tiler::create(Arc::new(DebugEngine::new()), config).unwrap()
}

fn keys(tiles: &BTreeMap<TileCoord, Bytes>) -> Vec<String> {
    tiles.keys().map(|coord| coord.to_string()).collect()
}

async fn png_tiles(tiler: &Tiler<DebugEngine>, z: u32, x: i64, y: i64) -> BTreeMap<TileCoord, Bytes> {
    let tiles = tiler
        .tiles(&TilesRequest::new(DEBUG_STYLE, z, x, y, "png"))
        .await
        .unwrap();
    for tile in tiles.values() {
        assert!(is_valid_png(tile));
    }
    tiles
}

// =============================================================================
// metatile = 1
// =============================================================================

#[tokio::test]
async fn test_metatile_1_rejects_unknown_format() {
    let tiler = tiler(1);
    let err = tiler
        .tiles(&TilesRequest::new(DEBUG_STYLE, 0, 0, 0, "wadus"))
        .await
        .unwrap_err();

    assert_eq!(err, RenderError::FormatNotAllowed("wadus".to_string()));
    assert_eq!(err.to_string(), "Format 'wadus' not allowed");
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_metatile_1_returns_only_requested_tile() {
    let tiler = tiler(1);

    assert_eq!(keys(&png_tiles(&tiler, 0, 0, 0).await), ["0/0/0"]);
    assert_eq!(keys(&png_tiles(&tiler, 1, 0, 0).await), ["1/0/0"]);
    assert_eq!(keys(&png_tiles(&tiler, 1, 1, 0).await), ["1/1/0"]);
    assert_eq!(keys(&png_tiles(&tiler, 1, 0, 1).await), ["1/0/1"]);
    assert_eq!(keys(&png_tiles(&tiler, 1, 1, 1).await), ["1/1/1"]);

    tiler.close().await;
}

// =============================================================================
// metatile = 4
// =============================================================================

#[tokio::test]
async fn test_metatile_4_rejects_unknown_format() {
    let tiler = tiler(4);
    let err = tiler
        .tiles(&TilesRequest::new(DEBUG_STYLE, 0, 0, 0, "wadus"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Format 'wadus' not allowed");
}

#[tokio::test]
async fn test_metatile_4_at_zoom_0_is_a_single_tile() {
    let tiler = tiler(4);
    assert_eq!(keys(&png_tiles(&tiler, 0, 0, 0).await), ["0/0/0"]);
}

#[tokio::test]
async fn test_metatile_4_at_zoom_1_returns_the_whole_level() {
    let tiler = tiler(4);
    let expected = ["1/0/0", "1/0/1", "1/1/0", "1/1/1"];

    for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        assert_eq!(keys(&png_tiles(&tiler, 1, x, y).await), expected);
    }

    tiler.close().await;
}

#[tokio::test]
async fn test_metatile_4_returns_sixteen_tiles_when_they_fit() {
    let tiler = tiler(4);
    let tiles = png_tiles(&tiler, 3, 5, 6).await;

    assert_eq!(tiles.len(), 16);
    let first = tiles.keys().next().unwrap();
    let last = tiles.keys().last().unwrap();
    assert_eq!(first.to_string(), "3/4/4");
    assert_eq!(last.to_string(), "3/7/7");
}

#[tokio::test]
async fn test_out_of_range_request() {
    let tiler = tiler(2);
    let err = tiler
        .tiles(&TilesRequest::new(DEBUG_STYLE, 1, 2, 0, "png"))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "required parameter x is out of range of possible values based on z value"
    );
}

// =============================================================================
// Styles
// =============================================================================

#[tokio::test]
async fn test_styles_get_independent_renderers() {
    let engine = Arc::new(MockEngine::new());
    let tiler = Tiler::create(
        Arc::clone(&engine),
        RendererConfig::default().with_metatile(2).with_tile_size(8),
    )
    .unwrap();

    let a = tiler.get_tile("style-a", "png", 1, 0, 0).await.unwrap();
    let b = tiler.get_tile("style-b", "png", 1, 0, 0).await.unwrap();
    let a_again = tiler.get_tile("style-a", "png", 1, 1, 1).await.unwrap();

    assert_eq!(a.headers.cache_status(), Some(CacheStatus::Miss));
    assert_eq!(b.headers.cache_status(), Some(CacheStatus::Miss));
    assert_eq!(a_again.headers.cache_status(), Some(CacheStatus::Hit));
    assert_eq!(engine.handles_created(), 2);
    assert_eq!(tiler.registry().len(), 2);

    tiler.close().await;
    assert_eq!(engine.handles_destroyed(), 2);

    let err = tiler.get_tile("style-c", "png", 0, 0, 0).await.unwrap_err();
    assert_eq!(err, RenderError::PoolDraining);
}

#[tokio::test]
async fn test_evicted_renderers_destroy_their_handles() {
    let engine = Arc::new(MockEngine::new());
    let tiler = Tiler::create(
        Arc::clone(&engine),
        RendererConfig::default()
            .with_tile_size(8)
            .with_registry_size(4),
    )
    .unwrap();

    for i in 0..20 {
        let style = format!("style-{}", i);
        tiler.get_tile(&style, "png", 0, 0, 0).await.unwrap();
    }
    assert_eq!(engine.handles_created(), 20);
    assert_eq!(tiler.registry().len(), 4);

    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.handles_destroyed() < 16 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(engine.handles_destroyed(), 16);

    tiler.close().await;
    assert_eq!(engine.handles_destroyed(), 20);
}

#[tokio::test]
async fn test_missing_style_in_request() {
    let tiler = tiler(1);
    let err = tiler
        .tiles(&TilesRequest::new("", 0, 0, 0, "png"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No style provided");
}

#[test]
fn test_request_from_json() {
    let request: TilesRequest = serde_json::from_str(
        r#"{"style": "{}", "z": 2, "x": 1, "y": 3, "format": "webp"}"#,
    )
    .unwrap();
    assert_eq!(request, TilesRequest::new("{}", 2, 1, 3, "webp"));
}
