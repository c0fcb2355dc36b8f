//! Metatile cache integration tests.
//!
//! Tests verify:
//! - `Carto-Metatile-Cache` follows the MISS-then-HIT pattern per metatile
//! - Concurrent requests for sibling tiles share one render pass
//! - A failed pass reaches every coalesced caller and is retried afterwards

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use metatile_renderer::config::RendererConfig;
use metatile_renderer::engine::DebugEngine;
use metatile_renderer::error::RenderError;
use metatile_renderer::tile::{CacheStatus, TileRenderer};

use super::test_utils::{is_valid_png, MockEngine, DEBUG_STYLE};

fn config(metatile: u32) -> RendererConfig {
    RendererConfig::default()
        .with_style(DEBUG_STYLE)
        .with_metatile(metatile)
        .with_tile_size(32)
}

// =============================================================================
// Sequential Requests
// =============================================================================

#[tokio::test]
async fn test_metatile_cache_header_scenario() {
    let scenario = [
        ((0, 0, 0), CacheStatus::Miss),
        ((1, 0, 0), CacheStatus::Miss),
        ((1, 0, 1), CacheStatus::Hit),
        ((1, 1, 0), CacheStatus::Hit),
        ((1, 1, 1), CacheStatus::Hit),
        ((2, 0, 0), CacheStatus::Miss),
        ((2, 0, 1), CacheStatus::Hit),
        ((2, 1, 0), CacheStatus::Hit),
        ((2, 1, 1), CacheStatus::Hit),
        ((2, 0, 2), CacheStatus::Miss),
        ((2, 0, 3), CacheStatus::Hit),
        ((2, 1, 2), CacheStatus::Hit),
        ((2, 1, 3), CacheStatus::Hit),
        ((2, 2, 0), CacheStatus::Miss),
        ((2, 2, 1), CacheStatus::Hit),
        ((2, 3, 0), CacheStatus::Hit),
        ((2, 3, 1), CacheStatus::Hit),
        ((2, 2, 2), CacheStatus::Miss),
        ((2, 2, 3), CacheStatus::Hit),
        ((2, 3, 2), CacheStatus::Hit),
        ((2, 3, 3), CacheStatus::Hit),
    ];

    let renderer = TileRenderer::raster(Arc::new(DebugEngine::new()), &config(2)).unwrap();

    for ((z, x, y), expected) in scenario {
        let tile = renderer.get_tile("png", z, x, y).await.unwrap();
        assert_eq!(
            tile.headers.cache_status(),
            Some(expected),
            "Tile: {},{},{}",
            z,
            x,
            y
        );
        assert!(is_valid_png(&tile.data));
    }

    // One pass for z0, one for z1, four for z2
    assert_eq!(renderer.cache().len(), 6);
    renderer.close().await;
}

#[tokio::test]
async fn test_metatile_one_renders_every_tile() {
    let engine = Arc::new(MockEngine::new());
    let renderer = TileRenderer::raster(Arc::clone(&engine), &config(1)).unwrap();

    for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        let tile = renderer.get_tile("png", 1, x, y).await.unwrap();
        assert_eq!(tile.headers.cache_status(), Some(CacheStatus::Miss));
    }
    assert_eq!(engine.renders(), 4);
}

#[tokio::test]
async fn test_formats_render_separately() {
    let engine = Arc::new(MockEngine::new());
    let renderer = TileRenderer::raster(Arc::clone(&engine), &config(2)).unwrap();

    let png = renderer.get_tile("png", 1, 0, 0).await.unwrap();
    let jpeg = renderer.get_tile("jpeg", 1, 1, 0).await.unwrap();
    let png_sibling = renderer.get_tile("png32", 1, 1, 1).await.unwrap();

    assert_eq!(png.headers.cache_status(), Some(CacheStatus::Miss));
    assert_eq!(jpeg.headers.cache_status(), Some(CacheStatus::Miss));
    assert_eq!(jpeg.headers.content_type(), Some("image/jpeg"));
    assert_eq!(png_sibling.headers.cache_status(), Some(CacheStatus::Hit));
    assert_eq!(engine.renders(), 2);
}

// =============================================================================
// Concurrent Requests
// =============================================================================

#[tokio::test]
async fn test_concurrent_siblings_share_one_pass() {
    let engine = Arc::new(MockEngine::new().with_render_delay(Duration::from_millis(50)));
    let renderer = TileRenderer::raster(Arc::clone(&engine), &config(4)).unwrap();

    let requests = (0..4i64).flat_map(|x| (0..4i64).map(move |y| (x, y)));
    let results = join_all(requests.map(|(x, y)| {
        let renderer = renderer.clone();
        async move { renderer.get_tile("png", 3, x, y).await }
    }))
    .await;

    let statuses: Vec<CacheStatus> = results
        .into_iter()
        .map(|r| r.unwrap().headers.cache_status().unwrap())
        .collect();

    assert_eq!(statuses.len(), 16);
    assert_eq!(
        statuses.iter().filter(|s| **s == CacheStatus::Miss).count(),
        1
    );
    assert_eq!(engine.renders(), 1);
    assert_eq!(engine.handles_created(), 1);
}

#[tokio::test]
async fn test_concurrent_metatiles_respect_pool_size() {
    let engine = Arc::new(MockEngine::new().with_render_delay(Duration::from_millis(20)));
    let config = config(1).with_pool_max_size(2);
    let renderer = TileRenderer::raster(Arc::clone(&engine), &config).unwrap();

    let tasks: Vec<_> = (0..8i64)
        .map(|x| {
            let renderer = renderer.clone();
            tokio::spawn(async move { renderer.get_tile("png", 3, x, 0).await })
        })
        .collect();

    for task in tasks {
        let tile = task.await.unwrap().unwrap();
        assert_eq!(tile.headers.cache_status(), Some(CacheStatus::Miss));
    }

    assert_eq!(engine.renders(), 8);
    assert!(engine.handles_created() <= 2);
    assert_eq!(renderer.pool().leased(), 0);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_failed_pass_reaches_all_waiters_then_retries() {
    let engine = Arc::new(MockEngine::new().with_render_delay(Duration::from_millis(30)));
    engine.set_failing(true);
    let renderer = TileRenderer::raster(Arc::clone(&engine), &config(2)).unwrap();

    let results = join_all((0..2i64).map(|x| {
        let renderer = renderer.clone();
        async move { renderer.get_tile("png", 1, x, 0).await }
    }))
    .await;

    for result in results {
        assert_eq!(
            result.unwrap_err(),
            RenderError::Render("mock engine failure".to_string())
        );
    }
    assert_eq!(engine.renders(), 1);
    assert_eq!(renderer.pool().leased(), 0);
    assert_eq!(renderer.pool().size(), 1);

    engine.set_failing(false);
    let tile = renderer.get_tile("png", 1, 1, 1).await.unwrap();
    assert_eq!(tile.headers.cache_status(), Some(CacheStatus::Miss));
    assert_eq!(engine.renders(), 2);
}

#[tokio::test]
async fn test_invalid_style_error_surfaces_on_get_tile() {
    let engine = Arc::new(MockEngine::new());
    let config = RendererConfig::default().with_style("bogus");
    let renderer = TileRenderer::raster(Arc::clone(&engine), &config).unwrap();

    let err = renderer.get_tile("png", 0, 0, 0).await.unwrap_err();
    assert_eq!(err.to_string(), "expected < at line 1");
    assert_eq!(renderer.pool().size(), 0);

    renderer.close().await;
}
