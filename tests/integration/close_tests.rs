//! Closing behaviour integration tests.
//!
//! Tests verify:
//! - Closing before or after rendering completes cleanly
//! - Requests made while the pool drains are rejected, cached or not
//! - In-flight renders finish before handles are destroyed

use std::sync::Arc;
use std::time::Duration;

use metatile_renderer::config::RendererConfig;
use metatile_renderer::error::RenderError;
use metatile_renderer::pool::Lifecycle;
use metatile_renderer::tile::TileRenderer;

use super::test_utils::MockEngine;

const DRAINING: &str = "pool is draining and cannot accept work";

fn renderer(engine: &Arc<MockEngine>) -> TileRenderer<MockEngine> {
    let config = RendererConfig::default().with_style("<Map/>").with_tile_size(16);
    TileRenderer::raster(Arc::clone(engine), &config).unwrap()
}

#[tokio::test]
async fn test_close_right_after_creation() {
    let engine = Arc::new(MockEngine::new());
    let renderer = renderer(&engine);

    renderer.close().await;

    assert_eq!(renderer.pool().lifecycle(), Lifecycle::Closed);
    assert_eq!(engine.handles_created(), 0);
    assert_eq!(engine.handles_destroyed(), 0);
}

#[tokio::test]
async fn test_close_after_one_tile() {
    let engine = Arc::new(MockEngine::new());
    let renderer = renderer(&engine);

    renderer.get_tile("png", 0, 0, 0).await.unwrap();
    assert_eq!(renderer.pool().size(), 1);

    renderer.close().await;

    assert_eq!(renderer.pool().size(), 0);
    assert_eq!(engine.handles_destroyed(), 1);
}

#[tokio::test]
async fn test_get_tile_while_draining_is_rejected() {
    let engine = Arc::new(MockEngine::new().with_destroy_delay(Duration::from_millis(50)));
    let renderer = renderer(&engine);
    renderer.get_tile("png", 0, 0, 0).await.unwrap();

    let closing = {
        let renderer = renderer.clone();
        tokio::spawn(async move { renderer.close().await })
    };
    while renderer.pool().is_active() {
        tokio::task::yield_now().await;
    }

    // Even though the tile is cached
    let err = renderer.get_tile("png", 0, 0, 0).await.unwrap_err();
    assert_eq!(err.to_string(), DRAINING);

    closing.await.unwrap();
    let err = renderer.get_tile("png", 0, 0, 0).await.unwrap_err();
    assert_eq!(err, RenderError::PoolDraining);
}

#[tokio::test]
async fn test_close_before_first_tile_rejects_it() {
    let engine = Arc::new(MockEngine::new());
    let renderer = renderer(&engine);

    renderer.close().await;

    let err = renderer.get_tile("png", 0, 0, 0).await.unwrap_err();
    assert_eq!(err.to_string(), DRAINING);
    assert_eq!(engine.handles_created(), 0);
}

#[tokio::test]
async fn test_close_waits_for_in_flight_render() {
    let engine = Arc::new(MockEngine::new().with_render_delay(Duration::from_millis(50)));
    let renderer = renderer(&engine);

    let in_flight = {
        let renderer = renderer.clone();
        tokio::spawn(async move { renderer.get_tile("png", 0, 0, 0).await })
    };
    while renderer.pool().leased() == 0 {
        tokio::task::yield_now().await;
    }

    renderer.close().await;

    // The render that was already running completed with its handle intact
    assert!(in_flight.await.unwrap().is_ok());
    assert_eq!(engine.handles_destroyed(), 1);
    assert_eq!(renderer.pool().size(), 0);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let engine = Arc::new(MockEngine::new());
    let renderer = renderer(&engine);
    renderer.get_tile("png", 0, 0, 0).await.unwrap();

    let first = renderer.clone();
    let second = renderer.clone();
    tokio::join!(first.close(), second.close());
    renderer.close().await;

    assert_eq!(engine.handles_destroyed(), 1);
}
