//! # Metatile Renderer
//!
//! Tile-request orchestration for map tiles rendered from a style definition.
//!
//! Map renderers are much faster drawing one large image than many small
//! ones, and labels that cross tile borders only line up when neighbours are
//! drawn together. This crate renders *metatiles* (`N×N` blocks of tiles) in
//! one pass and serves every member from that pass, while keeping the
//! expensive renderer handles in a bounded pool.
//!
//! ## Features
//!
//! - **Handle pool**: lazily created, FIFO hand-off, draining shutdown
//! - **Single-flight cache**: concurrent requests for sibling tiles share one
//!   render pass; exactly one of them is reported as `MISS`
//! - **Raster and vector output**: PNG, JPEG and WebP from one canvas, or
//!   gzipped Mapbox Vector Tiles
//! - **Pluggable engine**: anything implementing [`engine::Engine`]
//!
//! ## Architecture
//!
//! - [`config`] - Renderer options and CLI types
//! - [`engine`] - Engine trait, style sources and the debug engine
//! - [`pool`] - Bounded, draining pool of engine handles
//! - [`tile`] - Coordinates, metatile planning, caching and renderers
//! - [`tiler`] - Batch facade serving any number of styles
//! - [`error`] - Error type shared by every layer
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use metatile_renderer::{CacheStatus, DebugEngine, RendererConfig, TileRenderer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RendererConfig::default()
//!         .with_style(r##"{"background": "#dde6ef", "grid": "#333333"}"##)
//!         .with_metatile(2)
//!         .with_tile_size(64);
//!     let renderer = TileRenderer::raster(Arc::new(DebugEngine::new()), &config).unwrap();
//!
//!     let first = renderer.get_tile("png", 1, 0, 0).await.unwrap();
//!     let sibling = renderer.get_tile("png", 1, 1, 1).await.unwrap();
//!     assert_eq!(first.headers.cache_status(), Some(CacheStatus::Miss));
//!     assert_eq!(sibling.headers.cache_status(), Some(CacheStatus::Hit));
//!
//!     renderer.close().await;
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod pool;
pub mod tile;
pub mod tiler;

// Re-export commonly used types
pub use config::RendererConfig;
pub use engine::{DebugEngine, Engine, MetatileRequest, RenderedMetatile, StyleSource};
pub use error::RenderError;
pub use pool::{HandlePool, Lifecycle, PooledHandle};
pub use tile::{
    plan, CacheStatus, MetatileCache, MetatileKey, MetatilePlan, RendererKind, Tile, TileCoord,
    TileFormat, TileHeaders, TileRenderer,
};
pub use tiler::{Tiler, TilesRequest};
