//! Tile layer.
//!
//! Turns single-tile requests into metatile render passes and back into
//! individually encoded tiles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Tiler (batch facade)            │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │        TileRenderer (raster/vector)     │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ MetatileCache│  │     slicer      │  │
//! │  │ (single-     │  │  (crop/encode,  │  │
//! │  │  flight)     │  │   gzip)         │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │         HandlePool ─▶ Engine            │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileCoord`]: a validated `z/x/y` tile address
//! - [`plan`]: which tiles share a render pass with a given tile
//! - [`MetatileCache`]: coalesces concurrent requests for one metatile
//! - [`TileRenderer`]: the per-tile entry point, raster or vector
//! - [`Tile`] / [`TileHeaders`]: encoded payload and response metadata
//!
//! # Example
//!
//! ```
//! use metatile_renderer::tile::{plan, TileCoord};
//!
//! let plan = plan(TileCoord::new(2, 3, 1), 2);
//! assert_eq!(plan.key.origin(), TileCoord::new(2, 2, 0));
//! assert_eq!(plan.len(), 4);
//! assert!(plan.contains(&TileCoord::new(2, 2, 1)));
//! ```

mod cache;
mod coord;
mod format;
mod headers;
mod planner;
mod renderer;
mod slicer;

pub use cache::{CacheKey, CacheOutcome, MetatileCache, MetatileTiles, DEFAULT_METATILE_CACHE_CAPACITY};
pub use coord::{tiles_at_zoom, TileCoord, MAX_ZOOM};
pub use format::{RendererKind, TileFormat, DEFAULT_JPEG_QUALITY, PROTOBUF_CONTENT_TYPE};
pub use headers::{
    CacheStatus, HeaderValue, Tile, TileHeaders, CONTAINS_DATA, CONTENT_ENCODING, CONTENT_TYPE,
    METATILE_CACHE,
};
pub use planner::{plan, MetatileKey, MetatilePlan};
pub use renderer::TileRenderer;
pub use slicer::{slice_raster, slice_vector};
