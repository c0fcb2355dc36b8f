//! Batch facade.
//!
//! [`Tiler`] is the factory-level entry point: it is created once from an
//! engine and a configuration, and serves requests for any style. Asking for
//! one tile renders its whole metatile and returns every member.
//!
//! ```text
//! tiles({style, z, x, y, format})
//!        │
//!        ▼
//! RendererRegistry ──(style, kind)──▶ TileRenderer ──▶ get_metatile()
//!        │                                                  │
//!        └────────────── { "z/x/y" → bytes } ◀──────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use metatile_renderer::config::RendererConfig;
//! use metatile_renderer::engine::DebugEngine;
//! use metatile_renderer::tiler::{Tiler, TilesRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RendererConfig::default().with_metatile(4).with_tile_size(16);
//!     let tiler = Tiler::create(Arc::new(DebugEngine::new()), config).unwrap();
//!
//!     let tiles = tiler.tiles(&TilesRequest::new("{}", 1, 0, 0, "png")).await.unwrap();
//!     let keys: Vec<String> = tiles.keys().map(|c| c.to_string()).collect();
//!     assert_eq!(keys, ["1/0/0", "1/0/1", "1/1/0", "1/1/1"]);
//!
//!     tiler.close().await;
//! }
//! ```

mod registry;

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;

use crate::config::RendererConfig;
use crate::engine::Engine;
use crate::error::RenderError;
use crate::tile::{Tile, TileCoord, TileFormat, TileRenderer};

pub use registry::RendererRegistry;

/// A batch request: one tile, answered with its whole metatile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TilesRequest {
    /// Style markup
    pub style: String,
    pub z: u32,
    pub x: i64,
    pub y: i64,
    pub format: String,
}

impl TilesRequest {
    pub fn new(style: impl Into<String>, z: u32, x: i64, y: i64, format: impl Into<String>) -> Self {
        Self {
            style: style.into(),
            z,
            x,
            y,
            format: format.into(),
        }
    }
}

/// Renders tiles for any number of styles with one configuration.
pub struct Tiler<E: Engine> {
    config: RendererConfig,
    registry: RendererRegistry<E>,
}

impl<E: Engine> Tiler<E> {
    /// Create a tiler.
    ///
    /// The configuration's style, if any, is ignored: every request carries
    /// its own.
    pub fn create(engine: Arc<E>, config: RendererConfig) -> Result<Self, RenderError> {
        config.validate()?;
        Ok(Self {
            registry: RendererRegistry::new(engine, config.clone()),
            config,
        })
    }

    /// Render the metatile enclosing the requested tile.
    ///
    /// Returns one payload per member, ordered by `(z, x, y)`. That is a
    /// single entry when the metatile size is 1 or the zoom level is too
    /// small to hold more than one tile.
    pub async fn tiles(
        &self,
        request: &TilesRequest,
    ) -> Result<BTreeMap<TileCoord, Bytes>, RenderError> {
        let renderer = self.renderer(&request.style, &request.format)?;
        let tiles = renderer
            .get_metatile(&request.format, request.z, request.x, request.y)
            .await?;

        Ok(tiles
            .into_iter()
            .map(|(coord, tile)| (coord, tile.data))
            .collect())
    }

    /// Render a single tile of a style.
    pub async fn get_tile(
        &self,
        style: &str,
        format: &str,
        z: u32,
        x: i64,
        y: i64,
    ) -> Result<Tile, RenderError> {
        self.renderer(style, format)?.get_tile(format, z, x, y).await
    }

    /// Close every renderer. Later requests fail with
    /// [`RenderError::PoolDraining`].
    pub async fn close(&self) {
        self.registry.close().await;
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn registry(&self) -> &RendererRegistry<E> {
        &self.registry
    }

    fn renderer(&self, style: &str, format: &str) -> Result<TileRenderer<E>, RenderError> {
        let format: TileFormat = format.parse()?;
        self.registry.renderer(style, format.kind())
    }
}
