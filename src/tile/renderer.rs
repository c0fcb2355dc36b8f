//! Tile renderers.
//!
//! A [`TileRenderer`] answers single-tile requests by rendering the whole
//! enclosing metatile once and serving every member from the cache.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           TileRenderer                           │
//! │                                                                  │
//! │  get_tile(format, z, x, y)                                       │
//! │   1. format allowed?        5. single-flight render pass:        │
//! │   2. coordinate in range?      acquire ─▶ render ─▶ release      │
//! │   3. pool still active?        ─▶ slice every member             │
//! │   4. plan the metatile      6. pick the tile, tag HIT / MISS     │
//! │                                                                  │
//! │     ┌────────────┐   ┌───────────────┐   ┌──────────────────┐    │
//! │     │  planner   │   │ MetatileCache │   │  HandlePool<E>   │    │
//! │     └────────────┘   └───────────────┘   └──────────────────┘    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The raster and vector variants differ only in the formats they accept
//! and in how the engine output is sliced.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::RendererConfig;
use crate::engine::{Engine, MetatileRequest, RenderedMetatile};
use crate::error::RenderError;
use crate::pool::HandlePool;

use super::cache::{CacheKey, CacheOutcome, MetatileCache, MetatileTiles};
use super::coord::TileCoord;
use super::format::{RendererKind, TileFormat};
use super::headers::{CacheStatus, Tile};
use super::planner::{plan, MetatilePlan};
use super::slicer::{slice_raster, slice_vector};

struct RendererInner<E: Engine> {
    kind: RendererKind,
    engine: Arc<E>,
    pool: HandlePool<E>,
    cache: MetatileCache,
    metatile: u32,
    tile_size: u32,
    jpeg_quality: u8,
}

/// Metatile-aware tile renderer over an [`Engine`].
///
/// Cloning yields another reference to the same pool and cache.
///
/// # Example
///
/// ```ignore
/// let config = RendererConfig::default()
///     .with_style(r##"{"background": "#dde6ef"}"##)
///     .with_metatile(2);
/// let renderer = TileRenderer::raster(Arc::new(DebugEngine::new()), &config)?;
///
/// let tile = renderer.get_tile("png", 1, 0, 0).await?;
/// assert_eq!(tile.headers.cache_status(), Some(CacheStatus::Miss));
/// ```
pub struct TileRenderer<E: Engine> {
    inner: Arc<RendererInner<E>>,
}

impl<E: Engine> Clone for TileRenderer<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Engine> TileRenderer<E> {
    /// Create a raster renderer (PNG, JPEG, WebP).
    pub fn raster(engine: Arc<E>, config: &RendererConfig) -> Result<Self, RenderError> {
        Self::new(RendererKind::Raster, engine, config)
    }

    /// Create a vector renderer (MVT).
    pub fn vector(engine: Arc<E>, config: &RendererConfig) -> Result<Self, RenderError> {
        Self::new(RendererKind::Vector, engine, config)
    }

    /// Create a renderer of the given kind.
    ///
    /// Fails synchronously when the configuration is invalid or carries no
    /// style. The style itself is only parsed by the engine, when the first
    /// handle is created.
    pub fn new(
        kind: RendererKind,
        engine: Arc<E>,
        config: &RendererConfig,
    ) -> Result<Self, RenderError> {
        config.validate()?;
        let style = config.style_source()?;

        debug!(
            "Creating {} renderer (metatile {}, pool {}, cache {})",
            kind, config.metatile, config.pool_max_size, config.cache_size
        );

        Ok(Self {
            inner: Arc::new(RendererInner {
                kind,
                pool: HandlePool::new(Arc::clone(&engine), style, config.pool_max_size),
                engine,
                cache: MetatileCache::with_capacity(config.cache_size),
                metatile: config.metatile,
                tile_size: config.tile_size,
                jpeg_quality: config.jpeg_quality,
            }),
        })
    }

    /// Render a single tile.
    ///
    /// The tile carries `Carto-Metatile-Cache: MISS` when this request
    /// triggered the render pass of its metatile, and `HIT` otherwise.
    ///
    /// # Errors
    ///
    /// - [`RenderError::FormatNotAllowed`] for formats outside this variant
    /// - [`RenderError::CoordinateRange`] / [`RenderError::ZoomRange`]
    /// - [`RenderError::PoolDraining`] once the renderer is closed
    /// - any handle creation or render failure, shared by the whole pass
    pub async fn get_tile(&self, format: &str, z: u32, x: i64, y: i64) -> Result<Tile, RenderError> {
        let (format, coord) = self.check_request(format, z, x, y)?;
        let (plan, outcome) = self.render_metatile(coord, format).await?;

        let tile = member(&outcome.tiles, &plan, &coord)?;
        Ok(tile.with_cache_status(outcome.status))
    }

    /// Render the metatile enclosing a tile and return all of its members.
    ///
    /// The requested tile carries the status of the pass; its siblings are
    /// always reported as `HIT`.
    pub async fn get_metatile(
        &self,
        format: &str,
        z: u32,
        x: i64,
        y: i64,
    ) -> Result<BTreeMap<TileCoord, Tile>, RenderError> {
        let (format, coord) = self.check_request(format, z, x, y)?;
        let (plan, outcome) = self.render_metatile(coord, format).await?;

        plan.members
            .iter()
            .map(|sibling| {
                let status = if *sibling == coord {
                    outcome.status
                } else {
                    CacheStatus::Hit
                };
                let tile = member(&outcome.tiles, &plan, sibling)?;
                Ok((*sibling, tile.with_cache_status(status)))
            })
            .collect()
    }

    /// Close the renderer: drain and destroy its handle pool.
    ///
    /// Every later request fails with [`RenderError::PoolDraining`], cached
    /// tiles included.
    pub async fn close(&self) {
        self.inner.pool.close().await;
    }

    pub fn kind(&self) -> RendererKind {
        self.inner.kind
    }

    pub fn metatile(&self) -> u32 {
        self.inner.metatile
    }

    pub fn tile_size(&self) -> u32 {
        self.inner.tile_size
    }

    pub fn pool(&self) -> &HandlePool<E> {
        &self.inner.pool
    }

    pub fn cache(&self) -> &MetatileCache {
        &self.inner.cache
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.inner.engine
    }

    fn check_request(
        &self,
        format: &str,
        z: u32,
        x: i64,
        y: i64,
    ) -> Result<(TileFormat, TileCoord), RenderError> {
        let parsed: TileFormat = format.parse()?;
        if !self.inner.kind.allows(parsed) {
            return Err(RenderError::FormatNotAllowed(format.to_string()));
        }

        let coord = TileCoord::checked(z, x, y)?;

        if !self.inner.pool.is_active() {
            return Err(RenderError::PoolDraining);
        }

        Ok((parsed, coord))
    }

    async fn render_metatile(
        &self,
        coord: TileCoord,
        format: TileFormat,
    ) -> Result<(MetatilePlan, CacheOutcome), RenderError> {
        let plan = plan(coord, self.inner.metatile);
        let key = CacheKey::new(plan.key, format);

        let inner = Arc::clone(&self.inner);
        let pass_plan = plan.clone();
        let outcome = self
            .inner
            .cache
            .get_or_render(key, move || async move { inner.render_pass(&pass_plan, format).await })
            .await?;

        Ok((plan, outcome))
    }
}

impl<E: Engine> RendererInner<E> {
    /// One render pass: lease a handle, render, give the handle back, slice.
    async fn render_pass(
        &self,
        plan: &MetatilePlan,
        format: TileFormat,
    ) -> Result<MetatileTiles, RenderError> {
        let request = MetatileRequest {
            kind: self.kind,
            origin: plan.key.origin(),
            width: plan.width,
            height: plan.height,
            tile_size: self.tile_size,
        };

        let start = Instant::now();
        let mut handle = self.pool.acquire().await?;
        let rendered = self.engine.render(&mut *handle, &request).await;
        // Slicing does not need the handle
        drop(handle);

        let rendered = rendered.map_err(|e| {
            warn!("Failed to render metatile {}: {}", plan.key.origin(), e);
            e
        })?;

        debug!(
            "Rendered {} metatile {} ({}x{}) in {:?}",
            self.kind,
            plan.key.origin(),
            plan.width,
            plan.height,
            start.elapsed()
        );

        match rendered {
            RenderedMetatile::Raster(canvas) if self.kind == RendererKind::Raster => {
                slice_raster(&canvas, plan, self.tile_size, format, self.jpeg_quality)
            }
            RenderedMetatile::Vector(payloads) if self.kind == RendererKind::Vector => {
                slice_vector(&payloads, plan)
            }
            other => Err(RenderError::Render(format!(
                "engine returned {} output to a {} renderer",
                other.kind(),
                self.kind
            ))),
        }
    }
}

fn member<'a>(
    tiles: &'a MetatileTiles,
    plan: &MetatilePlan,
    coord: &TileCoord,
) -> Result<&'a Tile, RenderError> {
    tiles.get(coord).ok_or_else(|| {
        RenderError::Render(format!(
            "metatile {} has no tile {}",
            plan.key.origin(),
            coord
        ))
    })
}
