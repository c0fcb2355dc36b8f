//! Rendering engine collaborator.
//!
//! The engine does the actual drawing: it parses a style into a stateful
//! handle and renders whole metatiles with it. This crate never shares a
//! handle between concurrent renders; the [`HandlePool`](crate::pool::HandlePool)
//! leases each one to a single caller at a time.
//!
//! ```text
//! TileRenderer ──acquire──▶ HandlePool ──create_handle──▶ Engine
//!      │                                                    ▲
//!      └──────────── render(&mut handle, request) ──────────┘
//! ```

mod debug;
mod style;

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use image::RgbaImage;

use crate::error::RenderError;
use crate::tile::{RendererKind, TileCoord};

pub use debug::{DebugEngine, DebugHandle, DebugStyle};
pub use style::StyleSource;

/// A request to render one metatile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetatileRequest {
    /// Which kind of output the renderer expects
    pub kind: RendererKind,
    /// Top-left tile of the metatile
    pub origin: TileCoord,
    /// Tiles along x
    pub width: u32,
    /// Tiles along y
    pub height: u32,
    /// Edge length of one tile in pixels
    pub tile_size: u32,
}

impl MetatileRequest {
    /// Canvas size in pixels for raster output.
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.width * self.tile_size, self.height * self.tile_size)
    }

    /// Member coordinates, row-major.
    pub fn members(&self) -> impl Iterator<Item = TileCoord> + '_ {
        let origin = self.origin;
        (0..self.height).flat_map(move |dy| {
            (0..self.width).map(move |dx| TileCoord::new(origin.z, origin.x + dx, origin.y + dy))
        })
    }
}

/// Raw engine output for a whole metatile.
#[derive(Debug, Clone)]
pub enum RenderedMetatile {
    /// One canvas of `width*tile_size × height*tile_size` pixels
    Raster(RgbaImage),
    /// Uncompressed encoded vector tile per member; missing or empty means no data
    Vector(HashMap<TileCoord, Bytes>),
}

impl RenderedMetatile {
    pub fn kind(&self) -> RendererKind {
        match self {
            RenderedMetatile::Raster(_) => RendererKind::Raster,
            RenderedMetatile::Vector(_) => RendererKind::Vector,
        }
    }
}

/// A rendering engine.
///
/// Handles are expensive to create and not safe for concurrent use, so the
/// caller owns each one exclusively between acquire and release.
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    /// A style bound, stateful renderer instance.
    type Handle: Send + 'static;

    /// Build a handle from a style.
    ///
    /// Style parse errors must be returned as [`RenderError::Validation`]
    /// with the parser's message.
    async fn create_handle(&self, style: &StyleSource) -> Result<Self::Handle, RenderError>;

    /// Tear a handle down. Called once per handle when its pool closes.
    async fn destroy_handle(&self, handle: Self::Handle);

    /// Render a whole metatile.
    async fn render(
        &self,
        handle: &mut Self::Handle,
        request: &MetatileRequest,
    ) -> Result<RenderedMetatile, RenderError>;
}
