//! A self-contained reference engine.
//!
//! The style markup is a small JSON document:
//!
//! ```json
//! { "background": "#dde6efff", "grid": "#333333", "layer": "debug", "maxzoom": 14 }
//! ```
//!
//! Raster output fills the background and, when `grid` is set, outlines every
//! tile of the metatile. Vector output is a Mapbox Vector Tile with a single
//! polygon covering the tile for `z <= maxzoom`, and no data above it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use image::{Rgba, RgbaImage};
use prost::Message;
use serde::Deserialize;
use tracing::trace;

use super::{Engine, MetatileRequest, RenderedMetatile, StyleSource};
use crate::error::RenderError;
use crate::tile::{RendererKind, TileCoord};

/// Vector tile extent (coordinate space of one tile).
const MVT_EXTENT: i32 = 4096;

fn default_background() -> String {
    "#ffffff00".to_string()
}

fn default_layer() -> String {
    "debug".to_string()
}

fn default_maxzoom() -> u32 {
    14
}

/// Parsed style markup of the [`DebugEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebugStyle {
    #[serde(default = "default_background")]
    pub background: String,

    #[serde(default)]
    pub grid: Option<String>,

    #[serde(default = "default_layer")]
    pub layer: String,

    #[serde(default = "default_maxzoom")]
    pub maxzoom: u32,
}

/// A handle of the [`DebugEngine`].
#[derive(Debug)]
pub struct DebugHandle {
    background: Rgba<u8>,
    grid: Option<Rgba<u8>>,
    layer: String,
    maxzoom: u32,
    renders: u64,
}

impl DebugHandle {
    /// Number of metatiles rendered with this handle.
    pub fn renders(&self) -> u64 {
        self.renders
    }
}

/// Reference engine used by the CLI and the tests.
#[derive(Debug, Default)]
pub struct DebugEngine {
    created: AtomicUsize,
    destroyed: AtomicUsize,
}

impl DebugEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handles_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn handles_destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Engine for DebugEngine {
    type Handle = DebugHandle;

    async fn create_handle(&self, style: &StyleSource) -> Result<DebugHandle, RenderError> {
        let parsed: DebugStyle = serde_json::from_str(style.markup())
            .map_err(|e| RenderError::Validation(e.to_string()))?;

        let handle = DebugHandle {
            background: parse_colour(&parsed.background)?,
            grid: parsed.grid.as_deref().map(parse_colour).transpose()?,
            layer: parsed.layer,
            maxzoom: parsed.maxzoom,
            renders: 0,
        };

        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    async fn destroy_handle(&self, handle: DebugHandle) {
        trace!("Destroying debug handle after {} renders", handle.renders);
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }

    async fn render(
        &self,
        handle: &mut DebugHandle,
        request: &MetatileRequest,
    ) -> Result<RenderedMetatile, RenderError> {
        handle.renders += 1;

        match request.kind {
            RendererKind::Raster => Ok(RenderedMetatile::Raster(draw_canvas(handle, request))),
            RendererKind::Vector => {
                let tiles = request
                    .members()
                    .map(|coord| {
                        let data = if coord.z <= handle.maxzoom {
                            encode_square_tile(&handle.layer, &coord)
                        } else {
                            Bytes::new()
                        };
                        (coord, data)
                    })
                    .collect::<HashMap<_, _>>();
                Ok(RenderedMetatile::Vector(tiles))
            }
        }
    }
}

/// Parse `#rrggbb` or `#rrggbbaa`.
fn parse_colour(value: &str) -> Result<Rgba<u8>, RenderError> {
    let invalid = || RenderError::Validation(format!("invalid colour '{}'", value));

    let hex = value
        .strip_prefix('#')
        .filter(|hex| (hex.len() == 6 || hex.len() == 8) && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .ok_or_else(invalid)?;

    let packed = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
    let rgba = if hex.len() == 6 {
        (packed << 8) | 0xff
    } else {
        packed
    };

    Ok(Rgba(rgba.to_be_bytes()))
}

fn draw_canvas(handle: &DebugHandle, request: &MetatileRequest) -> RgbaImage {
    let (width, height) = request.pixel_size();
    let tile_size = request.tile_size;
    let mut canvas = RgbaImage::from_pixel(width, height, handle.background);

    if let Some(grid) = handle.grid {
        for (px, py, pixel) in canvas.enumerate_pixels_mut() {
            let (tx, ty) = (px % tile_size, py % tile_size);
            if tx == 0 || ty == 0 || tx == tile_size - 1 || ty == tile_size - 1 {
                *pixel = grid;
            }
        }
    }

    canvas
}

// =============================================================================
// Mapbox Vector Tile messages
// =============================================================================

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct VectorTile {
    #[prost(message, repeated, tag = "3")]
    pub layers: Vec<VectorTileLayer>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct VectorTileLayer {
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub features: Vec<VectorTileFeature>,
    #[prost(uint32, optional, tag = "5")]
    pub extent: Option<u32>,
    #[prost(uint32, required, tag = "15")]
    pub version: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct VectorTileFeature {
    #[prost(uint64, optional, tag = "1")]
    pub id: Option<u64>,
    #[prost(enumeration = "VectorTileGeomType", optional, tag = "3")]
    pub geometry_type: Option<i32>,
    #[prost(uint32, repeated, tag = "4")]
    pub geometry: Vec<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub(crate) enum VectorTileGeomType {
    Unknown = 0,
    Point = 1,
    LineString = 2,
    Polygon = 3,
}

const MOVE_TO: u32 = 1;
const LINE_TO: u32 = 2;
const CLOSE_PATH: u32 = 7;

fn command(id: u32, count: u32) -> u32 {
    (id & 0x7) | (count << 3)
}

fn zigzag(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// One layer, one polygon feature covering the whole tile.
fn encode_square_tile(layer: &str, coord: &TileCoord) -> Bytes {
    // Clockwise in tile space: (0,0) -> (E,0) -> (E,E) -> (0,E)
    let geometry = vec![
        command(MOVE_TO, 1),
        zigzag(0),
        zigzag(0),
        command(LINE_TO, 3),
        zigzag(MVT_EXTENT),
        zigzag(0),
        zigzag(0),
        zigzag(MVT_EXTENT),
        zigzag(-MVT_EXTENT),
        zigzag(0),
        command(CLOSE_PATH, 1),
    ];

    let tile = VectorTile {
        layers: vec![VectorTileLayer {
            name: layer.to_string(),
            features: vec![VectorTileFeature {
                id: Some((u64::from(coord.x) << 32) | u64::from(coord.y)),
                geometry_type: Some(VectorTileGeomType::Polygon as i32),
                geometry,
            }],
            extent: Some(MVT_EXTENT as u32),
            version: 2,
        }],
    };

    Bytes::from(tile.encode_to_vec())
}
