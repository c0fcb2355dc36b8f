//! Tile output formats and the renderer variants that produce them.

use std::fmt;
use std::str::FromStr;

use crate::error::RenderError;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// MIME type of vector tiles.
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// The two renderer variants.
///
/// Each variant owns its own pool and cache, and their formats are disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererKind {
    Raster,
    Vector,
}

impl RendererKind {
    /// Formats this variant may be asked for.
    pub fn allowed_formats(self) -> &'static [TileFormat] {
        match self {
            RendererKind::Raster => &[TileFormat::Png, TileFormat::Jpeg, TileFormat::Webp],
            RendererKind::Vector => &[TileFormat::Mvt],
        }
    }

    pub fn allows(self, format: TileFormat) -> bool {
        self.allowed_formats().contains(&format)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RendererKind::Raster => "raster",
            RendererKind::Vector => "vector",
        }
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tile output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileFormat {
    Png,
    Jpeg,
    Webp,
    /// Mapbox Vector Tile, served gzipped
    Mvt,
}

impl TileFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            TileFormat::Png => "png",
            TileFormat::Jpeg => "jpeg",
            TileFormat::Webp => "webp",
            TileFormat::Mvt => "mvt",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            TileFormat::Png => "image/png",
            TileFormat::Jpeg => "image/jpeg",
            TileFormat::Webp => "image/webp",
            TileFormat::Mvt => PROTOBUF_CONTENT_TYPE,
        }
    }

    /// File extension used when writing tiles to disk.
    pub fn extension(self) -> &'static str {
        match self {
            TileFormat::Png => "png",
            TileFormat::Jpeg => "jpg",
            TileFormat::Webp => "webp",
            TileFormat::Mvt => "pbf",
        }
    }

    /// The renderer variant that produces this format.
    pub fn kind(self) -> RendererKind {
        match self {
            TileFormat::Mvt => RendererKind::Vector,
            _ => RendererKind::Raster,
        }
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TileFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "png" | "png32" => Ok(TileFormat::Png),
            "jpeg" | "jpg" => Ok(TileFormat::Jpeg),
            "webp" => Ok(TileFormat::Webp),
            "mvt" | "pbf" => Ok(TileFormat::Mvt),
            other => Err(RenderError::FormatNotAllowed(other.to_string())),
        }
    }
}
