//! Configuration for renderers and the command line.
//!
//! Renderer options come from [`RendererConfig`], which can be built in code
//! or loaded from JSON with the same option names used on the wire:
//!
//! ```json
//! { "metatile": 2, "poolMaxSize": 4, "style": "{...}", "base": "/styles" }
//! ```
//!
//! The binary parses [`Cli`] with clap. Every render option can also be set
//! through an environment variable with the `METATILE_` prefix:
//!
//! - `METATILE_STYLE` - Path to the style file (required)
//! - `METATILE_FORMAT` - Output format (default: png)
//! - `METATILE_SIZE` - Metatile size in tiles per axis (default: 1)
//! - `METATILE_POOL_SIZE` - Maximum renderer handles (default: available parallelism)
//! - `METATILE_TILE_SIZE` - Tile edge in pixels (default: 256)
//! - `METATILE_CACHE_SIZE` - Resolved metatiles kept in memory (default: 128)
//! - `METATILE_JPEG_QUALITY` - JPEG quality (default: 80)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use crate::engine::StyleSource;
use crate::error::RenderError;
use crate::tile::{DEFAULT_JPEG_QUALITY, DEFAULT_METATILE_CACHE_CAPACITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default metatile size (no coalescing).
pub const DEFAULT_METATILE: u32 = 1;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default number of per-style renderers a batch facade keeps open.
pub const DEFAULT_REGISTRY_SIZE: usize = 64;

/// Default handle pool size: one handle per available CPU.
pub fn default_pool_max_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_metatile() -> u32 {
    DEFAULT_METATILE
}

fn default_tile_size() -> u32 {
    DEFAULT_TILE_SIZE
}

fn default_cache_size() -> usize {
    DEFAULT_METATILE_CACHE_CAPACITY
}

fn default_registry_size() -> usize {
    DEFAULT_REGISTRY_SIZE
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

// =============================================================================
// Renderer Configuration
// =============================================================================

/// Options of a tile renderer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererConfig {
    /// Tiles per metatile axis
    #[serde(default = "default_metatile")]
    pub metatile: u32,

    /// Maximum number of renderer handles
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: usize,

    /// Style markup, interpreted by the engine
    #[serde(default)]
    pub style: Option<String>,

    /// Directory relative style resources resolve against
    #[serde(default)]
    pub base: Option<PathBuf>,

    #[serde(default = "default_tile_size")]
    pub tile_size: u32,

    /// Number of resolved metatiles kept in memory
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Renderers kept open by the batch facade before the least recently
    /// used one is closed
    #[serde(default = "default_registry_size")]
    pub registry_size: usize,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            metatile: DEFAULT_METATILE,
            pool_max_size: default_pool_max_size(),
            style: None,
            base: None,
            tile_size: DEFAULT_TILE_SIZE,
            cache_size: DEFAULT_METATILE_CACHE_CAPACITY,
            registry_size: DEFAULT_REGISTRY_SIZE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl RendererConfig {
    /// Parse options from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, RenderError> {
        serde_json::from_str(json).map_err(|e| RenderError::Validation(e.to_string()))
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_metatile(mut self, metatile: u32) -> Self {
        self.metatile = metatile;
        self
    }

    pub fn with_pool_max_size(mut self, pool_max_size: usize) -> Self {
        self.pool_max_size = pool_max_size;
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    pub fn with_registry_size(mut self, registry_size: usize) -> Self {
        self.registry_size = registry_size;
        self
    }

    pub fn with_jpeg_quality(mut self, jpeg_quality: u8) -> Self {
        self.jpeg_quality = jpeg_quality;
        self
    }

    /// Validate the numeric options.
    ///
    /// The style is checked separately by [`style_source`](Self::style_source)
    /// because a batch facade may be configured without one.
    pub fn validate(&self) -> Result<(), RenderError> {
        let invalid = |message: &str| Err(RenderError::Validation(message.to_string()));

        if self.metatile == 0 {
            return invalid("metatile must be greater than 0");
        }
        if self.pool_max_size == 0 {
            return invalid("poolMaxSize must be greater than 0");
        }
        if self.tile_size == 0 {
            return invalid("tileSize must be greater than 0");
        }
        if self.cache_size == 0 {
            return invalid("cacheSize must be greater than 0");
        }
        if self.registry_size == 0 {
            return invalid("registrySize must be greater than 0");
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return invalid("jpegQuality must be between 1 and 100");
        }

        // The metatile canvas must be addressable in pixels
        if self.metatile.checked_mul(self.tile_size).is_none() {
            return invalid("metatile * tileSize is too large");
        }

        Ok(())
    }

    /// The configured style, ready to hand to a pool.
    ///
    /// # Errors
    ///
    /// `No style provided` when the style is missing or blank.
    pub fn style_source(&self) -> Result<StyleSource, RenderError> {
        let markup = self
            .style
            .as_deref()
            .filter(|markup| !markup.trim().is_empty())
            .ok_or_else(|| RenderError::Validation("No style provided".to_string()))?;

        let source = StyleSource::new(markup);
        Ok(match &self.base {
            Some(base) => source.with_base(base.clone()),
            None => source,
        })
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Metatile renderer - render map tiles a metatile at a time.
#[derive(Parser, Debug, Clone)]
#[command(name = "metatile-renderer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Render a single tile and print its headers as JSON.
    Tile(TileArgs),

    /// Render every tile of the metatile enclosing a tile.
    Batch(BatchArgs),
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Path to the style file.
    #[arg(long, env = "METATILE_STYLE")]
    pub style: PathBuf,

    /// Output format (png, jpeg, webp, mvt).
    #[arg(short, long, default_value = "png", env = "METATILE_FORMAT")]
    pub format: String,

    /// Tiles per metatile axis.
    #[arg(short, long, default_value_t = DEFAULT_METATILE, env = "METATILE_SIZE")]
    pub metatile: u32,

    /// Maximum number of renderer handles.
    #[arg(long, env = "METATILE_POOL_SIZE")]
    pub pool_size: Option<usize>,

    /// Tile edge length in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "METATILE_TILE_SIZE")]
    pub tile_size: u32,

    /// Resolved metatiles kept in memory.
    #[arg(long, default_value_t = DEFAULT_METATILE_CACHE_CAPACITY, env = "METATILE_CACHE_SIZE")]
    pub cache_size: usize,

    /// JPEG quality (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "METATILE_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Zoom level.
    pub z: u32,

    /// Tile column.
    #[arg(allow_negative_numbers = true)]
    pub x: i64,

    /// Tile row.
    #[arg(allow_negative_numbers = true)]
    pub y: i64,
}

impl RenderArgs {
    /// Renderer options for a style loaded from `--style`.
    pub fn renderer_config(&self, style: &StyleSource) -> RendererConfig {
        let config = RendererConfig {
            metatile: self.metatile,
            pool_max_size: self.pool_size.unwrap_or_else(default_pool_max_size),
            style: Some(style.markup().to_string()),
            base: None,
            tile_size: self.tile_size,
            cache_size: self.cache_size,
            registry_size: DEFAULT_REGISTRY_SIZE,
            jpeg_quality: self.jpeg_quality,
        };

        match style.base() {
            Some(base) => config.with_base(base),
            None => config,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TileArgs {
    #[command(flatten)]
    pub render: RenderArgs,

    /// File the tile payload is written to.
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    #[command(flatten)]
    pub render: RenderArgs,

    /// Directory tiles are written to, as `z/x/y.<ext>`.
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

// =============================================================================
// Tests
// =============================================================================
