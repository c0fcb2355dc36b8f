//! Slicing engine output into per-tile payloads.
//!
//! Raster metatiles arrive as one canvas; every member is cropped out and
//! encoded on its own. Vector metatiles arrive as one uncompressed payload per
//! member; non-empty payloads are gzipped and empty ones are flagged as
//! carrying no data.

use std::collections::HashMap;
use std::io::{Cursor, Write};

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, ImageFormat, RgbaImage};

use super::cache::MetatileTiles;
use super::coord::TileCoord;
use super::format::{TileFormat, PROTOBUF_CONTENT_TYPE};
use super::headers::{Tile, TileHeaders, CONTAINS_DATA, CONTENT_ENCODING, CONTENT_TYPE};
use super::planner::MetatilePlan;
use crate::error::RenderError;

/// Cut a raster canvas into its member tiles and encode each one.
///
/// # Errors
///
/// Returns [`RenderError::Render`] if the canvas does not match the plan, and
/// [`RenderError::Encode`] if a tile cannot be encoded.
pub fn slice_raster(
    canvas: &RgbaImage,
    plan: &MetatilePlan,
    tile_size: u32,
    format: TileFormat,
    jpeg_quality: u8,
) -> Result<MetatileTiles, RenderError> {
    let expected = (plan.width * tile_size, plan.height * tile_size);
    if canvas.dimensions() != expected {
        return Err(RenderError::Render(format!(
            "engine returned a {}x{} canvas, expected {}x{}",
            canvas.width(),
            canvas.height(),
            expected.0,
            expected.1
        )));
    }

    let mut tiles = HashMap::with_capacity(plan.len());
    for member in &plan.members {
        let (dx, dy) = offset(plan, member)?;
        let region =
            imageops::crop_imm(canvas, dx * tile_size, dy * tile_size, tile_size, tile_size)
                .to_image();

        let mut headers = TileHeaders::new();
        headers.insert_text(CONTENT_TYPE, format.content_type());
        tiles.insert(
            *member,
            Tile {
                data: encode_image(region, format, jpeg_quality)?,
                headers,
            },
        );
    }

    Ok(tiles)
}

/// Gzip every member payload of a vector metatile.
pub fn slice_vector(
    payloads: &HashMap<TileCoord, Bytes>,
    plan: &MetatilePlan,
) -> Result<MetatileTiles, RenderError> {
    let mut tiles = HashMap::with_capacity(plan.len());
    for member in &plan.members {
        let mut headers = TileHeaders::new();
        headers.insert_text(CONTENT_TYPE, PROTOBUF_CONTENT_TYPE);

        let data = match payloads.get(member) {
            Some(raw) if !raw.is_empty() => {
                headers.insert_text(CONTENT_ENCODING, "gzip");
                headers.insert_flag(CONTAINS_DATA, true);
                gzip(raw)?
            }
            _ => {
                headers.insert_flag(CONTAINS_DATA, false);
                Bytes::new()
            }
        };

        tiles.insert(*member, Tile { data, headers });
    }

    Ok(tiles)
}

fn offset(plan: &MetatilePlan, member: &TileCoord) -> Result<(u32, u32), RenderError> {
    plan.offset_of(member)
        .ok_or_else(|| RenderError::Render(format!("tile {} is not part of the metatile", member)))
}

fn encode_image(
    tile: RgbaImage,
    format: TileFormat,
    jpeg_quality: u8,
) -> Result<Bytes, RenderError> {
    let encode_error = |e: image::ImageError| RenderError::Encode {
        format: format.as_str(),
        message: e.to_string(),
    };

    let mut output = Vec::new();
    match format {
        TileFormat::Png => tile
            .write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
            .map_err(encode_error)?,
        TileFormat::Webp => tile
            .write_to(&mut Cursor::new(&mut output), ImageFormat::WebP)
            .map_err(encode_error)?,
        TileFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgba8(tile).to_rgb8();
            JpegEncoder::new_with_quality(&mut output, jpeg_quality.clamp(1, 100))
                .encode_image(&rgb)
                .map_err(encode_error)?;
        }
        TileFormat::Mvt => {
            return Err(RenderError::Encode {
                format: format.as_str(),
                message: "vector tiles cannot be encoded from a raster canvas".to_string(),
            })
        }
    }

    Ok(Bytes::from(output))
}

fn gzip(raw: &[u8]) -> Result<Bytes, RenderError> {
    let encode_error = |e: std::io::Error| RenderError::Encode {
        format: TileFormat::Mvt.as_str(),
        message: e.to_string(),
    };

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw).map_err(encode_error)?;
    let compressed = encoder.finish().map_err(encode_error)?;
    Ok(Bytes::from(compressed))
}
