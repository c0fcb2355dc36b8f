//! Tile coordinates in the XYZ scheme.

use std::fmt;
use std::str::FromStr;

use crate::error::RenderError;

/// Highest zoom level a [`TileCoord`] can address (`2^30` tiles per axis).
pub const MAX_ZOOM: u32 = 30;

/// Number of tiles along each axis at zoom `z`.
///
/// Saturates at `u32::MAX` for `z >= 32`.
#[inline]
pub fn tiles_at_zoom(z: u32) -> u32 {
    1u32.checked_shl(z).unwrap_or(u32::MAX)
}

/// A tile coordinate `{z, x, y}`.
///
/// Ordering is `(z, x, y)`, which is also the order in which batch results
/// are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Create a coordinate without validating it.
    pub const fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Validate raw request parameters and build a coordinate.
    ///
    /// `x` is checked before `y`; both must lie in `[0, 2^z)`.
    pub fn checked(z: u32, x: i64, y: i64) -> Result<Self, RenderError> {
        if z > MAX_ZOOM {
            return Err(RenderError::ZoomRange { z, max: MAX_ZOOM });
        }

        let limit = i64::from(tiles_at_zoom(z));
        if !(0..limit).contains(&x) {
            return Err(RenderError::CoordinateRange { param: "x" });
        }
        if !(0..limit).contains(&y) {
            return Err(RenderError::CoordinateRange { param: "y" });
        }

        Ok(Self::new(z, x as u32, y as u32))
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

impl FromStr for TileCoord {
    type Err = RenderError;

    /// Parse a `z/x/y` key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RenderError::Validation(format!("invalid tile key '{}'", s));

        let mut parts = s.split('/');
        let mut next = || -> Result<i64, RenderError> {
            parts
                .next()
                .and_then(|part| part.parse::<i64>().ok())
                .ok_or_else(invalid)
        };

        let z = next()?;
        let x = next()?;
        let y = next()?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        let z = u32::try_from(z).map_err(|_| invalid())?;
        Self::checked(z, x, y)
    }
}
