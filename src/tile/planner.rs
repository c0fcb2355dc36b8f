//! Metatile planning.
//!
//! Maps a tile coordinate to the metatile that encloses it. The planner is
//! pure: it never validates the coordinate (the renderer does) but it never
//! produces a member outside `[0, 2^z)` either.

use super::coord::{tiles_at_zoom, TileCoord};

/// Origin of a metatile: the top-left tile of the `N×N` block.
///
/// Two coordinates are rendered together iff they share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetatileKey {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl MetatileKey {
    /// The origin as a tile coordinate.
    pub fn origin(&self) -> TileCoord {
        TileCoord::new(self.z, self.x, self.y)
    }
}

/// The metatile enclosing a requested coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetatilePlan {
    pub key: MetatileKey,
    /// Tiles along x, clipped to the zoom level
    pub width: u32,
    /// Tiles along y, clipped to the zoom level
    pub height: u32,
    /// Member coordinates, row-major (`y` outer, `x` inner)
    pub members: Vec<TileCoord>,
}

impl MetatilePlan {
    /// Number of member tiles.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `coord` is one of the members.
    pub fn contains(&self, coord: &TileCoord) -> bool {
        self.offset_of(coord).is_some()
    }

    /// Position of `coord` inside the metatile, in tiles from the origin.
    pub fn offset_of(&self, coord: &TileCoord) -> Option<(u32, u32)> {
        if coord.z != self.key.z {
            return None;
        }
        let dx = coord.x.checked_sub(self.key.x)?;
        let dy = coord.y.checked_sub(self.key.y)?;
        (dx < self.width && dy < self.height).then_some((dx, dy))
    }
}

/// Plan the metatile of size `metatile` that contains `coord`.
///
/// A size of 0 is treated as 1.
pub fn plan(coord: TileCoord, metatile: u32) -> MetatilePlan {
    let size = metatile.max(1);
    let limit = tiles_at_zoom(coord.z);

    let key = MetatileKey {
        z: coord.z,
        x: coord.x / size * size,
        y: coord.y / size * size,
    };
    let width = size.min(limit.saturating_sub(key.x));
    let height = size.min(limit.saturating_sub(key.y));

    let members = (key.y..key.y + height)
        .flat_map(|y| (key.x..key.x + width).map(move |x| TileCoord::new(coord.z, x, y)))
        .collect();

    MetatilePlan {
        key,
        width,
        height,
        members,
    }
}
