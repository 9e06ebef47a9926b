//! Coordinate systems for the tiled terrain.
//!
//! The terrain lies in the XY plane with Z pointing up. Tile `(0, 0)` covers
//! world coordinates `[0, tile_width)` on both axes.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Tile position in tile grid coordinates.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Pod,
    Zeroable,
    Serialize,
    Deserialize,
)]
#[repr(C)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    /// Create a new tile position
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Get the tile containing a world position (Z is ignored).
    #[inline]
    pub fn from_world(pos: Vec3, tile_width: f32) -> Self {
        Self::new(
            (pos.x / tile_width).floor() as i32,
            (pos.y / tile_width).floor() as i32,
        )
    }

    /// World-space XY of the tile's minimum corner.
    #[inline]
    pub fn origin(self, tile_width: f32) -> Vec2 {
        Vec2::new(self.x as f32 * tile_width, self.y as f32 * tile_width)
    }

    /// World-space XY of the tile's centre.
    #[inline]
    pub fn center(self, tile_width: f32) -> Vec2 {
        self.origin(tile_width) + Vec2::splat(tile_width * 0.5)
    }

    /// Squared distance between two tiles, in tiles.
    #[inline]
    pub const fn distance_sq(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }
}

impl std::fmt::Display for TilePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn world_to_tile() {
        let tile = TilePos::from_world(Vec3::new(15.0, 90.0, 400.0), 80.0);
        assert_eq!(tile, TilePos::new(0, 1));

        let tile = TilePos::from_world(Vec3::new(160.0, 0.0, 0.0), 80.0);
        assert_eq!(tile, TilePos::new(2, 0));
    }

    #[test]
    fn negative_world_pos_tile() {
        let tile = TilePos::from_world(Vec3::new(-1.0, -80.5, 0.0), 80.0);
        assert_eq!(tile, TilePos::new(-1, -2));
    }

    #[test]
    fn tile_center() {
        let center = TilePos::new(2, -1).center(80.0);
        assert_relative_eq!(center.x, 200.0);
        assert_relative_eq!(center.y, -40.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = TilePos::new(3, -4);
        let b = TilePos::new(0, 0);
        assert_eq!(a.distance_sq(b), 25);
        assert_eq!(b.distance_sq(a), 25);
    }
}
