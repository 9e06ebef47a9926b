//! Core types, math, and coordinates for the Tilestream terrain streamer.
//!
//! This crate provides the foundational types used throughout the workspace:
//! - Tile identities and the world/tile coordinate conversions
//! - The row-major tile grid describing the terrain layout
//! - Tile types and their height profiles
//! - Bounds math and the common error type

pub mod coords;
pub mod error;
pub mod grid;
pub mod math;
pub mod types;

pub use coords::TilePos;
pub use error::{Error, Result};
pub use grid::TileGrid;
pub use math::Aabb;
pub use types::{HeightProfile, TileType};

/// Workspace-wide constants
pub mod constants {
    /// Default edge length of a tile in world units.
    pub const DEFAULT_TILE_WIDTH: f32 = 80.0;
    /// Default render distance, measured in tiles.
    pub const DEFAULT_RENDER_DISTANCE: f32 = 20.0;
    /// Default number of height samples along one tile edge.
    pub const DEFAULT_TILE_RESOLUTION: u32 = 33;
}
