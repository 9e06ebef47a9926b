//! Tile types and their terrain shape.

use serde::{Deserialize, Serialize};

/// Surface category of a terrain tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileType {
    /// Grounded ice sheet with gentle relief.
    #[default]
    StaticIce,
    /// Fractured, moving ice with rougher relief.
    DynamicIce,
    /// Open water, flat at the base height.
    Water,
}

impl TileType {
    /// Height profile used when sampling this tile type.
    #[inline]
    pub const fn profile(self) -> HeightProfile {
        match self {
            Self::StaticIce => HeightProfile::STATIC_ICE,
            Self::DynamicIce => HeightProfile::DYNAMIC_ICE,
            Self::Water => HeightProfile::WATER,
        }
    }

    /// Returns true if the surface is flat regardless of noise.
    #[inline]
    pub const fn is_flat(self) -> bool {
        matches!(self, Self::Water)
    }
}

/// Per-type scaling applied to the shared height field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HeightProfile {
    /// Offset added to the base height, in world units.
    pub offset: f32,
    /// Multiplier on the noise amplitude (0.0 = flat).
    pub amplitude: f32,
    /// Multiplier on the noise frequency.
    pub roughness: f32,
}

impl HeightProfile {
    /// Static ice: raised plateau with smooth relief
    pub const STATIC_ICE: Self = Self {
        offset: 20.0,
        amplitude: 1.0,
        roughness: 1.0,
    };

    /// Dynamic ice: lower, broken surface
    pub const DYNAMIC_ICE: Self = Self {
        offset: 8.0,
        amplitude: 0.6,
        roughness: 3.0,
    };

    /// Water: flat
    pub const WATER: Self = Self {
        offset: 0.0,
        amplitude: 0.0,
        roughness: 1.0,
    };
}
