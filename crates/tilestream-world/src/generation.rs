//! Procedural terrain height sampling.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};
use tilestream_core::constants::DEFAULT_TILE_RESOLUTION;
use tilestream_core::HeightProfile;

use crate::WorldSeed;

/// Terrain generator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainConfig {
    /// Seed for noise generation.
    pub seed: WorldSeed,
    /// Height of the flat reference surface (Z coordinate).
    pub base_height: f32,
    /// Maximum height variation above the profile offset.
    pub height_scale: f32,
    /// Horizontal scale of terrain features in world units.
    pub feature_scale: f64,
    /// Number of noise octaves for detail.
    pub octaves: usize,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Height samples along one tile edge (at least 2).
    pub resolution: u32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            base_height: 0.0,
            height_scale: 30.0,
            feature_scale: 400.0,
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            resolution: DEFAULT_TILE_RESOLUTION,
        }
    }
}

impl TerrainConfig {
    /// Set the noise seed.
    pub fn with_seed(mut self, seed: WorldSeed) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of samples along a tile edge.
    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }
}

/// Height field shared by every tile, sampled in world space.
///
/// Tiles of the same type sample one continuous field, so adjacent tiles
/// agree on their shared edge.
#[derive(Clone)]
pub struct TerrainGenerator {
    config: TerrainConfig,
    height_noise: Fbm<Perlin>,
}

impl TerrainGenerator {
    /// Create a new terrain generator with the given configuration.
    pub fn new(config: TerrainConfig) -> Self {
        let height_noise = Fbm::<Perlin>::new(config.seed as u32)
            .set_octaves(config.octaves)
            .set_lacunarity(config.lacunarity)
            .set_persistence(config.persistence);

        Self {
            config,
            height_noise,
        }
    }

    /// Create a terrain generator with default configuration.
    pub fn with_seed(seed: WorldSeed) -> Self {
        Self::new(TerrainConfig::default().with_seed(seed))
    }

    /// Get the terrain configuration.
    pub const fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Get terrain height at world XY coordinates for a height profile.
    pub fn height_at(&self, world_x: f64, world_y: f64, profile: HeightProfile) -> f32 {
        let base = self.config.base_height + profile.offset;
        if profile.amplitude == 0.0 {
            return base;
        }

        let scale = self.config.feature_scale / f64::from(profile.roughness);
        let noise_value = self
            .height_noise
            .get([world_x / scale, world_y / scale])
            .clamp(-1.0, 1.0);

        // Map [-1, 1] to [0, height_scale]
        let relief = ((noise_value + 1.0) * 0.5) as f32 * self.config.height_scale;
        base + relief * profile.amplitude
    }
}
