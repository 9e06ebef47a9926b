//! Worker-side terrain tile builder.

use glam::Vec3;
use rayon::prelude::*;
use thiserror::Error;
use tilestream_core::{Aabb, HeightProfile, TilePos};
use tilestream_jobs::{CancelToken, Processor};
use tracing::trace;

use crate::generation::{TerrainConfig, TerrainGenerator};
use crate::tile::{TerrainMesh, TerrainVertex, TileInput};

/// Errors raised while building a tile.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpdateError {
    /// The tile description cannot be meshed.
    #[error("invalid tile input: {0}")]
    InvalidInput(String),

    /// The height field produced NaN or infinity.
    #[error("non-finite height sampled in tile {pos}")]
    NonFiniteHeight { pos: TilePos },

    /// Cancellation was observed at a checkpoint.
    #[error("tile build interrupted by cancellation")]
    Interrupted,
}

/// Builds a tile's height grid and mesh.
///
/// Only reads its own configuration and the job input; the result is handed
/// back to the owning thread for insertion.
#[derive(Clone)]
pub struct TerrainUpdater {
    generator: TerrainGenerator,
}

impl TerrainUpdater {
    /// Create an updater sampling heights with the given configuration.
    pub fn new(config: TerrainConfig) -> Self {
        Self {
            generator: TerrainGenerator::new(config),
        }
    }

    /// Build the mesh for one tile.
    ///
    /// Checks `cancel` before each row of samples and before meshing.
    pub fn build(
        &self,
        input: &TileInput,
        cancel: &CancelToken,
    ) -> Result<TerrainMesh, UpdateError> {
        let res = self.generator.config().resolution as usize;
        if res < 2 {
            return Err(UpdateError::InvalidInput(format!(
                "resolution {res} is below the minimum of 2"
            )));
        }
        if !(input.width.is_finite() && input.width > 0.0) {
            return Err(UpdateError::InvalidInput(format!(
                "tile width {} must be positive",
                input.width
            )));
        }

        let step = input.width / (res - 1) as f32;
        let profile = input.tile_type.profile();
        let sampler = Sampler {
            generator: &self.generator,
            input,
            profile,
            step,
        };

        let mut heights = vec![0.0f32; res * res];
        heights
            .par_chunks_mut(res)
            .enumerate()
            .try_for_each(|(row, out)| {
                if cancel.is_cancelled() {
                    return Err(UpdateError::Interrupted);
                }
                for (col, h) in out.iter_mut().enumerate() {
                    *h = sampler.sample(col as i64, row as i64);
                }
                Ok(())
            })?;

        if heights.iter().any(|h| !h.is_finite()) {
            return Err(UpdateError::NonFiniteHeight { pos: input.pos });
        }
        if cancel.is_cancelled() {
            return Err(UpdateError::Interrupted);
        }

        // Samples just outside the tile come from the field, so edge normals
        // match the neighbouring tile.
        let height = |col: i64, row: i64| -> f32 {
            if (0..res as i64).contains(&col) && (0..res as i64).contains(&row) {
                heights[row as usize * res + col as usize]
            } else {
                sampler.sample(col, row)
            }
        };

        let mut vertices = Vec::with_capacity(res * res);
        for row in 0..res as i64 {
            for col in 0..res as i64 {
                let z = height(col, row);
                let dx = height(col - 1, row) - height(col + 1, row);
                let dy = height(col, row - 1) - height(col, row + 1);
                let normal = Vec3::new(dx, dy, 2.0 * step).normalize();
                let position = Vec3::new(
                    input.origin.x + col as f32 * step,
                    input.origin.y + row as f32 * step,
                    z,
                );
                vertices.push(TerrainVertex {
                    position: position.to_array(),
                    normal: normal.to_array(),
                });
            }
        }

        let indices = grid_indices(res as u32);
        let bounds = Aabb::from_points(vertices.iter().map(|v| Vec3::from_array(v.position)))
            .unwrap_or_default();

        trace!(tile = %input.pos, vertices = vertices.len(), "tile mesh built");
        Ok(TerrainMesh {
            pos: input.pos,
            tile_type: input.tile_type,
            vertices,
            indices,
            bounds,
        })
    }
}

impl Processor for TerrainUpdater {
    type Input = TileInput;
    type Output = TerrainMesh;
    type Error = UpdateError;

    fn process(&self, input: TileInput, cancel: &CancelToken) -> Result<TerrainMesh, UpdateError> {
        self.build(&input, cancel)
    }
}

/// Samples the height field on one tile's vertex lattice.
struct Sampler<'a> {
    generator: &'a TerrainGenerator,
    input: &'a TileInput,
    profile: HeightProfile,
    step: f32,
}

impl Sampler<'_> {
    fn sample(&self, col: i64, row: i64) -> f32 {
        let x = f64::from(self.input.origin.x) + col as f64 * f64::from(self.step);
        let y = f64::from(self.input.origin.y) + row as f64 * f64::from(self.step);
        self.generator.height_at(x, y, self.profile)
    }
}

/// Two counter-clockwise triangles per lattice cell.
fn grid_indices(res: u32) -> Vec<u32> {
    let cells = (res - 1) as usize;
    let mut indices = Vec::with_capacity(cells * cells * 6);
    for row in 0..res - 1 {
        for col in 0..res - 1 {
            let i = row * res + col;
            indices.extend_from_slice(&[i, i + 1, i + res, i + 1, i + res + 1, i + res]);
        }
    }
    indices
}
