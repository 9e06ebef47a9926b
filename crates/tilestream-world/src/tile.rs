//! Tile job input and renderable mesh payload.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use tilestream_core::{Aabb, TilePos, TileType};

/// Everything a worker needs to build one tile. Plain data, no scene access.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileInput {
    /// Tile being built.
    pub pos: TilePos,
    /// Surface type selecting the height profile.
    pub tile_type: TileType,
    /// World-space XY of the tile's minimum corner.
    pub origin: Vec2,
    /// Edge length in world units.
    pub width: f32,
}

impl TileInput {
    /// Describe the tile at `pos` on a grid of `tile_width`-sized tiles.
    pub fn new(pos: TilePos, tile_type: TileType, tile_width: f32) -> Self {
        Self {
            pos,
            tile_type,
            origin: pos.origin(tile_width),
            width: tile_width,
        }
    }
}

/// Vertex layout uploaded to the renderer's vertex buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Renderable representation of one tile.
#[derive(Debug, Clone)]
pub struct TerrainMesh {
    /// Tile this mesh belongs to.
    pub pos: TilePos,
    /// Surface type it was built from.
    pub tile_type: TileType,
    /// Grid of `resolution * resolution` vertices, row-major.
    pub vertices: Vec<TerrainVertex>,
    /// Triangle list, counter-clockwise seen from +Z.
    pub indices: Vec<u32>,
    /// World-space bounds of all vertices.
    pub bounds: Aabb,
}

impl TerrainMesh {
    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex data as raw bytes for buffer upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index data as raw bytes for buffer upload.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Get memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.vertices.len() * std::mem::size_of::<TerrainVertex>()
            + self.indices.len() * std::mem::size_of::<u32>()
    }
}
