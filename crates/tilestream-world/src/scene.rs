//! Scene graph collaborator and an in-memory implementation.

use hashbrown::HashMap;
use tilestream_core::TilePos;

use crate::tile::TerrainMesh;

/// Live scene structure that resident tiles are inserted into.
///
/// Only ever called from the owning thread.
pub trait SceneGraph {
    /// Insert (or replace) the renderable node for a tile.
    fn attach(&mut self, pos: TilePos, mesh: TerrainMesh);

    /// Remove the node for a tile. Returns false if it was not attached.
    fn detach(&mut self, pos: TilePos) -> bool;
}

/// Scene graph that keeps attached meshes in a map.
#[derive(Default)]
pub struct MeshStore {
    meshes: HashMap<TilePos, TerrainMesh>,
}

impl MeshStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a mesh is attached at the given position.
    pub fn contains(&self, pos: TilePos) -> bool {
        self.meshes.contains_key(&pos)
    }

    /// Get the mesh attached at the given position.
    pub fn get(&self, pos: TilePos) -> Option<&TerrainMesh> {
        self.meshes.get(&pos)
    }

    /// Get the number of attached meshes.
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Check if no meshes are attached.
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Get all attached tile positions.
    pub fn positions(&self) -> Vec<TilePos> {
        self.meshes.keys().copied().collect()
    }

    /// Total triangles across attached meshes.
    pub fn triangle_count(&self) -> usize {
        self.meshes.values().map(TerrainMesh::triangle_count).sum()
    }

    /// Get total memory usage of all meshes.
    pub fn memory_usage(&self) -> usize {
        self.meshes.values().map(TerrainMesh::memory_usage).sum()
    }
}

impl SceneGraph for MeshStore {
    fn attach(&mut self, pos: TilePos, mesh: TerrainMesh) {
        self.meshes.insert(pos, mesh);
    }

    fn detach(&mut self, pos: TilePos) -> bool {
        self.meshes.remove(&pos).is_some()
    }
}
