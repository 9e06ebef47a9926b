//! Terrain tile processing and render-distance streaming.
//!
//! [`TerrainUpdater`] turns a tile's description into a vertex/index mesh on a
//! worker thread. [`TiledScene`] decides which tiles the camera wants, feeds
//! them to an [`AsyncJobHandler`](tilestream_jobs::AsyncJobHandler) and, on the
//! owning thread only, attaches finished meshes to a [`SceneGraph`].

pub mod generation;
pub mod scene;
pub mod tile;
pub mod tiled_scene;
pub mod updater;

pub use generation::{TerrainConfig, TerrainGenerator};
pub use scene::{MeshStore, SceneGraph};
pub use tile::{TerrainMesh, TerrainVertex, TileInput};
pub use tiled_scene::{StreamingConfig, TiledScene, UpdateSummary};
pub use updater::{TerrainUpdater, UpdateError};

/// World seed for procedural height generation.
pub type WorldSeed = u64;
