//! Render-distance tile streaming driven from the owning thread.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::{Vec2, Vec3};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tilestream_core::constants::{DEFAULT_RENDER_DISTANCE, DEFAULT_TILE_WIDTH};
use tilestream_core::{TileGrid, TilePos, TileType};
use tilestream_jobs::{
    AsyncJobHandler, Cancellation, JobConfig, JobError, JobOutcome, Processor, SubmitError,
};
use tracing::{debug, trace, warn};

use crate::generation::TerrainConfig;
use crate::scene::SceneGraph;
use crate::tile::{TerrainMesh, TileInput};
use crate::updater::TerrainUpdater;

/// Priority entry for the submission queue.
#[derive(Debug, Clone, Copy)]
struct LoadPriority {
    pos: TilePos,
    /// Squared distance to the camera tile (lower = higher priority).
    distance_sq: i64,
}

impl PartialEq for LoadPriority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LoadPriority {}

impl PartialOrd for LoadPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LoadPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (closer tiles have higher priority)
        other
            .distance_sq
            .cmp(&self.distance_sq)
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

/// Configuration for tile streaming behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Tile edge length in world units.
    pub tile_width: f32,
    /// Maximum camera-to-tile-centre distance, in tiles, for a tile to be wanted.
    pub render_distance: f32,
    /// Maximum jobs submitted per update call.
    pub max_submits_per_update: usize,
    /// Failed builds of one tile before it is no longer resubmitted.
    pub max_retries: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            tile_width: DEFAULT_TILE_WIDTH,
            render_distance: DEFAULT_RENDER_DISTANCE,
            max_submits_per_update: 64,
            max_retries: 3,
        }
    }
}

impl StreamingConfig {
    /// Set the tile width.
    pub fn with_tile_width(mut self, tile_width: f32) -> Self {
        self.tile_width = tile_width;
        self
    }

    /// Set the render distance in tiles.
    pub fn with_render_distance(mut self, render_distance: f32) -> Self {
        self.render_distance = render_distance;
        self
    }

    /// Set the per-update submission budget.
    pub fn with_max_submits(mut self, max_submits_per_update: usize) -> Self {
        self.max_submits_per_update = max_submits_per_update;
        self
    }

    /// Set the retry bound for failed tiles.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// What one [`TiledScene::update`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Jobs submitted.
    pub submitted: usize,
    /// Wanted tiles left for a later update because of backpressure or budget.
    pub deferred: usize,
    /// In-flight jobs cancelled because their tile is no longer wanted.
    pub cancelled: usize,
    /// Meshes inserted into the scene.
    pub attached: usize,
    /// Meshes removed from the scene.
    pub detached: usize,
    /// Results thrown away as cancelled or stale.
    pub discarded: usize,
    /// Failed builds received.
    pub failed: usize,
}

/// Tracks which tiles the camera wants and keeps the scene in step.
///
/// All scene mutation happens inside [`update`](Self::update) on the calling
/// thread; workers only ever see [`TileInput`] values.
pub struct TiledScene<P = TerrainUpdater>
where
    P: Processor<Input = TileInput, Output = TerrainMesh>,
{
    config: StreamingConfig,
    types: TileGrid<TileType>,
    jobs: AsyncJobHandler<TilePos, P>,
    /// Tiles within render distance of the last camera position.
    desired: HashSet<TilePos>,
    /// Tiles whose mesh is attached to the scene.
    resident: HashSet<TilePos>,
    /// Submitted tiles whose result has not been received.
    pending: HashSet<TilePos>,
    /// Running jobs that were cancelled; their results are discarded.
    cancelling: HashSet<TilePos>,
    /// Failed build count per wanted tile.
    attempts: HashMap<TilePos, u32>,
    last_camera: Option<Vec2>,
}

impl TiledScene<TerrainUpdater> {
    /// Create a scene streaming terrain meshes built by a [`TerrainUpdater`].
    pub fn new(
        types: TileGrid<TileType>,
        config: StreamingConfig,
        terrain: TerrainConfig,
        jobs: JobConfig,
    ) -> Result<Self, JobError> {
        Self::with_processor(types, config, TerrainUpdater::new(terrain), jobs)
    }
}

impl<P> TiledScene<P>
where
    P: Processor<Input = TileInput, Output = TerrainMesh>,
{
    /// Create a scene with a custom tile processor.
    pub fn with_processor(
        types: TileGrid<TileType>,
        config: StreamingConfig,
        processor: P,
        jobs: JobConfig,
    ) -> Result<Self, JobError> {
        let jobs = AsyncJobHandler::new(processor, jobs)?;
        Ok(Self {
            config,
            types,
            jobs,
            desired: HashSet::new(),
            resident: HashSet::new(),
            pending: HashSet::new(),
            cancelling: HashSet::new(),
            attempts: HashMap::new(),
            last_camera: None,
        })
    }

    /// Get the streaming configuration.
    pub const fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Get the job handler.
    pub const fn jobs(&self) -> &AsyncJobHandler<TilePos, P> {
        &self.jobs
    }

    /// Change the render distance; takes effect on the next update.
    pub fn set_render_distance(&mut self, render_distance: f32) {
        self.config.render_distance = render_distance;
        self.last_camera = None;
    }

    /// Check if a tile is currently wanted.
    pub fn is_desired(&self, pos: TilePos) -> bool {
        self.desired.contains(&pos)
    }

    /// Check if a tile's mesh is attached to the scene.
    pub fn is_resident(&self, pos: TilePos) -> bool {
        self.resident.contains(&pos)
    }

    /// Number of wanted tiles.
    pub fn desired_count(&self) -> usize {
        self.desired.len()
    }

    /// Number of attached tiles.
    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    /// Number of tiles with a job whose result has not arrived.
    pub fn pending_count(&self) -> usize {
        self.pending.len() + self.cancelling.len()
    }

    /// Failed builds recorded for a tile.
    pub fn attempts(&self, pos: TilePos) -> u32 {
        self.attempts.get(&pos).copied().unwrap_or(0)
    }

    /// Advance streaming for the current camera position. Never blocks on jobs.
    pub fn update<S: SceneGraph>(&mut self, camera_pos: Vec3, scene: &mut S) -> UpdateSummary {
        let mut summary = UpdateSummary::default();

        // Step 1: Recompute the wanted set if the camera moved
        let camera = camera_pos.truncate();
        if self.last_camera != Some(camera) {
            self.recompute_desired(camera);
            self.last_camera = Some(camera);
        }
        let center = TilePos::from_world(camera_pos, self.config.tile_width);

        // Step 2: Submit newly wanted tiles, nearest first
        self.submit_missing(center, &mut summary);

        // Step 3: Cancel in-flight tiles that are no longer wanted
        self.cancel_unwanted(&mut summary);

        // Step 4: Drop resident tiles that are no longer wanted
        let desired = &self.desired;
        let stale: Vec<TilePos> = self
            .resident
            .iter()
            .filter(|pos| !desired.contains(*pos))
            .copied()
            .collect();
        for pos in stale {
            self.resident.remove(&pos);
            scene.detach(pos);
            summary.detached += 1;
        }

        // Step 5: Apply finished jobs
        self.apply_results(scene, &mut summary);

        if summary != UpdateSummary::default() {
            trace!(?summary, "tile scene updated");
        }
        summary
    }

    /// Stop the job workers, discarding any unapplied results.
    pub fn shutdown(&mut self) -> Result<(), JobError> {
        let leftover = self.jobs.shutdown()?;
        debug!(discarded = leftover.len(), "tile scene shut down");
        self.pending.clear();
        self.cancelling.clear();
        Ok(())
    }

    fn recompute_desired(&mut self, camera: Vec2) {
        let width = self.config.tile_width;
        let distance = self.config.render_distance.max(0.0);
        let reach = distance.ceil() as i32 + 1;
        let center = TilePos::from_world(camera.extend(0.0), width);

        self.desired.clear();
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let pos = TilePos::new(center.x + dx, center.y + dy);
                if !self.types.contains(pos) {
                    continue;
                }
                let tiles_away = (pos.center(width) - camera).length() / width;
                if tiles_away <= distance {
                    self.desired.insert(pos);
                }
            }
        }

        let desired = &self.desired;
        self.attempts.retain(|pos, _| desired.contains(pos));
        debug!(center = %center, desired = self.desired.len(), "wanted tiles recomputed");
    }

    fn submit_missing(&mut self, center: TilePos, summary: &mut UpdateSummary) {
        let max_retries = self.config.max_retries;
        let mut queue: BinaryHeap<LoadPriority> = self
            .desired
            .iter()
            .filter(|pos| {
                !self.resident.contains(*pos)
                    && !self.pending.contains(*pos)
                    && !self.cancelling.contains(*pos)
                    && self.attempts.get(*pos).copied().unwrap_or(0) < max_retries
            })
            .map(|&pos| LoadPriority {
                pos,
                distance_sq: pos.distance_sq(center),
            })
            .collect();

        while let Some(entry) = queue.pop() {
            if summary.submitted >= self.config.max_submits_per_update {
                summary.deferred += queue.len() + 1;
                break;
            }

            let tile_type = self.types.get(entry.pos).copied().unwrap_or_default();
            let input = TileInput::new(entry.pos, tile_type, self.config.tile_width);
            match self.jobs.submit(entry.pos, input) {
                Ok(()) => {
                    self.pending.insert(entry.pos);
                    summary.submitted += 1;
                }
                Err(SubmitError::AlreadyQueued) => {}
                Err(SubmitError::Backpressure { .. }) => {
                    summary.deferred += queue.len() + 1;
                    break;
                }
                Err(SubmitError::ShutDown) => break,
            }
        }
    }

    fn cancel_unwanted(&mut self, summary: &mut UpdateSummary) {
        let desired = &self.desired;
        let unwanted: Vec<TilePos> = self
            .pending
            .iter()
            .filter(|pos| !desired.contains(*pos))
            .copied()
            .collect();

        for pos in unwanted {
            self.pending.remove(&pos);
            match self.jobs.cancel(&pos) {
                Cancellation::Requested => {
                    self.cancelling.insert(pos);
                }
                Cancellation::Removed | Cancellation::Unknown => {}
            }
            summary.cancelled += 1;
        }
    }

    fn apply_results<S: SceneGraph>(&mut self, scene: &mut S, summary: &mut UpdateSummary) {
        for result in self.jobs.drain() {
            let pos = result.key;
            let superseded = self.cancelling.remove(&pos);
            self.pending.remove(&pos);

            match result.outcome {
                JobOutcome::Completed(mesh) if !superseded && self.desired.contains(&pos) => {
                    scene.attach(pos, mesh);
                    self.resident.insert(pos);
                    self.attempts.remove(&pos);
                    summary.attached += 1;
                }
                JobOutcome::Completed(_) | JobOutcome::Cancelled => {
                    trace!(tile = %pos, "discarding stale tile result");
                    summary.discarded += 1;
                }
                JobOutcome::Failed(reason) => {
                    summary.failed += 1;
                    if !self.desired.contains(&pos) {
                        continue;
                    }
                    let attempts = self.attempts.entry(pos).or_insert(0);
                    *attempts += 1;
                    if *attempts >= self.config.max_retries {
                        warn!(tile = %pos, attempts = *attempts, %reason, "giving up on tile");
                    } else {
                        debug!(
                            tile = %pos,
                            attempts = *attempts,
                            %reason,
                            "tile build failed, will retry"
                        );
                    }
                }
            }
        }
    }
}
