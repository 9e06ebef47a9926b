//! Viewer state and the frame loop.

use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use glam::Vec3;
use tilestream_core::constants::DEFAULT_TILE_WIDTH;
use tilestream_core::{TileGrid, TileType};
use tilestream_jobs::JobConfig;
use tilestream_world::{MeshStore, StreamingConfig, TerrainConfig, TiledScene, UpdateSummary};
use tracing::info;

/// Frames between statistics reports.
const REPORT_INTERVAL: u64 = 60;

/// Simulated frame rate.
const TARGET_FPS: u32 = 60;

/// Camera height above the ground plane.
const CAMERA_HEIGHT: f32 = 120.0;

/// Viewer configuration (from CLI or defaults).
#[derive(Debug, Clone)]
pub struct ViewerParams {
    pub frames: u64,
    pub workers: Option<usize>,
    pub soft_cap: usize,
    pub render_distance: f32,
    pub tiles: u32,
    pub seed: u64,
    pub speed: f32,
}

impl Default for ViewerParams {
    fn default() -> Self {
        let jobs = JobConfig::default();
        let streaming = StreamingConfig::default();
        Self {
            frames: 600,
            workers: None,
            soft_cap: jobs.queue_soft_cap,
            render_distance: streaming.render_distance,
            tiles: 64,
            seed: 42,
            speed: 20.0,
        }
    }
}

impl ViewerParams {
    /// Parse viewer parameters from command line arguments.
    pub fn from_args() -> anyhow::Result<Self> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self::parse(&args)
    }

    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut params = Self::default();

        let mut iter = args.iter();
        while let Some(flag) = iter.next() {
            let mut value = || {
                iter.next()
                    .map(String::as_str)
                    .with_context(|| format!("missing value for {flag}"))
            };
            match flag.as_str() {
                "--frames" => params.frames = parse_value(flag, value()?)?,
                "--workers" => params.workers = Some(parse_value(flag, value()?)?),
                "--soft-cap" => params.soft_cap = parse_value(flag, value()?)?,
                "--render-distance" => params.render_distance = parse_value(flag, value()?)?,
                "--tiles" => params.tiles = parse_value(flag, value()?)?,
                "--seed" => params.seed = parse_value(flag, value()?)?,
                "--speed" => params.speed = parse_value(flag, value()?)?,
                other => bail!("unknown argument: {other}"),
            }
        }

        if params.tiles == 0 {
            bail!("--tiles must be at least 1");
        }
        Ok(params)
    }
}

fn parse_value<T>(flag: &str, value: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("invalid value {value:?} for {flag}"))
}

/// Headless viewer: a camera flying over a streamed tile grid.
pub struct Viewer {
    tiles: TiledScene,
    store: MeshStore,
    camera: Vec3,
    speed: f32,
    frames: u64,
    world_width: f32,
}

impl Viewer {
    pub fn new(params: &ViewerParams) -> anyhow::Result<Self> {
        let mut jobs = JobConfig::default().with_soft_cap(params.soft_cap);
        if let Some(workers) = params.workers {
            jobs = jobs.with_workers(workers);
        }
        let streaming = StreamingConfig::default()
            .with_tile_width(DEFAULT_TILE_WIDTH)
            .with_render_distance(params.render_distance);
        let terrain = TerrainConfig::default().with_seed(params.seed);
        let grid = TileGrid::filled(params.tiles, params.tiles, TileType::StaticIce);

        let world_width = params.tiles as f32 * streaming.tile_width;
        let tiles = TiledScene::new(grid, streaming, terrain, jobs)
            .context("failed to start tile workers")?;

        info!(
            tiles = params.tiles,
            workers = tiles.jobs().config().worker_count,
            render_distance = tiles.config().render_distance,
            seed = params.seed,
            "starting tile streaming"
        );

        Ok(Self {
            tiles,
            store: MeshStore::new(),
            camera: Vec3::new(0.0, world_width * 0.5, CAMERA_HEIGHT),
            speed: params.speed,
            frames: params.frames,
            world_width,
        })
    }

    /// Simulate every frame, then stop the workers.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let frame_time = Duration::from_secs(1) / TARGET_FPS;
        let started = Instant::now();
        let mut totals = UpdateSummary::default();

        for frame in 0..self.frames {
            let frame_start = Instant::now();

            self.camera.x += self.speed;
            if self.camera.x > self.world_width {
                self.camera.x -= self.world_width;
            }

            let summary = self.tiles.update(self.camera, &mut self.store);
            accumulate(&mut totals, &summary);

            if frame % REPORT_INTERVAL == 0 {
                let jobs = self.tiles.jobs();
                info!(
                    frame,
                    camera_x = self.camera.x,
                    resident = self.tiles.resident_count(),
                    pending = self.tiles.pending_count(),
                    queued = jobs.queued_count(),
                    running = jobs.running_count(),
                    triangles = self.store.triangle_count(),
                    memory_kb = self.store.memory_usage() / 1024,
                    "streaming stats"
                );
            }

            if let Some(remaining) = frame_time.checked_sub(frame_start.elapsed()) {
                std::thread::sleep(remaining);
            }
        }

        self.tiles.shutdown().context("worker shutdown failed")?;

        let stats = self.tiles.jobs().stats();
        info!(
            elapsed_ms = started.elapsed().as_millis(),
            submitted = totals.submitted,
            attached = totals.attached,
            detached = totals.detached,
            cancelled = totals.cancelled,
            discarded = totals.discarded,
            failed = totals.failed,
            jobs_completed = stats.completed,
            jobs_cancelled = stats.cancelled,
            "viewer finished"
        );
        Ok(())
    }
}

fn accumulate(totals: &mut UpdateSummary, summary: &UpdateSummary) {
    totals.submitted += summary.submitted;
    totals.deferred += summary.deferred;
    totals.cancelled += summary.cancelled;
    totals.attached += summary.attached;
    totals.detached += summary.detached;
    totals.discarded += summary.discarded;
    totals.failed += summary.failed;
}
