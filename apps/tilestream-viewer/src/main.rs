//! Tilestream Headless Viewer
//!
//! Flies a camera across a tiled terrain grid and streams tile meshes in and
//! out through the async job handler. Nothing is rendered; the mesh store and
//! streaming statistics are logged instead.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p tilestream-viewer -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--frames <N>`: Number of frames to simulate (default: 600)
//! - `--workers <N>`: Worker threads (default: available cores minus one)
//! - `--soft-cap <N>`: Queued job soft cap (default: 256)
//! - `--render-distance <N>`: Render distance in tiles (default: 20)
//! - `--tiles <N>`: Grid edge length in tiles (default: 64)
//! - `--seed <N>`: Height field seed (default: 42)
//! - `--speed <N>`: Camera movement per frame in world units (default: 20)
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use tracing_subscriber::EnvFilter;

use crate::app::{Viewer, ViewerParams};

fn main() -> anyhow::Result<()> {
    // Check for help flag before starting the app
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let params = ViewerParams::from_args()?;
    let mut viewer = Viewer::new(&params)?;
    viewer.run()
}

fn print_help() {
    eprintln!(
        "Tilestream Headless Viewer

USAGE:
    cargo run -p tilestream-viewer -- [OPTIONS]

SIMULATION OPTIONS:
    --frames <N>            Number of frames to simulate (default: 600)
    --speed <N>             Camera movement per frame in world units (default: 20)

STREAMING OPTIONS:
    --workers <N>           Worker threads (default: available cores minus one)
    --soft-cap <N>          Queued job soft cap (default: 256)
    --render-distance <N>   Render distance in tiles (default: 20)
    --tiles <N>             Grid edge length in tiles (default: 64)
    --seed <N>              Height field seed (default: 42)

OTHER:
    -h, --help              Print this help message

EXAMPLES:
    # Default flight across a 64x64 grid
    cargo run -p tilestream-viewer

    # Single worker, small render distance
    cargo run -p tilestream-viewer -- --workers 1 --render-distance 4

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
