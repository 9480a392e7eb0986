//! Headless tile streaming driver.
//!
//! Flies a camera across the configured map, streaming tiles into an
//! in-memory scene tree, and logs resident-set statistics as it goes.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use glam::Vec3;
use tracing::{debug, error, info};
use voxmap_config::{CliArgs, Config, ConfigError, default_config_dir};
use voxmap_loader::{ConfiguredSource, SourceError};
use voxmap_lod::LodError;
use voxmap_manager::{TileEvent, TileManager};
use voxmap_scene::{CameraState, SceneTree};

/// Altitude of the simulated camera above the map.
const CAMERA_ALTITUDE: f32 = 256.0;

/// How long to wait for outstanding loads after the last tick.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "voxmap", version, about = "Stream voxel map tiles around a moving camera")]
struct Args {
    #[command(flatten)]
    overrides: CliArgs,

    /// Number of camera ticks to simulate.
    #[arg(long, default_value_t = 200)]
    ticks: u32,

    /// Wall-clock time per tick in milliseconds.
    #[arg(long, default_value_t = 16)]
    tick_ms: u64,

    /// Camera speed in world units per tick, along +X.
    #[arg(long, default_value_t = 8.0)]
    speed: f32,

    /// Camera start position as `x,z`.
    #[arg(long, value_parser = parse_position, default_value = "0,0")]
    start: (f32, f32),
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("no platform config directory; pass --config")]
    NoConfigDir,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid tile source: {0}")]
    Source(#[from] SourceError),

    #[error("invalid LOD thresholds: {0}")]
    Lod(#[from] LodError),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

fn parse_position(s: &str) -> Result<(f32, f32), String> {
    let (x, z) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `x,z`, got `{s}`"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x: {e}"))?;
    let z = z.trim().parse().map_err(|e| format!("bad z: {e}"))?;
    Ok((x, z))
}

fn load_config(args: &CliArgs) -> Result<(Config, PathBuf), CliError> {
    let config_dir = match &args.config {
        Some(dir) => dir.clone(),
        None => default_config_dir().ok_or(CliError::NoConfigDir)?,
    };
    let mut config = Config::load_or_create(&config_dir)?;
    config.apply_cli_overrides(args);
    config.validate()?;
    Ok((config, config_dir))
}

fn camera_at(x: f32, z: f32) -> CameraState {
    CameraState::perspective(
        Vec3::new(x, CAMERA_ALTITUDE, z),
        Vec3::new(x + CAMERA_ALTITUDE, 0.0, z),
        60f32.to_radians(),
        16.0 / 9.0,
        0.5,
        8192.0,
    )
}

fn run(args: Args) -> Result<(), CliError> {
    let (config, config_dir) = load_config(&args.overrides)?;
    voxmap_log::init_logging(
        Some(&config_dir.join("logs")),
        cfg!(debug_assertions),
        Some(&config),
    );

    let workers = num_cpus::get().clamp(2, 8);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .thread_name("voxmap-io")
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let source = Arc::new(ConfiguredSource::from_template(&config.tiles.source)?);
    info!(
        map = %config.tiles.map_id,
        source = %config.tiles.source,
        kind = source.kind(),
        workers,
        "streaming started"
    );

    let mut manager =
        TileManager::from_config(&config, source, runtime.handle().clone(), SceneTree::new())?;
    let events = manager.events();

    let (mut x, z) = args.start;
    let tick = Duration::from_millis(args.tick_ms);
    for i in 0..args.ticks {
        let started = Instant::now();
        manager.update(&camera_at(x, z), started);
        for event in events.try_iter() {
            match &event {
                TileEvent::Failed { address, kind } => {
                    debug!(tile = %address, ?kind, "tile failed");
                }
                other => debug!(tile = %other.address(), event = ?other, "tile event"),
            }
        }
        if i % 50 == 0 {
            let stats = manager.stats();
            info!(
                tick = i,
                x,
                z,
                desired = stats.desired,
                attached = stats.attached,
                loading = stats.loading,
                deferred = stats.deferred,
                failed = stats.failed,
                cached = stats.cached,
                cached_mb = stats.cached_bytes / (1024 * 1024),
                "stream status"
            );
        }
        x += args.speed;
        std::thread::sleep(tick.saturating_sub(started.elapsed()));
    }

    let deadline = Instant::now() + SETTLE_TIMEOUT;
    while !manager.is_settled() && Instant::now() < deadline {
        manager.poll();
        std::thread::sleep(Duration::from_millis(5));
    }

    let stats = manager.stats();
    let loader = manager.loader().stats();
    info!(
        settled = manager.is_settled(),
        desired = stats.desired,
        attached = stats.attached,
        failed = stats.failed,
        scene_tiles = manager.scene().tile_count(),
        requested = loader.requested,
        joined = loader.joined,
        cancelled = loader.cancelled,
        "streaming finished"
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be initialized yet if config loading failed.
            error!("{e}");
            eprintln!("voxmap: {e}");
            ExitCode::FAILURE
        }
    }
}
