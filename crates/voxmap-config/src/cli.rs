//! Command-line argument parsing for voxmap.

use std::path::PathBuf;

use clap::Args;

use crate::Config;

/// Configuration overrides accepted on the command line.
///
/// CLI values override settings loaded from `config.ron`. Binaries embed this
/// with `#[command(flatten)]`.
#[derive(Args, Debug, Default, Clone)]
pub struct CliArgs {
    /// Map to stream.
    #[arg(long)]
    pub map: Option<String>,

    /// Tile source URL or path template.
    #[arg(long)]
    pub source: Option<String>,

    /// LOD quality multiplier.
    #[arg(long)]
    pub quality: Option<f32>,

    /// View radius in world units.
    #[arg(long)]
    pub view_radius: Option<f64>,

    /// Maximum simultaneous tile loads.
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Maximum number of cached tiles.
    #[arg(long)]
    pub max_tiles: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref map) = args.map {
            self.tiles.map_id = map.clone();
        }
        if let Some(ref source) = args.source {
            self.tiles.source = source.clone();
        }
        if let Some(quality) = args.quality {
            self.lod.quality = quality;
        }
        if let Some(radius) = args.view_radius {
            self.lod.view_radius = radius;
        }
        if let Some(n) = args.max_in_flight {
            self.loader.max_in_flight = n;
        }
        if let Some(n) = args.max_tiles {
            self.cache.max_tiles = n;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
