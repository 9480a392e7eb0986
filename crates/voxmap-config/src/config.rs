//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration for the tile streaming core.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Tile data source and grid geometry.
    pub tiles: TilesConfig,
    /// Level-of-detail policy.
    pub lod: LodConfig,
    /// Tile fetch/decode settings.
    pub loader: LoaderConfig,
    /// Decoded tile cache budget.
    pub cache: CacheConfig,
    /// Resident-set manager settings.
    pub manager: ManagerConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Tile data source and grid geometry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TilesConfig {
    /// Map to stream (e.g. `overworld`, `nether`).
    pub map_id: String,
    /// URL or path template. Placeholders: `{map}`, `{lod}`, `{x}`, `{z}`.
    /// Templates starting with `http://` or `https://` are fetched over HTTP,
    /// anything else is resolved on the local filesystem.
    pub source: String,
    /// Edge length of a LOD 0 tile in world units (blocks).
    pub tile_size: f32,
    /// Lowest world Y covered by tile bounds.
    pub min_y: f32,
    /// Highest world Y covered by tile bounds.
    pub max_y: f32,
}

/// Level-of-detail policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Distance boundaries between LOD levels, strictly increasing.
    /// `thresholds[i]` is the maximum distance served at LOD `i`.
    pub thresholds: Vec<f64>,
    /// Quality multiplier applied to the thresholds (higher = finer detail further out).
    pub quality: f32,
    /// Radius around the camera footprint within which tiles are resident.
    pub view_radius: f64,
}

/// Tile loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoaderConfig {
    /// Maximum number of simultaneous fetch+decode operations.
    pub max_in_flight: usize,
    /// Per-attempt timeout in milliseconds. Timeouts count as network errors.
    pub timeout_ms: u64,
    /// Total fetch attempts per load, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    pub initial_backoff_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
    /// Upper bound on the retry delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Jitter factor (0.0 - 1.0), applied as +/- jitter to each delay.
    pub jitter: f64,
}

/// Decoded tile cache budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of decoded tiles kept in memory.
    pub max_tiles: usize,
    /// Maximum bytes of decoded geometry kept in memory.
    pub max_bytes: usize,
}

/// Resident-set manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ManagerConfig {
    /// Minimum time between two desired-set recomputations, in milliseconds.
    pub min_update_interval_ms: u64,
    /// Distance added to the load priority of tiles outside the view frustum.
    pub offscreen_penalty: f64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for TilesConfig {
    fn default() -> Self {
        Self {
            map_id: "overworld".to_string(),
            source: "http://localhost:8100/maps/{map}/tiles/{lod}/x{x}/z{z}.vxmt".to_string(),
            tile_size: 32.0,
            min_y: -64.0,
            max_y: 320.0,
        }
    }
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            thresholds: vec![256.0, 512.0, 1024.0, 2048.0],
            quality: 1.0,
            view_radius: 1500.0,
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 6,
            timeout_ms: 10_000,
            max_attempts: 5,
            initial_backoff_ms: 250,
            backoff_multiplier: 2.0,
            max_backoff_ms: 8_000,
            jitter: 0.25,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_tiles: 4096,
            max_bytes: 512 * 1024 * 1024, // 512 MB
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            min_update_interval_ms: 50,
            offscreen_penalty: 0.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Platform config directory for voxmap (`<config_dir>/voxmap`), if one exists.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("voxmap"))
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tiles.map_id.is_empty() {
            return Err(invalid("tiles.map_id", "must not be empty"));
        }
        if !(self.tiles.tile_size.is_finite() && self.tiles.tile_size > 0.0) {
            return Err(invalid("tiles.tile_size", "must be a positive number"));
        }
        if self.tiles.min_y > self.tiles.max_y {
            return Err(invalid("tiles.min_y", "must not exceed tiles.max_y"));
        }
        for (i, &t) in self.lod.thresholds.iter().enumerate() {
            if !(t.is_finite() && t > 0.0) {
                return Err(invalid("lod.thresholds", "thresholds must be positive"));
            }
            if i > 0 && t <= self.lod.thresholds[i - 1] {
                return Err(invalid(
                    "lod.thresholds",
                    "thresholds must be strictly increasing",
                ));
            }
        }
        if !(self.lod.quality.is_finite() && self.lod.quality > 0.0) {
            return Err(invalid("lod.quality", "must be a positive number"));
        }
        if !(self.lod.view_radius.is_finite() && self.lod.view_radius > 0.0) {
            return Err(invalid("lod.view_radius", "must be a positive number"));
        }
        if self.loader.max_in_flight == 0 {
            return Err(invalid("loader.max_in_flight", "must be at least 1"));
        }
        if self.loader.max_attempts == 0 {
            return Err(invalid("loader.max_attempts", "must be at least 1"));
        }
        if self.loader.backoff_multiplier < 1.0 {
            return Err(invalid("loader.backoff_multiplier", "must be >= 1.0"));
        }
        if !(0.0..=1.0).contains(&self.loader.jitter) {
            return Err(invalid("loader.jitter", "must be within 0.0..=1.0"));
        }
        if self.cache.max_tiles == 0 {
            return Err(invalid("cache.max_tiles", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
