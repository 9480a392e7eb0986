//! Configuration system for the voxmap tile streaming core.
//!
//! Provides runtime-configurable settings that persist to disk as RON files.
//! Supports CLI overrides via clap, hot-reload detection, validation, and
//! forward/backward compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CacheConfig, Config, DebugConfig, LoaderConfig, LodConfig, ManagerConfig, TilesConfig,
    default_config_dir,
};
pub use error::ConfigError;
