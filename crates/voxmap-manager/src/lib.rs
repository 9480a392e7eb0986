//! Resident-set management for streamed map tiles.
//!
//! [`TileManager`] turns camera updates into a desired tile set, diffs it
//! against what is loading or attached, drives the [`TileLoader`] and
//! [`TileCache`], and attaches finished tiles to the scene graph. Everything
//! here runs on the thread that owns the manager.
//!
//! [`TileLoader`]: voxmap_loader::TileLoader
//! [`TileCache`]: voxmap_cache::TileCache

mod events;
mod manager;

pub use events::{ManagerStats, TileEvent};
pub use manager::{ManagerSettings, TileManager};
