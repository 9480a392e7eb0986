//! Bounded in-memory store of decoded tiles.
//!
//! [`TileCache`] keeps decoded tiles keyed by address under a tile-count and
//! byte budget. Tiles attached to the scene are pinned and never evicted;
//! the rest are evicted least-recently-used first. Addresses the data source
//! reported as missing are remembered in a negative cache for the session.

mod budget;
mod cache;

pub use budget::CacheBudget;
pub use cache::TileCache;
