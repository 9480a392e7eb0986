use voxmap_config::CacheConfig;

/// Limits on what a [`TileCache`](crate::TileCache) may hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheBudget {
    /// Maximum number of cached tiles, attached or not.
    pub max_tiles: usize,
    /// Maximum approximate bytes of cached tiles.
    pub max_bytes: usize,
}

impl Default for CacheBudget {
    fn default() -> Self {
        Self {
            max_tiles: 4096,
            max_bytes: 512 * 1024 * 1024, // 512 MB
        }
    }
}

impl CacheBudget {
    #[must_use]
    pub fn new(max_tiles: usize, max_bytes: usize) -> Self {
        Self {
            max_tiles,
            max_bytes,
        }
    }

    /// Build from the `[cache]` configuration section.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_tiles, config.max_bytes)
    }

    /// Whether `tiles` entries totalling `bytes` exceed the budget.
    #[must_use]
    pub fn is_exceeded_by(&self, tiles: usize, bytes: usize) -> bool {
        tiles > self.max_tiles || bytes > self.max_bytes
    }
}
