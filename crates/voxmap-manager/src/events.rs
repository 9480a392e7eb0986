use voxmap_scene::NodeId;
use voxmap_tile::{TileAddress, TileErrorKind};

/// Diagnostic notifications emitted by the [`TileManager`](crate::TileManager).
#[derive(Clone, Debug, PartialEq)]
pub enum TileEvent {
    /// A tile was attached to the scene.
    Attached { address: TileAddress, node: NodeId },
    /// A tile left the desired set and was detached. Its geometry stays
    /// cached while the budget allows.
    Detached { address: TileAddress, node: NodeId },
    /// A load failed. `NotFound` tiles are not requested again this session.
    Failed {
        address: TileAddress,
        kind: TileErrorKind,
    },
    /// The cache had no room beside the attached tiles; the load waits until
    /// capacity frees.
    Deferred { address: TileAddress },
    /// A detached tile was dropped from the cache to stay within budget.
    Evicted { address: TileAddress },
}

impl TileEvent {
    pub fn address(&self) -> &TileAddress {
        match self {
            TileEvent::Attached { address, .. }
            | TileEvent::Detached { address, .. }
            | TileEvent::Failed { address, .. }
            | TileEvent::Deferred { address }
            | TileEvent::Evicted { address } => address,
        }
    }
}

/// Snapshot of the manager's bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ManagerStats {
    /// Tiles in the current desired set.
    pub desired: usize,
    /// Tiles attached to the scene.
    pub attached: usize,
    /// Loads queued or running.
    pub loading: usize,
    /// Loads waiting for cache capacity.
    pub deferred: usize,
    /// Desired tiles whose load failed.
    pub failed: usize,
    /// Tiles held by the cache, attached or not.
    pub cached: usize,
    /// Approximate bytes held by the cache.
    pub cached_bytes: usize,
}
