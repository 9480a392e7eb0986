use crate::{Aabb, TileAddress, TileErrorKind, TileGeometry};

/// Lifecycle state of a tile as seen by the resident-set manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileState {
    /// Requested; fetch/decode pending.
    Loading,
    /// Decoded and attached to the scene.
    Ready,
    /// Load failed with the given classification. `CapacityExceeded`
    /// tiles are waiting for cache capacity and load again once it frees.
    Failed(TileErrorKind),
    /// Removed from the resident set; geometry may still be cached.
    Evicted,
}

/// One decoded, renderable tile.
///
/// Tiles are immutable once decoded and shared as `Arc<Tile>` between the
/// loader, the cache, and the scene graph. Lifecycle state lives with the
/// manager, not on the tile, since a failed load never produces a `Tile`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub address: TileAddress,
    pub geometry: TileGeometry,
    /// World-space bounds of the tile's footprint, used for culling and distance tests.
    pub bounds: Aabb,
}

impl Tile {
    /// Create a tile.
    pub fn new(address: TileAddress, geometry: TileGeometry, bounds: Aabb) -> Self {
        Self {
            address,
            geometry,
            bounds,
        }
    }

    /// Approximate memory held by the tile, for the cache byte budget.
    pub fn byte_size(&self) -> usize {
        self.geometry.byte_size() + std::mem::size_of::<Tile>() + self.address.map_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TileGrid, TileVertex};

    #[test]
    fn test_byte_size_grows_with_geometry() {
        let address = TileAddress::new("overworld", 0, 0, 0);
        let bounds = TileGrid::default().bounds(&address);
        let empty = Tile::new(address.clone(), TileGeometry::default(), bounds);
        let full = Tile::new(
            address,
            TileGeometry::new(vec![TileVertex::default(); 30], Vec::new()),
            bounds,
        );
        assert!(empty.byte_size() > 0);
        assert_eq!(full.byte_size() - empty.byte_size(), 30 * TileVertex::STRIDE);
    }
}
