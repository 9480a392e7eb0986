//! Tile addressing: map id, LOD level, and grid coordinate.

use std::fmt;
use std::sync::Arc;

/// Identifies a tile by map, level of detail, and grid coordinate.
///
/// A tile at LOD `n` covers `2^n × 2^n` LOD 0 cells, so the grid coordinate
/// is expressed in units of that tile's own span. Equality and hashing are by
/// the full `(map_id, lod, x, z)` tuple; the map id is shared via `Arc<str>`
/// so addresses clone cheaply.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileAddress {
    /// Map the tile belongs to (e.g. `overworld`).
    pub map_id: Arc<str>,
    /// Level of detail, 0 = finest.
    pub lod: u8,
    /// Grid X coordinate at this LOD.
    pub x: i32,
    /// Grid Z coordinate at this LOD.
    pub z: i32,
}

impl TileAddress {
    /// Highest LOD level whose span still fits in an `i32` cell shift.
    pub const MAX_LOD: u8 = 30;

    /// Create a new tile address.
    pub fn new(map_id: impl Into<Arc<str>>, lod: u8, x: i32, z: i32) -> Self {
        debug_assert!(lod <= Self::MAX_LOD, "lod {lod} out of range");
        Self {
            map_id: map_id.into(),
            lod,
            x,
            z,
        }
    }

    /// The tile at `lod` that contains the LOD 0 cell `(cell_x, cell_z)`.
    ///
    /// Uses floor division so negative cells map to negative tiles.
    pub fn containing(map_id: &Arc<str>, lod: u8, cell_x: i32, cell_z: i32) -> Self {
        let span = 1i32 << lod.min(Self::MAX_LOD);
        Self {
            map_id: Arc::clone(map_id),
            lod,
            x: cell_x.div_euclid(span),
            z: cell_z.div_euclid(span),
        }
    }

    /// Address of the tile one LOD coarser that contains this one.
    pub fn parent(&self) -> Self {
        Self {
            map_id: Arc::clone(&self.map_id),
            lod: self.lod + 1,
            x: self.x.div_euclid(2),
            z: self.z.div_euclid(2),
        }
    }

    /// Number of LOD 0 cells along one edge of this tile.
    pub fn cell_span(&self) -> i64 {
        1i64 << self.lod
    }

    /// Whether this tile covers the LOD 0 cell `(cell_x, cell_z)`.
    pub fn contains_cell(&self, cell_x: i32, cell_z: i32) -> bool {
        *self == Self::containing(&self.map_id, self.lod, cell_x, cell_z)
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.map_id, self.lod, self.x, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_by_field_tuple() {
        let a = TileAddress::new("overworld", 0, 5, 5);
        let b = TileAddress::new(String::from("overworld"), 0, 5, 5);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        assert!(!set.contains(&TileAddress::new("nether", 0, 5, 5)));
        assert!(!set.contains(&TileAddress::new("overworld", 1, 5, 5)));
    }

    #[test]
    fn test_containing_positive_cells() {
        let map: Arc<str> = Arc::from("overworld");
        assert_eq!(
            TileAddress::containing(&map, 0, 7, 3),
            TileAddress::new("overworld", 0, 7, 3)
        );
        assert_eq!(
            TileAddress::containing(&map, 2, 7, 3),
            TileAddress::new("overworld", 2, 1, 0)
        );
    }

    #[test]
    fn test_containing_negative_cells_floor() {
        let map: Arc<str> = Arc::from("overworld");
        // Cell -1 belongs to tile -1 at every LOD, not tile 0.
        assert_eq!(
            TileAddress::containing(&map, 1, -1, -1),
            TileAddress::new("overworld", 1, -1, -1)
        );
        assert_eq!(
            TileAddress::containing(&map, 2, -5, 4),
            TileAddress::new("overworld", 2, -2, 1)
        );
    }

    #[test]
    fn test_parent_is_one_lod_coarser() {
        let tile = TileAddress::new("overworld", 0, -3, 5);
        let parent = tile.parent();
        assert_eq!(parent, TileAddress::new("overworld", 1, -2, 2));
        assert!(parent.contains_cell(-3, 5));
    }

    #[test]
    fn test_cell_span() {
        assert_eq!(TileAddress::new("m", 0, 0, 0).cell_span(), 1);
        assert_eq!(TileAddress::new("m", 3, 0, 0).cell_span(), 8);
    }

    #[test]
    fn test_display() {
        let tile = TileAddress::new("overworld", 2, -4, 9);
        assert_eq!(tile.to_string(), "overworld/2/-4/9");
    }
}
