//! World-space geometry of the tile grid.

use glam::Vec3;

use crate::{Aabb, TileAddress};

/// Maps tile addresses and LOD 0 cells to world-space extents.
///
/// A LOD 0 tile is `tile_size` world units on a side; each LOD step doubles
/// the span. Tiles cover the full `min_y..max_y` height range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileGrid {
    /// Edge length of a LOD 0 tile in world units.
    pub tile_size: f32,
    /// Lowest world Y covered by tile bounds.
    pub min_y: f32,
    /// Highest world Y covered by tile bounds.
    pub max_y: f32,
}

impl Default for TileGrid {
    fn default() -> Self {
        Self {
            tile_size: 32.0,
            min_y: -64.0,
            max_y: 320.0,
        }
    }
}

impl TileGrid {
    /// Create a grid description.
    pub fn new(tile_size: f32, min_y: f32, max_y: f32) -> Self {
        debug_assert!(tile_size > 0.0, "tile_size must be positive");
        Self {
            tile_size,
            min_y: min_y.min(max_y),
            max_y: max_y.max(min_y),
        }
    }

    /// Edge length in world units of a tile at `lod`.
    pub fn tile_span(&self, lod: u8) -> f64 {
        self.tile_size as f64 * (1u64 << lod) as f64
    }

    /// World-space bounds of the tile at `address`.
    pub fn bounds(&self, address: &TileAddress) -> Aabb {
        let span = self.tile_span(address.lod);
        let x0 = address.x as f64 * span;
        let z0 = address.z as f64 * span;
        Aabb::new(
            Vec3::new(x0 as f32, self.min_y, z0 as f32),
            Vec3::new((x0 + span) as f32, self.max_y, (z0 + span) as f32),
        )
    }

    /// LOD 0 cell containing the world position `(x, z)`.
    pub fn cell_at(&self, x: f64, z: f64) -> (i32, i32) {
        let size = self.tile_size as f64;
        ((x / size).floor() as i32, (z / size).floor() as i32)
    }

    /// World-space center of a LOD 0 cell, horizontal components only.
    pub fn cell_center(&self, cell_x: i32, cell_z: i32) -> (f64, f64) {
        let size = self.tile_size as f64;
        (
            (cell_x as f64 + 0.5) * size,
            (cell_z as f64 + 0.5) * size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_span_doubles_per_lod() {
        let grid = TileGrid::new(32.0, 0.0, 256.0);
        assert_eq!(grid.tile_span(0), 32.0);
        assert_eq!(grid.tile_span(1), 64.0);
        assert_eq!(grid.tile_span(3), 256.0);
    }

    #[test]
    fn test_bounds_cover_tile_footprint() {
        let grid = TileGrid::new(32.0, -64.0, 320.0);
        let bounds = grid.bounds(&TileAddress::new("overworld", 1, -1, 2));
        assert_eq!(bounds.min, Vec3::new(-64.0, -64.0, 128.0));
        assert_eq!(bounds.max, Vec3::new(0.0, 320.0, 192.0));
    }

    #[test]
    fn test_cell_at_floors_negative_positions() {
        let grid = TileGrid::new(16.0, 0.0, 1.0);
        assert_eq!(grid.cell_at(0.0, 15.9), (0, 0));
        assert_eq!(grid.cell_at(-0.1, 16.0), (-1, 1));
    }

    #[test]
    fn test_cell_center() {
        let grid = TileGrid::new(16.0, 0.0, 1.0);
        assert_eq!(grid.cell_center(0, -1), (8.0, -8.0));
    }

    #[test]
    fn test_new_orders_height_range() {
        let grid = TileGrid::new(8.0, 100.0, -10.0);
        assert_eq!(grid.min_y, -10.0);
        assert_eq!(grid.max_y, 100.0);
    }
}
