//! Desired tile set computation.
//!
//! Every LOD 0 cell whose nearest point lies within the view radius of the
//! camera footprint is assigned a LOD by the policy and mapped to the tile
//! containing it at that LOD. Cells are visited in ascending distance and the
//! assigned LOD is the running maximum, so no cell ever gets a finer tile
//! than a closer one.
//! A coarse tile may overlap finer tiles near the band boundary.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;
use voxmap_tile::{TileAddress, TileGrid};

use crate::LodPolicy;

/// A LOD 0 cell with its distance and assigned LOD.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellLod {
    pub cell_x: i32,
    pub cell_z: i32,
    pub distance: f64,
    pub lod: u8,
}

/// A tile that should be resident, with its load priority distance.
#[derive(Clone, Debug, PartialEq)]
pub struct DesiredTile {
    pub address: TileAddress,
    /// Horizontal distance of the closest cell that selected this tile.
    pub distance: f64,
}

/// The set of tiles that should be resident for one camera state, ordered
/// by ascending distance.
#[derive(Clone, Debug, Default)]
pub struct DesiredSet {
    entries: Vec<DesiredTile>,
    index: FxHashMap<TileAddress, usize>,
}

impl DesiredSet {
    /// Build from tiles already sorted by distance; duplicates keep the first.
    fn from_sorted(tiles: impl IntoIterator<Item = DesiredTile>) -> Self {
        let mut set = Self::default();
        for tile in tiles {
            if !set.index.contains_key(&tile.address) {
                set.index.insert(tile.address.clone(), set.entries.len());
                set.entries.push(tile);
            }
        }
        set
    }

    pub fn contains(&self, address: &TileAddress) -> bool {
        self.index.contains_key(address)
    }

    /// Distance recorded for `address`, if desired.
    pub fn distance(&self, address: &TileAddress) -> Option<f64> {
        self.index.get(address).map(|&i| self.entries[i].distance)
    }

    /// Tiles in ascending distance order.
    pub fn iter(&self) -> impl Iterator<Item = &DesiredTile> {
        self.entries.iter()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &TileAddress> {
        self.entries.iter().map(|t| &t.address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Assign a LOD to each cell, visiting cells in ascending distance.
///
/// The result is sorted by `(distance, cell_x, cell_z)` and its LODs never
/// decrease, whatever `policy` returns. LODs are clamped to
/// [`TileAddress::MAX_LOD`].
pub fn assign_cell_lods(
    cells: impl IntoIterator<Item = (i32, i32, f64)>,
    policy: &impl LodPolicy,
    quality: f32,
) -> Vec<CellLod> {
    let mut cells: Vec<(i32, i32, f64)> = cells.into_iter().collect();
    cells.sort_by(|a, b| {
        a.2.total_cmp(&b.2)
            .then(a.0.cmp(&b.0))
            .then(a.1.cmp(&b.1))
    });

    let mut floor = 0u8;
    cells
        .into_iter()
        .map(|(cell_x, cell_z, distance)| {
            let lod = policy
                .select_lod(distance, quality)
                .min(TileAddress::MAX_LOD)
                .max(floor);
            floor = lod;
            CellLod {
                cell_x,
                cell_z,
                distance,
                lod,
            }
        })
        .collect()
}

/// Compute the tiles that should be resident for a camera at `footprint`.
pub fn compute_desired(
    map_id: &Arc<str>,
    grid: &TileGrid,
    footprint: (f64, f64),
    view_radius: f64,
    policy: &impl LodPolicy,
    quality: f32,
) -> DesiredSet {
    let (cx, cz) = footprint;
    if !(view_radius.is_finite() && view_radius >= 0.0 && cx.is_finite() && cz.is_finite()) {
        return DesiredSet::default();
    }

    let (min_x, min_z) = grid.cell_at(cx - view_radius, cz - view_radius);
    let (max_x, max_z) = grid.cell_at(cx + view_radius, cz + view_radius);

    let half = grid.tile_size as f64 * 0.5;
    let cells = (min_x..=max_x).flat_map(|x| (min_z..=max_z).map(move |z| (x, z)));
    let in_range = cells.filter_map(|(x, z)| {
        // Distance to the nearest point of the cell, zero under the camera.
        let (px, pz) = grid.cell_center(x, z);
        let dx = ((px - cx).abs() - half).max(0.0);
        let dz = ((pz - cz).abs() - half).max(0.0);
        let distance = (dx * dx + dz * dz).sqrt();
        (distance <= view_radius).then_some((x, z, distance))
    });

    let assigned = assign_cell_lods(in_range, policy, quality);
    let set = DesiredSet::from_sorted(assigned.into_iter().map(|cell| DesiredTile {
        address: TileAddress::containing(map_id, cell.lod, cell.cell_x, cell.cell_z),
        distance: cell.distance,
    }));
    trace!(tiles = set.len(), radius = view_radius, "computed desired set");
    set
}
