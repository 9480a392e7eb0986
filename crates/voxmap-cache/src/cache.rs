use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;
use voxmap_config::CacheConfig;
use voxmap_tile::{Tile, TileAddress};

use crate::CacheBudget;

struct CacheEntry {
    tile: Arc<Tile>,
    bytes: usize,
    /// Attached to the scene; never an eviction candidate.
    pinned: bool,
    /// Logical clock value of the last access.
    last_used: u64,
}

/// LRU tile cache with pinning and a negative cache.
///
/// Owned and mutated only by the tile manager's thread.
pub struct TileCache {
    budget: CacheBudget,
    entries: FxHashMap<TileAddress, CacheEntry>,
    absent: FxHashSet<TileAddress>,
    clock: u64,
    total_bytes: usize,
    pinned_count: usize,
    pinned_bytes: usize,
}

impl TileCache {
    /// Create an empty cache with the given budget.
    #[must_use]
    pub fn new(budget: CacheBudget) -> Self {
        Self {
            budget,
            entries: FxHashMap::default(),
            absent: FxHashSet::default(),
            clock: 0,
            total_bytes: 0,
            pinned_count: 0,
            pinned_bytes: 0,
        }
    }

    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(CacheBudget::from_config(config))
    }

    /// Look up a tile and mark it most recently used.
    pub fn get(&mut self, address: &TileAddress) -> Option<Arc<Tile>> {
        let now = self.tick();
        let entry = self.entries.get_mut(address)?;
        entry.last_used = now;
        Some(Arc::clone(&entry.tile))
    }

    /// Look up a tile without touching its recency.
    #[must_use]
    pub fn peek(&self, address: &TileAddress) -> Option<&Arc<Tile>> {
        self.entries.get(address).map(|e| &e.tile)
    }

    #[must_use]
    pub fn contains(&self, address: &TileAddress) -> bool {
        self.entries.contains_key(address)
    }

    /// Insert a tile under its own address as most recently used.
    ///
    /// Replacing an existing entry keeps its pinned flag. Returns the
    /// replaced tile. Does not enforce the budget; call
    /// [`enforce_budget`](Self::enforce_budget) afterwards.
    pub fn put(&mut self, tile: Arc<Tile>) -> Option<Arc<Tile>> {
        let now = self.tick();
        let bytes = tile.byte_size();
        let address = tile.address.clone();
        self.absent.remove(&address);

        let pinned = self.entries.get(&address).is_some_and(|e| e.pinned);
        let entry = CacheEntry {
            tile,
            bytes,
            pinned,
            last_used: now,
        };
        let replaced = self.entries.insert(address, entry);
        if let Some(old) = &replaced {
            self.total_bytes -= old.bytes;
            if old.pinned {
                self.pinned_bytes -= old.bytes;
            }
        }
        self.total_bytes += bytes;
        if pinned {
            self.pinned_bytes += bytes;
        }
        replaced.map(|e| e.tile)
    }

    /// Remove a tile. Pinned tiles are refused and `None` is returned.
    pub fn evict(&mut self, address: &TileAddress) -> Option<Arc<Tile>> {
        if self.entries.get(address)?.pinned {
            return None;
        }
        let entry = self.entries.remove(address)?;
        self.total_bytes -= entry.bytes;
        Some(entry.tile)
    }

    /// Mark a cached tile as attached. Returns `false` if it is not cached.
    pub fn pin(&mut self, address: &TileAddress) -> bool {
        let now = self.tick();
        let Some(entry) = self.entries.get_mut(address) else {
            return false;
        };
        entry.last_used = now;
        if !entry.pinned {
            entry.pinned = true;
            self.pinned_count += 1;
            self.pinned_bytes += entry.bytes;
        }
        true
    }

    /// Mark a cached tile as detached, making it an eviction candidate.
    pub fn unpin(&mut self, address: &TileAddress) -> bool {
        let Some(entry) = self.entries.get_mut(address) else {
            return false;
        };
        if entry.pinned {
            entry.pinned = false;
            self.pinned_count -= 1;
            self.pinned_bytes -= entry.bytes;
        }
        true
    }

    #[must_use]
    pub fn is_pinned(&self, address: &TileAddress) -> bool {
        self.entries.get(address).is_some_and(|e| e.pinned)
    }

    /// Evict least-recently-used unpinned tiles until the cache is within
    /// budget or no candidates remain. Returns the evicted addresses in
    /// eviction order.
    pub fn enforce_budget(&mut self) -> Vec<TileAddress> {
        if !self.is_over_budget() {
            return Vec::new();
        }

        let mut candidates: Vec<(u64, TileAddress)> = self
            .entries
            .iter()
            .filter(|(_, e)| !e.pinned)
            .map(|(addr, e)| (e.last_used, addr.clone()))
            .collect();
        candidates.sort_unstable_by_key(|(last_used, _)| *last_used);

        let mut evicted = Vec::new();
        for (_, address) in candidates {
            if !self.is_over_budget() {
                break;
            }
            if self.evict(&address).is_some() {
                evicted.push(address);
            }
        }

        if !evicted.is_empty() {
            debug!(
                evicted = evicted.len(),
                tiles = self.entries.len(),
                bytes = self.total_bytes,
                "cache budget enforced"
            );
        }
        evicted
    }

    /// Whether the cache currently exceeds its budget.
    #[must_use]
    pub fn is_over_budget(&self) -> bool {
        self.budget
            .is_exceeded_by(self.entries.len(), self.total_bytes)
    }

    /// Whether one more tile of `bytes` could be held without exceeding the
    /// budget once every unpinned tile is evicted.
    #[must_use]
    pub fn can_admit(&self, bytes: usize) -> bool {
        self.can_reserve(1, bytes)
    }

    /// Whether `tiles` more attached tiles totalling `bytes` would fit beside
    /// the tiles already pinned.
    #[must_use]
    pub fn can_reserve(&self, tiles: usize, bytes: usize) -> bool {
        !self.budget.is_exceeded_by(
            self.pinned_count.saturating_add(tiles),
            self.pinned_bytes.saturating_add(bytes),
        )
    }

    /// Record that the data source has no tile at `address`.
    pub fn mark_absent(&mut self, address: TileAddress) {
        self.absent.insert(address);
    }

    /// Whether `address` was reported missing earlier in this session.
    #[must_use]
    pub fn is_absent(&self, address: &TileAddress) -> bool {
        self.absent.contains(address)
    }

    /// Drop every tile, pinned or not, and the negative cache.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.absent.clear();
        self.total_bytes = 0;
        self.pinned_count = 0;
        self.pinned_bytes = 0;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    #[must_use]
    pub fn pinned_count(&self) -> usize {
        self.pinned_count
    }

    #[must_use]
    pub fn absent_count(&self) -> usize {
        self.absent.len()
    }

    #[must_use]
    pub fn budget(&self) -> &CacheBudget {
        &self.budget
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxmap_tile::{TileGeometry, TileGrid, TileVertex};

    fn tile(x: i32) -> Arc<Tile> {
        tile_with_vertices(x, 0)
    }

    fn tile_with_vertices(x: i32, vertices: usize) -> Arc<Tile> {
        let address = TileAddress::new("overworld", 0, x, 0);
        let bounds = TileGrid::default().bounds(&address);
        let geometry = TileGeometry::new(vec![TileVertex::default(); vertices], Vec::new());
        Arc::new(Tile::new(address, geometry, bounds))
    }

    fn addr(x: i32) -> TileAddress {
        TileAddress::new("overworld", 0, x, 0)
    }

    /// Tiles are evicted oldest first once the count budget is exceeded.
    #[test]
    fn test_lru_eviction_order() {
        let mut cache = TileCache::new(CacheBudget::new(2, usize::MAX));
        cache.put(tile(1));
        cache.put(tile(2));
        cache.put(tile(3));
        assert_eq!(cache.enforce_budget(), vec![addr(1)]);
        assert_eq!(cache.len(), 2);
    }

    /// A lookup refreshes recency.
    #[test]
    fn test_get_touches_entry() {
        let mut cache = TileCache::new(CacheBudget::new(2, usize::MAX));
        cache.put(tile(1));
        cache.put(tile(2));
        assert!(cache.get(&addr(1)).is_some());
        cache.put(tile(3));
        assert_eq!(cache.enforce_budget(), vec![addr(2)]);

        // peek does not.
        assert!(cache.peek(&addr(1)).is_some());
        cache.put(tile(4));
        assert_eq!(cache.enforce_budget(), vec![addr(1)]);
    }

    #[test]
    fn test_pinned_tiles_never_evicted() {
        let mut cache = TileCache::new(CacheBudget::new(1, usize::MAX));
        cache.put(tile(1));
        cache.put(tile(2));
        assert!(cache.pin(&addr(1)));
        assert!(cache.pin(&addr(2)));

        assert!(cache.enforce_budget().is_empty());
        assert!(cache.is_over_budget());
        assert!(cache.evict(&addr(1)).is_none());
        assert!(cache.contains(&addr(1)));

        assert!(cache.unpin(&addr(1)));
        assert_eq!(cache.enforce_budget(), vec![addr(1)]);
        assert!(cache.contains(&addr(2)));
    }

    #[test]
    fn test_byte_budget_enforced() {
        let small = tile_with_vertices(1, 3);
        let budget_bytes = small.byte_size() * 2;
        let mut cache = TileCache::new(CacheBudget::new(100, budget_bytes));
        cache.put(small);
        cache.put(tile_with_vertices(2, 3));
        assert!(!cache.is_over_budget());
        cache.put(tile_with_vertices(3, 3));
        assert_eq!(cache.enforce_budget(), vec![addr(1)]);
        assert!(cache.total_bytes() <= budget_bytes);
    }

    #[test]
    fn test_replacing_keeps_pin_and_byte_count() {
        let mut cache = TileCache::new(CacheBudget::default());
        cache.put(tile_with_vertices(1, 3));
        cache.pin(&addr(1));
        let replaced = cache.put(tile_with_vertices(1, 6));
        assert_eq!(replaced.map(|t| t.geometry.vertex_count()), Some(3));
        assert!(cache.is_pinned(&addr(1)));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_bytes(), tile_with_vertices(1, 6).byte_size());
    }

    #[test]
    fn test_can_admit_counts_only_pinned_tiles() {
        let mut cache = TileCache::new(CacheBudget::new(2, usize::MAX));
        cache.put(tile(1));
        cache.put(tile(2));
        // Unpinned entries can always make room.
        assert!(cache.can_admit(1));

        cache.pin(&addr(1));
        assert!(cache.can_admit(1));
        cache.pin(&addr(2));
        assert!(!cache.can_admit(1));

        cache.unpin(&addr(2));
        assert!(cache.can_admit(1));
    }

    #[test]
    fn test_can_admit_respects_bytes() {
        let pinned = tile_with_vertices(1, 3);
        let mut cache = TileCache::new(CacheBudget::new(10, pinned.byte_size() + 100));
        cache.put(pinned);
        cache.pin(&addr(1));
        assert!(cache.can_admit(100));
        assert!(!cache.can_admit(101));
    }

    #[test]
    fn test_can_reserve_several_slots() {
        let mut cache = TileCache::new(CacheBudget::new(4, usize::MAX));
        cache.put(tile(1));
        cache.pin(&addr(1));
        assert!(cache.can_reserve(3, 0));
        assert!(!cache.can_reserve(4, 0));
    }

    #[test]
    fn test_negative_cache() {
        let mut cache = TileCache::new(CacheBudget::default());
        assert!(!cache.is_absent(&addr(9)));
        cache.mark_absent(addr(9));
        assert!(cache.is_absent(&addr(9)));
        assert_eq!(cache.absent_count(), 1);

        cache.clear();
        assert!(!cache.is_absent(&addr(9)));
    }

    #[test]
    fn test_clear_resets_accounting() {
        let mut cache = TileCache::new(CacheBudget::new(1, usize::MAX));
        cache.put(tile(1));
        cache.pin(&addr(1));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.total_bytes(), 0);
        assert_eq!(cache.pinned_count(), 0);
        assert!(cache.can_admit(1));
    }

    #[test]
    fn test_pin_unknown_address_fails() {
        let mut cache = TileCache::new(CacheBudget::default());
        assert!(!cache.pin(&addr(1)));
        assert!(!cache.unpin(&addr(1)));
        assert!(cache.evict(&addr(1)).is_none());
    }
}
