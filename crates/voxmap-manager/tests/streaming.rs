//! End-to-end streaming runs over an in-memory tile source.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec3;
use voxmap_cache::{CacheBudget, TileCache};
use voxmap_config::Config;
use voxmap_loader::{LoaderSettings, MemoryTileSource, RetryPolicy, TileLoader};
use voxmap_lod::{LodThresholds, ThresholdPolicy};
use voxmap_manager::{ManagerSettings, TileEvent, TileManager};
use voxmap_scene::{CameraState, SceneTree};
use voxmap_tile::{Tile, TileAddress, TileGeometry, TileGrid, TileVertex};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

fn quad() -> TileGeometry {
    let v = TileVertex {
        normal: [0.0, 1.0, 0.0],
        ao: 1.0,
        sunlight: 1.0,
        ..Default::default()
    };
    TileGeometry::new(vec![v; 4], vec![0, 1, 2, 2, 3, 0])
}

fn overhead(x: f32, z: f32) -> CameraState {
    CameraState::perspective(
        Vec3::new(x, 300.0, z),
        Vec3::new(x, 0.0, z),
        1.2,
        16.0 / 9.0,
        0.5,
        4000.0,
    )
}

fn streaming_manager(
    rt: &tokio::runtime::Runtime,
    source: &Arc<MemoryTileSource>,
) -> TileManager<MemoryTileSource, SceneTree> {
    streaming_manager_with_budget(rt, source, CacheBudget::new(512, usize::MAX))
}

fn streaming_manager_with_budget(
    rt: &tokio::runtime::Runtime,
    source: &Arc<MemoryTileSource>,
    budget: CacheBudget,
) -> TileManager<MemoryTileSource, SceneTree> {
    let grid = TileGrid::new(32.0, -64.0, 320.0);
    let loader = TileLoader::new(
        Arc::clone(source),
        rt.handle().clone(),
        grid,
        LoaderSettings {
            max_in_flight: 4,
            retry: RetryPolicy::none(),
            ..LoaderSettings::default()
        },
    );
    let thresholds = LodThresholds::new(vec![64.0, 128.0, 256.0]).unwrap();
    TileManager::new(
        loader,
        TileCache::new(budget),
        SceneTree::new(),
        ThresholdPolicy::new(thresholds),
        ManagerSettings {
            view_radius: 300.0,
            ..ManagerSettings::default()
        },
        "overworld",
    )
}

fn settle(manager: &mut TileManager<MemoryTileSource, SceneTree>) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !manager.is_settled() && Instant::now() < deadline {
        manager.poll();
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(manager.is_settled(), "loads did not settle");
}

fn attached_set(manager: &TileManager<MemoryTileSource, SceneTree>) -> BTreeSet<String> {
    manager.attached().map(|a| a.to_string()).collect()
}

fn desired_set(manager: &TileManager<MemoryTileSource, SceneTree>) -> BTreeSet<String> {
    manager.desired().addresses().map(|a| a.to_string()).collect()
}

/// After any sequence of camera moves, the attached set catches up with the
/// desired set once loads settle.
#[test]
fn test_attached_set_converges_after_camera_moves() {
    let rt = runtime();
    let source = Arc::new(MemoryTileSource::new().with_fallback_geometry(&quad()));
    let mut manager = streaming_manager(&rt, &source);

    let path = [
        (0.0, 0.0),
        (40.0, 10.0),
        (400.0, -250.0),
        (410.0, -260.0),
        (-900.0, 700.0),
        (0.0, 0.0),
    ];
    for (i, &(x, z)) in path.iter().enumerate() {
        manager.update_forced(&overhead(x, z));
        // Let some moves interrupt loads in flight.
        if i % 2 == 1 {
            settle(&mut manager);
            assert_eq!(attached_set(&manager), desired_set(&manager));
        }
    }
    settle(&mut manager);
    assert_eq!(attached_set(&manager), desired_set(&manager));
    assert_eq!(manager.scene().tile_count(), manager.desired().len());
}

/// Coarser tiles are chosen further from the camera.
#[test]
fn test_desired_lod_grows_with_distance() {
    let rt = runtime();
    let source = Arc::new(MemoryTileSource::new().with_fallback_geometry(&quad()));
    let mut manager = streaming_manager(&rt, &source);
    manager.update_forced(&overhead(16.0, 16.0));

    let tiles: Vec<_> = manager.desired().iter().cloned().collect();
    assert!(tiles.iter().any(|t| t.address.lod == 0));
    assert!(tiles.iter().any(|t| t.address.lod == 3));
    for pair in tiles.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
    let max_near = tiles
        .iter()
        .filter(|t| t.distance < 64.0)
        .map(|t| t.address.lod)
        .max();
    assert_eq!(max_near, Some(0));
}

/// Every address is fetched at most once while the camera holds still.
#[test]
fn test_no_duplicate_fetches_for_repeated_updates() {
    let rt = runtime();
    let source = Arc::new(MemoryTileSource::new().with_fallback_geometry(&quad()));
    source.hold();
    let mut manager = streaming_manager(&rt, &source);

    for _ in 0..5 {
        manager.update_forced(&overhead(0.0, 0.0));
    }
    source.release();
    settle(&mut manager);

    for address in manager.desired().addresses() {
        assert_eq!(source.fetch_count(address), 1, "{address}");
    }
    assert_eq!(source.total_fetches(), manager.desired().len());
}

/// A byte budget smaller than the desired set holds at every stop, and
/// tiles turned away for their size are not fetched again while idle.
#[test]
fn test_byte_budget_holds_along_camera_path() {
    let rt = runtime();
    let source = Arc::new(MemoryTileSource::new().with_fallback_geometry(&quad()));
    let grid = TileGrid::new(32.0, -64.0, 320.0);
    let sample = TileAddress::new("overworld", 0, 0, 0);
    let tile_bytes = Tile::new(sample.clone(), quad(), grid.bounds(&sample)).byte_size();
    let max_bytes = tile_bytes * 8;
    let mut manager =
        streaming_manager_with_budget(&rt, &source, CacheBudget::new(512, max_bytes));

    for (x, z) in [(0.0, 0.0), (400.0, -250.0), (-900.0, 700.0), (0.0, 0.0)] {
        manager.update_forced(&overhead(x, z));
        settle(&mut manager);
        let stats = manager.stats();
        assert!(stats.desired > 8);
        assert_eq!(stats.attached, 8);
        assert!(stats.cached_bytes <= max_bytes);

        let fetched = source.total_fetches();
        for _ in 0..3 {
            manager.update_forced(&overhead(x, z));
            settle(&mut manager);
        }
        assert_eq!(source.total_fetches(), fetched);
        assert_eq!(manager.stats().attached, 8);
    }
}

/// Missing tiles fail once and leave the rest of the set untouched.
#[test]
fn test_missing_tiles_do_not_block_others() {
    let rt = runtime();
    let source = Arc::new(MemoryTileSource::new());
    let present = TileAddress::new("overworld", 0, 0, 0);
    source.insert_geometry(present.clone(), &quad());
    let mut manager = streaming_manager(&rt, &source);
    let events = manager.events();

    manager.update_forced(&overhead(16.0, 16.0));
    settle(&mut manager);

    let attached: Vec<_> = manager.attached().cloned().collect();
    assert_eq!(attached, vec![present]);
    let failed = events
        .try_iter()
        .filter(|e| matches!(e, TileEvent::Failed { .. }))
        .count();
    assert_eq!(failed, manager.desired().len() - 1);
    assert_eq!(manager.stats().failed, failed);
}

#[test]
fn test_from_config_uses_configured_grid() {
    let rt = runtime();
    let source = Arc::new(MemoryTileSource::new().with_fallback_geometry(&quad()));
    let mut config = Config::default();
    config.tiles.tile_size = 16.0;
    config.lod.view_radius = 20.0;

    let mut manager =
        TileManager::from_config(&config, source, rt.handle().clone(), SceneTree::new()).unwrap();
    assert_eq!(manager.grid().tile_size, 16.0);
    manager.update_forced(&overhead(8.0, 8.0));
    settle(&mut manager);
    assert_eq!(manager.stats().attached, manager.desired().len());
    assert!(manager.desired().len() >= 9);
}
