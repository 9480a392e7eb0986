use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};
use voxmap_cache::TileCache;
use voxmap_config::Config;
use voxmap_loader::{LoadTicket, LoaderSettings, TileLoader, TileSource};
use voxmap_lod::{DesiredSet, LodError, LodPolicy, ThresholdPolicy, compute_desired};
use voxmap_scene::{CameraState, Frustum, NodeId, SceneGraph};
use voxmap_tile::{Tile, TileAddress, TileError, TileErrorKind, TileGrid, TileState};

use crate::{ManagerStats, TileEvent};

/// Capacity of the diagnostic event channel. Events beyond it are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Desired-set and scheduling settings.
#[derive(Clone, Debug, PartialEq)]
pub struct ManagerSettings {
    /// Radius around the camera footprint within which tiles are desired.
    pub view_radius: f64,
    /// Quality level handed to the LOD policy.
    pub quality: f32,
    /// Minimum time between two throttled updates.
    pub min_update_interval: Duration,
    /// Added to the load priority of tiles outside the frustum.
    pub offscreen_penalty: f64,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            view_radius: 1500.0,
            quality: 1.0,
            min_update_interval: Duration::from_millis(50),
            offscreen_penalty: 0.0,
        }
    }
}

impl ManagerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            view_radius: config.lod.view_radius,
            quality: config.lod.quality,
            min_update_interval: Duration::from_millis(config.manager.min_update_interval_ms),
            offscreen_penalty: config.manager.offscreen_penalty.max(0.0),
        }
    }
}

/// A tile the manager is responsible for.
enum Resident {
    Loading(LoadTicket),
    Attached(NodeId),
}

/// A desired tile waiting for cache capacity.
struct Deferral {
    priority: f64,
    /// Size of the decoded tile when it was turned away for its bytes.
    /// Such a tile is fetched again only once the cache can admit it.
    bytes: Option<usize>,
}

/// Keeps the scene's attached tiles in step with the camera.
///
/// Each update computes the desired set, cancels loads and detaches tiles
/// that left it, and serves newly desired tiles from the cache or the
/// loader. Completed loads are attached only if still desired. Once loads
/// settle the attached set equals the desired set minus failed tiles.
pub struct TileManager<S: TileSource, G: SceneGraph, P: LodPolicy = ThresholdPolicy> {
    loader: TileLoader<S>,
    cache: TileCache,
    scene: G,
    policy: P,
    settings: ManagerSettings,
    grid: TileGrid,
    map_id: Arc<str>,
    desired: DesiredSet,
    resident: FxHashMap<TileAddress, Resident>,
    deferred: FxHashMap<TileAddress, Deferral>,
    /// Desired tiles whose last load failed.
    failed: FxHashMap<TileAddress, TileErrorKind>,
    last_update: Option<Instant>,
    events_tx: Sender<TileEvent>,
    events_rx: Receiver<TileEvent>,
}

impl<S: TileSource, G: SceneGraph> TileManager<S, G, ThresholdPolicy> {
    /// Build a manager and its loader and cache from configuration.
    pub fn from_config(
        config: &Config,
        source: Arc<S>,
        runtime: Handle,
        scene: G,
    ) -> Result<Self, LodError> {
        let policy = ThresholdPolicy::from_config(&config.lod)?;
        let grid = TileGrid::new(config.tiles.tile_size, config.tiles.min_y, config.tiles.max_y);
        let loader = TileLoader::new(
            source,
            runtime,
            grid,
            LoaderSettings::from_config(&config.loader),
        );
        Ok(Self::new(
            loader,
            TileCache::from_config(&config.cache),
            scene,
            policy,
            ManagerSettings::from_config(config),
            config.tiles.map_id.as_str(),
        ))
    }
}

impl<S: TileSource, G: SceneGraph, P: LodPolicy> TileManager<S, G, P> {
    /// Create a manager streaming `map_id`. The grid is taken from the loader
    /// so that decoded bounds and desired cells agree.
    pub fn new(
        loader: TileLoader<S>,
        cache: TileCache,
        scene: G,
        policy: P,
        settings: ManagerSettings,
        map_id: impl Into<Arc<str>>,
    ) -> Self {
        let (events_tx, events_rx) = bounded(EVENT_CHANNEL_CAPACITY);
        Self {
            grid: loader.grid(),
            loader,
            cache,
            scene,
            policy,
            settings,
            map_id: map_id.into(),
            desired: DesiredSet::default(),
            resident: FxHashMap::default(),
            deferred: FxHashMap::default(),
            failed: FxHashMap::default(),
            last_update: None,
            events_tx,
            events_rx,
        }
    }

    /// Apply finished loads, then recompute the desired set if at least
    /// `min_update_interval` has passed since the last recomputation.
    /// Returns whether the desired set was recomputed.
    pub fn update(&mut self, camera: &CameraState, now: Instant) -> bool {
        if let Some(last) = self.last_update
            && now.saturating_duration_since(last) < self.settings.min_update_interval
        {
            self.poll();
            return false;
        }
        self.update_forced(camera);
        self.last_update = Some(now);
        true
    }

    /// Apply finished loads and recompute the desired set unconditionally.
    pub fn update_forced(&mut self, camera: &CameraState) {
        self.poll();

        let frustum = camera.frustum();
        self.desired = compute_desired(
            &self.map_id,
            &self.grid,
            camera.footprint(),
            self.settings.view_radius,
            &self.policy,
            self.settings.quality,
        );

        let desired = &self.desired;
        self.failed.retain(|address, _| desired.contains(address));
        self.deferred.retain(|address, _| desired.contains(address));

        let leaving: Vec<TileAddress> = self
            .resident
            .keys()
            .filter(|address| !self.desired.contains(address))
            .cloned()
            .collect();
        for address in leaving {
            self.release(&address);
        }

        let entering: Vec<(TileAddress, f64)> = self
            .desired
            .iter()
            .map(|t| (t.address.clone(), t.distance))
            .collect();
        for (address, distance) in entering {
            let priority = self.priority(&frustum, &address, distance);
            match self.resident.get(&address) {
                Some(Resident::Loading(_)) => {
                    self.loader.reprioritize(&address, priority);
                }
                Some(Resident::Attached(_)) => {}
                None => self.admit(address, priority),
            }
        }

        self.service_deferred();
        self.enforce_budget();
        trace!(
            desired = self.desired.len(),
            resident = self.resident.len(),
            deferred = self.deferred.len(),
            "resident set updated"
        );
    }

    /// Apply completed loads. Returns how many completions were applied.
    pub fn poll(&mut self) -> usize {
        let completed = self.loader.poll();
        let applied = completed.len();

        for load in completed {
            if !matches!(self.resident.get(&load.address), Some(Resident::Loading(_))) {
                continue;
            }
            self.resident.remove(&load.address);
            match load.result {
                Ok(tile) => self.on_loaded(tile),
                Err(err) => {
                    let kind = err.kind();
                    if kind == TileErrorKind::NotFound {
                        self.cache.mark_absent(load.address.clone());
                    }
                    if self.desired.contains(&load.address) {
                        self.failed.insert(load.address.clone(), kind);
                    }
                    self.emit(TileEvent::Failed {
                        address: load.address,
                        kind,
                    });
                }
            }
        }

        // Loads cancelled through a ticket held elsewhere.
        self.resident.retain(|_, resident| match resident {
            Resident::Loading(ticket) => !ticket.is_cancelled(),
            Resident::Attached(_) => true,
        });

        if applied > 0 {
            self.service_deferred();
            self.enforce_budget();
        }
        applied
    }

    /// Whether no loads are outstanding.
    pub fn is_settled(&self) -> bool {
        self.loader.pending() == 0
            && !self
                .resident
                .values()
                .any(|r| matches!(r, Resident::Loading(_)))
    }

    /// Lifecycle state of `address` as seen by the manager.
    pub fn state(&self, address: &TileAddress) -> Option<TileState> {
        match self.resident.get(address) {
            Some(Resident::Loading(_)) => return Some(TileState::Loading),
            Some(Resident::Attached(_)) => return Some(TileState::Ready),
            None => {}
        }
        if self.deferred.contains_key(address) {
            Some(TileState::Failed(TileErrorKind::CapacityExceeded))
        } else if let Some(kind) = self.failed.get(address) {
            Some(TileState::Failed(*kind))
        } else if self.cache.is_absent(address) {
            Some(TileState::Failed(TileErrorKind::NotFound))
        } else if self.cache.contains(address) {
            Some(TileState::Evicted)
        } else {
            None
        }
    }

    /// Switch to another map. Every load is cancelled, every tile detached,
    /// and the cache (including its record of missing tiles) is cleared.
    pub fn set_map(&mut self, map_id: impl Into<Arc<str>>) {
        let map_id = map_id.into();
        if map_id == self.map_id {
            return;
        }

        self.loader.cancel_all();
        let resident: Vec<(TileAddress, Resident)> = self.resident.drain().collect();
        for (address, resident) in resident {
            if let Resident::Attached(node) = resident {
                self.scene.detach(node);
                self.emit(TileEvent::Detached { address, node });
            }
        }
        self.cache.clear();
        self.deferred.clear();
        self.failed.clear();
        self.desired = DesiredSet::default();
        self.last_update = None;
        info!(from = %self.map_id, to = %map_id, "switched map");
        self.map_id = map_id;
    }

    /// Snapshot of the manager's counters.
    pub fn stats(&self) -> ManagerStats {
        let attached = self
            .resident
            .values()
            .filter(|r| matches!(r, Resident::Attached(_)))
            .count();
        ManagerStats {
            desired: self.desired.len(),
            attached,
            loading: self.resident.len() - attached,
            deferred: self.deferred.len(),
            failed: self.failed.len(),
            cached: self.cache.len(),
            cached_bytes: self.cache.total_bytes(),
        }
    }

    /// Addresses currently attached to the scene.
    pub fn attached(&self) -> impl Iterator<Item = &TileAddress> + '_ {
        self.resident
            .iter()
            .filter(|(_, r)| matches!(r, Resident::Attached(_)))
            .map(|(address, _)| address)
    }

    /// Scene node holding `address`, if attached.
    pub fn node(&self, address: &TileAddress) -> Option<NodeId> {
        match self.resident.get(address) {
            Some(Resident::Attached(node)) => Some(*node),
            _ => None,
        }
    }

    /// Receiver for [`TileEvent`]s. Events are dropped when nobody drains it.
    pub fn events(&self) -> Receiver<TileEvent> {
        self.events_rx.clone()
    }

    pub fn desired(&self) -> &DesiredSet {
        &self.desired
    }

    pub fn map_id(&self) -> &Arc<str> {
        &self.map_id
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub fn scene(&self) -> &G {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut G {
        &mut self.scene
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn loader(&self) -> &TileLoader<S> {
        &self.loader
    }

    /// Load priority: distance, plus the off-screen penalty outside the frustum.
    fn priority(&self, frustum: &Frustum, address: &TileAddress, distance: f64) -> f64 {
        let penalized = self.settings.offscreen_penalty > 0.0
            && !frustum.is_visible(&self.grid.bounds(address));
        if penalized {
            distance + self.settings.offscreen_penalty
        } else {
            distance
        }
    }

    /// Serve a newly desired tile from the cache, or start loading it.
    fn admit(&mut self, address: TileAddress, priority: f64) {
        if self.failed.contains_key(&address) || self.deferred.contains_key(&address) {
            return;
        }
        if self.cache.is_absent(&address) {
            self.failed.insert(address, TileErrorKind::NotFound);
            return;
        }
        if !self.has_capacity_for_load() {
            self.defer(address, priority, None);
            return;
        }
        if let Some(tile) = self.cache.get(&address) {
            let bytes = tile.byte_size();
            if !self.cache.can_admit(bytes) {
                self.defer(address, priority, Some(bytes));
                return;
            }
            trace!(tile = %address, "reattached from cache");
            self.attach(tile);
            return;
        }
        let ticket = self.loader.request(address.clone(), priority);
        self.resident.insert(address, Resident::Loading(ticket));
    }

    /// Attach a finished load. Only loads still desired reach this point,
    /// since leaving the desired set cancels them.
    fn on_loaded(&mut self, tile: Arc<Tile>) {
        let address = tile.address.clone();
        debug_assert!(self.desired.contains(&address));
        let bytes = tile.byte_size();
        if !self.cache.can_admit(bytes) {
            let distance = self.desired.distance(&address).unwrap_or(f64::MAX);
            self.defer(address, distance, Some(bytes));
            return;
        }
        self.cache.put(tile);
        if let Some(tile) = self.cache.get(&address) {
            self.attach(tile);
        }
    }

    fn attach(&mut self, tile: Arc<Tile>) {
        let address = tile.address.clone();
        let node = self.scene.attach(&tile);
        self.cache.pin(&address);
        self.failed.remove(&address);
        self.deferred.remove(&address);
        self.resident.insert(address.clone(), Resident::Attached(node));
        debug!(tile = %address, node = node.0, "tile attached");
        self.emit(TileEvent::Attached { address, node });
    }

    /// Cancel or detach a tile that left the desired set.
    fn release(&mut self, address: &TileAddress) {
        match self.resident.remove(address) {
            Some(Resident::Loading(_)) => {
                self.loader.cancel(address);
                trace!(tile = %address, "load cancelled");
            }
            Some(Resident::Attached(node)) => {
                self.scene.detach(node);
                self.cache.unpin(address);
                debug!(tile = %address, node = node.0, "tile detached");
                self.emit(TileEvent::Detached {
                    address: address.clone(),
                    node,
                });
            }
            None => {}
        }
    }

    fn defer(&mut self, address: TileAddress, priority: f64, bytes: Option<usize>) {
        let deferral = Deferral { priority, bytes };
        if self.deferred.insert(address.clone(), deferral).is_none() {
            let err = TileError::capacity_exceeded(&address);
            debug!(error = %err, bytes = ?bytes, "load deferred until attached tiles are released");
            self.emit(TileEvent::Deferred { address });
        }
    }

    /// Whether one more tile fits beside the attached tiles and the loads
    /// already outstanding.
    fn has_capacity_for_load(&self) -> bool {
        let loading = self.resident.len().saturating_sub(self.cache.pinned_count());
        self.cache.can_reserve(loading + 1, 0)
    }

    /// Start deferred loads, nearest first, while capacity allows. A tile
    /// turned away for its size waits until the cache can admit that size.
    fn service_deferred(&mut self) {
        if self.deferred.is_empty() {
            return;
        }
        let mut waiting: Vec<(TileAddress, f64, Option<usize>)> = self
            .deferred
            .iter()
            .map(|(address, d)| (address.clone(), d.priority, d.bytes))
            .collect();
        waiting.sort_by(|a, b| a.1.total_cmp(&b.1));

        for (address, priority, bytes) in waiting {
            if !self.has_capacity_for_load() {
                break;
            }
            if let Some(bytes) = bytes
                && !self.cache.can_admit(bytes)
            {
                continue;
            }
            if let Some(tile) = self.cache.get(&address) {
                if self.cache.can_admit(tile.byte_size()) {
                    self.attach(tile);
                } else if let Some(deferral) = self.deferred.get_mut(&address) {
                    deferral.bytes = Some(tile.byte_size());
                }
                continue;
            }
            self.deferred.remove(&address);
            let ticket = self.loader.request(address.clone(), priority);
            self.resident.insert(address, Resident::Loading(ticket));
        }
    }

    fn enforce_budget(&mut self) {
        for address in self.cache.enforce_budget() {
            trace!(tile = %address, "evicted from cache");
            self.emit(TileEvent::Evicted { address });
        }
    }

    fn emit(&self, event: TileEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                trace!(tile = %event.address(), "event channel full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("tile event channel disconnected");
            }
        }
    }
}
