//! The owning-thread tile loader.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use voxmap_config::LoaderConfig;
use voxmap_tile::{DecodeError, Tile, TileAddress, TileError, TileGrid, decode_tile};

use crate::queue::LoadQueue;
use crate::retry::{Backoff, RetryPolicy};
use crate::ticket::{LoadTicket, TicketShared};
use crate::TileSource;

/// Throttling, timeout and retry settings for a [`TileLoader`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderSettings {
    /// Maximum loads fetching or decoding at once. Default: 6.
    pub max_in_flight: usize,
    /// Per-attempt fetch timeout. Default: 10 s.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            max_in_flight: 6,
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

impl LoaderSettings {
    /// Build from the `[loader]` configuration section.
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self {
            max_in_flight: config.max_in_flight,
            timeout: Duration::from_millis(config.timeout_ms),
            retry: RetryPolicy::from_config(config),
        }
    }
}

/// Counters over the loader's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Requests that started a new load.
    pub requested: u64,
    /// Requests that joined a load already outstanding.
    pub joined: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
}

/// A load that finished, drained by [`TileLoader::poll`].
#[derive(Debug, Clone)]
pub struct CompletedLoad {
    pub address: TileAddress,
    pub result: Result<Arc<Tile>, TileError>,
    /// Fetch attempts made, including retries.
    pub attempts: u32,
}

/// Message from a load task to the owning thread.
struct LoadCompletion {
    id: u64,
    address: TileAddress,
    result: Result<Arc<Tile>, TileError>,
    attempts: u32,
}

struct LoadEntry {
    shared: Arc<TicketShared>,
    /// Set once the load leaves the queue and its task is spawned.
    task: Option<JoinHandle<()>>,
}

/// Loads tiles on a tokio runtime on behalf of a single owning thread.
///
/// At most one load exists per address: requesting an address that is
/// already loading returns a ticket for the existing load. Loads beyond
/// `max_in_flight` wait in a [`LoadQueue`]. Completions are only observed
/// through [`poll`](Self::poll), so outcomes are applied on the owning
/// thread. Cancelled loads are aborted and never complete.
pub struct TileLoader<S: TileSource> {
    source: Arc<S>,
    runtime: Handle,
    grid: TileGrid,
    settings: LoaderSettings,
    queue: LoadQueue,
    loads: FxHashMap<TileAddress, LoadEntry>,
    running: usize,
    next_id: u64,
    completion_tx: Sender<LoadCompletion>,
    completion_rx: Receiver<LoadCompletion>,
    stats: LoaderStats,
}

impl<S: TileSource> TileLoader<S> {
    /// Create a loader that spawns work on `runtime`.
    pub fn new(source: Arc<S>, runtime: Handle, grid: TileGrid, settings: LoaderSettings) -> Self {
        let (completion_tx, completion_rx) = unbounded();
        Self {
            source,
            runtime,
            grid,
            settings,
            queue: LoadQueue::new(),
            loads: FxHashMap::default(),
            running: 0,
            next_id: 0,
            completion_tx,
            completion_rx,
            stats: LoaderStats::default(),
        }
    }

    /// Request `address` with `priority` (lower loads sooner).
    ///
    /// Joins an outstanding load for the same address instead of starting a
    /// second one; the existing load keeps its priority.
    pub fn request(&mut self, address: TileAddress, priority: f64) -> LoadTicket {
        if let Some(entry) = self.loads.get(&address) {
            if !entry.shared.is_cancelled() {
                self.stats.joined += 1;
                trace!(tile = %address, "joined outstanding load");
                return LoadTicket::new(Arc::clone(&entry.shared));
            }
            // Cancelled through a ticket but not swept yet.
            self.remove_load(&address);
        }

        let id = self.next_id;
        self.next_id += 1;
        let shared = Arc::new(TicketShared::new(id, address.clone()));
        self.loads.insert(
            address.clone(),
            LoadEntry {
                shared: Arc::clone(&shared),
                task: None,
            },
        );
        self.queue.push(address, priority);
        self.stats.requested += 1;
        self.pump();
        LoadTicket::new(shared)
    }

    /// Cancel the load for `address`. Returns `false` if none is outstanding,
    /// so repeated calls are harmless.
    pub fn cancel(&mut self, address: &TileAddress) -> bool {
        let Some(entry) = self.loads.get(address) else {
            return false;
        };
        entry.shared.cancelled.store(true, std::sync::atomic::Ordering::Release);
        self.remove_load(address);
        self.pump();
        true
    }

    /// Cancel every outstanding load.
    pub fn cancel_all(&mut self) {
        let addresses: Vec<TileAddress> = self.loads.keys().cloned().collect();
        for address in &addresses {
            if let Some(entry) = self.loads.get(address) {
                entry.shared.cancelled.store(true, std::sync::atomic::Ordering::Release);
            }
            self.remove_load(address);
        }
        self.queue.clear();
    }

    /// Change the priority of a load still waiting in the queue. Loads that
    /// have already started are unaffected and `false` is returned.
    pub fn reprioritize(&mut self, address: &TileAddress, priority: f64) -> bool {
        self.queue.reprioritize(address, priority)
    }

    /// Drain finished loads, publish their outcomes to tickets, and start
    /// queued loads into freed slots.
    pub fn poll(&mut self) -> Vec<CompletedLoad> {
        self.sweep_cancelled();

        let mut completed = Vec::new();
        while let Ok(completion) = self.completion_rx.try_recv() {
            let current = self.loads.get(&completion.address).is_some_and(|e| {
                e.shared.id == completion.id && !e.shared.is_cancelled()
            });
            if !current {
                trace!(tile = %completion.address, "dropped stale completion");
                continue;
            }
            let Some(entry) = self.loads.remove(&completion.address) else {
                continue;
            };
            self.running = self.running.saturating_sub(1);

            match &completion.result {
                Ok(tile) => {
                    self.stats.succeeded += 1;
                    debug!(
                        tile = %completion.address,
                        attempts = completion.attempts,
                        triangles = tile.geometry.triangle_count(),
                        "tile loaded"
                    );
                }
                Err(err) => {
                    self.stats.failed += 1;
                    warn!(
                        tile = %completion.address,
                        attempts = completion.attempts,
                        kind = ?err.kind(),
                        error = %err,
                        "tile load failed"
                    );
                }
            }
            let _ = entry.shared.outcome.set(completion.result.clone());
            completed.push(CompletedLoad {
                address: completion.address,
                result: completion.result,
                attempts: completion.attempts,
            });
        }

        self.pump();
        completed
    }

    /// Whether a load for `address` is queued or running.
    pub fn is_loading(&self, address: &TileAddress) -> bool {
        self.loads.contains_key(address)
    }

    /// Ticket for the outstanding load of `address`, if any.
    pub fn ticket(&self, address: &TileAddress) -> Option<LoadTicket> {
        self.loads
            .get(address)
            .map(|e| LoadTicket::new(Arc::clone(&e.shared)))
    }

    /// Loads fetching or decoding right now.
    pub fn in_flight(&self) -> usize {
        self.running
    }

    /// Loads waiting for a slot.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// All outstanding loads, queued or running.
    pub fn pending(&self) -> usize {
        self.loads.len()
    }

    pub fn stats(&self) -> LoaderStats {
        self.stats
    }

    pub fn grid(&self) -> TileGrid {
        self.grid
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Start queued loads while slots are free.
    fn pump(&mut self) {
        while self.running < self.settings.max_in_flight.max(1) {
            let Some((address, priority)) = self.queue.pop() else {
                break;
            };
            let Some(entry) = self.loads.get_mut(&address) else {
                continue;
            };
            let task = run_load(
                Arc::clone(&self.source),
                self.grid,
                Arc::clone(&entry.shared),
                self.settings.timeout,
                self.settings.retry.clone(),
                self.completion_tx.clone(),
            );
            entry.task = Some(self.runtime.spawn(task));
            self.running += 1;
            trace!(tile = %address, priority, in_flight = self.running, "load started");
        }
    }

    fn sweep_cancelled(&mut self) {
        let cancelled: Vec<TileAddress> = self
            .loads
            .iter()
            .filter(|(_, e)| e.shared.is_cancelled())
            .map(|(a, _)| a.clone())
            .collect();
        for address in &cancelled {
            self.remove_load(address);
        }
    }

    fn remove_load(&mut self, address: &TileAddress) {
        let Some(entry) = self.loads.remove(address) else {
            return;
        };
        self.queue.remove(address);
        if let Some(task) = entry.task {
            task.abort();
            self.running = self.running.saturating_sub(1);
        }
        self.stats.cancelled += 1;
        debug!(tile = %address, "load cancelled");
    }
}

impl<S: TileSource> Drop for TileLoader<S> {
    fn drop(&mut self) {
        for entry in self.loads.values() {
            if let Some(task) = &entry.task {
                task.abort();
            }
        }
    }
}

/// Fetch, decode and retry one tile until it succeeds, fails permanently,
/// or is cancelled.
async fn run_load<S: TileSource>(
    source: Arc<S>,
    grid: TileGrid,
    shared: Arc<TicketShared>,
    timeout: Duration,
    retry: RetryPolicy,
    completion_tx: Sender<LoadCompletion>,
) {
    let address = shared.address.clone();
    let mut backoff = Backoff::new(retry);
    let mut attempts = 0;

    let result = loop {
        if shared.is_cancelled() {
            return;
        }
        attempts += 1;
        match fetch_and_decode(&*source, &address, grid, timeout).await {
            Err(err) if err.is_retryable() => match backoff.next_delay() {
                Some(delay) => {
                    debug!(
                        tile = %address,
                        attempt = attempts,
                        ?delay,
                        error = %err,
                        "retrying tile load"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => break Err(err),
            },
            other => break other,
        }
    };

    if shared.is_cancelled() {
        return;
    }
    let _ = completion_tx.send(LoadCompletion {
        id: shared.id,
        address,
        result,
        attempts,
    });
}

async fn fetch_and_decode<S: TileSource>(
    source: &S,
    address: &TileAddress,
    grid: TileGrid,
    timeout: Duration,
) -> Result<Arc<Tile>, TileError> {
    let bytes = tokio::time::timeout(timeout, source.fetch(address))
        .await
        .map_err(|_| TileError::network(address, format!("timed out after {timeout:?}")))??;

    let owned = address.clone();
    let decoded = tokio::task::spawn_blocking(move || decode_tile(&owned, &bytes, &grid))
        .await
        .map_err(|e| TileError::decode(address, DecodeError::TaskFailed(e.to_string())))?;
    decoded.map(Arc::new)
}
