//! In-memory tile source for embedding and tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use voxmap_tile::{TileAddress, TileError, TileGeometry, encode_payload};

use crate::TileSource;

/// Serves payloads from memory.
///
/// Addresses without a payload are `NotFound` unless a fallback payload is
/// set. Fetches can be held at a gate, delayed, or scripted to fail with
/// network errors, and every fetch is counted and logged in order.
pub struct MemoryTileSource {
    payloads: DashMap<TileAddress, Vec<u8>>,
    fallback: Option<Vec<u8>>,
    network_failures: DashMap<TileAddress, usize>,
    fetch_counts: DashMap<TileAddress, usize>,
    fetch_log: Mutex<Vec<TileAddress>>,
    total_fetches: AtomicUsize,
    delay: Option<Duration>,
    open: watch::Sender<bool>,
}

impl Default for MemoryTileSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTileSource {
    pub fn new() -> Self {
        Self {
            payloads: DashMap::new(),
            fallback: None,
            network_failures: DashMap::new(),
            fetch_counts: DashMap::new(),
            fetch_log: Mutex::new(Vec::new()),
            total_fetches: AtomicUsize::new(0),
            delay: None,
            open: watch::Sender::new(true),
        }
    }

    /// Serve `payload` for every address without its own payload.
    pub fn with_fallback(mut self, payload: Vec<u8>) -> Self {
        self.fallback = Some(payload);
        self
    }

    /// Serve `geometry` for every address without its own payload.
    pub fn with_fallback_geometry(self, geometry: &TileGeometry) -> Self {
        self.with_fallback(encode_payload(geometry, false))
    }

    /// Sleep for `delay` inside every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert(&self, address: TileAddress, payload: Vec<u8>) {
        self.payloads.insert(address, payload);
    }

    pub fn insert_geometry(&self, address: TileAddress, geometry: &TileGeometry) {
        self.insert(address, encode_payload(geometry, true));
    }

    pub fn remove(&self, address: &TileAddress) {
        self.payloads.remove(address);
    }

    /// Fail the next `times` fetches of `address` with a network error.
    pub fn fail_network(&self, address: TileAddress, times: usize) {
        self.network_failures.insert(address, times);
    }

    /// Block fetches until [`release`](Self::release) is called.
    pub fn hold(&self) {
        self.open.send_replace(false);
    }

    /// Let held and future fetches proceed.
    pub fn release(&self) {
        self.open.send_replace(true);
    }

    /// Number of fetches started for `address`.
    pub fn fetch_count(&self, address: &TileAddress) -> usize {
        self.fetch_counts.get(address).map_or(0, |c| *c)
    }

    pub fn total_fetches(&self) -> usize {
        self.total_fetches.load(Ordering::Relaxed)
    }

    /// Addresses in the order their fetches started.
    pub fn fetch_log(&self) -> Vec<TileAddress> {
        self.fetch_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn record_fetch(&self, address: &TileAddress) {
        self.total_fetches.fetch_add(1, Ordering::Relaxed);
        *self.fetch_counts.entry(address.clone()).or_insert(0) += 1;
        if let Ok(mut log) = self.fetch_log.lock() {
            log.push(address.clone());
        }
    }

    fn take_failure(&self, address: &TileAddress) -> bool {
        match self.network_failures.get_mut(address) {
            Some(mut remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

impl TileSource for MemoryTileSource {
    async fn fetch(&self, address: &TileAddress) -> Result<Vec<u8>, TileError> {
        self.record_fetch(address);

        let mut open = self.open.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = open.wait_for(|open| *open).await;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.take_failure(address) {
            return Err(TileError::network(address, "scripted network failure"));
        }

        if let Some(payload) = self.payloads.get(address) {
            return Ok(payload.value().clone());
        }
        self.fallback
            .clone()
            .ok_or_else(|| TileError::not_found(address))
    }
}
