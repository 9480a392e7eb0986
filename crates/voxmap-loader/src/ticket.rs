use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use voxmap_tile::{Tile, TileAddress, TileError};

/// State shared between a load's tickets, the loader, and the load task.
#[derive(Debug)]
pub(crate) struct TicketShared {
    pub(crate) id: u64,
    pub(crate) address: TileAddress,
    pub(crate) cancelled: AtomicBool,
    pub(crate) outcome: OnceLock<Result<Arc<Tile>, TileError>>,
}

impl TicketShared {
    pub(crate) fn new(id: u64, address: TileAddress) -> Self {
        Self {
            id,
            address,
            cancelled: AtomicBool::new(false),
            outcome: OnceLock::new(),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Handle to one in-flight tile load.
///
/// Every requester of the same address while a load is outstanding holds a
/// clone of the same ticket. The outcome is published on the owning thread
/// during [`TileLoader::poll`](crate::TileLoader::poll). Cancelling through
/// any clone cancels the shared load; a cancelled load never publishes an
/// outcome.
#[derive(Clone, Debug)]
pub struct LoadTicket {
    pub(crate) shared: Arc<TicketShared>,
}

impl LoadTicket {
    pub(crate) fn new(shared: Arc<TicketShared>) -> Self {
        Self { shared }
    }

    pub fn address(&self) -> &TileAddress {
        &self.shared.address
    }

    /// Request cancellation. The loader aborts the task on its next `poll`.
    /// Idempotent.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Whether the load is neither finished nor cancelled.
    pub fn is_pending(&self) -> bool {
        !self.is_cancelled() && self.shared.outcome.get().is_none()
    }

    /// Result of the load once it has completed.
    pub fn outcome(&self) -> Option<&Result<Arc<Tile>, TileError>> {
        self.shared.outcome.get()
    }

    /// The loaded tile, if the load succeeded.
    pub fn tile(&self) -> Option<&Arc<Tile>> {
        self.outcome().and_then(|r| r.as_ref().ok())
    }

    /// Whether two tickets refer to the same load.
    pub fn same_load(&self, other: &LoadTicket) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}
