//! Asynchronous, cancellable tile loading.
//!
//! [`TileLoader`] is owned by the manager thread. It throttles loads to a
//! configured number in flight, queues the rest by priority, fetches and
//! decodes on a tokio runtime, retries transient failures with backoff, and
//! hands completions back through [`TileLoader::poll`].

mod loader;
mod memory;
mod queue;
mod retry;
mod source;
mod ticket;

pub use loader::{CompletedLoad, LoaderSettings, LoaderStats, TileLoader};
pub use memory::MemoryTileSource;
pub use queue::LoadQueue;
pub use retry::{Backoff, RetryPolicy};
pub use source::{
    ConfiguredSource, FileTileSource, HttpTileSource, SourceError, TileSource, UrlTemplate,
};
pub use ticket::LoadTicket;
