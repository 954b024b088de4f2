//! 🧵 Workers: the tasks that actually move pages while the Supervisor takes the credit.
//!
//! - [`PagedFetchWorker`]: follows a cursor, publishes typed pages onto a bounded channel.
//! - [`DrainWorker`]: reads that channel, renders each page, hands it to a sink.
//!
//! ```text
//!  PagedClient ──fetch──▶ PagedFetchWorker ══ bounded(2) ══▶ DrainWorker ──send──▶ Sink
//!                               ▲                                  │
//!                               └──────── CancellationToken ───────┘ (max_pages)
//! ```

use anyhow::Result;
use tokio::task::JoinHandle;

mod drain_worker;
mod paged_fetch_worker;

pub use drain_worker::{DrainSummary, DrainWorker};
pub use paged_fetch_worker::{PAGE_CHANNEL_CAPACITY, PageStream, PagedFetchWorker, query_async};

/// 🏗️ A background worker, that does work. duh.
///
/// `start` spawns onto the current tokio runtime; the handle resolves to whatever the
/// worker reports when it is done.
pub trait Worker {
    type Output;

    fn start(self) -> JoinHandle<Result<Self::Output>>;
}
