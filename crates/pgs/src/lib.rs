//! 📡 pgs: stream every page of a cursor-paginated source as typed results.
//!
//! The library half is [`PagedFetchWorker`]: hand it a [`PagedClient`], an
//! [`Unmarshaler`], a [`Query`] and a [`CancellationToken`](tokio_util::sync::CancellationToken),
//! and read [`PageResult`]s off the [`PageStream`] it returns until it closes.
//!
//! The application half is [`run`]: build a client and a sink from an [`AppConfig`],
//! drain the stream into the sink, and report a [`DrainSummary`].

pub mod app_config;
pub mod backends;
pub mod common;
pub mod composers;
pub mod errors;
pub mod progress;
pub mod unmarshalers;
pub mod workers;

mod supervisors;

use anyhow::Result;

pub use app_config::AppConfig;
pub use backends::PagedClient;
pub use common::{Cursor, Page, PageResult, Query, QueryParams};
pub use errors::{ErrorKind, FetchError};
pub use unmarshalers::{JsonUnmarshaler, Unmarshaler, unmarshal_fn};
pub use workers::{DrainSummary, PAGE_CHANNEL_CAPACITY, PageStream, PagedFetchWorker, query_async};

use supervisors::Supervisor;

/// 🚀 Run one configured fetch-and-drain to completion.
pub async fn run(app_config: AppConfig) -> Result<DrainSummary> {
    Supervisor::new(app_config).start_workers().await
}
