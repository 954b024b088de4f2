use anyhow::Result;
use async_trait::async_trait;

use crate::backends::{file, http, in_mem};
use crate::common::{Page, Query, QueryParams};

/// 📡 A client that fetches exactly one page per call.
///
/// Implement this trait and you too can be the origin of someone else's pagination problems.
///
/// # Contract 📜
/// - `fetch` returns every record of exactly one page, in the order the source returned them.
/// - `Page::next_cursor == None` (or an empty cursor) = no further pages. The worker stops asking.
/// - Any `Err` is fatal for the stream. The worker does not retry; if you want retries,
///   they live in here, not in the worker.
/// - `&mut self` because clients have state. Connection pools, file handles, feelings.
///
/// # Knowledge Graph 🧠
/// - Pattern: trait → concrete impls (InMemoryClient, FileClient, HttpClient) → ClientBackend enum
/// - Client returns raw records → worker unmarshals → channel(PageResult<T>) → consumer
/// - `Params` is opaque to the worker; it's forwarded to every `fetch` untouched.
#[async_trait]
pub trait PagedClient: Send + 'static {
    /// 🔧 Whatever the client needs to know to build its request.
    type Params: Send + Sync + 'static;
    /// 📦 One raw record, before unmarshaling.
    type Record: Send + 'static;

    async fn fetch(&mut self, query: &Query<Self::Params>) -> Result<Page<Self::Record>>;
}

/// 🎭 The many faces of a paged client, a polymorphic casting call for data origins.
///
/// Each variant wraps a concrete client; the enum dispatches `fetch` so the supervisor
/// never needs to know whether it's paging through RAM, a file, or somebody's HTTP API.
/// Ancient proverb: "He who hardcodes the backend, paginates only once."
#[derive(Debug)]
pub enum ClientBackend {
    InMemory(in_mem::InMemoryClient),
    File(file::FileClient),
    Http(http::HttpClient),
}

#[async_trait]
impl PagedClient for ClientBackend {
    type Params = QueryParams;
    type Record = String;

    async fn fetch(&mut self, query: &Query<QueryParams>) -> Result<Page<String>> {
        match self {
            ClientBackend::InMemory(client) => client.fetch(query).await,
            ClientBackend::File(client) => client.fetch(query).await,
            ClientBackend::Http(client) => client.fetch(query).await,
        }
    }
}
