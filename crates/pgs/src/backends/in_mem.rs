//! # Previously, on pgs...
//!
//! 🎬 The records were trapped in a `Vec`. No network. No disk. No excuses.
//! Someone had to page through them anyway, because the worker only speaks pages.
//!
//! `in_mem` provides an in-memory [`PagedClient`] and [`Sink`] for tests and local
//! development. The [`InMemoryClient`] serves a fixed list of records `page_size` at a time,
//! using the offset of the next record as its cursor. The [`InMemorySink`] stashes every
//! payload behind an `Arc<Mutex<...>>` so callers can inspect what arrived.
//!
//! 🦆
//!
//! ⚠️ This is NOT for production. This is for tests. If you're deploying this
//! to prod, please also deploy a therapist.

use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::trace;

use crate::backends::{PagedClient, Sink};
use crate::common::{Cursor, Page, Query, QueryParams};

/// 🔧 Config for the in-memory client: the documents themselves, and how many per page.
#[derive(Debug, Deserialize, Clone)]
pub struct InMemoryClientConfig {
    #[serde(default)]
    pub documents: Vec<serde_json::Value>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    100
}

/// 📦 The world's most honest data source: it already has everything, it just
/// refuses to hand it over all at once.
#[derive(Debug)]
pub struct InMemoryClient {
    records: Vec<String>,
    page_size: usize,
}

impl InMemoryClient {
    /// 🚀 Pages over raw records. `page_size` must be at least 1; a zero-sized page
    /// would hand out the same cursor forever.
    pub fn new(records: Vec<String>, page_size: usize) -> Result<Self> {
        ensure!(
            page_size > 0,
            "💀 An in-memory client with page_size 0 would page forever and deliver nothing. \
             Like a meeting about meetings."
        );
        Ok(Self { records, page_size })
    }

    pub fn from_config(config: InMemoryClientConfig) -> Result<Self> {
        let records = config.documents.iter().map(|doc| doc.to_string()).collect();
        Self::new(records, config.page_size)
    }
}

#[async_trait]
impl PagedClient for InMemoryClient {
    type Params = QueryParams;
    type Record = String;

    async fn fetch(&mut self, query: &Query<QueryParams>) -> Result<Page<String>> {
        let start = match &query.cursor {
            None => 0,
            Some(cursor) => cursor.as_str().parse::<usize>().with_context(|| {
                format!("💀 In-memory cursor '{cursor}' is not an offset. Who gave you that?")
            })?,
        };
        ensure!(
            start <= self.records.len(),
            "💀 In-memory cursor {start} points past the last record ({}). Time travel is not supported.",
            self.records.len()
        );

        let end = (start + self.page_size).min(self.records.len());
        let items = self.records[start..end].to_vec();
        trace!("🧠 in-memory page [{start}, {end}) of {}", self.records.len());

        // 🏁 no cursor once the last record has been handed out
        let next_cursor = if end < self.records.len() {
            Some(Cursor::new(end.to_string()))
        } else {
            None
        };
        Ok(Page::new(items, next_cursor))
    }
}

/// 📦 A sink that never forgets.
///
/// Clone-able because tests need to peek inside after handing `self` off to the
/// drain worker. The `Arc` means every clone shares the same Vec.
#[derive(Debug, Default, Clone)]
pub struct InMemorySink {
    pub received: Arc<Mutex<Vec<String>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 📋 Everything received so far, in arrival order.
    pub async fn payloads(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn send(&mut self, payload: String) -> Result<()> {
        self.received.lock().await.push(payload);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        // 🗑️ nothing to flush. we live in RAM.
        Ok(())
    }
}
