//! 🎬 *[a cursor is handed back. a page comes home. the channel has room for two.]*
//!
//! 📡 The PagedFetchWorker: the part of pgs that actually follows the cursor.
//!
//! One background task per stream. It fetches a page, unmarshals every record in it,
//! publishes the typed page onto a bounded channel, advances the cursor, and goes again,
//! until one of exactly four things happens:
//!
//! | what happened                       | last thing published                 |
//! |-------------------------------------|--------------------------------------|
//! | the cursor came back empty          | the last page, no error              |
//! | the token was cancelled             | empty `PageResult` + `ContextCanceled` |
//! | the client returned `Err`           | empty `PageResult` + `Transport`       |
//! | a record would not unmarshal        | that page's items so far + `Unmarshal` |
//!
//! Then the channel closes. Closing is the only "done" signal; there is no sentinel.
//!
//! ⚠️ Cancellation is cooperative: the token is checked once, at the top of each loop,
//! without blocking. A fetch already in flight runs to completion and is published; the
//! cancel lands on the next iteration. The worker never races the token against I/O.
//!
//! 🧠 Knowledge graph:
//! - channel capacity is [`PAGE_CHANNEL_CAPACITY`] (2): the worker may run at most two
//!   published pages (plus the one it is holding) ahead of the consumer, then it blocks.
//! - pages are fetched strictly one after another. No prefetch. No parallelism.
//! - a dropped [`PageStream`] makes the next publish fail; the worker quits on the spot.

use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use anyhow::Result;
use async_channel::{Receiver, Sender};
use futures::Stream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::backends::PagedClient;
use crate::common::{Page, PageResult, Query};
use crate::errors::FetchError;
use crate::unmarshalers::Unmarshaler;

/// 📏 How many published pages may sit in the channel waiting for the consumer.
pub const PAGE_CHANNEL_CAPACITY: usize = 2;

/// 📡 Streams the pages of one query as typed [`PageResult`]s.
///
/// Generic over the client `C`, the unmarshaler `U`, and the item type `T`; nothing
/// about the record shape or the remote source is known here.
pub struct PagedFetchWorker<C, U, T>
where
    C: PagedClient,
{
    client: C,
    unmarshaler: U,
    query: Query<C::Params>,
    cancel: CancellationToken,
    _item: PhantomData<fn() -> T>,
}

impl<C, U, T> PagedFetchWorker<C, U, T>
where
    C: PagedClient,
    U: Unmarshaler<C::Record, T>,
    T: Send + 'static,
{
    /// 🏗️ The worker takes ownership of `query`; its cursor is the worker's to advance.
    pub fn new(client: C, unmarshaler: U, query: Query<C::Params>, cancel: CancellationToken) -> Self {
        Self {
            client,
            unmarshaler,
            query,
            cancel,
            _item: PhantomData,
        }
    }

    /// 🚀 Spawn the background task and hand back the read end of its channel.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn start(self) -> PageStream<T> {
        let (tx, rx) = async_channel::bounded(PAGE_CHANNEL_CAPACITY);
        let handle = tokio::spawn(self.run(tx));
        PageStream {
            rx: Box::pin(rx),
            handle,
        }
    }

    async fn run(mut self, tx: Sender<PageResult<T>>) {
        self.fetch_pages(&tx).await;
        // 🏁 the one and only close. everything published above is still readable.
        tx.close();
    }

    async fn fetch_pages(&mut self, tx: &Sender<PageResult<T>>) {
        let mut page_number = 0usize;
        loop {
            if self.cancel.is_cancelled() {
                debug!("🛑 cancelled before page {page_number}; publishing ContextCanceled and standing down");
                publish(tx, PageResult::failed(Vec::new(), FetchError::ContextCanceled)).await;
                return;
            }

            trace!(
                "📡 fetching page {page_number} (cursor: {:?})",
                self.query.cursor.as_ref().map(|c| c.as_str())
            );
            let Page { items: records, next_cursor } = match self.client.fetch(&self.query).await {
                Ok(page) => page,
                Err(source) => {
                    debug!("💀 page {page_number} fetch failed: {source:#}");
                    let error = FetchError::Transport {
                        page: page_number,
                        source,
                    };
                    publish(tx, PageResult::failed(Vec::new(), error)).await;
                    return;
                }
            };

            let mut items = Vec::with_capacity(records.len());
            for (index, record) in records.into_iter().enumerate() {
                match self.unmarshaler.unmarshal(record) {
                    Ok(item) => items.push(item),
                    Err(source) => {
                        // 🧩 fail fast: ship what converted so far from this page, then stop
                        debug!("💀 page {page_number} item {index} failed to unmarshal: {source:#}");
                        let error = FetchError::Unmarshal {
                            page: page_number,
                            index,
                            source,
                        };
                        publish(tx, PageResult::failed(items, error)).await;
                        return;
                    }
                }
            }

            trace!("📦 page {page_number}: {} items ready", items.len());
            if !publish(tx, PageResult::ok(items)).await {
                debug!("🚪 consumer hung up after page {page_number}; no point fetching more");
                return;
            }

            self.query.cursor = next_cursor.filter(|cursor| !cursor.is_empty());
            if self.query.cursor.is_none() {
                debug!("🏁 cursor exhausted after {} pages", page_number + 1);
                return;
            }
            page_number += 1;
        }
    }
}

/// 📬 Blocks while the channel is full (backpressure). `false` = nobody is listening anymore.
async fn publish<T>(tx: &Sender<PageResult<T>>, result: PageResult<T>) -> bool {
    tx.send(result).await.is_ok()
}

/// 🚀 Shorthand for `PagedFetchWorker::new(client, unmarshaler, query, cancel).start()`.
pub fn query_async<C, U, T>(
    cancel: CancellationToken,
    client: C,
    unmarshaler: U,
    query: Query<C::Params>,
) -> PageStream<T>
where
    C: PagedClient,
    U: Unmarshaler<C::Record, T>,
    T: Send + 'static,
{
    PagedFetchWorker::new(client, unmarshaler, query, cancel).start()
}

/// 📥 The read-only end of a paged stream.
///
/// Drain it with [`PageStream::recv`] (or as a `futures::Stream`) until it returns
/// `None`. Not `Clone`: a stream has exactly one consumer. Dropping it early is allowed;
/// the worker notices on its next publish and stops.
pub struct PageStream<T> {
    // 📌 the receiver's listener is `!Unpin`; boxing it keeps `PageStream` itself `Unpin`
    rx: Pin<Box<Receiver<PageResult<T>>>>,
    handle: JoinHandle<()>,
}

impl<T> PageStream<T> {
    /// 📥 The next result, or `None` once the worker has closed the channel.
    pub async fn recv(&mut self) -> Option<PageResult<T>> {
        self.rx.recv().await.ok()
    }

    /// 🔍 `true` once the worker has closed the channel. Results may still be buffered.
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    /// 📊 Results published but not yet received.
    pub fn queued(&self) -> usize {
        self.rx.len()
    }

    /// ⏳ Wait for the background task to finish. Only errors if the task panicked,
    /// which would be a bug in a client or unmarshaler.
    pub async fn join(self) -> Result<()> {
        let Self { rx, handle } = self;
        // 🚪 drop our end first so a worker blocked on a full channel can leave
        drop(rx);
        handle
            .await
            .map_err(|join_error| anyhow::anyhow!("💀 paged fetch worker panicked: {join_error}"))
    }
}

impl<T> Stream for PageStream<T> {
    type Item = PageResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.as_mut().poll_next(cx)
    }
}

impl<T> std::fmt::Debug for PageStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageStream")
            .field("queued", &self.rx.len())
            .field("closed", &self.rx.is_closed())
            .finish()
    }
}
