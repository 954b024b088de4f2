//! 🎬 *[a channel fills with pages. somewhere, a sink waits.]*
//!
//! 🗑️ The DrainWorker: reads a [`PageStream`] until it closes, renders each page with a
//! composer, and writes it to a sink. Patient, tireless, deeply unbothered by upstream.
//!
//! Partial items that arrive alongside an error are still written; the error then
//! becomes the worker's result once the stream closes. With `max_pages` set, the worker
//! cancels the shared token after that many successful pages and discards whatever the
//! fetch side still publishes on its way out.

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{PageStream, Worker};
use crate::backends::{Sink, SinkBackend};
use crate::common::PageResult;
use crate::composers::{Composer, ComposerBackend};
use crate::errors::FetchError;
use crate::progress::ProgressMetrics;

/// 📋 What one drain accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// ✅ pages published without an error
    pub pages: u64,
    /// 📄 items written, partial pages included
    pub items: u64,
    /// 📦 payload bytes handed to the sink
    pub bytes: u64,
    /// ✂️ `true` when `max_pages` cut the stream short
    pub stopped_early: bool,
}

#[derive(Debug)]
pub struct DrainWorker<T> {
    stream: PageStream<T>,
    sink: SinkBackend,
    composer: ComposerBackend,
    progress: ProgressMetrics,
    cancel: CancellationToken,
    max_pages: Option<u64>,
}

impl<T> DrainWorker<T>
where
    T: Serialize + Send + 'static,
{
    pub fn new(
        stream: PageStream<T>,
        sink: SinkBackend,
        composer: ComposerBackend,
        progress: ProgressMetrics,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stream,
            sink,
            composer,
            progress,
            cancel,
            max_pages: None,
        }
    }

    /// ✂️ Stop after `max_pages` successful pages. `None` (the default) drains everything.
    pub fn with_max_pages(mut self, max_pages: Option<u64>) -> Self {
        self.max_pages = max_pages;
        self
    }

    async fn drain(mut self) -> Result<DrainSummary> {
        debug!("📥 DrainWorker started draining the page stream...");
        let mut summary = DrainSummary::default();

        let drained = self.drain_pages(&mut summary).await;
        self.progress.finish();
        // 🚪 closed on every exit path, errors included
        let closed = self.sink.close().await.context("💀 DrainWorker failed to close the sink");
        let failure = drained?;
        closed?;
        debug!("🏁 DrainWorker: stream closed after {} pages.", summary.pages);

        match failure {
            Some(err) => Err(anyhow::Error::new(err).context(format!(
                "💀 page stream failed after {} good pages ({} items written)",
                summary.pages, summary.items
            ))),
            None => Ok(summary),
        }
    }

    /// 🔄 Read until the stream closes. `Ok(Some(_))` carries the error the stream reported.
    async fn drain_pages(&mut self, summary: &mut DrainSummary) -> Result<Option<FetchError>> {
        let mut failure = None;

        while let Some(result) = self.stream.recv().await {
            if summary.stopped_early {
                // 🗑️ past the limit; keep reading so the fetch side can wind down
                continue;
            }
            let PageResult { items, error } = result;
            if error.is_none() && self.limit_reached(summary.pages) {
                self.stop_early(summary);
                continue;
            }
            if !items.is_empty() || error.is_none() {
                // 🎼 render before any await so only owned data crosses it
                let payload = self
                    .composer
                    .compose(&items)
                    .context("💀 DrainWorker failed to render a page")?;
                self.write_page(payload, items.len() as u64, error.is_none(), summary)
                    .await?;
            }
            match error {
                None => {
                    summary.pages += 1;
                    if self.limit_reached(summary.pages) {
                        self.stop_early(summary);
                    }
                }
                Some(err) => {
                    debug!("💀 stream reported {}: {err}", err.kind());
                    failure = Some(err);
                }
            }
        }
        Ok(failure)
    }

    fn limit_reached(&self, pages: u64) -> bool {
        self.max_pages.is_some_and(|max| pages >= max)
    }

    fn stop_early(&mut self, summary: &mut DrainSummary) {
        info!("✂️ reached max_pages ({}); cancelling the fetch", summary.pages);
        summary.stopped_early = true;
        self.cancel.cancel();
    }

    /// 📬 `complete` is false for the partial page that arrives with an error; its items
    /// are written but it is not counted as a page.
    async fn write_page(
        &mut self,
        payload: String,
        items: u64,
        complete: bool,
        summary: &mut DrainSummary,
    ) -> Result<()> {
        let bytes = payload.len() as u64;
        if !payload.is_empty() {
            self.sink
                .send(payload)
                .await
                .context("💀 DrainWorker failed to hand a page to the sink")?;
        }
        summary.items += items;
        summary.bytes += bytes;
        self.progress.update(u64::from(complete), items, bytes);
        Ok(())
    }
}

impl<T> Worker for DrainWorker<T>
where
    T: Serialize + Send + 'static,
{
    type Output = DrainSummary;

    fn start(self) -> JoinHandle<Result<DrainSummary>> {
        tokio::spawn(self.drain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{FileSink, FileSinkConfig, InMemoryClient, InMemorySink};
    use crate::common::{Query, QueryParams};
    use crate::composers::{JsonArrayComposer, NdjsonComposer};
    use crate::errors::ErrorKind;
    use crate::unmarshalers::{JsonUnmarshaler, unmarshal_fn};
    use crate::workers::query_async;
    use serde_json::Value;

    fn the_stream(records: &[&str], page_size: usize, cancel: &CancellationToken) -> PageStream<Value> {
        let the_client = InMemoryClient::new(records.iter().map(|r| r.to_string()).collect(), page_size)
            .expect("💀 page size is fine");
        query_async(
            cancel.clone(),
            the_client,
            JsonUnmarshaler::<Value>::new(),
            Query::new(QueryParams::new()),
        )
    }

    fn the_worker(stream: PageStream<Value>, sink: &InMemorySink, composer: ComposerBackend, cancel: &CancellationToken) -> DrainWorker<Value> {
        DrainWorker::new(
            stream,
            SinkBackend::InMemory(sink.clone()),
            composer,
            ProgressMetrics::hidden("test"),
            cancel.clone(),
        )
    }

    #[tokio::test]
    async fn the_one_where_every_page_lands_in_the_sink() -> Result<()> {
        let the_cancel = CancellationToken::new();
        let the_sink = InMemorySink::new();
        let the_records = [r#"{"a":1}"#, r#"{"a":2}"#, r#"{"a":3}"#, r#"{"a":4}"#, r#"{"a":5}"#];

        let the_summary = the_worker(
            the_stream(&the_records, 2, &the_cancel),
            &the_sink,
            ComposerBackend::JsonArray(JsonArrayComposer),
            &the_cancel,
        )
        .start()
        .await??;

        assert_eq!(the_summary.pages, 3);
        assert_eq!(the_summary.items, 5);
        assert!(!the_summary.stopped_early);
        assert_eq!(
            the_sink.payloads().await,
            vec![r#"[{"a":1},{"a":2}]"#, r#"[{"a":3},{"a":4}]"#, r#"[{"a":5}]"#]
        );
        let the_bytes: usize = the_sink.payloads().await.iter().map(String::len).sum();
        assert_eq!(the_summary.bytes, the_bytes as u64);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_good_items_before_a_bad_record_still_get_written() -> Result<()> {
        let the_cancel = CancellationToken::new();
        let the_sink = InMemorySink::new();
        let the_records = [r#"{"a":1}"#, r#"{"a":2}"#, r#"{"a":3}"#, "{not json", r#"{"a":5}"#];

        let the_err = the_worker(
            the_stream(&the_records, 4, &the_cancel),
            &the_sink,
            ComposerBackend::Ndjson(NdjsonComposer),
            &the_cancel,
        )
        .start()
        .await?
        .expect_err("💀 a malformed record must fail the drain");

        let the_fetch_error = the_err
            .chain()
            .find_map(|cause| cause.downcast_ref::<FetchError>())
            .expect("💀 the FetchError should be in the chain");
        assert_eq!(the_fetch_error.kind(), ErrorKind::UnmarshalError);
        assert_eq!(
            the_sink.payloads().await,
            vec!["{\"a\":1}\n{\"a\":2}\n{\"a\":3}\n".to_string()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_max_pages_pulls_the_plug_politely() -> Result<()> {
        let the_cancel = CancellationToken::new();
        let the_sink = InMemorySink::new();
        let the_records: Vec<String> = (0..20).map(|i| format!(r#"{{"n":{i}}}"#)).collect();
        let the_refs: Vec<&str> = the_records.iter().map(String::as_str).collect();

        let the_summary = the_worker(
            the_stream(&the_refs, 2, &the_cancel),
            &the_sink,
            ComposerBackend::JsonArray(JsonArrayComposer),
            &the_cancel,
        )
        .with_max_pages(Some(2))
        .start()
        .await??;

        assert_eq!(the_summary.pages, 2);
        assert_eq!(the_summary.items, 4);
        assert!(the_summary.stopped_early);
        assert!(the_cancel.is_cancelled());
        assert_eq!(the_sink.payloads().await.len(), 2, "nothing past the limit reaches the sink");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_outside_cancel_is_an_error() -> Result<()> {
        let the_cancel = CancellationToken::new();
        the_cancel.cancel();
        let the_sink = InMemorySink::new();

        let the_err = the_worker(
            the_stream(&[r#"{"a":1}"#], 1, &the_cancel),
            &the_sink,
            ComposerBackend::JsonArray(JsonArrayComposer),
            &the_cancel,
        )
        .start()
        .await?
        .expect_err("💀 someone else cancelled; that's not a clean finish");

        assert!(
            the_err
                .chain()
                .filter_map(|cause| cause.downcast_ref::<FetchError>())
                .any(FetchError::is_canceled)
        );
        assert!(the_sink.payloads().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_empty_source_writes_nothing_but_still_counts_a_page() -> Result<()> {
        let the_cancel = CancellationToken::new();
        let the_sink = InMemorySink::new();

        let the_summary = the_worker(
            the_stream(&[], 3, &the_cancel),
            &the_sink,
            ComposerBackend::Ndjson(NdjsonComposer),
            &the_cancel,
        )
        .start()
        .await??;

        assert_eq!(the_summary, DrainSummary { pages: 1, ..DrainSummary::default() });
        assert!(the_sink.payloads().await.is_empty(), "NDJSON of nothing is nothing; not sent");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_max_pages_zero_writes_nothing() -> Result<()> {
        let the_cancel = CancellationToken::new();
        let the_sink = InMemorySink::new();

        let the_summary = the_worker(
            the_stream(&["0", "1", "2", "3"], 2, &the_cancel),
            &the_sink,
            ComposerBackend::JsonArray(JsonArrayComposer),
            &the_cancel,
        )
        .with_max_pages(Some(0))
        .start()
        .await??;

        assert_eq!(
            the_summary,
            DrainSummary {
                stopped_early: true,
                ..DrainSummary::default()
            }
        );
        assert!(the_cancel.is_cancelled());
        assert!(the_sink.payloads().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_partial_page_is_items_but_not_a_page() -> Result<()> {
        let the_cancel = CancellationToken::new();
        let the_sink = InMemorySink::new();
        let the_records = [r#"{"a":1}"#, r#"{"a":2}"#, r#"{"a":3}"#, "{not json"];
        let mut the_worker = the_worker(
            the_stream(&the_records, 2, &the_cancel),
            &the_sink,
            ComposerBackend::Ndjson(NdjsonComposer),
            &the_cancel,
        );

        let mut the_summary = DrainSummary::default();
        let the_failure = the_worker.drain_pages(&mut the_summary).await?;

        assert!(the_failure.is_some_and(|err| err.kind() == ErrorKind::UnmarshalError));
        assert_eq!((the_summary.pages, the_summary.items), (1, 3));
        assert_eq!(the_worker.progress.total_pages(), the_summary.pages);
        assert_eq!(the_worker.progress.total_items(), the_summary.items);
        Ok(())
    }

    /// 🧨 Serializes fine until it meets a negative number.
    struct Touchy(i64);

    impl Serialize for Touchy {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
            if self.0 < 0 {
                return Err(serde::ser::Error::custom("negative numbers are not welcome here"));
            }
            serializer.serialize_i64(self.0)
        }
    }

    #[tokio::test]
    async fn the_one_where_a_render_failure_still_flushes_the_file() -> Result<()> {
        let the_dir = tempfile::tempdir()?;
        let the_path = the_dir.path().join("out.ndjson");
        let the_sink = FileSink::new(FileSinkConfig {
            file_name: the_path.display().to_string(),
        })
        .await?;
        let the_cancel = CancellationToken::new();
        let the_client = InMemoryClient::new(vec!["1".into(), "2".into(), "-3".into(), "4".into()], 2)?;
        let the_stream = query_async(
            the_cancel.clone(),
            the_client,
            unmarshal_fn(|raw: String| Ok(Touchy(raw.parse()?))),
            Query::new(QueryParams::new()),
        );

        let the_err = DrainWorker::new(
            the_stream,
            SinkBackend::File(the_sink),
            ComposerBackend::Ndjson(NdjsonComposer),
            ProgressMetrics::hidden("test"),
            the_cancel.clone(),
        )
        .start()
        .await?
        .expect_err("💀 page two cannot be rendered");

        assert!(format!("{the_err:#}").contains("failed to render a page"));
        assert_eq!(tokio::fs::read_to_string(&the_path).await?, "1\n2\n", "page one made it to disk");
        Ok(())
    }
}
