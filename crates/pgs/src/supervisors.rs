//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where cursors never end..."
//! 🎬 "One supervisor dared to stop them." *[record scratch]* 🦆
//!
//! 📦 The Supervisor: builds the backends from config, owns the cancellation token,
//! starts one fetch worker and one drain worker, and waits.
//!
//! Three things cancel the token: the drain worker hitting `max_pages`, the
//! `runtime.timeout_secs` deadline, and Ctrl-C. The fetch worker sees it at the top of
//! its next loop; the drain worker sees the `ContextCanceled` result and reports it.

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::app_config::{AppConfig, ClientConfig, SinkConfig};
use crate::backends::{
    ClientBackend, FileClient, FileSink, HttpClient, InMemoryClient, InMemorySink, SinkBackend, StdoutSink,
};
use crate::composers::ComposerBackend;
use crate::progress::ProgressMetrics;
use crate::unmarshalers::JsonUnmarshaler;
use crate::workers::{DrainSummary, DrainWorker, Worker, query_async};

pub(crate) struct Supervisor {
    app_config: AppConfig,
}

impl Supervisor {
    pub(crate) fn new(app_config: AppConfig) -> Self {
        Self { app_config }
    }

    /// 🧵 Unleash the workers and wait for the drain side to report back.
    pub(crate) async fn start_workers(&self) -> Result<DrainSummary> {
        let config = &self.app_config;
        let cancel = CancellationToken::new();

        let client = build_client(&config.source_config)
            .await
            .context("💀 Supervisor could not build the paged client")?;
        let sink = build_sink(&config.sink_config)
            .await
            .context("💀 Supervisor could not build the sink")?;
        let composer = ComposerBackend::resolve(&config.sink_config, config.runtime.composer);
        let source_name = describe_source(&config.source_config);
        let progress = if config.runtime.show_progress {
            ProgressMetrics::new(source_name.clone())
        } else {
            ProgressMetrics::hidden(source_name.clone())
        };
        debug!("🏗️ source: {source_name}, sink: {:?}, composer: {composer:?}", config.sink_config);

        let stream = query_async(
            cancel.clone(),
            client,
            JsonUnmarshaler::<Value>::new(),
            config.query.to_query(),
        );
        let drain = DrainWorker::new(stream, sink, composer, progress, cancel.clone())
            .with_max_pages(config.runtime.max_pages)
            .start();
        let watchdog = tokio::spawn(watch(
            cancel.clone(),
            config.runtime.timeout_secs.map(Duration::from_secs),
        ));

        let summary = finish_drain(drain, &watchdog).await?;
        info!(
            "✅ drained {} pages, {} items, {} bytes{}",
            summary.pages,
            summary.items,
            summary.bytes,
            if summary.stopped_early { " (stopped at max_pages)" } else { "" }
        );
        Ok(summary)
    }
}

/// 🏁 Await the drain, then stop the watchdog whether the drain returned, failed or panicked.
async fn finish_drain(
    drain: JoinHandle<Result<DrainSummary>>,
    watchdog: &JoinHandle<()>,
) -> Result<DrainSummary> {
    let outcome = drain.await;
    watchdog.abort();
    outcome.context("💀 DrainWorker panicked")?
}

/// ⏰ Cancels `cancel` on Ctrl-C or when `timeout` elapses; returns quietly if someone
/// else cancels first.
async fn watch(cancel: CancellationToken, timeout: Option<Duration>) {
    let deadline = async {
        match timeout {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        Ok(()) = signal::ctrl_c() => info!("🛑 Ctrl-C received; cancelling the stream"),
        _ = deadline => info!("⏰ timeout reached; cancelling the stream"),
        _ = cancel.cancelled() => return,
    }
    cancel.cancel();
}

async fn build_client(config: &ClientConfig) -> Result<ClientBackend> {
    Ok(match config {
        ClientConfig::InMemory(c) => ClientBackend::InMemory(InMemoryClient::from_config(c.clone())?),
        ClientConfig::File(c) => ClientBackend::File(FileClient::new(c.clone()).await?),
        ClientConfig::Http(c) => ClientBackend::Http(HttpClient::new(c.clone())?),
    })
}

async fn build_sink(config: &SinkConfig) -> Result<SinkBackend> {
    Ok(match config {
        SinkConfig::InMemory => SinkBackend::InMemory(InMemorySink::new()),
        SinkConfig::File(c) => SinkBackend::File(FileSink::new(c.clone()).await?),
        SinkConfig::Stdout => SinkBackend::Stdout(StdoutSink::new()),
    })
}

fn describe_source(config: &ClientConfig) -> String {
    match config {
        ClientConfig::InMemory(c) => format!("in-memory ({} documents)", c.documents.len()),
        ClientConfig::File(c) => format!("file: {}", c.file_name),
        ClientConfig::Http(c) => format!("http: {}", c.url),
    }
}
