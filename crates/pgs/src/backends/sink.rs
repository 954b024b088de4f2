use anyhow::Result;
use async_trait::async_trait;

use crate::backends::{file, in_mem, stdout};

/// 🕳️ A sink that writes pre-rendered payloads, pure I/O, zero logic.
///
/// The drain at the bottom of the pipeline tub. Sinks do not know about pages, cursors,
/// or `T`. The `DrainWorker` composes each page into a payload string and hands it over.
///
/// # Contract 📜
/// - `send` accepts one fully rendered payload and writes it. That's it.
/// - `close` flushes and finalizes. MUST be called. Skipping `close` is a bug.
///   It is also considered rude.
#[async_trait]
pub trait Sink: std::fmt::Debug + Send {
    /// 📡 Write one rendered payload to the destination.
    async fn send(&mut self, payload: String) -> Result<()>;
    /// 🗑️ Flush, finalize, and release.
    async fn close(&mut self) -> Result<()>;
}

/// 🎭 The many faces of a Sink. Mirrors `ClientBackend` on the other end of the stream.
#[derive(Debug)]
pub enum SinkBackend {
    InMemory(in_mem::InMemorySink),
    File(file::FileSink),
    Stdout(stdout::StdoutSink),
}

#[async_trait]
impl Sink for SinkBackend {
    async fn send(&mut self, payload: String) -> Result<()> {
        match self {
            SinkBackend::InMemory(sink) => sink.send(payload).await,
            SinkBackend::File(sink) => sink.send(payload).await,
            SinkBackend::Stdout(sink) => sink.send(payload).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            SinkBackend::InMemory(sink) => sink.close().await,
            SinkBackend::File(sink) => sink.close().await,
            SinkBackend::Stdout(sink) => sink.close().await,
        }
    }
}
