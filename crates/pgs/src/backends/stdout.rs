use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{self, AsyncWriteExt};

use crate::backends::Sink;

/// 🖨️ StdoutSink, for piping pages into `jq` like a civilized person.
#[derive(Debug)]
pub struct StdoutSink {
    out: io::BufWriter<io::Stdout>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            out: io::BufWriter::new(io::stdout()),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for StdoutSink {
    async fn send(&mut self, payload: String) -> Result<()> {
        self.out
            .write_all(payload.as_bytes())
            .await
            .context("💀 stdout stopped listening. Did someone close the pipe?")
    }

    async fn close(&mut self) -> Result<()> {
        self.out.flush().await.context("💀 Failed to flush stdout")
    }
}
