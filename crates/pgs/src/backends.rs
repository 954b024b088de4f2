//! 🔌 Backends: where the real I/O happens.
//!
//! 📡 Paged clients pour the pages, sinks slurp up what the consumer renders.
//! In between sits the worker, and none of these files know it exists.
//!
//! 🎭 This module is the casting agency. Need to page through a `Vec`? A file on disk?
//! Somebody's JSON API with a `next_cursor` field? We've got a client for that.
//!
//! 🦆 The duck is here because every file must have one. This is law.

mod client;
mod sink;

pub mod common_config;
pub mod file;
pub mod http;
pub mod in_mem;
pub mod stdout;

pub use client::{ClientBackend, PagedClient};
pub use sink::{Sink, SinkBackend};

// 🎯 Re-export backend-specific types so callers can say `backends::FileClient`
// instead of spelunking into `backends::file::FileClient`.
pub use common_config::CommonClientConfig;
pub use file::{FileClient, FileClientConfig, FileSink, FileSinkConfig};
pub use http::{HttpClient, HttpClientConfig};
pub use in_mem::{InMemoryClient, InMemoryClientConfig, InMemorySink};
pub use stdout::StdoutSink;
