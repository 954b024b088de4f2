//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment: `PGS_*` environment variables, optionally merged with a TOML
//! file. TOML wins on conflicts.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::{FileClientConfig, FileSinkConfig, HttpClientConfig, InMemoryClientConfig};
use crate::common::{Cursor, Query, QueryParams};

/// 📦 One struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 📡 Where pages come from.
    pub source_config: ClientConfig,
    /// 🕳️ Where rendered pages go.
    pub sink_config: SinkConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 📡 Which paged client to build. Externally tagged: `[source_config.File]`, etc.
#[derive(Debug, Deserialize, Clone)]
pub enum ClientConfig {
    InMemory(InMemoryClientConfig),
    File(FileClientConfig),
    Http(HttpClientConfig),
}

/// 🕳️ Which sink to build. `sink_config = "Stdout"` works for the unit variants.
#[derive(Debug, Deserialize, Clone)]
pub enum SinkConfig {
    InMemory,
    File(FileSinkConfig),
    Stdout,
}

/// 🔍 What to ask the source for, and where to start.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct QueryConfig {
    /// Opaque to the worker; forwarded to every fetch.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Resume from here instead of the first page. Empty = first page.
    #[serde(default)]
    pub start_cursor: Option<String>,
}

impl QueryConfig {
    pub fn to_query(&self) -> Query<QueryParams> {
        Query::new(self.params.clone()).starting_at(self.start_cursor.clone().map(Cursor::new))
    }
}

/// 🎼 Overrides the payload format the sink would otherwise pick.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComposerKind {
    Ndjson,
    JsonArray,
}

/// ⏱️ Knobs for the run itself, not for any one backend.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// Cancel the stream after this many seconds. `None` = no deadline.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Stop after this many successful pages. `None` = drain everything.
    #[serde(default)]
    pub max_pages: Option<u64>,
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
    #[serde(default)]
    pub composer: Option<ComposerKind>,
}

fn default_show_progress() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            max_pages: None,
            show_progress: default_show_progress(),
            composer: None,
        }
    }
}

/// 🚀 Load the config from `PGS_*` env vars, plus the TOML file if one is given.
///
/// - `None` → env vars only. No file. No assumptions.
/// - `Some(path)` → env vars + TOML file, merged. TOML wins on conflicts.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("PGS_"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (PGS_*). \
             The file exists in our hearts, but apparently not in a shape serde recognizes.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (PGS_*). \
                 No file was provided, so this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}
