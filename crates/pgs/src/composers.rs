//! 🎬 *[a page arrives. its items are typed. the sink only speaks strings.]*
//!
//! 🎼 The Composers module: rendering one page of typed items into one payload.
//!
//! 🧠 Knowledge graph:
//! - **NDJSON** (`NdjsonComposer`): one JSON line per item, trailing `\n`. Files and stdout.
//! - **JSON Array** (`JsonArrayComposer`): `[item,item,item]`. In-memory sinks, for tests.
//! - Resolution: from `SinkConfig`, same pattern as the backends. `runtime.composer`
//!   overrides it.
//!
//! ```text
//! DrainWorker:
//!   PageStream<T> → PageResult { items } → composer.compose(&items) → sink.send(payload)
//! ```
//!
//! 🦆 (the duck composes... symphonies? payloads? both? the duck has no comment.)

use anyhow::{Context, Result};
use serde::Serialize;

use crate::app_config::{ComposerKind, SinkConfig};

/// 🎼 Renders one page of items into a single wire-format payload.
pub trait Composer: std::fmt::Debug {
    fn compose<T: Serialize>(&self, items: &[T]) -> Result<String>;
}

/// 📡 Newline-Delimited JSON. Every line is lonely. No brackets to hold them.
/// No commas to connect them. Just newlines. And silence.
#[derive(Debug, Clone, Copy)]
pub struct NdjsonComposer;

impl Composer for NdjsonComposer {
    fn compose<T: Serialize>(&self, items: &[T]) -> Result<String> {
        let mut payload = String::new();
        for item in items {
            let line = serde_json::to_string(item).context("💀 An item refused to become JSON")?;
            payload.push_str(&line);
            payload.push('\n');
        }
        Ok(payload)
    }
}

/// 📦 JSON Array format, `[item1,item2,item3]`, one valid JSON document per page.
#[derive(Debug, Clone, Copy)]
pub struct JsonArrayComposer;

impl Composer for JsonArrayComposer {
    fn compose<T: Serialize>(&self, items: &[T]) -> Result<String> {
        serde_json::to_string(items).context("💀 A page refused to become a JSON array")
    }
}

/// 🎭 The polymorphic composer, wraps concrete composers, dispatches via match.
#[derive(Debug, Clone, Copy)]
pub enum ComposerBackend {
    Ndjson(NdjsonComposer),
    JsonArray(JsonArrayComposer),
}

impl ComposerBackend {
    /// 🔧 Resolve the composer from the sink config.
    ///
    /// | SinkConfig | Composer | Format |
    /// |---|---|---|
    /// | File | NdjsonComposer | `item\nitem\n` |
    /// | Stdout | NdjsonComposer | `item\nitem\n` |
    /// | InMemory | JsonArrayComposer | `[item,item]` |
    pub fn from_sink_config(sink: &SinkConfig) -> Self {
        match sink {
            SinkConfig::File(_) | SinkConfig::Stdout => Self::Ndjson(NdjsonComposer),
            SinkConfig::InMemory => Self::JsonArray(JsonArrayComposer),
        }
    }

    /// 🎯 An explicit `kind` wins; otherwise the sink picks.
    pub fn resolve(sink: &SinkConfig, kind: Option<ComposerKind>) -> Self {
        match kind {
            Some(ComposerKind::Ndjson) => Self::Ndjson(NdjsonComposer),
            Some(ComposerKind::JsonArray) => Self::JsonArray(JsonArrayComposer),
            None => Self::from_sink_config(sink),
        }
    }
}

impl Composer for ComposerBackend {
    fn compose<T: Serialize>(&self, items: &[T]) -> Result<String> {
        match self {
            Self::Ndjson(c) => c.compose(items),
            Self::JsonArray(c) => c.compose(items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ndjson_the_one_where_items_become_lines() -> Result<()> {
        let the_items = vec![json!({"doc":1}), json!({"doc":2})];
        assert_eq!(NdjsonComposer.compose(&the_items)?, "{\"doc\":1}\n{\"doc\":2}\n");
        Ok(())
    }

    #[test]
    fn ndjson_the_one_where_an_empty_page_produces_nothing() -> Result<()> {
        let the_nothing: Vec<serde_json::Value> = Vec::new();
        assert!(NdjsonComposer.compose(&the_nothing)?.is_empty(), "Empty input → empty output. Zen.");
        Ok(())
    }

    #[test]
    fn json_array_the_one_where_items_become_an_array() -> Result<()> {
        let the_items = vec![json!({"doc":1}), json!({"doc":2}), json!({"doc":3})];
        assert_eq!(
            JsonArrayComposer.compose(&the_items)?,
            r#"[{"doc":1},{"doc":2},{"doc":3}]"#
        );
        Ok(())
    }

    #[test]
    fn json_array_the_one_where_an_empty_page_is_still_valid_json() -> Result<()> {
        let the_nothing: Vec<u32> = Vec::new();
        assert_eq!(JsonArrayComposer.compose(&the_nothing)?, "[]");
        Ok(())
    }

    #[test]
    fn backend_the_one_where_each_sink_gets_its_format() -> Result<()> {
        use crate::backends::FileSinkConfig;

        let the_file = ComposerBackend::from_sink_config(&SinkConfig::File(FileSinkConfig {
            file_name: "out.ndjson".into(),
        }));
        assert!(matches!(the_file, ComposerBackend::Ndjson(_)));
        assert!(matches!(
            ComposerBackend::from_sink_config(&SinkConfig::Stdout),
            ComposerBackend::Ndjson(_)
        ));

        let the_in_mem = ComposerBackend::from_sink_config(&SinkConfig::InMemory);
        assert_eq!(the_in_mem.compose(&[1, 2])?, "[1,2]");
        Ok(())
    }

    #[test]
    fn backend_the_one_where_the_override_beats_the_sink() -> Result<()> {
        let the_forced = ComposerBackend::resolve(&SinkConfig::Stdout, Some(ComposerKind::JsonArray));
        assert_eq!(the_forced.compose(&["x"])?, r#"["x"]"#);
        let the_default = ComposerBackend::resolve(&SinkConfig::Stdout, None);
        assert_eq!(the_default.compose(&["x"])?, "\"x\"\n");
        Ok(())
    }
}
