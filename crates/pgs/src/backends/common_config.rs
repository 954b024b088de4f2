//! 📦 **Common client config**: the knobs every paged client shares.
//!
//! 🧠 Knowledge graph:
//! - Embedded in `FileClientConfig` and `HttpClientConfig`.
//! - `max_batch_size_docs`: record-count ceiling per page. The file client enforces it
//!   itself; the HTTP client forwards it as the page-size query parameter.
//! - `max_batch_size_bytes`: byte ceiling per page. Only the file client can enforce this
//!   one, the HTTP server decides how big its own pages are.

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CommonClientConfig {
    /// 📦 Max records per page
    #[serde(default = "default_max_batch_size_docs")]
    pub max_batch_size_docs: usize,
    /// 📦 Max bytes per page (file client only)
    #[serde(default = "default_max_batch_size_bytes")]
    pub max_batch_size_bytes: usize,
}

// 📦 1,000 records per page, a nice round number that will age like milk
// the moment someone pages through 50MB documents.
fn default_max_batch_size_docs() -> usize {
    1000
}

// 📦 1MB per page. If your records are bigger, we need to talk.
fn default_max_batch_size_bytes() -> usize {
    1024 * 1024
}

impl Default for CommonClientConfig {
    fn default() -> Self {
        Self {
            max_batch_size_docs: default_max_batch_size_docs(),
            max_batch_size_bytes: default_max_batch_size_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_serde_and_default_finally_agree() {
        let the_parsed: CommonClientConfig = serde_json::from_str("{}")
            .expect("💀 an empty object should fill in every default");
        assert_eq!(the_parsed, CommonClientConfig::default());
        assert_eq!(the_parsed.max_batch_size_docs, 1000);
    }

    #[test]
    fn the_one_where_toml_overrides_only_what_it_names() {
        let the_parsed: CommonClientConfig =
            toml::from_str("max_batch_size_docs = 5").expect("💀 one knob of TOML should parse");
        assert_eq!(the_parsed.max_batch_size_docs, 5);
        assert_eq!(the_parsed.max_batch_size_bytes, CommonClientConfig::default().max_batch_size_bytes);
    }
}
