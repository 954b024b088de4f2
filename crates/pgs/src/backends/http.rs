//! # 📡 THE HTTP BACKEND
//!
//! 🎬 COLD OPEN: INT. SOMEONE ELSE'S API, PAGE 1
//!
//! "Just call the endpoint until `next_cursor` is null," the docs said.
//! The docs did not say what happens when `next_cursor` is `""`. Or `0`. Or missing.
//! We handle all of them. We have seen things.
//!
//! [`HttpClient`] speaks the most generic cursor protocol we could get away with:
//!
//! ```text
//! GET {url}?{params...}&{page_size_param}={n}&{cursor_param}={cursor}
//! → { "<items_field>": [ record, record, ... ], "<cursor_field>": "token" | 123 | null }
//! ```
//!
//! Field and parameter names are config, so it fits most JSON APIs that page with a
//! token. Records come back as raw JSON text (sliced with `RawValue`, never re-serialized)
//! and are left for the unmarshaler to judge.
//!
//! 🔄 No retries here. A failed request is a failed stream. 🦆

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::value::RawValue;
use tracing::{debug, trace};

use crate::backends::{CommonClientConfig, PagedClient};
use crate::common::{Cursor, Page, Query, QueryParams};

#[derive(Debug, Deserialize, Clone)]
pub struct HttpClientConfig {
    /// 📡 Full endpoint URL, scheme and all.
    pub url: String,
    /// 📦 Top-level response field holding the page's records.
    #[serde(default = "default_items_field")]
    pub items_field: String,
    /// 🔖 Top-level response field holding the next cursor.
    #[serde(default = "default_cursor_field")]
    pub cursor_field: String,
    /// 🔖 Query parameter the cursor is sent back in.
    #[serde(default = "default_cursor_param")]
    pub cursor_param: String,
    /// 📏 Query parameter for the page size. `None` = let the server decide.
    #[serde(default)]
    pub page_size_param: Option<String>,
    /// 🔒 Basic auth username.
    #[serde(default)]
    pub username: Option<String>,
    /// 🔒 Basic auth password.
    #[serde(default)]
    pub password: Option<String>,
    /// 🔒 API key, sent as `Authorization: ApiKey <key>`. Wins over basic auth.
    #[serde(default)]
    pub api_key: Option<String>,
    /// ⏱️ Per-request timeout. A stuck request blocks the worker, and cancellation
    /// cannot reach inside a request, so this is the only bound on a single fetch.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub common_config: CommonClientConfig,
}

fn default_items_field() -> String {
    "items".to_string()
}

fn default_cursor_field() -> String {
    "next_cursor".to_string()
}

fn default_cursor_param() -> String {
    "cursor".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        // 🔧 validate the URL now rather than on the first fetch
        reqwest::Url::parse(&config.url)
            .with_context(|| format!("💀 '{}' is not a URL. It's barely a string.", config.url))?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. The TLS stack wept. Probably a missing cert store.")?;
        Ok(Self { client, config })
    }

    fn request_url(&self, query: &Query<QueryParams>) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.config.url)
            .with_context(|| format!("💀 '{}' is not a URL", self.config.url))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &query.params {
                pairs.append_pair(key, value);
            }
            if let Some(ref size_param) = self.config.page_size_param {
                pairs.append_pair(size_param, &self.config.common_config.max_batch_size_docs.to_string());
            }
            if let Some(ref cursor) = query.cursor {
                pairs.append_pair(&self.config.cursor_param, cursor.as_str());
            }
        }
        Ok(url)
    }

    /// 🔍 Slice the records and the cursor out of a response body.
    fn parse_page(&self, body: &str) -> Result<Page<String>> {
        let fields: HashMap<String, Box<RawValue>> = serde_json::from_str(body)
            .context("💀 The response body is not a JSON object. We asked for a page and got a riddle.")?;

        let items_raw = fields.get(&self.config.items_field).with_context(|| {
            format!(
                "💀 The response has no '{}' field. Wrong `items_field`, or wrong endpoint.",
                self.config.items_field
            )
        })?;
        let records: Vec<Box<RawValue>> = serde_json::from_str(items_raw.get()).with_context(|| {
            format!("💀 The '{}' field is not an array", self.config.items_field)
        })?;

        let next_cursor = match fields.get(&self.config.cursor_field) {
            None => None,
            Some(raw) => match serde_json::from_str::<serde_json::Value>(raw.get())? {
                serde_json::Value::Null => None,
                serde_json::Value::String(token) => Cursor::non_empty(token),
                serde_json::Value::Number(n) => Some(Cursor::new(n.to_string())),
                other => bail!(
                    "💀 The '{}' field should be a string, number, or null. It was {other}.",
                    self.config.cursor_field
                ),
            },
        };

        Ok(Page::new(
            records.into_iter().map(|raw| raw.get().to_string()).collect(),
            next_cursor,
        ))
    }
}

#[async_trait]
impl PagedClient for HttpClient {
    type Params = QueryParams;
    type Record = String;

    async fn fetch(&mut self, query: &Query<QueryParams>) -> Result<Page<String>> {
        let url = self.request_url(query)?;
        trace!("📡 GET {url}");

        let mut request = self.client.get(url.clone());
        // 🔒 Auth priority: API key wins over basic auth. This is not a democracy.
        if let Some(ref api_key) = self.config.api_key {
            request = request.header("Authorization", format!("ApiKey {api_key}"));
        } else if let Some(ref username) = self.config.username {
            request = request.basic_auth(username, self.config.password.as_ref());
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("💀 GET {url} never came back. Check connectivity, timeouts, and your feelings."))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("💀 GET {url} answered {status} but the body got lost on the way"))?;
        if !status.is_success() {
            bail!("💀 GET {url} answered {status}. The body read: '{body}'");
        }

        let page = self
            .parse_page(&body)
            .with_context(|| format!("💀 GET {url} returned something that is not a page"))?;
        debug!(
            "📡 page of {} records, next cursor: {:?}",
            page.items.len(),
            page.next_cursor.as_ref().map(Cursor::as_str)
        );
        Ok(page)
    }
}
