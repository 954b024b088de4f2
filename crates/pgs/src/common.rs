//! 📦 Common data structures: the building blocks of pgs
//!
//! 🎬 COLD OPEN: INT. SOMEBODY'S API, PAGE 1 OF ???
//!
//! The response came back with forty records and a little string at the bottom.
//! "next_cursor": "eyJvZmZzZXQiOjQwfQ==". The engineer stared at it. It stared back.
//! Nobody knows what's inside a cursor. Nobody is supposed to. You just hand it back
//! and hope the server remembers where it left off.
//!
//! 🦆
//!
//! This module holds the structs that ferry a paged query through the worker:
//! - [`Cursor`]: the opaque continuation token. Empty means "no more pages".
//! - [`Query`]: the query descriptor, opaque params + the cursor the worker advances.
//! - [`Page`]: one raw page as a client hands it back.
//! - [`PageResult`]: one typed page (or one terminal error) as the consumer sees it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::FetchError;

/// 🔧 The `Params` type every built-in client speaks: plain string key/value pairs.
/// Custom clients are free to pick something fancier.
pub type QueryParams = BTreeMap<String, String>;

/// 🔖 An opaque continuation token handed out by the remote source.
///
/// The worker never looks inside. It only asks one question: "are you empty?"
/// An empty token and an absent token mean the same thing, no more pages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// 🏗️ Wrap a raw token. Empty strings are accepted here; [`Cursor::non_empty`]
    /// is the gatekeeper that turns them into "absent".
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// 🚪 `Some(cursor)` for a real token, `None` for an empty one.
    pub fn non_empty(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() { None } else { Some(Self(token)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// 📜 The query descriptor: what to ask for, and where to resume.
///
/// `params` is opaque to the worker, it is passed to the client untouched on every
/// fetch. `cursor` starts out as whatever the caller sets (usually `None`) and is then
/// advanced by the worker after each successful page. Once a stream starts, the worker
/// owns its copy; the caller's original is never touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query<P> {
    pub params: P,
    pub cursor: Option<Cursor>,
}

impl<P> Query<P> {
    /// 🚀 A fresh query, starting from the very first page.
    pub fn new(params: P) -> Self {
        Self { params, cursor: None }
    }

    /// 🔄 Resume from a cursor a previous stream handed out. Empty tokens start over.
    pub fn starting_at(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor.filter(|c| !c.is_empty());
        self
    }
}

/// 📄 One page as the client returns it: raw records plus where to go next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<R> {
    pub items: Vec<R>,
    /// `None` (or an empty cursor) = this was the last page.
    pub next_cursor: Option<Cursor>,
}

impl<R> Page<R> {
    pub fn new(items: Vec<R>, next_cursor: Option<Cursor>) -> Self {
        Self { items, next_cursor }
    }

    /// 🏁 A page with nothing after it.
    pub fn last(items: Vec<R>) -> Self {
        Self { items, next_cursor: None }
    }
}

/// 🎯 One unit published on the stream.
///
/// Either a successful page (`error == None`, `items` in source order, possibly empty)
/// or the terminal event (`error == Some(..)`). When present, the error result is
/// always the final one on the stream; for an unmarshal failure, `items` carries the
/// records of that page that converted before the bad one.
#[derive(Debug)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub error: Option<FetchError>,
}

impl<T> PageResult<T> {
    /// ✅ A clean page.
    pub fn ok(items: Vec<T>) -> Self {
        Self { items, error: None }
    }

    /// 💀 The terminal result, carrying whatever items made it through.
    pub fn failed(items: Vec<T>, error: FetchError) -> Self {
        Self { items, error: Some(error) }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    /// 🔄 Collapse into a `Result`, dropping any partial items that came with an error.
    pub fn into_result(self) -> Result<Vec<T>, FetchError> {
        match self.error {
            None => Ok(self.items),
            Some(err) => Err(err),
        }
    }
}
