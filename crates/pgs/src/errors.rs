//! 🏷️ The closed set of ways a paged stream can end badly.
//!
//! Everywhere else in pgs we reach for `anyhow` and a context string. Here we don't:
//! a consumer draining a stream has to be able to tell "you cancelled me" from "the
//! server is down" from "record 7 is garbage" without grepping an error message.
//! So this one gets a real enum. 🦆

use std::fmt;

use thiserror::Error;

/// 🎯 Which of the three terminal failures happened. Cheap to copy, cheap to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 🛑 The cancellation token fired before the next fetch.
    ContextCanceled,
    /// 📡 The paged client itself returned an error.
    TransportError,
    /// 🧩 A raw record could not be converted into the target type.
    UnmarshalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ContextCanceled => "context canceled",
            ErrorKind::TransportError => "transport error",
            ErrorKind::UnmarshalError => "unmarshal error",
        };
        f.write_str(name)
    }
}

/// 💀 The error attached to the final `PageResult` of a stream.
///
/// `page` is the zero-based number of the fetch that failed (counting every fetch
/// the worker issued in this stream); `index` is the zero-based position of the
/// offending record inside that page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("context canceled")]
    ContextCanceled,

    #[error("paged client returned an error on page {page}")]
    Transport {
        page: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to unmarshal item {index} of page {page}")]
    Unmarshal {
        page: usize,
        index: usize,
        #[source]
        source: anyhow::Error,
    },
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::ContextCanceled => ErrorKind::ContextCanceled,
            FetchError::Transport { .. } => ErrorKind::TransportError,
            FetchError::Unmarshal { .. } => ErrorKind::UnmarshalError,
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.kind() == ErrorKind::ContextCanceled
    }
}
