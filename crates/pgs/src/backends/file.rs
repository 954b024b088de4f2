//! 📂 File backend: NDJSON in, NDJSON out.
//!
//! [`FileClient`] pages through a newline-delimited file. The cursor is the byte offset
//! where the next page starts, so a stream can be resumed from any cursor it handed out,
//! even by a different process. [`FileSink`] appends payloads to a file and flushes on close.
//!
//! 🧠 Knowledge graph:
//! - one record = one non-blank line, trailing `\n` / `\r\n` stripped, otherwise untouched
//! - page ends at `max_batch_size_docs` records, after crossing `max_batch_size_bytes`, or at EOF
//! - EOF reached (or nothing left after the page) → `next_cursor = None`

use std::io::SeekFrom;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::{
    fs::File,
    io::{self, AsyncBufReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::trace;

use crate::backends::{CommonClientConfig, PagedClient, Sink};
use crate::common::{Cursor, Page, Query, QueryParams};

// -- 📂 FileClientConfig, "It's just a file", said no sysadmin ever before the disk filled up.
#[derive(Debug, Deserialize, Clone)]
pub struct FileClientConfig {
    pub file_name: String,
    #[serde(default)]
    pub common_config: CommonClientConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FileSinkConfig {
    pub file_name: String,
}

/// 📂 FileClient, reads a file line by line, a page at a time, and remembers nothing
/// except what the cursor tells it.
#[derive(Debug)]
pub struct FileClient {
    buf_reader: io::BufReader<File>,
    config: FileClientConfig,
}

impl FileClient {
    pub async fn new(config: FileClientConfig) -> Result<Self> {
        let file_handle = File::open(&config.file_name).await.with_context(|| {
            format!(
                "💀 The door to '{}' would not budge. We checked if it existed (it might not). \
                 We checked permissions (they might be wrong). The file remains unopened.",
                config.file_name
            )
        })?;
        Ok(Self {
            buf_reader: io::BufReader::new(file_handle),
            config,
        })
    }

    fn offset_of(cursor: Option<&Cursor>) -> Result<u64> {
        match cursor {
            None => Ok(0),
            Some(cursor) => cursor.as_str().parse::<u64>().with_context(|| {
                format!("💀 File cursor '{cursor}' is not a byte offset. Files only understand numbers.")
            }),
        }
    }
}

#[async_trait]
impl PagedClient for FileClient {
    type Params = QueryParams;
    type Record = String;

    /// 📄 Read the next page of lines starting at the cursor's byte offset.
    ///
    /// Two exit conditions exist beyond EOF, checked after every line:
    ///   1. `max_batch_size_docs`: record count cap. Don't build a page the size of Texas.
    ///   2. `max_batch_size_bytes`: byte cap. The line that crosses it is still included.
    async fn fetch(&mut self, query: &Query<QueryParams>) -> Result<Page<String>> {
        let offset = Self::offset_of(query.cursor.as_ref())?;
        self.buf_reader
            .seek(SeekFrom::Start(offset))
            .await
            .with_context(|| format!("💀 Could not seek '{}' to byte {offset}", self.config.file_name))?;

        let limits = &self.config.common_config;
        let mut records = Vec::new();
        let mut total_bytes_read = 0usize;
        let mut hit_eof = false;
        let mut line = String::new();

        loop {
            let bytes_read = self.buf_reader.read_line(&mut line).await.with_context(|| {
                format!("💀 Reading '{}' failed mid-page at byte {}", self.config.file_name, offset + total_bytes_read as u64)
            })?;
            if bytes_read == 0 {
                hit_eof = true;
                break;
            }
            total_bytes_read += bytes_read;

            // 🧹 strip the newline; blank lines are skipped but their bytes still move the cursor
            let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
            if !trimmed.trim().is_empty() {
                records.push(trimmed.to_string());
            }
            line.clear();

            if total_bytes_read > limits.max_batch_size_bytes || records.len() >= limits.max_batch_size_docs {
                break;
            }
        }

        // 🔍 stopped on a limit? peek once so the last page doesn't leave a dangling empty page behind it
        if !hit_eof && self.buf_reader.fill_buf().await?.is_empty() {
            hit_eof = true;
        }

        trace!(
            "📖 hauled {} bytes / {} records out of '{}' starting at byte {}",
            total_bytes_read,
            records.len(),
            self.config.file_name,
            offset
        );

        let next_cursor = if hit_eof {
            None
        } else {
            Some(Cursor::new((offset + total_bytes_read as u64).to_string()))
        };
        Ok(Page::new(records, next_cursor))
    }
}

/// 🗄️ FileSink, writes every payload to disk, in order, through a `BufWriter`.
#[derive(Debug)]
pub struct FileSink {
    file_buf: io::BufWriter<File>,
    path: PathBuf,
}

impl FileSink {
    pub async fn new(config: FileSinkConfig) -> Result<Self> {
        let file_handle = File::create(&config.file_name).await.with_context(|| {
            format!(
                "💀 The sink file '{}' could not be conjured into existence. \
                 One of us was wrong about whether the parent directory existed. It was us.",
                config.file_name
            )
        })?;
        Ok(Self {
            file_buf: io::BufWriter::new(file_handle),
            path: PathBuf::from(config.file_name),
        })
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn send(&mut self, payload: String) -> Result<()> {
        trace!("📬 {} bytes walked into the file sink", payload.len());
        self.file_buf
            .write_all(payload.as_bytes())
            .await
            .with_context(|| format!("💀 Failed writing to '{}'", self.path.display()))
    }

    async fn close(&mut self) -> Result<()> {
        self.file_buf.flush().await.with_context(|| {
            format!(
                "💀 Error flushing '{}', the buffer held its data to the very end and the disk said no.",
                self.path.display()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_ndjson(lines: &str) -> tempfile::NamedTempFile {
        let mut the_file = tempfile::NamedTempFile::new().expect("💀 tempfile refused to exist");
        the_file
            .write_all(lines.as_bytes())
            .expect("💀 tempfile refused our bytes");
        the_file
    }

    fn config_for(file: &tempfile::NamedTempFile, docs: usize, bytes: usize) -> FileClientConfig {
        FileClientConfig {
            file_name: file.path().display().to_string(),
            common_config: CommonClientConfig {
                max_batch_size_docs: docs,
                max_batch_size_bytes: bytes,
            },
        }
    }

    async fn drain_pages(client: &mut FileClient) -> Result<Vec<Vec<String>>> {
        let mut the_query = Query::new(QueryParams::new());
        let mut the_pages = Vec::new();
        loop {
            let the_page = client.fetch(&the_query).await?;
            the_pages.push(the_page.items);
            match the_page.next_cursor {
                Some(cursor) => the_query.cursor = Some(cursor),
                None => return Ok(the_pages),
            }
        }
    }

    #[tokio::test]
    async fn the_one_where_five_lines_page_by_two() -> Result<()> {
        let the_file = write_ndjson("{\"n\":1}\n{\"n\":2}\n{\"n\":3}\n{\"n\":4}\n{\"n\":5}\n");
        let mut the_client = FileClient::new(config_for(&the_file, 2, 1024 * 1024)).await?;

        let the_pages = drain_pages(&mut the_client).await?;
        let the_sizes: Vec<usize> = the_pages.iter().map(Vec::len).collect();
        assert_eq!(the_sizes, vec![2, 2, 1]);
        assert_eq!(the_pages[2], vec!["{\"n\":5}".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_exact_fit_leaves_no_empty_page_behind() -> Result<()> {
        let the_file = write_ndjson("a\nb\nc\nd\n");
        let mut the_client = FileClient::new(config_for(&the_file, 2, 1024)).await?;
        let the_pages = drain_pages(&mut the_client).await?;
        assert_eq!(the_pages.len(), 2, "four lines at two per page is two pages, not three");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_blank_lines_and_crlf_are_tidied_up() -> Result<()> {
        let the_file = write_ndjson("one\r\n\n   \ntwo\nthree");
        let mut the_client = FileClient::new(config_for(&the_file, 100, 1024)).await?;
        let the_pages = drain_pages(&mut the_client).await?;
        assert_eq!(
            the_pages,
            vec![vec!["one".to_string(), "two".to_string(), "three".to_string()]]
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_byte_cap_ends_a_page_early() -> Result<()> {
        // 📏 each line is 10 bytes with its newline; crossing 15 bytes ends the page after line 2
        let the_file = write_ndjson("123456789\n123456789\n123456789\n");
        let mut the_client = FileClient::new(config_for(&the_file, 100, 15)).await?;
        let the_first = the_client.fetch(&Query::new(QueryParams::new())).await?;
        assert_eq!(the_first.items.len(), 2);
        assert_eq!(the_first.next_cursor, Some(Cursor::new("20")));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_cursor_from_yesterday_still_works_today() -> Result<()> {
        let the_file = write_ndjson("a\nb\nc\n");
        let mut the_first_client = FileClient::new(config_for(&the_file, 1, 1024)).await?;
        let the_first_page = the_first_client.fetch(&Query::new(QueryParams::new())).await?;
        let the_cursor = the_first_page.next_cursor.expect("💀 more pages expected");

        // 🔄 brand new client, same file, resume from the handed-out cursor
        let mut the_second_client = FileClient::new(config_for(&the_file, 10, 1024)).await?;
        let the_resumed = the_second_client
            .fetch(&Query::new(QueryParams::new()).starting_at(Some(the_cursor)))
            .await?;
        assert_eq!(the_resumed.items, vec!["b".to_string(), "c".to_string()]);
        assert!(the_resumed.next_cursor.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_missing_file_is_an_error_with_a_name() {
        let the_result = FileClient::new(FileClientConfig {
            file_name: "/definitely/not/here.ndjson".to_string(),
            common_config: CommonClientConfig::default(),
        })
        .await;
        let the_error = the_result.expect_err("💀 a missing file should not open");
        assert!(format!("{the_error:#}").contains("/definitely/not/here.ndjson"));
    }

    #[tokio::test]
    async fn the_one_where_the_sink_writes_payloads_in_order() -> Result<()> {
        let the_dir = tempfile::tempdir()?;
        let the_path = the_dir.path().join("out.ndjson");
        let mut the_sink = FileSink::new(FileSinkConfig {
            file_name: the_path.display().to_string(),
        })
        .await?;
        the_sink.send("{\"a\":1}\n".to_string()).await?;
        the_sink.send("{\"b\":2}\n".to_string()).await?;
        the_sink.close().await?;

        let the_contents = tokio::fs::read_to_string(&the_path).await?;
        assert_eq!(the_contents, "{\"a\":1}\n{\"b\":2}\n");
        Ok(())
    }
}
