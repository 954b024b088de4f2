//! 📊 progress.rs: "Are we there yet?", every pipeline, every time, forever.
//!
//! A paged stream has no known end. The remote decides when the cursor runs dry, so
//! there is no percentage and no ETA here: a spinner, running totals, and a 5 second
//! sliding window of rates, rendered as a comfy-table under the spinner.
//!
//! ⚠️ Watching this spinner will not make the remote API go faster. We've tried.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

// -- 📏 one mebibyte. not a megabyte. there's a difference and I will die on this hill.
const MIB: f64 = 1024.0 * 1024.0;

const RATE_WINDOW: Duration = Duration::from_secs(5);

/// 📦 Bytes with a unit picked by magnitude.
fn format_bytes(bytes: u64) -> String {
    let b = bytes as f64;
    if b >= MIB {
        format!("{:.2} MiB", b / MIB)
    } else if b >= 1024.0 {
        format!("{:.2} KiB", b / 1024.0)
    } else {
        format!("{bytes} bytes")
    }
}

/// 🔢 "1000000" → "1,000,000". You're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS if you should probably call your mom.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// 📡 Throughput over the sliding window.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Rates {
    pages_per_sec: f64,
    items_per_sec: f64,
    mib_per_sec: f64,
}

/// 📊 Tracks pages, items and bytes drained so far, and draws them.
///
/// [`ProgressMetrics::hidden`] keeps the bookkeeping but never touches the terminal;
/// that's what tests and `show_progress = false` use.
pub struct ProgressMetrics {
    source_name: String,
    total_pages: u64,
    total_items: u64,
    total_bytes: u64,
    progress_bar: ProgressBar,
    /// 🔄 (timestamp, pages, items, bytes) samples, oldest at the front
    rate_samples: VecDeque<(Instant, u64, u64, u64)>,
    start_time: Instant,
}

impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("ProgressMetrics")
            .field("source_name", &self.source_name)
            .field("total_pages", &self.total_pages)
            .field("total_items", &self.total_items)
            .field("total_bytes", &self.total_bytes)
            .finish()
    }
}

impl ProgressMetrics {
    /// 🚀 A visible spinner on stderr.
    pub fn new(source_name: impl Into<String>) -> Self {
        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                // -- 🐛 literal template, so this never fails in practice
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self::with_bar(source_name.into(), progress_bar)
    }

    /// 🙈 Same bookkeeping, no drawing.
    pub fn hidden(source_name: impl Into<String>) -> Self {
        Self::with_bar(source_name.into(), ProgressBar::hidden())
    }

    fn with_bar(source_name: String, progress_bar: ProgressBar) -> Self {
        let start_time = Instant::now();
        // -- 🔄 seed the window with t=0 so rates never divide by zero
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0, 0, 0));
        Self {
            source_name,
            total_pages: 0,
            total_items: 0,
            total_bytes: 0,
            progress_bar,
            rate_samples,
            start_time,
        }
    }

    /// 🔄 Record `items` items that rendered to `bytes` bytes. `pages` is 0 for the partial
    /// page that arrives with an error, so the page total matches the drain summary.
    pub fn update(&mut self, pages: u64, items: u64, bytes: u64) {
        self.total_pages += pages;
        self.total_items += items;
        self.total_bytes += bytes;

        let rates = self.calculate_rates(Instant::now());
        self.render(rates);
        self.progress_bar.tick();
    }

    /// ✅ Leave the last frame on screen.
    pub fn finish(&self) {
        self.progress_bar.finish();
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    fn calculate_rates(&mut self, now: Instant) -> Rates {
        while let Some(&(timestamp, ..)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > RATE_WINDOW {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }
        self.rate_samples
            .push_back((now, self.total_pages, self.total_items, self.total_bytes));

        let Some(&(oldest_time, oldest_pages, oldest_items, oldest_bytes)) = self.rate_samples.front() else {
            return Rates::default();
        };
        let elapsed = now.duration_since(oldest_time).as_secs_f64();
        if elapsed <= 0.0 {
            // -- 💤 not enough elapsed time yet. zeros, and maintain composure.
            return Rates::default();
        }
        Rates {
            pages_per_sec: self.total_pages.saturating_sub(oldest_pages) as f64 / elapsed,
            items_per_sec: self.total_items.saturating_sub(oldest_items) as f64 / elapsed,
            mib_per_sec: self.total_bytes.saturating_sub(oldest_bytes) as f64 / elapsed / MIB,
        }
    }

    /// 🎨 Layout (4 rows x 2 cols, no borders):
    /// ```text
    /// source: <name>
    ///   <pages/s>    <total pages>
    ///   <items/s>    <total items>
    ///   <MiB/s>      <total bytes>
    ///   <elapsed>
    /// ```
    fn render(&self, rates: Rates) {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);

        let right = |text: String| Cell::new(text).set_alignment(CellAlignment::Right);
        table.add_row(vec![
            right(format!("{:.1} Pages/s", rates.pages_per_sec)),
            right(format!("{} Pages", format_number(self.total_pages))),
        ]);
        table.add_row(vec![
            right(format!("{} Items/s", format_number(rates.items_per_sec as u64))),
            right(format!("{} Items", format_number(self.total_items))),
        ]);
        table.add_row(vec![
            right(format!("{:.2} MiB/s", rates.mib_per_sec)),
            right(format_bytes(self.total_bytes)),
        ]);
        table.add_row(vec![
            right(format!("{} elapsed", format_duration(self.start_time.elapsed()))),
            right(String::new()),
        ]);

        self.progress_bar
            .set_message(format!("source: {}\n{}", self.source_name, table));
    }
}
