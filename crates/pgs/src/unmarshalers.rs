//! 🧩 Unmarshalers: turning one raw record into one `T`.
//!
//! The worker calls an [`Unmarshaler`] once per raw record, in order. The first `Err`
//! ends the whole stream (fail-fast), so an unmarshaler should only fail on records it
//! genuinely cannot represent.
//!
//! 🧠 Knowledge graph:
//! - [`JsonUnmarshaler`]: raw JSON text → `T: DeserializeOwned`. What every built-in client feeds.
//! - [`FnUnmarshaler`]: any closure, built with [`unmarshal_fn`]. For custom record shapes.
//! - Generic over `R` and `T` so the worker never needs to know what a record looks like.

use std::fmt;
use std::marker::PhantomData;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// 🔄 Converts one raw record of type `R` into a `T`.
pub trait Unmarshaler<R, T>: Send + 'static {
    fn unmarshal(&self, record: R) -> Result<T>;
}

/// 📦 Raw JSON text (`String`) into any `T: DeserializeOwned`.
///
/// Passing a type serde fundamentally cannot build from the record shape (say, a
/// struct when the records are bare numbers) shows up as an unmarshal error on the
/// first record, never as a panic.
pub struct JsonUnmarshaler<T> {
    _target: PhantomData<fn() -> T>,
}

impl<T> JsonUnmarshaler<T> {
    pub fn new() -> Self {
        Self { _target: PhantomData }
    }
}

impl<T> Default for JsonUnmarshaler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonUnmarshaler<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonUnmarshaler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonUnmarshaler")
            .field("target", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> Unmarshaler<String, T> for JsonUnmarshaler<T>
where
    T: DeserializeOwned + 'static,
{
    fn unmarshal(&self, record: String) -> Result<T> {
        serde_json::from_str(&record).with_context(|| {
            format!(
                "💀 Record would not become a `{}`. It had one job. Record (first 120 bytes): {}",
                std::any::type_name::<T>(),
                preview(&record, 120)
            )
        })
    }
}

/// 🎭 Any `Fn(R) -> Result<T>` dressed up as an [`Unmarshaler`].
pub struct FnUnmarshaler<F, R, T> {
    f: F,
    _types: PhantomData<fn(R) -> T>,
}

/// 🏗️ Build an [`Unmarshaler`] from a closure.
///
/// ```ignore
/// let parse_len = unmarshal_fn(|raw: String| Ok(raw.len()));
/// ```
pub fn unmarshal_fn<F, R, T>(f: F) -> FnUnmarshaler<F, R, T>
where
    F: Fn(R) -> Result<T>,
{
    FnUnmarshaler { f, _types: PhantomData }
}

impl<F, R, T> Unmarshaler<R, T> for FnUnmarshaler<F, R, T>
where
    F: Fn(R) -> Result<T> + Send + 'static,
    R: 'static,
    T: 'static,
{
    fn unmarshal(&self, record: R) -> Result<T> {
        (self.f)(record)
    }
}

impl<F, R, T> fmt::Debug for FnUnmarshaler<F, R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnUnmarshaler").finish_non_exhaustive()
    }
}

/// ✂️ First `max` bytes of a record for error messages, cut on a char boundary.
fn preview(record: &str, max: usize) -> &str {
    if record.len() <= max {
        return record;
    }
    let mut end = max;
    while !record.is_char_boundary(end) {
        end -= 1;
    }
    &record[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Widget {
        id: u32,
        name: String,
    }

    #[test]
    fn the_one_where_json_becomes_a_widget() -> Result<()> {
        let the_unmarshaler = JsonUnmarshaler::<Widget>::new();
        let the_widget = the_unmarshaler.unmarshal(r#"{"id":7,"name":"sprocket"}"#.to_string())?;
        assert_eq!(
            the_widget,
            Widget {
                id: 7,
                name: "sprocket".to_string()
            }
        );
        Ok(())
    }

    #[test]
    fn the_one_where_the_wrong_shape_is_an_error_not_a_panic() {
        let the_unmarshaler = JsonUnmarshaler::<Widget>::new();
        let the_failure = the_unmarshaler
            .unmarshal("42".to_string())
            .expect_err("💀 a bare number is not a Widget");
        assert!(format!("{the_failure:#}").contains("Widget"));
    }

    #[test]
    fn the_one_where_a_closure_gets_to_be_an_unmarshaler() -> Result<()> {
        let the_counter = unmarshal_fn(|raw: &'static str| Ok(raw.len()));
        assert_eq!(the_counter.unmarshal("four")?, 4);

        let the_picky_one = unmarshal_fn(|n: i64| {
            anyhow::ensure!(n >= 0, "negative numbers are not welcome here");
            Ok(n as u64)
        });
        assert!(the_picky_one.unmarshal(-1).is_err());
        assert_eq!(the_picky_one.unmarshal(5)?, 5);
        Ok(())
    }

    #[test]
    fn the_one_where_previews_do_not_slice_through_an_emoji() {
        let the_record = "🦆🦆🦆";
        // 🦆 is 4 bytes; cutting at 5 would land mid-duck
        assert_eq!(preview(the_record, 5), "🦆");
        assert_eq!(preview("short", 120), "short");
    }
}
