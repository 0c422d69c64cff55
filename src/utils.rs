use crate::Result;
use anyhow::Context;
use serde::de::DeserializeOwned;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tokio::fs::ReadDir;

/// First selectable budget year.
pub const YEAR_START: i32 = 2025;

/// Last selectable budget year.
pub const YEAR_END: i32 = 2040;

/// Write a file.
pub(crate) async fn write(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, contents)
        .await
        .context(format!("Unable to write to {}", path.to_string_lossy()))
}

/// Read a file to a `String`.
pub async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file at {}", path.display()))
}

/// Read a JSON file and deserialize it.
pub(crate) async fn deserialize<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let data = read(path).await?;
    serde_json::from_str(&data)
        .with_context(|| format!("Unable to parse JSON in {}", path.display()))
}

/// Create a directory and any missing parents.
pub(crate) async fn make_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("Unable to create directory at {}", path.display()))
}

pub(crate) async fn canonicalize(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    tokio::fs::canonicalize(path)
        .await
        .with_context(|| format!("Unable to canonicalize the path {}", path.display()))
}

pub(crate) async fn read_dir(path: impl AsRef<Path>) -> Result<ReadDir> {
    let path = path.as_ref();
    tokio::fs::read_dir(path)
        .await
        .with_context(|| format!("Unable to read directory {}", path.display()))
}

pub(crate) async fn remove(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::remove_file(path)
        .await
        .with_context(|| format!("Unable to remove {}", path.display()))
}

/// Parses `json`, returning `fallback` when it is not valid JSON for `T`.
pub fn safe_parse<T>(json: &str, fallback: T) -> T
where
    T: DeserializeOwned,
{
    match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!("Discarding unparseable JSON: {e}");
            fallback
        }
    }
}

/// Clamps `year` into `[YEAR_START, YEAR_END]`.
pub fn clamp_year(year: i32) -> i32 {
    year.clamp(YEAR_START, YEAR_END)
}

/// Parses a year from user or storage input and clamps it. Anything that is not a number falls
/// back to `YEAR_START`.
pub fn clamp_year_str(year: &str) -> i32 {
    match year.trim().parse::<f64>() {
        Ok(y) if y.is_finite() => clamp_year(y.clamp(i32::MIN as f64, i32::MAX as f64) as i32),
        _ => YEAR_START,
    }
}

/// All selectable years.
pub fn year_options() -> impl Iterator<Item = i32> {
    YEAR_START..=YEAR_END
}

/// Formats an amount as euros the way an Italian locale would, e.g. `-1.234,50 €`.
pub fn format_money(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let sign = if value < 0.0 && value.abs() >= 0.005 {
        "-"
    } else {
        ""
    };
    format!("{sign}{} €", format_number(value.abs(), 2))
}

/// Formats a number with `.` as the thousands separator and `,` as the decimal separator.
pub fn format_number(value: f64, decimals: usize) -> String {
    let us = match decimals {
        0 => format_num::format_num!(",.0", value),
        _ => format_num::format_num!(",.2", value),
    };
    us.chars()
        .map(|c| match c {
            ',' => '.',
            '.' => ',',
            other => other,
        })
        .collect()
}

/// Orders strings case-insensitively first, falling back to a byte comparison so that the order
/// is total.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
