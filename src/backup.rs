//! Backup artifacts: the JSON export of one budget year and the rotating files written to the
//! backups directory.

use crate::error::{typed, ErrorType, IntoResult};
use crate::model::{CategoryItem, Transaction, YearDataset};
use crate::{utils, Config, Result};
use anyhow::Context;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix of export files written to the backups directory.
pub const BACKUP_PREFIX: &str = "backup";

/// The exported shape of one budget year.
///
/// The three collections are required on input and any field that is not part of the format,
/// at the top level or inside an item or transaction, is refused, so that a file that is not a
/// backup cannot be half-applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BackupFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub expense_data: Vec<CategoryItem>,
    pub income_data: Vec<CategoryItem>,
    pub transactions: Vec<Transaction>,
}

impl BackupFile {
    pub fn new(year: i32, data: &YearDataset) -> Self {
        Self {
            year: Some(year),
            expense_data: data.expense_data.clone(),
            income_data: data.income_data.clone(),
            transactions: data.transactions.clone(),
        }
    }

    /// Parses a backup from JSON text.
    ///
    /// Text that is not JSON at all fails with "not valid JSON"; JSON of the wrong shape fails
    /// with "incompatible backup" and the serde message naming the offending field.
    pub fn parse(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .context("The file is not valid JSON")
            .pub_result(ErrorType::Backup)?;
        let Some(object) = value.as_object() else {
            return Err(typed(
                ErrorType::Backup,
                "Incompatible backup: expected a JSON object",
            ));
        };
        check_entry_fields(object, "expenseData", ITEM_FIELDS)?;
        check_entry_fields(object, "incomeData", ITEM_FIELDS)?;
        check_entry_fields(object, "transactions", TRANSACTION_FIELDS)?;
        serde_json::from_value(value)
            .context("Incompatible backup")
            .pub_result(ErrorType::Backup)
    }

    /// Reads and parses a backup file. Nothing is returned until the whole file is validated.
    pub async fn read(path: &Path) -> Result<Self> {
        let json = utils::read(path).await.pub_result(ErrorType::Backup)?;
        Self::parse(&json).with_context(|| format!("Unable to restore {}", path.display()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize the backup")
    }

    /// The dataset held by this backup, with income normalized.
    pub fn into_dataset(self) -> YearDataset {
        YearDataset {
            expense_data: self.expense_data,
            income_data: self.income_data,
            transactions: self.transactions,
        }
        .normalized()
    }

    /// The file name a browser download would have used.
    pub fn download_name(year: i32) -> String {
        format!("backup_piano_finanziario_{year}.json")
    }
}

/// Manages export file creation and rotation.
///
/// The `Backup` struct is immutable and owns copies of the paths and settings it needs.
/// Create a new instance via `Config::backup()` or `Backup::new()`.
#[derive(Debug, Clone)]
pub struct Backup {
    backups_dir: PathBuf,
    backup_copies: u32,
}

impl Backup {
    pub fn new(config: &Config) -> Self {
        Self {
            backups_dir: config.backups().to_path_buf(),
            backup_copies: config.backup_copies(),
        }
    }

    /// Writes `file` to `path`, replacing whatever is there.
    pub async fn export_to(&self, file: &BackupFile, path: &Path) -> Result<PathBuf> {
        utils::write(path, file.to_json()?).await?;
        debug!("Wrote backup to {}", path.display());
        Ok(path.to_path_buf())
    }

    /// Writes `file` into the backups directory.
    ///
    /// The filename format is `backup.{year}.YYYY-MM-DD-NNN.json` where NNN is a sequence number.
    /// Old exports of the same year are rotated, keeping only `backup_copies` files.
    pub async fn export(&self, year: i32, file: &BackupFile) -> Result<PathBuf> {
        let prefix = format!("{BACKUP_PREFIX}.{year}");
        let date = today();
        let seq = self.next_sequence_number(&prefix, &date).await?;
        let path = self.backups_dir.join(format!("{prefix}.{date}-{seq:03}.json"));

        self.export_to(file, &path).await?;
        self.rotate(&prefix).await?;
        Ok(path)
    }

    /// Export files in the backups directory with the given prefix, oldest first.
    async fn list(&self, prefix: &str) -> Result<Vec<(PathBuf, String)>> {
        let mut files = Vec::new();
        let mut dir = utils::read_dir(&self.backups_dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_backup_file(&name, prefix) {
                files.push((entry.path(), name));
            }
        }
        // The date and zero-padded sequence make name order chronological.
        files.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(files)
    }

    async fn next_sequence_number(&self, prefix: &str, date: &str) -> Result<u32> {
        let max_seq = self
            .list(prefix)
            .await?
            .iter()
            .filter_map(|(_, name)| parse_sequence_number(name, prefix, date))
            .max()
            .unwrap_or(0);
        Ok(max_seq + 1)
    }

    async fn rotate(&self, prefix: &str) -> Result<()> {
        let files = self.list(prefix).await?;
        let to_delete = files.len().saturating_sub(self.backup_copies as usize);
        for (path, _) in files.into_iter().take(to_delete) {
            debug!("Rotating out {}", path.display());
            utils::remove(&path).await?;
        }
        Ok(())
    }
}

fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Parses NNN out of `{prefix}.{date}-NNN.json`.
const ITEM_FIELDS: &[&str] = &["group", "name", "budget", "baseActual"];
const TRANSACTION_FIELDS: &[&str] = &["id", "type", "group", "name", "date", "amount", "note"];

/// Refuses any field outside `allowed` on the objects of the array `list`. The stored types accept
/// extra fields, a restore does not.
fn check_entry_fields(
    object: &serde_json::Map<String, serde_json::Value>,
    list: &str,
    allowed: &[&str],
) -> Result<()> {
    let Some(entries) = object.get(list).and_then(|v| v.as_array()) else {
        return Ok(());
    };
    for (i, entry) in entries.iter().enumerate() {
        let Some(fields) = entry.as_object() else {
            continue;
        };
        if let Some(key) = fields.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(typed(
                ErrorType::Backup,
                format!("Incompatible backup: unknown field `{key}` in {list}[{i}]"),
            ));
        }
    }
    Ok(())
}

fn parse_sequence_number(filename: &str, prefix: &str, date: &str) -> Option<u32> {
    filename
        .strip_prefix(&format!("{prefix}.{date}-"))?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

fn is_backup_file(filename: &str, prefix: &str) -> bool {
    filename.starts_with(&format!("{prefix}.")) && filename.ends_with(".json")
}
