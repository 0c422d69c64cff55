use crate::backup::BackupFile;
use crate::commands::{open, Out};
use crate::{Config, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct BackupSummary {
    pub year: Option<i32>,
    pub path: PathBuf,
    pub expense_items: usize,
    pub income_items: usize,
    pub transactions: usize,
}

impl BackupSummary {
    fn new(file: &BackupFile, path: &Path) -> Self {
        Self {
            year: file.year,
            path: path.to_path_buf(),
            expense_items: file.expense_data.len(),
            income_items: file.income_data.len(),
            transactions: file.transactions.len(),
        }
    }
}

/// Exports the selected year.
///
/// With no `out` the file goes to the backups directory, which keeps a rotating set of copies.
/// When `out` is an existing directory the file is written into it under its download name,
/// otherwise `out` is the file to write.
pub async fn backup_export(config: Config, out: Option<PathBuf>) -> Result<Out<BackupSummary>> {
    let planner = open(&config, None).await?;
    let year = planner.year();
    let file = planner.backup_file();
    let backup = config.backup();

    let path = match out {
        None => backup.export(year, &file).await?,
        Some(dir) if dir.is_dir() => {
            backup
                .export_to(&file, &dir.join(BackupFile::download_name(year)))
                .await?
        }
        Some(path) => backup.export_to(&file, &path).await?,
    };
    let summary = BackupSummary::new(&file, &path);
    Ok(Out::new(
        format!("Exported {year} to {}", path.display()),
        summary,
    ))
}

/// Replaces the selected year's data with the backup at `file`. An invalid file changes nothing.
pub async fn backup_restore(config: Config, file: &Path) -> Result<Out<BackupSummary>> {
    let backup = BackupFile::read(file).await?;
    let summary = BackupSummary::new(&backup, file);
    let mut planner = open(&config, None).await?;
    planner.restore(backup).await;
    Ok(Out::new(
        format!("Restored {} into {}", file.display(), planner.year()),
        summary,
    ))
}
