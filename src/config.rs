//! The data directory and its settings.
//!
//! Everything the CLI keeps lives under `$BUDGET_HOME`:
//!
//! ```text
//! $BUDGET_HOME/
//!   config.json     settings, see `Settings`
//!   budget.sqlite   the key-value store holding every budget year
//!   .backups/       rotated exports
//! ```

use crate::backup::Backup;
use crate::db::Db;
use crate::store::Store;
use crate::{utils, Result};
use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const APP_NAME: &str = "budget";
const SETTINGS_VERSION: u8 = 1;
const DEFAULT_BACKUP_COPIES: u32 = 5;
const BACKUPS_DIR: &str = ".backups";
const SETTINGS_FILE: &str = "config.json";
const DB_FILE: &str = "budget.sqlite";

/// An opened data directory: its paths, its settings and a handle on its database.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    settings: Settings,
    db: Db,
}

impl Config {
    /// Lays out a new data directory at `dir` and opens it. Refuses to touch a directory that
    /// already holds a database.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        utils::make_dir(&dir)
            .await
            .context("Unable to create the budget home directory")?;
        let root = utils::canonicalize(&dir).await?;

        let db = Db::init(root.join(DB_FILE))
            .await
            .context("Unable to create the database")?;
        utils::make_dir(root.join(BACKUPS_DIR)).await?;
        let settings = Settings::default();
        settings.save(root.join(SETTINGS_FILE)).await?;

        debug!("Created a budget home at {}", root.display());
        Ok(Self { root, settings, db })
    }

    /// Opens the data directory at `budget_home`, migrating its database if needed.
    pub async fn load(budget_home: impl Into<PathBuf>) -> Result<Self> {
        let dir = budget_home.into();
        let root = utils::canonicalize(&dir).await.with_context(|| {
            format!(
                "There is no budget home at {}, run 'budget init' first",
                dir.display()
            )
        })?;

        let settings_path = root.join(SETTINGS_FILE);
        if !settings_path.is_file() {
            bail!("{} is missing, run 'budget init' first", settings_path.display())
        }
        let settings = Settings::load(&settings_path).await?;

        let backups = root.join(BACKUPS_DIR);
        if !backups.is_dir() {
            bail!("The backups directory {} is missing", backups.display())
        }

        let db_path = root.join(DB_FILE);
        let db = Db::load(&db_path)
            .await
            .context("Unable to open the database")?;
        debug!(
            "Opened {} holding {} keys",
            db_path.display(),
            db.count_keys().await?
        );

        Ok(Self { root, settings, db })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn backups(&self) -> PathBuf {
        self.root.join(BACKUPS_DIR)
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.root.join(DB_FILE)
    }

    /// How many exports of one year the backups directory keeps.
    pub fn backup_copies(&self) -> u32 {
        self.settings.backup_copies
    }

    /// The persistence service over this home's database.
    pub fn store(&self) -> Store {
        Store::new(Arc::new(self.db.clone()))
    }

    pub fn backup(&self) -> Backup {
        Backup::new(self)
    }
}

/// The contents of `config.json`.
///
/// ```json
/// {
///   "app_name": "budget",
///   "config_version": 1,
///   "backup_copies": 5
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct Settings {
    /// Always "budget". Guards against pointing `BUDGET_HOME` at some other program's directory.
    app_name: String,
    config_version: u8,
    #[serde(default = "default_backup_copies")]
    backup_copies: u32,
}

fn default_backup_copies() -> u32 {
    DEFAULT_BACKUP_COPIES
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: SETTINGS_VERSION,
            backup_copies: DEFAULT_BACKUP_COPIES,
        }
    }
}

impl Settings {
    async fn load(path: &Path) -> Result<Self> {
        let settings: Settings = utils::deserialize(path)
            .await
            .with_context(|| format!("Unable to read the settings in {}", path.display()))?;
        ensure!(
            settings.app_name == APP_NAME,
            "{} belongs to '{}', expected '{APP_NAME}'",
            path.display(),
            settings.app_name
        );
        ensure!(
            settings.config_version <= SETTINGS_VERSION,
            "{} has version {}, this program understands up to {SETTINGS_VERSION}",
            path.display(),
            settings.config_version
        );
        Ok(settings)
    }

    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Unable to serialize the settings")?;
        utils::write(path, json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_settings(dir: &TempDir, json: &str) -> PathBuf {
        let path = dir.path().join(SETTINGS_FILE);
        utils::write(&path, json).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_create_then_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("budget_home");

        let created = Config::create(&home).await.unwrap();
        assert!(created.backups().is_dir());
        assert!(created.sqlite_path().is_file());
        assert!(created.config_path().is_file());
        assert_eq!(created.backup_copies(), DEFAULT_BACKUP_COPIES);

        let loaded = Config::load(&home).await.unwrap();
        assert_eq!(loaded.root(), created.root());
    }

    #[tokio::test]
    async fn test_create_refuses_existing_home() {
        let dir = TempDir::new().unwrap();
        Config::create(dir.path()).await.unwrap();
        assert!(Config::create(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_load_without_init() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path().join("nothing-here"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("run 'budget init' first"));
    }

    #[tokio::test]
    async fn test_store_outlives_config() {
        let dir = TempDir::new().unwrap();
        let config = Config::create(dir.path()).await.unwrap();
        config.store().set_current_year(2028).await.unwrap();
        drop(config);
        let loaded = Config::load(dir.path()).await.unwrap();
        assert_eq!(loaded.store().current_year().await.unwrap(), 2028);
    }

    #[tokio::test]
    async fn test_settings_default_backup_copies() {
        let dir = TempDir::new().unwrap();
        let path = write_settings(&dir, r#"{"app_name": "budget", "config_version": 1}"#).await;
        let settings = Settings::load(&path).await.unwrap();
        assert_eq!(settings.backup_copies, DEFAULT_BACKUP_COPIES);
    }

    #[tokio::test]
    async fn test_settings_of_another_app() {
        let dir = TempDir::new().unwrap();
        let path = write_settings(&dir, r#"{"app_name": "ledger", "config_version": 1}"#).await;
        let err = Settings::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("belongs to 'ledger'"));
    }

    #[tokio::test]
    async fn test_settings_from_a_newer_version() {
        let dir = TempDir::new().unwrap();
        let path = write_settings(&dir, r#"{"app_name": "budget", "config_version": 2}"#).await;
        assert!(Settings::load(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let settings = Settings {
            backup_copies: 9,
            ..Settings::default()
        };
        settings.save(&path).await.unwrap();
        assert_eq!(Settings::load(&path).await.unwrap(), settings);
    }
}
