//! The persistence service for budget years.
//!
//! Data is kept in a flat key-value store: one JSON blob per year under `fm_data_{year}`, and the
//! selected year under `fm_current_year`. The `KeyValue` trait is the seam between the `Store`
//! and the backend that holds the keys, the SQLite database in normal use and `MemoryKv` in tests.

use crate::error::{ErrorType, IntoResult};
use crate::model::YearDataset;
use crate::utils::{clamp_year, clamp_year_str, safe_parse, YEAR_START};
use crate::Result;
use anyhow::Context;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

/// Key that holds the selected year.
pub const CURRENT_YEAR_KEY: &str = "fm_current_year";

/// Prefix of the per-year data keys.
pub const YEAR_DATA_PREFIX: &str = "fm_data_";

/// The key under which `year`'s dataset is stored.
pub fn year_data_key(year: i32) -> String {
    format!("{YEAR_DATA_PREFIX}{year}")
}

/// A string key-value store.
#[async_trait::async_trait]
pub trait KeyValue: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Reads and writes year datasets and the selected-year pointer. Construct one per application
/// instance and pass it to whoever needs it.
#[derive(Clone)]
pub struct Store {
    kv: Arc<dyn KeyValue>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    pub fn new(kv: Arc<dyn KeyValue>) -> Self {
        Self { kv }
    }

    /// A store backed by a fresh in-memory map.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKv::default()))
    }

    /// Loads `year`'s dataset. A year that has never been stored is created empty and written
    /// back; a failure to write it back is logged. A stored value that is not valid JSON for a
    /// dataset reads as an empty dataset and is left as it is in the store.
    pub async fn load(&self, year: i32) -> Result<YearDataset> {
        let key = year_data_key(year);
        let stored = self
            .kv
            .get(&key)
            .await
            .with_context(|| format!("Unable to read {key}"))
            .pub_result(ErrorType::Storage)?;
        match stored {
            Some(json) => {
                debug!("Loaded {key} ({} bytes)", json.len());
                Ok(safe_parse(&json, YearDataset::default()))
            }
            None => {
                debug!("No data stored for {year}, creating an empty dataset");
                let empty = YearDataset::default();
                if let Err(e) = self.save(year, &empty).await {
                    error!("Unable to create the dataset of {year}: {e:#}");
                }
                Ok(empty)
            }
        }
    }

    /// Whether anything has ever been stored for `year`.
    pub async fn exists(&self, year: i32) -> Result<bool> {
        Ok(self
            .kv
            .get(&year_data_key(year))
            .await
            .pub_result(ErrorType::Storage)?
            .is_some())
    }

    /// Writes `year`'s dataset, replacing what was there.
    pub async fn save(&self, year: i32, data: &YearDataset) -> Result<()> {
        let key = year_data_key(year);
        let json = serde_json::to_string(data).context("Unable to serialize the year dataset")?;
        self.kv
            .set(&key, &json)
            .await
            .with_context(|| format!("Unable to write {key}"))
            .pub_result(ErrorType::Storage)
    }

    /// The selected year, clamped into range. Defaults to the first year when none was stored.
    pub async fn current_year(&self) -> Result<i32> {
        let stored = self
            .kv
            .get(CURRENT_YEAR_KEY)
            .await
            .pub_result(ErrorType::Storage)?;
        Ok(match stored {
            Some(s) => {
                let year = clamp_year_str(&s);
                if year.to_string() != s.trim() {
                    warn!("Stored year '{s}' is out of range, using {year}");
                }
                year
            }
            None => YEAR_START,
        })
    }

    /// Stores `year`, clamped into range, as the selected year and returns it.
    pub async fn set_current_year(&self, year: i32) -> Result<i32> {
        let year = clamp_year(year);
        self.kv
            .set(CURRENT_YEAR_KEY, &year.to_string())
            .await
            .pub_result(ErrorType::Storage)?;
        Ok(year)
    }
}

/// A `KeyValue` held in memory.
#[derive(Debug, Default)]
pub struct MemoryKv {
    map: Mutex<BTreeMap<String, String>>,
}

impl MemoryKv {
    /// A snapshot of every stored key and value.
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.map.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl KeyValue for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _ = self
            .map
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
