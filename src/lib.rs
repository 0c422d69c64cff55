pub mod aggregate;
pub mod args;
mod backup;
pub mod commands;
mod config;
mod db;
mod error;
pub mod model;
mod planner;
mod store;
mod utils;
pub mod webhook;


pub use backup::{Backup, BackupFile};
pub use config::Config;
pub use error::{error_type, Error, ErrorType, IntoResult, Result};
pub use planner::{Planner, TransactionDraft};
pub use store::{KeyValue, MemoryKv, Store};
