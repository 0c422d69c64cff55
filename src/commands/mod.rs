//! Command handlers for the budget CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod backup;
mod budget;
mod category;
mod init;
mod overview;
mod report;
mod table;
mod transaction;
mod webhook;
mod year;

use crate::model::MonthView;
use crate::planner::Planner;
use crate::{Config, Result};
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use backup::{backup_export, backup_restore};
pub use budget::budget_set;
pub use category::{category_add, category_delete, category_edit, category_list};
pub use init::init;
pub use overview::{detail, overview};
pub use report::report;
pub use transaction::{transaction_add, transaction_delete, transaction_edit, transaction_list};
pub use webhook::webhook_serve;
pub use year::{year_reset, year_set, year_show};

/// The output type for a command. This allows the command to return a consistent message,
/// optionally a rendered text body for the terminal, and optionally structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Text meant for standard output, such as a rendered table or CSV.
    body: Option<String>,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            body: None,
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            body: None,
            structure: None,
        }
    }

    /// Attach text to be written to standard output.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the body to stdout, the message to `info!` and the structured data (if it exists) as
    /// JSON to `debug!`.
    pub fn print(&self) {
        if let Some(body) = self.body() {
            println!("{body}");
        }
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// Opens the planner on the selected year, viewing `month` or else the current month.
async fn open(config: &Config, month: Option<MonthView>) -> Result<Planner> {
    let mut planner = Planner::open(config.store()).await?;
    if let Some(view) = month {
        planner.set_view(view);
    }
    Ok(planner)
}
