//! These structs provide the CLI interface for the budget CLI.

use crate::model::{parse_date, Kind, MonthView};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing::level_filters::LevelFilter;

/// budget: a household budget planner.
///
/// Plan a monthly budget for expense categories and income sources, record what was actually
/// spent and earned, and compare the two month by month or over the whole year. Each year from
/// 2025 to 2040 is kept separately; switching to a year with no data carries the categories over.
///
/// Months are given as an index (0 is January, 12 the whole year), as m1..m12, or by name
/// (gennaio, feb, ...).
#[derive(Debug, Parser, Clone)]
#[command(name = "budget", version)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory, its config file and the database.
    ///
    /// This is the first command to run. By default the data lives in $HOME/budget, pass
    /// --budget-home or set BUDGET_HOME to keep it somewhere else.
    Init,
    /// Show or change the selected year, or reset its totals.
    Year(YearArgs),
    /// Add, rename, delete or list expense and income categories.
    Category(CategoryArgs),
    /// Record, edit, delete or list transactions.
    Transaction(TransactionArgs),
    /// Set planned amounts.
    Budget(BudgetArgs),
    /// Budget against actual for every category in a month or the whole year.
    Overview(ViewArgs),
    /// Expense reports: a per-category summary and a month-by-month matrix.
    Report(ReportArgs),
    /// The base amount and the transactions behind one category in a month or the whole year.
    Detail(DetailArgs),
    /// Export the selected year to a JSON file or restore it from one.
    Backup(BackupArgs),
    /// Run the billing webhook endpoint.
    Webhook(WebhookArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where budget data and configuration is held. Defaults to ~/budget
    #[arg(long, env = "BUDGET_HOME", default_value_t = default_budget_home())]
    budget_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, budget_home: PathBuf) -> Self {
        Self {
            log_level,
            budget_home: budget_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn budget_home(&self) -> &DisplayPath {
        &self.budget_home
    }
}

/// Args for the `budget year` command.
#[derive(Debug, Parser, Clone)]
pub struct YearArgs {
    #[command(subcommand)]
    pub command: YearCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum YearCommand {
    /// Print the selected year.
    Show,
    /// Select a year. Values outside 2025..=2040 are clamped into range.
    Set {
        /// The year to select.
        year: String,
    },
    /// Zero every budget and base amount of the selected year and delete its transactions.
    Reset {
        /// Confirm the reset.
        #[arg(long)]
        yes: bool,
    },
}

/// Args for the `budget category` command.
#[derive(Debug, Parser, Clone)]
pub struct CategoryArgs {
    #[command(subcommand)]
    pub command: CategoryCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryCommand {
    /// Add an expense category and sub-category, or an income category.
    Add {
        /// expense or income
        #[arg(long, default_value_t = Kind::Expense)]
        kind: Kind,
        /// The category, e.g. Casa.
        #[arg(long)]
        group: String,
        /// The sub-category, e.g. Affitto. Required for expenses, ignored for income.
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Rename the category at a position shown by `category list`. Its transactions follow it.
    Edit {
        #[arg(long, default_value_t = Kind::Expense)]
        kind: Kind,
        /// The position shown by `category list`.
        index: usize,
        #[arg(long)]
        group: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Delete the category at a position shown by `category list`. Deleting an income category
    /// also deletes its transactions.
    Delete {
        #[arg(long, default_value_t = Kind::Expense)]
        kind: Kind,
        index: usize,
    },
    /// List categories with their positions.
    List {
        /// Only list this kind.
        #[arg(long)]
        kind: Option<Kind>,
    },
}

/// Args for the `budget transaction` command.
#[derive(Debug, Parser, Clone)]
pub struct TransactionArgs {
    #[command(subcommand)]
    pub command: TransactionCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TransactionCommand {
    /// Record a transaction.
    Add(TransactionFields),
    /// Change a transaction. Fields that are not given keep their current value.
    Edit {
        /// The id shown by `transaction list`.
        id: i64,
        #[command(flatten)]
        fields: TransactionEdit,
    },
    /// Delete a transaction.
    Delete {
        /// The id shown by `transaction list`.
        id: i64,
    },
    /// List transactions, newest first.
    List {
        /// Only list transactions in this month.
        #[arg(long)]
        month: Option<MonthView>,
        #[arg(long)]
        kind: Option<Kind>,
        #[arg(long)]
        group: Option<String>,
    },
}

#[derive(Debug, Parser, Clone)]
pub struct TransactionFields {
    #[arg(long, default_value_t = Kind::Expense)]
    pub kind: Kind,
    /// YYYY-MM-DD, defaults to today.
    #[arg(long, value_parser = date_arg)]
    pub date: Option<NaiveDate>,
    #[arg(long, default_value = "")]
    pub group: String,
    /// The sub-category. Ignored for income.
    #[arg(long, default_value = "")]
    pub name: String,
    #[arg(long, allow_negative_numbers = true)]
    pub amount: Option<f64>,
    #[arg(long, default_value = "")]
    pub note: String,
}

#[derive(Debug, Parser, Clone)]
pub struct TransactionEdit {
    #[arg(long)]
    pub kind: Option<Kind>,
    #[arg(long, value_parser = date_arg)]
    pub date: Option<NaiveDate>,
    #[arg(long)]
    pub group: Option<String>,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    pub amount: Option<f64>,
    #[arg(long)]
    pub note: Option<String>,
}

/// Args for the `budget budget` command.
#[derive(Debug, Parser, Clone)]
pub struct BudgetArgs {
    #[command(subcommand)]
    pub command: BudgetCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum BudgetCommand {
    /// Set the planned amount of one category for one month.
    Set {
        #[arg(long, default_value_t = Kind::Expense)]
        kind: Kind,
        /// The position shown by `category list`.
        index: usize,
        /// The amount to plan.
        #[arg(allow_negative_numbers = true)]
        amount: f64,
        /// The month to plan, defaults to the current month.
        #[arg(long)]
        month: Option<MonthView>,
    },
}

/// Selects the month view, defaulting to the current month.
#[derive(Debug, Parser, Clone)]
pub struct ViewArgs {
    #[arg(long)]
    pub month: Option<MonthView>,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    Table,
    Csv,
    Json,
}

serde_plain::derive_display_from_serialize!(ReportFormat);

/// Args for the `budget report` command.
#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    #[arg(long)]
    pub month: Option<MonthView>,
    #[arg(long, value_enum, default_value_t = ReportFormat::Table)]
    pub format: ReportFormat,
}

/// Args for the `budget detail` command.
#[derive(Debug, Parser, Clone)]
pub struct DetailArgs {
    #[arg(long, default_value_t = Kind::Expense)]
    pub kind: Kind,
    #[arg(long)]
    pub group: String,
    /// The sub-category. Ignored for income.
    #[arg(long, default_value = "")]
    pub name: String,
    #[arg(long)]
    pub month: Option<MonthView>,
}

/// Args for the `budget backup` command.
#[derive(Debug, Parser, Clone)]
pub struct BackupArgs {
    #[command(subcommand)]
    pub command: BackupCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum BackupCommand {
    /// Export the selected year. Without --out the file is written to $BUDGET_HOME/.backups and
    /// old exports are rotated.
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace the selected year's data with the contents of a backup file.
    Restore { file: PathBuf },
}

/// Args for the `budget webhook` command.
#[derive(Debug, Parser, Clone)]
pub struct WebhookArgs {
    #[command(subcommand)]
    pub command: WebhookCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum WebhookCommand {
    /// Listen for billing events until interrupted.
    Serve(ServeArgs),
}

#[derive(Parser, Clone)]
pub struct ServeArgs {
    /// The address to listen on.
    #[arg(long, default_value = "127.0.0.1:8787")]
    pub listen: SocketAddr,
    #[arg(long, env = "STRIPE_SECRET_KEY", hide_env_values = true)]
    pub stripe_secret_key: String,
    #[arg(long, env = "STRIPE_WEBHOOK_SECRET", hide_env_values = true)]
    pub stripe_webhook_secret: String,
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: String,
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
    pub supabase_service_role_key: String,
}

impl std::fmt::Debug for ServeArgs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServeArgs")
            .field("listen", &self.listen)
            .field("supabase_url", &self.supabase_url)
            .finish_non_exhaustive()
    }
}

fn date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("'{s}' is not a date, use YYYY-MM-DD"))
}

fn default_budget_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("budget"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --budget-home or BUDGET_HOME instead of relying on the default \
                budget home directory.",
            );
            PathBuf::from("budget")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
