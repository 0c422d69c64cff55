//! The `Planner` holds the selected year's dataset and the selected month view, and applies every
//! mutation to them. Each mutation persists the dataset through the `Store` when it succeeds.

use crate::aggregate::Ledger;
use crate::backup::BackupFile;
use crate::error::{typed, ErrorType};
use crate::model::{
    normalize_income_data, CategoryItem, Kind, MonthView, Transaction, YearDataset,
    INCOME_ITEM_NAME, MONTHS_IN_YEAR,
};
use crate::store::Store;
use crate::utils::clamp_year;
use crate::Result;
use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info, warn};

/// The input for creating or editing a transaction. Fields are optional where a form could leave
/// them empty; `Planner::save_transaction` validates them in a fixed order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionDraft {
    /// The transaction to replace. When `None`, or when no transaction has this id, a new one is
    /// appended.
    pub id: Option<i64>,
    pub kind: Kind,
    pub date: Option<NaiveDate>,
    pub group: String,
    /// Ignored for income, which always books against the sentinel name.
    pub name: String,
    pub amount: Option<f64>,
    pub note: String,
}

impl TransactionDraft {
    /// A draft prefilled from an existing transaction, for editing.
    pub fn from_transaction(t: &Transaction) -> Self {
        Self {
            id: Some(t.id),
            kind: t.kind,
            date: Some(t.date),
            group: t.group.clone(),
            name: Transaction::name_for(t.kind, t.name.clone()),
            amount: Some(t.amount),
            note: t.note.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Planner {
    store: Store,
    year: i32,
    view: MonthView,
    data: YearDataset,
}

impl Planner {
    /// Loads the selected year from `store`, with income normalized, and starts on the current
    /// calendar month. Opening never writes the stored year back.
    pub async fn open(store: Store) -> Result<Self> {
        let year = store.current_year().await?;
        let data = store.load(year).await?.normalized();
        debug!(
            "Opened {year} with {} expense items, {} income items and {} transactions",
            data.expense_data.len(),
            data.income_data.len(),
            data.transactions.len()
        );
        Ok(Self {
            store,
            year,
            view: MonthView::current(),
            data,
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn view(&self) -> MonthView {
        self.view
    }

    /// Selects `view`. A month index past December is refused and the current view is kept.
    pub fn set_view(&mut self, view: MonthView) {
        match view {
            MonthView::Month(m) if m >= MONTHS_IN_YEAR => {
                warn!("Ignoring month index {m}, keeping the {} view", self.view)
            }
            view => self.view = view,
        }
    }

    pub fn data(&self) -> &YearDataset {
        &self.data
    }

    /// Aggregation over the current dataset.
    pub fn ledger(&self) -> Ledger<'_> {
        Ledger::from_dataset(&self.data)
    }

    /// Switches to `year`, clamped into range, and returns the year switched to.
    ///
    /// The outgoing year is saved first. A category list that is empty in the incoming year is
    /// carried over from the outgoing one with zeroed amounts; transactions never carry over.
    pub async fn change_year(&mut self, year: i32) -> Result<i32> {
        let next = clamp_year(year);
        self.persist().await;
        if let Err(e) = self.store.set_current_year(next).await {
            error!("Unable to store the selected year {next}: {e:#}");
        }

        let loaded = self.store.load(next).await?;
        self.data = self.data.carry_over(loaded);
        info!("Switched from {} to {next}", self.year);
        self.year = next;
        self.persist().await;
        Ok(next)
    }

    /// Zeroes every budget and base actual of the selected year and clears its transactions.
    pub async fn reset_year(&mut self) {
        self.data.reset_totals();
        info!("Reset all totals of {}", self.year);
        self.persist().await;
    }

    /// Sets the planned amount of item `index` for the selected month.
    pub async fn update_budget(&mut self, kind: Kind, index: usize, value: f64) -> Result<()> {
        let Some(month) = self.view.month() else {
            return Err(typed(
                ErrorType::Validation,
                "Budgets are set one month at a time, select a month first",
            ));
        };
        if !value.is_finite() {
            return Err(typed(ErrorType::Validation, "The budget must be a number"));
        }
        let items = self.data.items_mut(kind);
        let item = items
            .get_mut(index)
            .ok_or_else(|| no_such_item(kind, index))?;
        let slot = item.budget.get_mut(month).ok_or_else(|| {
            typed(ErrorType::Validation, format!("There is no month {month}"))
        })?;
        *slot = value;
        debug!("Set the {} budget of {item} to {value}", self.view);
        if kind == Kind::Income {
            self.data.income_data = normalize_income_data(std::mem::take(&mut self.data.income_data));
        }
        self.persist().await;
        Ok(())
    }

    /// Adds a category, or edits the one at `edit_index`, and returns its position.
    ///
    /// For income only `group` is used. Identity is compared without regard to case and must not
    /// collide with any other item of the same kind. Renaming moves the transactions booked on the
    /// old identity to the new one.
    pub async fn save_category(
        &mut self,
        kind: Kind,
        edit_index: Option<usize>,
        group: &str,
        name: &str,
    ) -> Result<usize> {
        let group = group.trim();
        if group.is_empty() {
            return Err(typed(ErrorType::Validation, "Enter the category"));
        }
        let name = match kind {
            Kind::Income => INCOME_ITEM_NAME,
            Kind::Expense => name.trim(),
        };
        if name.is_empty() {
            return Err(typed(ErrorType::Validation, "Enter the sub-category too"));
        }

        let items = self.data.items(kind);
        if let Some(i) = edit_index {
            if i >= items.len() {
                return Err(no_such_item(kind, i));
            }
        }
        let duplicate = items.iter().enumerate().any(|(i, it)| {
            Some(i) != edit_index
                && it.group.to_lowercase() == group.to_lowercase()
                && (kind == Kind::Income || it.name.to_lowercase() == name.to_lowercase())
        });
        if duplicate {
            let label = match kind {
                Kind::Income => group.to_string(),
                Kind::Expense => format!("{group}/{name}"),
            };
            return Err(typed(
                ErrorType::Conflict,
                format!("'{label}' already exists"),
            ));
        }

        let position = match edit_index {
            Some(i) => {
                let item = &mut self.data.items_mut(kind)[i];
                let (old_group, old_name) = (item.group.clone(), item.name.clone());
                item.group = group.to_string();
                item.name = name.to_string();
                let moved = self.rename_transactions(kind, &old_group, &old_name, group, name);
                info!("Renamed {kind} '{old_group}/{old_name}' to '{group}/{name}', moving {moved} transactions");
                i
            }
            None => {
                let item = match kind {
                    Kind::Income => CategoryItem::income(group),
                    Kind::Expense => CategoryItem::expense(group, name),
                };
                info!("Added {kind} '{item}'");
                let items = self.data.items_mut(kind);
                items.push(item);
                items.len() - 1
            }
        };
        if kind == Kind::Income {
            self.data.income_data = normalize_income_data(std::mem::take(&mut self.data.income_data));
        }
        self.persist().await;
        Ok(position)
    }

    fn rename_transactions(
        &mut self,
        kind: Kind,
        old_group: &str,
        old_name: &str,
        group: &str,
        name: &str,
    ) -> usize {
        let mut moved = 0;
        for t in self.data.transactions.iter_mut().filter(|t| t.kind == kind) {
            let hit = match kind {
                Kind::Income => t.group == old_group,
                Kind::Expense => t.group == old_group && t.name == old_name,
            };
            if hit {
                t.group = group.to_string();
                t.name = name.to_string();
                moved += 1;
            }
        }
        moved
    }

    /// Removes the item at `index` and returns it. Removing an income group also removes every
    /// income transaction of that group; expense transactions are left in place.
    pub async fn delete_category(&mut self, kind: Kind, index: usize) -> Result<CategoryItem> {
        let items = self.data.items_mut(kind);
        if index >= items.len() {
            return Err(no_such_item(kind, index));
        }
        let removed = items.remove(index);
        if kind == Kind::Income {
            self.data.income_data = normalize_income_data(std::mem::take(&mut self.data.income_data));
            if !removed.group.is_empty() {
                let before = self.data.transactions.len();
                self.data
                    .transactions
                    .retain(|t| !(t.kind == Kind::Income && t.group == removed.group));
                debug!(
                    "Removed {} income transactions of '{}'",
                    before - self.data.transactions.len(),
                    removed.group
                );
            }
        }
        info!("Deleted {kind} '{removed}'");
        self.persist().await;
        Ok(removed)
    }

    pub fn transaction(&self, id: i64) -> Option<&Transaction> {
        self.data.transactions.iter().find(|t| t.id == id)
    }

    /// Validates `draft` and stores it, replacing the transaction with the same id in place or
    /// appending a new one.
    ///
    /// Checks run in order: amount, date, category, then sub-category for expenses. The first
    /// failure is returned and nothing changes.
    pub async fn save_transaction(&mut self, draft: TransactionDraft) -> Result<Transaction> {
        let amount = match draft.amount {
            Some(a) if a.is_finite() && a != 0.0 => a,
            _ => return Err(typed(ErrorType::Validation, "Enter an amount")),
        };
        let Some(date) = draft.date else {
            return Err(typed(ErrorType::Validation, "Date missing"));
        };
        let group = draft.group.trim();
        if group.is_empty() {
            return Err(typed(ErrorType::Validation, "Category missing"));
        }
        let name = Transaction::name_for(draft.kind, draft.name.trim());
        if name.is_empty() {
            return Err(typed(ErrorType::Validation, "Sub-category missing"));
        }

        let transaction = Transaction {
            id: draft.id.unwrap_or_else(|| self.fresh_id()),
            kind: draft.kind,
            group: group.to_string(),
            name,
            date,
            amount,
            note: draft.note.trim().to_string(),
        };

        match self
            .data
            .transactions
            .iter_mut()
            .find(|t| t.id == transaction.id)
        {
            Some(existing) => {
                *existing = transaction.clone();
                info!("Updated transaction {}", transaction.id);
            }
            None => {
                self.data.transactions.push(transaction.clone());
                info!("Added transaction {}", transaction.id);
            }
        }
        self.persist().await;
        Ok(transaction)
    }

    /// The current time in milliseconds, moved forward past any id already in use.
    fn fresh_id(&self) -> i64 {
        let mut id = Utc::now().timestamp_millis();
        while self.transaction(id).is_some() {
            id += 1;
        }
        id
    }

    pub async fn delete_transaction(&mut self, id: i64) -> Result<Transaction> {
        let Some(position) = self.data.transactions.iter().position(|t| t.id == id) else {
            return Err(typed(
                ErrorType::Validation,
                format!("There is no transaction with id {id}"),
            ));
        };
        let removed = self.data.transactions.remove(position);
        info!("Deleted transaction {id}");
        self.persist().await;
        Ok(removed)
    }

    /// The export of the selected year.
    pub fn backup_file(&self) -> BackupFile {
        BackupFile::new(self.year, &self.data)
    }

    /// Replaces the selected year's data with the backup's, with income normalized.
    ///
    /// The data always lands in the selected year. A `year` recorded in the backup is only
    /// reported.
    pub async fn restore(&mut self, file: BackupFile) {
        if let Some(from) = file.year {
            if from != self.year {
                warn!(
                    "The backup was exported from {from}, it is being restored into {}",
                    self.year
                );
            }
        }
        self.data = file.into_dataset();
        info!(
            "Restored {} expense items, {} income items and {} transactions into {}",
            self.data.expense_data.len(),
            self.data.income_data.len(),
            self.data.transactions.len(),
            self.year
        );
        self.persist().await;
    }

    /// Saves the dataset. A failed write is logged and the in-memory state is kept.
    async fn persist(&self) {
        if let Err(e) = self.store.save(self.year, &self.data).await {
            error!("Unable to save the data of {}: {e:#}", self.year);
        }
    }
}

fn no_such_item(kind: Kind, index: usize) -> crate::Error {
    typed(
        ErrorType::Validation,
        format!("There is no {kind} category at position {index}"),
    )
}
