use crate::model::category::{normalize_income_data, zeroize_like, CategoryItem, Kind};
use crate::model::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Everything stored for one budget year.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearDataset {
    #[serde(default)]
    pub expense_data: Vec<CategoryItem>,
    #[serde(default)]
    pub income_data: Vec<CategoryItem>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl YearDataset {
    pub fn new(
        expense_data: Vec<CategoryItem>,
        income_data: Vec<CategoryItem>,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            expense_data,
            income_data,
            transactions,
        }
    }

    /// True when there are no categories and no transactions.
    pub fn is_empty(&self) -> bool {
        self.expense_data.is_empty() && self.income_data.is_empty() && self.transactions.is_empty()
    }

    /// The category list for `kind`.
    pub fn items(&self, kind: Kind) -> &[CategoryItem] {
        match kind {
            Kind::Expense => &self.expense_data,
            Kind::Income => &self.income_data,
        }
    }

    pub(crate) fn items_mut(&mut self, kind: Kind) -> &mut Vec<CategoryItem> {
        match kind {
            Kind::Expense => &mut self.expense_data,
            Kind::Income => &mut self.income_data,
        }
    }

    /// Returns the dataset with its income items collapsed to one per group.
    pub fn normalized(mut self) -> Self {
        self.income_data = normalize_income_data(std::mem::take(&mut self.income_data));
        self
    }

    /// Builds the dataset for a year with no stored data from this one, the year being left.
    ///
    /// Each category list is taken from `loaded` when it has items, otherwise it is cloned from
    /// `self` with every amount zeroed. Transactions only ever come from `loaded`.
    pub fn carry_over(&self, loaded: YearDataset) -> YearDataset {
        let expense_data = if !loaded.expense_data.is_empty() {
            loaded.expense_data
        } else {
            zeroize_like(&self.expense_data, Kind::Expense)
        };
        let income_data = if !loaded.income_data.is_empty() {
            loaded.income_data
        } else {
            zeroize_like(&self.income_data, Kind::Income)
        };
        YearDataset {
            expense_data,
            income_data,
            transactions: loaded.transactions,
        }
        .normalized()
    }

    /// Zeroes every budget and base actual and drops every transaction, keeping the categories.
    pub fn reset_totals(&mut self) {
        self.expense_data = zeroize_like(&self.expense_data, Kind::Expense);
        self.income_data = normalize_income_data(zeroize_like(&self.income_data, Kind::Income));
        self.transactions.clear();
    }
}
