//! Derives every display and report value from the categories, the transaction log and the
//! selected view.
//!
//! Nothing is cached: each query walks the transaction list again.

use crate::model::{
    distinct_groups, CategoryItem, Kind, MonthView, Transaction, YearDataset, MONTHS_IN_YEAR,
};
use crate::utils::locale_cmp;
use serde::Serialize;

/// Differences smaller than this are shown as balanced.
pub const BALANCED_EPSILON: f64 = 0.01;

/// A read-only view over one year's data that answers aggregation queries.
#[derive(Debug, Clone, Copy)]
pub struct Ledger<'a> {
    expense_data: &'a [CategoryItem],
    income_data: &'a [CategoryItem],
    transactions: &'a [Transaction],
}

/// Budget and actual totals for one group.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct GroupTotals {
    pub group_budget: f64,
    pub group_actual: f64,
}

/// Budget and actual totals across all expense and income lines.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct FooterTotals {
    pub exp_bud: f64,
    pub exp_act: f64,
    pub inc_bud: f64,
    pub inc_act: f64,
    pub net_bud: f64,
    pub net_act: f64,
}

/// One row of the category summary report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummaryRow {
    pub group: String,
    pub month_total: f64,
    pub year_total: f64,
    pub avg: f64,
}

/// One row of the annual matrix report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixRow {
    pub group: String,
    pub name: String,
    pub month_vals: [f64; MONTHS_IN_YEAR],
    pub total: f64,
}

/// The two expense reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// The month the summary's `month_total` refers to.
    pub cur_month: usize,
    pub category_summary: Vec<CategorySummaryRow>,
    pub rows: Vec<MatrixRow>,
}

/// The seeded amount and the transactions behind one cell of the overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detail {
    pub base_val: f64,
    pub rows: Vec<Transaction>,
}

impl<'a> Ledger<'a> {
    pub fn new(
        expense_data: &'a [CategoryItem],
        income_data: &'a [CategoryItem],
        transactions: &'a [Transaction],
    ) -> Self {
        Self {
            expense_data,
            income_data,
            transactions,
        }
    }

    pub fn from_dataset(data: &'a YearDataset) -> Self {
        Self::new(&data.expense_data, &data.income_data, &data.transactions)
    }

    fn items(&self, kind: Kind) -> &'a [CategoryItem] {
        match kind {
            Kind::Expense => self.expense_data,
            Kind::Income => self.income_data,
        }
    }

    fn find(&self, kind: Kind, group: &str, name: &str) -> Option<&'a CategoryItem> {
        self.items(kind).iter().find(|it| it.is(group, name))
    }

    /// The actual amount of line `(kind, group, name)` in `month`: its base actual plus every
    /// matching transaction dated in that calendar month. Zero when the line does not exist.
    pub fn total_actual(&self, kind: Kind, group: &str, name: &str, month: usize) -> f64 {
        let item = match self.find(kind, group, name) {
            Some(item) => item,
            None => return 0.0,
        };
        item.base_actual.get(month)
            + self
                .transactions
                .iter()
                .filter(|t| t.matches(kind, group, name) && t.month0() == month)
                .map(|t| t.amount)
                .sum::<f64>()
    }

    /// Sum of `total_actual` over all twelve months.
    pub fn year_actual(&self, kind: Kind, group: &str, name: &str) -> f64 {
        (0..MONTHS_IN_YEAR)
            .map(|m| self.total_actual(kind, group, name, m))
            .sum()
    }

    /// The planned amount of `item` for `view`.
    pub fn item_budget(item: &CategoryItem, view: MonthView) -> f64 {
        match view {
            MonthView::Annual => item.budget.sum(),
            MonthView::Month(m) => item.budget.get(m),
        }
    }

    /// The actual amount of `item` for `view`.
    pub fn item_actual(&self, kind: Kind, item: &CategoryItem, view: MonthView) -> f64 {
        match view {
            MonthView::Annual => self.year_actual(kind, &item.group, &item.name),
            MonthView::Month(m) => self.total_actual(kind, &item.group, &item.name, m),
        }
    }

    /// The signed gap between plan and actual: for expenses what is left to spend, for income
    /// what was earned beyond the plan.
    pub fn item_diff(&self, kind: Kind, item: &CategoryItem, view: MonthView) -> f64 {
        let budget = Self::item_budget(item, view);
        let actual = self.item_actual(kind, item, view);
        match kind {
            Kind::Expense => budget - actual,
            Kind::Income => actual - budget,
        }
    }

    /// Sums budget and actual over `items`.
    pub fn group_totals<'i>(
        &self,
        kind: Kind,
        items: impl IntoIterator<Item = &'i CategoryItem>,
        view: MonthView,
    ) -> GroupTotals {
        items
            .into_iter()
            .fold(GroupTotals::default(), |acc, it| GroupTotals {
                group_budget: acc.group_budget + Self::item_budget(it, view),
                group_actual: acc.group_actual + self.item_actual(kind, it, view),
            })
    }

    /// Totals over every expense and income line, and the net of the two.
    pub fn footer_totals(&self, view: MonthView) -> FooterTotals {
        let exp = self.group_totals(Kind::Expense, self.expense_data, view);
        let inc = self.group_totals(Kind::Income, self.income_data, view);
        FooterTotals {
            exp_bud: exp.group_budget,
            exp_act: exp.group_actual,
            inc_bud: inc.group_budget,
            inc_act: inc.group_actual,
            net_bud: inc.group_budget - exp.group_budget,
            net_act: inc.group_actual - exp.group_actual,
        }
    }

    /// Income actual minus expense actual over the whole year.
    pub fn year_net_actual(&self) -> f64 {
        let totals = self.footer_totals(MonthView::Annual);
        totals.inc_act - totals.exp_act
    }

    /// The previous month's budget for `item`, offered when planning a month other than January
    /// and only when it is positive.
    pub fn suggested_budget(item: &CategoryItem, view: MonthView) -> Option<f64> {
        match view {
            MonthView::Month(m) if m > 0 => {
                let prev = item.budget.get(m - 1);
                (prev > 0.0).then_some(prev)
            }
            _ => None,
        }
    }

    /// The base actual and the transactions behind the cell `(kind, group, name)` in `view`,
    /// newest first.
    pub fn detail(&self, kind: Kind, group: &str, name: &str, view: MonthView) -> Detail {
        let item = match self.find(kind, group, name) {
            Some(item) => item,
            None => {
                return Detail {
                    base_val: 0.0,
                    rows: Vec::new(),
                }
            }
        };
        let base_val = match view {
            MonthView::Annual => item.base_actual.sum(),
            MonthView::Month(m) => item.base_actual.get(m),
        };
        let mut rows: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| {
                t.matches(kind, group, name)
                    && view.month().map_or(true, |m| t.month0() == m)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Detail { base_val, rows }
    }

    /// Builds the category summary and the annual matrix over expense lines. The summary's month
    /// is the selected month, or `today_month` in the annual view.
    pub fn report(&self, view: MonthView, today_month: usize) -> Report {
        let cur_month = view.month().unwrap_or(today_month);

        let mut groups = distinct_groups(self.expense_data);
        groups.sort_by(|a, b| locale_cmp(a, b));

        let category_summary = groups
            .into_iter()
            .map(|group| {
                let items: Vec<&CategoryItem> = self
                    .expense_data
                    .iter()
                    .filter(|it| it.group == group)
                    .collect();
                let month_total = items
                    .iter()
                    .map(|it| self.total_actual(Kind::Expense, &it.group, &it.name, cur_month))
                    .sum::<f64>();
                let year_total = items
                    .iter()
                    .map(|it| self.year_actual(Kind::Expense, &it.group, &it.name))
                    .sum::<f64>();
                CategorySummaryRow {
                    group: group.to_string(),
                    month_total,
                    year_total,
                    avg: year_total / MONTHS_IN_YEAR as f64,
                }
            })
            .collect();

        let mut items: Vec<&CategoryItem> = self.expense_data.iter().collect();
        items.sort_by(|a, b| locale_cmp(&a.name, &b.name).then_with(|| locale_cmp(&a.group, &b.group)));
        let rows = items
            .into_iter()
            .map(|it| {
                let mut month_vals = [0.0; MONTHS_IN_YEAR];
                for (m, val) in month_vals.iter_mut().enumerate() {
                    *val = self.total_actual(Kind::Expense, &it.group, &it.name, m);
                }
                MatrixRow {
                    group: it.group.clone(),
                    name: it.name.clone(),
                    month_vals,
                    total: month_vals.iter().sum(),
                }
            })
            .collect();

        Report {
            cur_month,
            category_summary,
            rows,
        }
    }
}

/// Whether a difference is small enough to show as balanced.
pub fn is_balanced(diff: f64) -> bool {
    diff.abs() < BALANCED_EPSILON
}
