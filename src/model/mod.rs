//! Types that represent the core data model, such as `CategoryItem`, `Transaction` and
//! `YearDataset`.
mod category;
mod dataset;
mod month;
mod transaction;

pub use category::{
    distinct_groups, group_by_group, normalize_income_data, zeroize_like, CategoryItem, Kind,
    Months, INCOME_ITEM_LABEL, INCOME_ITEM_NAME, UNGROUPED,
};
pub use dataset::YearDataset;
pub use month::{
    current_month, MonthView, ANNUAL_INDEX, ANNUAL_LABEL, MONTHS, MONTHS_IN_YEAR, SHORT_MONTHS,
};
pub use transaction::{iso_today, parse_date, today, Transaction, DATE_FORMAT};
