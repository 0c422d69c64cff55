//! Month indexing and the month-or-year view selector.

use crate::error::{typed, ErrorType};
use crate::Result;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Number of months in a budget year.
pub const MONTHS_IN_YEAR: usize = 12;

/// Full month names as shown in the overview header.
pub const MONTHS: [&str; MONTHS_IN_YEAR] = [
    "Gennaio",
    "Febbraio",
    "Marzo",
    "Aprile",
    "Maggio",
    "Giugno",
    "Luglio",
    "Agosto",
    "Settembre",
    "Ottobre",
    "Novembre",
    "Dicembre",
];

/// Abbreviated month names used as column headers in the annual matrix.
pub const SHORT_MONTHS: [&str; MONTHS_IN_YEAR] = [
    "Gen", "Feb", "Mar", "Apr", "Mag", "Giu", "Lug", "Ago", "Set", "Ott", "Nov", "Dic",
];

/// Label used for the annual view.
pub const ANNUAL_LABEL: &str = "Totale anno";

/// Index that selects the annual view, one past the last month.
pub const ANNUAL_INDEX: usize = MONTHS_IN_YEAR;

/// Selects what the overview and the report aggregate over: one calendar month, or the whole
/// year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MonthView {
    /// A single month, `0` is January.
    Month(usize),
    /// All twelve months summed.
    Annual,
}

impl Default for MonthView {
    fn default() -> Self {
        MonthView::current()
    }
}

impl MonthView {
    /// Creates a view from its index, `0..=11` for months and `12` for the annual view.
    pub fn from_index(index: usize) -> Result<Self> {
        match index {
            ANNUAL_INDEX => Ok(MonthView::Annual),
            m if m < MONTHS_IN_YEAR => Ok(MonthView::Month(m)),
            bad => Err(typed(
                ErrorType::Validation,
                format!("Invalid month index {bad}, expected 0 to {ANNUAL_INDEX}"),
            )),
        }
    }

    /// The view for the real current calendar month.
    pub fn current() -> Self {
        MonthView::Month(current_month())
    }

    pub fn index(&self) -> usize {
        match self {
            MonthView::Month(m) => *m,
            MonthView::Annual => ANNUAL_INDEX,
        }
    }

    pub fn is_annual(&self) -> bool {
        matches!(self, MonthView::Annual)
    }

    /// The selected month, or `None` for the annual view.
    pub fn month(&self) -> Option<usize> {
        match self {
            MonthView::Month(m) => Some(*m),
            MonthView::Annual => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MonthView::Month(m) => MONTHS.get(*m).copied().unwrap_or("Invalid month"),
            MonthView::Annual => ANNUAL_LABEL,
        }
    }
}

impl Display for MonthView {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Parses either an index (`0`..`12`), a 1-based month number prefixed with `m` (`m1`..`m12`),
/// a month name, or `year`/`annual`.
impl FromStr for MonthView {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(ix) = s.parse::<usize>() {
            return MonthView::from_index(ix);
        }
        let lower = s.to_lowercase();
        if matches!(lower.as_str(), "year" | "annual" | "anno") {
            return Ok(MonthView::Annual);
        }
        if let Some(n) = lower.strip_prefix('m').and_then(|n| n.parse::<usize>().ok()) {
            if (1..=MONTHS_IN_YEAR).contains(&n) {
                return Ok(MonthView::Month(n - 1));
            }
        }
        if let Some(ix) = MONTHS
            .iter()
            .zip(SHORT_MONTHS.iter())
            .position(|(full, short)| full.to_lowercase() == lower || short.to_lowercase() == lower)
        {
            return Ok(MonthView::Month(ix));
        }
        Err(typed(
            ErrorType::Validation,
            format!("Unrecognized month '{s}'"),
        ))
    }
}

impl Serialize for MonthView {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.index() as u64)
    }
}

impl<'de> Deserialize<'de> for MonthView {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ix = usize::deserialize(deserializer)?;
        MonthView::from_index(ix).map_err(serde::de::Error::custom)
    }
}

/// The current month in local time, `0` is January.
pub fn current_month() -> usize {
    use chrono::Datelike;
    chrono::Local::now().month0() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_index() {
        assert_eq!(MonthView::from_index(0).unwrap(), MonthView::Month(0));
        assert_eq!(MonthView::from_index(11).unwrap(), MonthView::Month(11));
        assert_eq!(MonthView::from_index(12).unwrap(), MonthView::Annual);
        assert!(MonthView::from_index(13).is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!("3".parse::<MonthView>().unwrap(), MonthView::Month(3));
        assert_eq!("m1".parse::<MonthView>().unwrap(), MonthView::Month(0));
        assert_eq!("M12".parse::<MonthView>().unwrap(), MonthView::Month(11));
        assert_eq!("year".parse::<MonthView>().unwrap(), MonthView::Annual);
        assert_eq!("Marzo".parse::<MonthView>().unwrap(), MonthView::Month(2));
        assert_eq!("dic".parse::<MonthView>().unwrap(), MonthView::Month(11));
        assert!("m13".parse::<MonthView>().is_err());
        assert!("smarch".parse::<MonthView>().is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(MonthView::Month(0).label(), "Gennaio");
        assert_eq!(MonthView::Annual.to_string(), "Totale anno");
        assert_eq!(MonthView::Annual.month(), None);
        assert_eq!(MonthView::Month(4).month(), Some(4));
        assert_eq!(MonthView::Month(12).label(), "Invalid month");
    }

    #[test]
    fn test_serde() {
        let json = serde_json::to_string(&MonthView::Annual).unwrap();
        assert_eq!(json, "12");
        let view: MonthView = serde_json::from_str("5").unwrap();
        assert_eq!(view, MonthView::Month(5));
        assert!(serde_json::from_str::<MonthView>("14").is_err());
    }
}
