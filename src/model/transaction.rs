use crate::model::category::{Kind, INCOME_ITEM_NAME};
use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The serialized date format, e.g. `2025-01-15`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single movement of money against a budget line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Creation timestamp in milliseconds, kept when the transaction is edited.
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: Kind,
    pub group: String,
    pub name: String,
    #[serde(serialize_with = "serialize_date", deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default)]
    pub note: String,
}

impl Transaction {
    /// Whether this transaction is booked against the line `(kind, group, name)`.
    pub fn matches(&self, kind: Kind, group: &str, name: &str) -> bool {
        self.kind == kind && self.group == group && self.name == name
    }

    /// The calendar month of the transaction date, `0` is January.
    ///
    /// The stored value is a calendar date with no time or zone, so the month is the month of
    /// that date as written, wherever the program runs.
    pub fn month0(&self) -> usize {
        self.date.month0() as usize
    }

    /// The name used on an income transaction, or `name` for an expense.
    pub fn name_for(kind: Kind, name: impl Into<String>) -> String {
        match kind {
            Kind::Income => INCOME_ITEM_NAME.to_string(),
            Kind::Expense => name.into(),
        }
    }
}

/// Today's date in local time.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Today's date formatted as `YYYY-MM-DD`.
pub fn iso_today() -> String {
    today().format(DATE_FORMAT).to_string()
}

/// Parses `YYYY-MM-DD`, or a full RFC 3339 timestamp which is converted to the local calendar
/// date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
        return Some(date);
    }
    DateTime::<FixedOffset>::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Local).date_naive())
}

fn serialize_date<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&date.format(DATE_FORMAT).to_string())
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_date(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid date '{s}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_stored_shape() {
        let json = r#"{
            "id": 1736899200000,
            "type": "expense",
            "group": "Casa",
            "name": "Affitto",
            "date": "2025-01-15",
            "amount": 1000,
            "note": ""
        }"#;
        let t: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(t.id, 1736899200000);
        assert_eq!(t.kind, Kind::Expense);
        assert_eq!(t.month0(), 0);
        assert_eq!(t.amount, 1000.0);
        assert!(t.matches(Kind::Expense, "Casa", "Affitto"));
        assert!(!t.matches(Kind::Income, "Casa", "Affitto"));
    }

    #[test]
    fn test_note_is_optional() {
        let json = r#"{"id":1,"type":"income","group":"Lavoro","name":"__TOTALE__","date":"2025-03-01","amount":5}"#;
        let t: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(t.note, "");
        assert_eq!(t.month0(), 2);
    }

    #[test]
    fn test_date_serializes_as_calendar_date() {
        let t = Transaction {
            id: 7,
            kind: Kind::Income,
            group: "Lavoro".into(),
            name: INCOME_ITEM_NAME.into(),
            date: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            amount: 10.0,
            note: "x".into(),
        };
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["date"], "2025-12-31");
        assert_eq!(json["type"], "income");
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2025-02-28"),
            NaiveDate::from_ymd_opt(2025, 2, 28)
        );
        assert!(parse_date("2025-02-30").is_none());
        assert!(parse_date("").is_none());
        assert!(parse_date("2025-06-15T12:00:00+00:00").is_some());
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let json = r#"{"id":1,"type":"income","group":"g","name":"n","date":"2025-03-01","amount":5,"currency":"EUR"}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.id, 1);
        assert_eq!(tx.amount, 5.0);
        assert!(serde_json::to_value(&tx).unwrap().get("currency").is_none());
    }

    #[test]
    fn test_name_for() {
        assert_eq!(Transaction::name_for(Kind::Income, "anything"), INCOME_ITEM_NAME);
        assert_eq!(Transaction::name_for(Kind::Expense, "Luce"), "Luce");
    }
}
