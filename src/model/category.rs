use crate::model::month::MONTHS_IN_YEAR;
use serde::de::{SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::ops::{Index, IndexMut};

/// The fixed name of the single item every income group has.
pub const INCOME_ITEM_NAME: &str = "__TOTALE__";

/// How the income item is labelled when it is shown.
pub const INCOME_ITEM_LABEL: &str = "Stipendio";

/// Group used when an item has an empty group name.
pub const UNGROUPED: &str = "Senza categoria";

/// Whether a category or transaction is an expense or income.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    #[default]
    Expense,
    Income,
}

serde_plain::derive_display_from_serialize!(Kind);
serde_plain::derive_fromstr_from_deserialize!(Kind);

/// Twelve monthly amounts, index `0` is January.
///
/// On input a shorter sequence is accepted and padded with zeros, and `null` entries read as zero.
/// A sequence longer than twelve is rejected.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Months([f64; MONTHS_IN_YEAR]);

impl Months {
    pub const fn zero() -> Self {
        Months([0.0; MONTHS_IN_YEAR])
    }

    pub const fn new(values: [f64; MONTHS_IN_YEAR]) -> Self {
        Months(values)
    }

    /// Sum of all twelve months.
    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn get(&self, month: usize) -> f64 {
        self.0.get(month).copied().unwrap_or_default()
    }

    pub fn get_mut(&mut self, month: usize) -> Option<&mut f64> {
        self.0.get_mut(month)
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }

    pub fn as_array(&self) -> &[f64; MONTHS_IN_YEAR] {
        &self.0
    }
}

impl From<[f64; MONTHS_IN_YEAR]> for Months {
    fn from(value: [f64; MONTHS_IN_YEAR]) -> Self {
        Months(value)
    }
}

impl Index<usize> for Months {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IndexMut<usize> for Months {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl Serialize for Months {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Months {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MonthsVisitor;

        impl<'de> Visitor<'de> for MonthsVisitor {
            type Value = Months;

            fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "a sequence of at most {MONTHS_IN_YEAR} numbers")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut months = Months::zero();
                let mut ix = 0;
                while let Some(value) = seq.next_element::<Option<f64>>()? {
                    if ix >= MONTHS_IN_YEAR {
                        return Err(serde::de::Error::invalid_length(ix + 1, &self));
                    }
                    months.0[ix] = value.unwrap_or_default();
                    ix += 1;
                }
                Ok(months)
            }
        }

        deserializer.deserialize_seq(MonthsVisitor)
    }
}

/// One budget line: an expense sub-category, or the single line of an income group.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryItem {
    pub group: String,
    pub name: String,
    #[serde(default)]
    pub budget: Months,
    #[serde(default)]
    pub base_actual: Months,
}

impl CategoryItem {
    /// Creates an expense item with zeroed budgets and base actuals.
    pub fn expense(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            budget: Months::zero(),
            base_actual: Months::zero(),
        }
    }

    /// Creates the income item for `group` with zeroed budgets and base actuals.
    pub fn income(group: impl Into<String>) -> Self {
        Self::expense(group, INCOME_ITEM_NAME)
    }

    /// Whether this item is identified by `(group, name)`.
    pub fn is(&self, group: &str, name: &str) -> bool {
        self.group == group && self.name == name
    }

    /// The name to show for this item, the income label in place of the sentinel.
    pub fn display_name(&self) -> &str {
        if self.name == INCOME_ITEM_NAME {
            INCOME_ITEM_LABEL
        } else {
            &self.name
        }
    }

    /// The group to show for this item, a placeholder in place of an empty group.
    pub fn display_group(&self) -> &str {
        if self.group.is_empty() {
            UNGROUPED
        } else {
            &self.group
        }
    }
}

impl Display for CategoryItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.display_group(), self.display_name())
    }
}

/// Collapses income items so that each distinct group has exactly one item named with the
/// sentinel. For each group the item already named with the sentinel is kept, otherwise the first
/// one; items with an empty group are dropped. Groups keep the order of their first appearance.
pub fn normalize_income_data(items: Vec<CategoryItem>) -> Vec<CategoryItem> {
    let mut groups: Vec<(String, Vec<CategoryItem>)> = Vec::new();
    for item in items {
        if item.group.is_empty() {
            continue;
        }
        match groups.iter_mut().find(|(g, _)| *g == item.group) {
            Some((_, members)) => members.push(item),
            None => groups.push((item.group.clone(), vec![item])),
        }
    }

    groups
        .into_iter()
        .map(|(group, mut members)| {
            // Every group was created with at least one member.
            let keep = members
                .iter()
                .position(|it| it.name == INCOME_ITEM_NAME)
                .unwrap_or(0);
            let existing = members.swap_remove(keep);
            CategoryItem {
                group,
                name: INCOME_ITEM_NAME.to_string(),
                budget: existing.budget,
                base_actual: existing.base_actual,
            }
        })
        .collect()
}

/// Clones the category skeleton of `items` with every budget and base actual reset to zero.
/// Income items are re-pointed to the sentinel name.
pub fn zeroize_like(items: &[CategoryItem], kind: Kind) -> Vec<CategoryItem> {
    items
        .iter()
        .map(|it| CategoryItem {
            group: it.group.clone(),
            name: match kind {
                Kind::Income => INCOME_ITEM_NAME.to_string(),
                Kind::Expense => it.name.clone(),
            },
            budget: Months::zero(),
            base_actual: Months::zero(),
        })
        .collect()
}

/// Groups items by their group name, keeping the order in which groups first appear. Items with
/// an empty group are collected under a placeholder group.
pub fn group_by_group(items: &[CategoryItem]) -> Vec<(&str, Vec<&CategoryItem>)> {
    let mut out: Vec<(&str, Vec<&CategoryItem>)> = Vec::new();
    for item in items {
        let group = item.display_group();
        match out.iter_mut().find(|(g, _)| *g == group) {
            Some((_, members)) => members.push(item),
            None => out.push((group, vec![item])),
        }
    }
    out
}

/// Distinct group names in order of first appearance.
pub fn distinct_groups(items: &[CategoryItem]) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for item in items {
        if !out.contains(&item.group.as_str()) {
            out.push(&item.group);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_budget(group: &str, name: &str, january: f64) -> CategoryItem {
        let mut item = CategoryItem::expense(group, name);
        item.budget[0] = january;
        item
    }

    #[test]
    fn test_normalize_collapses_duplicates() {
        let raw = vec![
            with_budget("Stipendio", "legacy", 1.0),
            with_budget("Stipendio", INCOME_ITEM_NAME, 2.0),
            with_budget("Affitti", "x", 3.0),
            with_budget("Stipendio", "other", 4.0),
            with_budget("Affitti", "y", 5.0),
        ];
        let out = normalize_income_data(raw);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].group, "Stipendio");
        assert_eq!(out[0].name, INCOME_ITEM_NAME);
        // The item already named with the sentinel wins.
        assert_eq!(out[0].budget[0], 2.0);
        assert_eq!(out[1].group, "Affitti");
        assert_eq!(out[1].name, INCOME_ITEM_NAME);
        // Otherwise the first item of the group wins.
        assert_eq!(out[1].budget[0], 3.0);
    }

    #[test]
    fn test_normalize_drops_empty_group() {
        let out = normalize_income_data(vec![CategoryItem::income("")]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_income_data(vec![
            CategoryItem::income("A"),
            CategoryItem::income("B"),
            CategoryItem::income("A"),
        ]);
        let twice = normalize_income_data(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn test_zeroize_like() {
        let mut item = with_budget("Casa", "Affitto", 1000.0);
        item.base_actual[3] = 50.0;
        let out = zeroize_like(&[item], Kind::Expense);
        assert_eq!(out, vec![CategoryItem::expense("Casa", "Affitto")]);

        let out = zeroize_like(&[with_budget("Stipendio", "legacy", 9.0)], Kind::Income);
        assert_eq!(out, vec![CategoryItem::income("Stipendio")]);
    }

    #[test]
    fn test_group_by_group() {
        let items = vec![
            CategoryItem::expense("Casa", "Affitto"),
            CategoryItem::expense("Auto", "Benzina"),
            CategoryItem::expense("Casa", "Luce"),
            CategoryItem::expense("", "Varie"),
        ];
        let grouped = group_by_group(&items);
        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped[0].0, "Casa");
        assert_eq!(grouped[0].1.len(), 2);
        assert_eq!(grouped[1].0, "Auto");
        assert_eq!(grouped[2].0, UNGROUPED);
    }

    #[test]
    fn test_months_deserialize_lenient() {
        let m: Months = serde_json::from_str("[1, null, 3]").unwrap();
        assert_eq!(m[0], 1.0);
        assert_eq!(m[1], 0.0);
        assert_eq!(m[2], 3.0);
        assert_eq!(m[11], 0.0);
        assert_eq!(m.sum(), 4.0);
    }

    #[test]
    fn test_months_deserialize_too_long() {
        let r = serde_json::from_str::<Months>("[0,0,0,0,0,0,0,0,0,0,0,0,0]");
        assert!(r.is_err());
    }

    #[test]
    fn test_category_item_json_field_names() {
        let item = CategoryItem::expense("Casa", "Affitto");
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("baseActual").is_some());
        assert_eq!(json["budget"].as_array().unwrap().len(), 12);
        let back: CategoryItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(CategoryItem::income("Lavoro").display_name(), INCOME_ITEM_LABEL);
        assert_eq!(CategoryItem::expense("Casa", "Luce").to_string(), "Casa/Luce");
    }
}
