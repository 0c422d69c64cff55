use crate::args::{TransactionEdit, TransactionFields};
use crate::commands::table::Table;
use crate::commands::{open, Out};
use crate::error::{typed, ErrorType};
use crate::model::{today, Kind, MonthView, Transaction, DATE_FORMAT};
use crate::planner::TransactionDraft;
use crate::utils::format_money;
use crate::{Config, Result};

pub async fn transaction_add(config: Config, fields: TransactionFields) -> Result<Out<Transaction>> {
    let mut planner = open(&config, None).await?;
    let draft = TransactionDraft {
        id: None,
        kind: fields.kind,
        date: Some(fields.date.unwrap_or_else(today)),
        group: fields.group,
        name: fields.name,
        amount: fields.amount,
        note: fields.note,
    };
    let saved = planner.save_transaction(draft).await?;
    Ok(Out::new(
        format!(
            "Recorded {} of {} on {} with id {}",
            saved.kind,
            format_money(saved.amount),
            saved.date.format(DATE_FORMAT),
            saved.id
        ),
        saved,
    ))
}

/// Changes the transaction `id`, keeping every field that `fields` leaves out.
pub async fn transaction_edit(
    config: Config,
    id: i64,
    fields: TransactionEdit,
) -> Result<Out<Transaction>> {
    let mut planner = open(&config, None).await?;
    let Some(existing) = planner.transaction(id) else {
        return Err(typed(
            ErrorType::Validation,
            format!("There is no transaction with id {id}"),
        ));
    };
    let mut draft = TransactionDraft::from_transaction(existing);
    if let Some(kind) = fields.kind {
        draft.kind = kind;
    }
    if let Some(date) = fields.date {
        draft.date = Some(date);
    }
    if let Some(group) = fields.group {
        draft.group = group;
    }
    if let Some(name) = fields.name {
        draft.name = name;
    }
    if let Some(amount) = fields.amount {
        draft.amount = Some(amount);
    }
    if let Some(note) = fields.note {
        draft.note = note;
    }
    let saved = planner.save_transaction(draft).await?;
    Ok(Out::new(format!("Updated transaction {id}"), saved))
}

pub async fn transaction_delete(config: Config, id: i64) -> Result<Out<Transaction>> {
    let mut planner = open(&config, None).await?;
    let removed = planner.delete_transaction(id).await?;
    Ok(Out::new(format!("Deleted transaction {id}"), removed))
}

/// Lists transactions of the selected year, newest first, optionally narrowed by month, kind and
/// category.
pub async fn transaction_list(
    config: Config,
    month: Option<MonthView>,
    kind: Option<Kind>,
    group: Option<&str>,
) -> Result<Out<Vec<Transaction>>> {
    let planner = open(&config, None).await?;
    let month = month.and_then(|m| m.month());
    let mut rows: Vec<Transaction> = planner
        .data()
        .transactions
        .iter()
        .filter(|t| month.map_or(true, |m| t.month0() == m))
        .filter(|t| kind.map_or(true, |k| t.kind == k))
        .filter(|t| group.map_or(true, |g| t.group == g))
        .cloned()
        .collect();
    rows.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));

    Ok(Out::new(format!("{} transactions", rows.len()), rows.clone()).with_body(render(&rows)))
}

pub(super) fn render(rows: &[Transaction]) -> String {
    let mut table =
        Table::new(["Id", "Date", "Kind", "Category", "Sub-category", "Amount", "Note"]);
    for t in rows {
        let name = match t.kind {
            Kind::Income => "",
            Kind::Expense => t.name.as_str(),
        };
        table.push(vec![
            t.id.to_string(),
            t.date.format(DATE_FORMAT).to_string(),
            t.kind.to_string(),
            t.group.clone(),
            name.to_string(),
            format_money(t.amount),
            t.note.clone(),
        ]);
    }
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::category_add;
    use crate::error::error_type;
    use crate::test::TestEnv;
    use chrono::NaiveDate;

    fn fields(group: &str, name: &str, amount: f64, date: &str) -> TransactionFields {
        TransactionFields {
            kind: Kind::Expense,
            date: NaiveDate::parse_from_str(date, DATE_FORMAT).ok(),
            group: group.into(),
            name: name.into(),
            amount: Some(amount),
            note: String::new(),
        }
    }

    #[tokio::test]
    async fn test_add_edit_list_delete() {
        let env = TestEnv::new().await;
        category_add(env.config(), Kind::Expense, "Casa", "Affitto")
            .await
            .unwrap();
        let first = transaction_add(env.config(), fields("Casa", "Affitto", 750.0, "2025-01-05"))
            .await
            .unwrap();
        let first = first.structure().unwrap().clone();
        transaction_add(env.config(), fields("Casa", "Affitto", 30.0, "2025-02-05"))
            .await
            .unwrap();

        let edit = TransactionEdit {
            kind: None,
            date: None,
            group: None,
            name: None,
            amount: Some(700.0),
            note: Some("sconto".into()),
        };
        let out = transaction_edit(env.config(), first.id, edit).await.unwrap();
        let edited = out.structure().unwrap();
        assert_eq!(edited.amount, 700.0);
        assert_eq!(edited.date, first.date);
        assert_eq!(edited.note, "sconto");

        let out = transaction_list(env.config(), Some(MonthView::Month(0)), None, None)
            .await
            .unwrap();
        assert_eq!(out.structure().unwrap().len(), 1);

        let out = transaction_list(env.config(), None, None, Some("Casa"))
            .await
            .unwrap();
        let rows = out.structure().unwrap();
        assert_eq!(rows.len(), 2);
        // Newest first.
        assert_eq!(rows[0].amount, 30.0);
        assert!(out.body().unwrap().contains("700,00 €"));

        transaction_delete(env.config(), first.id).await.unwrap();
        let err = transaction_delete(env.config(), first.id).await.unwrap_err();
        assert_eq!(error_type(&err), Some(ErrorType::Validation));
    }

    #[tokio::test]
    async fn test_add_requires_amount() {
        let env = TestEnv::new().await;
        let mut f = fields("Casa", "Affitto", 0.0, "2025-01-05");
        f.amount = None;
        let err = transaction_add(env.config(), f).await.unwrap_err();
        assert_eq!(err.to_string(), "Enter an amount");
    }

    #[tokio::test]
    async fn test_edit_unknown_id() {
        let env = TestEnv::new().await;
        let edit = TransactionEdit {
            kind: None,
            date: None,
            group: None,
            name: None,
            amount: None,
            note: None,
        };
        assert!(transaction_edit(env.config(), 7, edit).await.is_err());
    }
}
