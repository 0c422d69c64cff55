use crate::aggregate::Ledger;
use crate::commands::{open, Out};
use crate::model::{CategoryItem, Kind, MonthView};
use crate::utils::format_money;
use crate::{Config, Result};
use anyhow::Context;

/// Sets the budget of the `kind` category at `index` for one month, the current month when
/// `month` is not given.
pub async fn budget_set(
    config: Config,
    kind: Kind,
    index: usize,
    amount: f64,
    month: Option<MonthView>,
) -> Result<Out<CategoryItem>> {
    let mut planner = open(&config, month).await?;
    planner.update_budget(kind, index, amount).await?;

    let view = planner.view();
    let item = planner
        .data()
        .items(kind)
        .get(index)
        .cloned()
        .with_context(|| format!("The {kind} category at position {index} disappeared"))?;
    let mut message = format!(
        "Budget for '{item}' in {} {} set to {}",
        view.label(),
        planner.year(),
        format_money(amount)
    );
    if amount == 0.0 {
        if let Some(suggested) = Ledger::suggested_budget(&item, view) {
            message.push_str(&format!(", last month was {}", format_money(suggested)));
        }
    }
    Ok(Out::new(message, item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::category_add;
    use crate::error::{error_type, ErrorType};
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_budget_set() {
        let env = TestEnv::new().await;
        category_add(env.config(), Kind::Expense, "Casa", "Affitto")
            .await
            .unwrap();
        let out = budget_set(env.config(), Kind::Expense, 0, 800.0, Some(MonthView::Month(2)))
            .await
            .unwrap();
        let item = out.structure().unwrap();
        assert_eq!(item.budget.get(2), 800.0);
        assert_eq!(item.budget.sum(), 800.0);

        let out = budget_set(env.config(), Kind::Expense, 0, 0.0, Some(MonthView::Month(3)))
            .await
            .unwrap();
        assert!(out.message().ends_with("last month was 800,00 €"));
    }

    #[tokio::test]
    async fn test_budget_set_rejects_annual_and_bad_index() {
        let env = TestEnv::new().await;
        category_add(env.config(), Kind::Income, "Stipendio", "")
            .await
            .unwrap();
        let err = budget_set(env.config(), Kind::Income, 0, 10.0, Some(MonthView::Annual))
            .await
            .unwrap_err();
        assert_eq!(error_type(&err), Some(ErrorType::Validation));
        let err = budget_set(env.config(), Kind::Income, 4, 10.0, Some(MonthView::Month(0)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "There is no income category at position 4");
    }
}
