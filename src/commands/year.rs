use crate::commands::{open, Out};
use crate::error::{typed, ErrorType};
use crate::utils::{clamp_year_str, year_options};
use crate::{Config, Result};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct YearInfo {
    pub year: i32,
    pub expense_items: usize,
    pub income_items: usize,
    pub transactions: usize,
    pub net_actual: f64,
}

async fn info(config: &Config) -> Result<YearInfo> {
    let planner = open(config, None).await?;
    let data = planner.data();
    Ok(YearInfo {
        year: planner.year(),
        expense_items: data.expense_data.len(),
        income_items: data.income_data.len(),
        transactions: data.transactions.len(),
        net_actual: planner.ledger().year_net_actual(),
    })
}

/// Prints the selected year and a count of what it holds.
pub async fn year_show(config: Config) -> Result<Out<YearInfo>> {
    let info = info(&config).await?;
    let years: Vec<String> = year_options().map(|y| y.to_string()).collect();
    let body = format!(
        "{}: {} expense categories, {} income categories, {} transactions\nAvailable years: {}",
        info.year,
        info.expense_items,
        info.income_items,
        info.transactions,
        years.join(", ")
    );
    Ok(Out::new(format!("The selected year is {}", info.year), info).with_body(body))
}

/// Selects `year`. Out-of-range values are clamped and non-numeric input selects the first year.
pub async fn year_set(config: Config, year: &str) -> Result<Out<YearInfo>> {
    let mut planner = open(&config, None).await?;
    let from = planner.year();
    let to = planner.change_year(clamp_year_str(year)).await?;
    let info = info(&config).await?;
    Ok(Out::new(format!("Switched from {from} to {to}"), info))
}

/// Zeroes the selected year's budgets and base amounts and deletes its transactions.
pub async fn year_reset(config: Config, confirmed: bool) -> Result<Out<()>> {
    if !confirmed {
        return Err(typed(
            ErrorType::Validation,
            "Resetting deletes every transaction of the year, pass --yes to confirm",
        ));
    }
    let mut planner = open(&config, None).await?;
    planner.reset_year().await;
    Ok(format!("Reset completed, every amount of {} is now zero", planner.year()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::category_add;
    use crate::model::Kind;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_year_set_and_show() {
        let env = TestEnv::new().await;
        category_add(env.config(), Kind::Expense, "Casa", "Affitto")
            .await
            .unwrap();

        let out = year_set(env.config(), "2026").await.unwrap();
        assert_eq!(out.message(), "Switched from 2025 to 2026");
        let info = out.structure().unwrap();
        assert_eq!(info.year, 2026);
        assert_eq!(info.expense_items, 1);

        let out = year_show(env.config()).await.unwrap();
        assert_eq!(out.structure().unwrap().year, 2026);

        let out = year_set(env.config(), "nonsense").await.unwrap();
        assert_eq!(out.structure().unwrap().year, 2025);
    }

    #[tokio::test]
    async fn test_reset_needs_confirmation() {
        let env = TestEnv::new().await;
        assert!(year_reset(env.config(), false).await.is_err());
        assert!(year_reset(env.config(), true).await.is_ok());
    }
}
