use crate::aggregate::{is_balanced, Detail, FooterTotals, GroupTotals, Ledger};
use crate::commands::table::Table;
use crate::commands::transaction::render;
use crate::commands::{open, Out};
use crate::model::{group_by_group, CategoryItem, Kind, MonthView, Transaction};
use crate::utils::format_money;
use crate::{Config, Result};
use serde::Serialize;
use std::fmt::Write;

/// Budget against actual for one category line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewLine {
    /// Position in the category list, as taken by `category edit` and `budget set`.
    pub index: usize,
    pub name: String,
    pub budget: f64,
    pub actual: f64,
    pub diff: f64,
    pub balanced: bool,
    /// Last month's budget, offered while this month's is still zero.
    pub suggested: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewGroup {
    pub group: String,
    pub totals: GroupTotals,
    pub lines: Vec<OverviewLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub year: i32,
    pub view: MonthView,
    pub label: String,
    pub expense: Vec<OverviewGroup>,
    pub income: Vec<OverviewGroup>,
    pub footer: FooterTotals,
    pub year_net_actual: f64,
}

fn groups(
    ledger: &Ledger<'_>,
    kind: Kind,
    items: &[CategoryItem],
    view: MonthView,
) -> Vec<OverviewGroup> {
    group_by_group(items)
        .into_iter()
        .map(|(group, members)| {
            let totals = ledger.group_totals(kind, members.iter().copied(), view);
            let lines = members
                .iter()
                .map(|item| {
                    let index = items
                        .iter()
                        .position(|x| std::ptr::eq(x, *item))
                        .unwrap_or_default();
                    let budget = Ledger::item_budget(item, view);
                    let diff = ledger.item_diff(kind, item, view);
                    OverviewLine {
                        index,
                        name: item.display_name().to_string(),
                        budget,
                        actual: ledger.item_actual(kind, item, view),
                        diff,
                        balanced: is_balanced(diff),
                        suggested: if budget == 0.0 {
                            Ledger::suggested_budget(item, view)
                        } else {
                            None
                        },
                    }
                })
                .collect();
            OverviewGroup {
                group: group.to_string(),
                totals,
                lines,
            }
        })
        .collect()
}

fn diff_cell(line: &OverviewLine) -> String {
    if line.balanced {
        "OK".to_string()
    } else {
        format_money(line.diff)
    }
}

fn render_kind(title: &str, groups: &[OverviewGroup]) -> String {
    let mut table = Table::new([title, "#", "Sub-category", "Budget", "Actual", "Diff"]).numeric_from(3);
    for g in groups {
        table.push(vec![
            g.group.clone(),
            String::new(),
            String::new(),
            format_money(g.totals.group_budget),
            format_money(g.totals.group_actual),
            String::new(),
        ]);
        for line in &g.lines {
            let budget = match line.suggested {
                Some(s) => format!("({}) {}", format_money(s), format_money(line.budget)),
                None => format_money(line.budget),
            };
            table.push(vec![
                String::new(),
                line.index.to_string(),
                line.name.clone(),
                budget,
                format_money(line.actual),
                diff_cell(line),
            ]);
        }
    }
    table.to_string()
}

/// Budget against actual for every category in the selected month or the whole year, with
/// per-group totals and the overall footer.
pub async fn overview(config: Config, month: Option<MonthView>) -> Result<Out<Overview>> {
    let planner = open(&config, month).await?;
    let view = planner.view();
    let data = planner.data();
    let ledger = planner.ledger();

    let overview = Overview {
        year: planner.year(),
        view,
        label: view.label().to_string(),
        expense: groups(&ledger, Kind::Expense, &data.expense_data, view),
        income: groups(&ledger, Kind::Income, &data.income_data, view),
        footer: ledger.footer_totals(view),
        year_net_actual: ledger.year_net_actual(),
    };

    let mut body = format!("{} {}\n\n", overview.label, overview.year);
    body.push_str(&render_kind("Expenses", &overview.expense));
    body.push('\n');
    body.push_str(&render_kind("Income", &overview.income));
    let f = &overview.footer;
    let _ = write!(
        body,
        "\nExpenses  budget {}  actual {}\nIncome    budget {}  actual {}\nNet       budget {}  actual {}\nYear net actual {}",
        format_money(f.exp_bud),
        format_money(f.exp_act),
        format_money(f.inc_bud),
        format_money(f.inc_act),
        format_money(f.net_bud),
        format_money(f.net_act),
        format_money(overview.year_net_actual),
    );

    let message = format!(
        "{} {}: net actual {}",
        overview.label,
        overview.year,
        format_money(f.net_act)
    );
    Ok(Out::new(message, overview).with_body(body))
}

/// The base amount and the transactions behind one category line, newest first.
pub async fn detail(
    config: Config,
    kind: Kind,
    group: &str,
    name: &str,
    month: Option<MonthView>,
) -> Result<Out<Detail>> {
    let planner = open(&config, month).await?;
    let name = Transaction::name_for(kind, name);
    let view = planner.view();
    let detail = planner.ledger().detail(kind, group, &name, view);

    let body = format!(
        "Base amount: {}\n{}",
        format_money(detail.base_val),
        render(&detail.rows)
    );
    let message = format!(
        "{} transactions for {group} in {} {}",
        detail.rows.len(),
        view.label(),
        planner.year()
    );
    Ok(Out::new(message, detail).with_body(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{budget_set, category_add, transaction_add};
    use crate::args::TransactionFields;
    use crate::test::TestEnv;
    use chrono::NaiveDate;

    async fn seed(env: &TestEnv) {
        category_add(env.config(), Kind::Expense, "Casa", "Affitto")
            .await
            .unwrap();
        category_add(env.config(), Kind::Income, "Stipendio", "")
            .await
            .unwrap();
        budget_set(env.config(), Kind::Expense, 0, 800.0, Some(MonthView::Month(0)))
            .await
            .unwrap();
        budget_set(env.config(), Kind::Income, 0, 2000.0, Some(MonthView::Month(0)))
            .await
            .unwrap();
        for (kind, group, name, amount, day) in [
            (Kind::Expense, "Casa", "Affitto", 800.0, 5),
            (Kind::Income, "Stipendio", "", 2100.0, 27),
        ] {
            transaction_add(
                env.config(),
                TransactionFields {
                    kind,
                    date: NaiveDate::from_ymd_opt(2025, 1, day),
                    group: group.into(),
                    name: name.into(),
                    amount: Some(amount),
                    note: String::new(),
                },
            )
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_overview_january() {
        let env = TestEnv::new().await;
        seed(&env).await;
        let out = overview(env.config(), Some(MonthView::Month(0))).await.unwrap();
        let o = out.structure().unwrap();
        assert_eq!(o.label, "Gennaio");
        assert_eq!(o.expense.len(), 1);
        let rent = &o.expense[0].lines[0];
        assert_eq!(rent.actual, 800.0);
        assert!(rent.balanced);
        assert_eq!(o.income[0].lines[0].diff, 100.0);
        assert_eq!(o.footer.net_bud, 1200.0);
        assert_eq!(o.footer.net_act, 1300.0);
        assert_eq!(o.year_net_actual, 1300.0);
        assert!(out.body().unwrap().contains("Stipendio"));
    }

    #[tokio::test]
    async fn test_overview_suggests_last_month() {
        let env = TestEnv::new().await;
        seed(&env).await;
        let out = overview(env.config(), Some(MonthView::Month(1))).await.unwrap();
        let rent = &out.structure().unwrap().expense[0].lines[0];
        assert_eq!(rent.budget, 0.0);
        assert_eq!(rent.suggested, Some(800.0));
    }

    #[tokio::test]
    async fn test_detail() {
        let env = TestEnv::new().await;
        seed(&env).await;
        let out = detail(env.config(), Kind::Income, "Stipendio", "", Some(MonthView::Annual))
            .await
            .unwrap();
        let d = out.structure().unwrap();
        assert_eq!(d.base_val, 0.0);
        assert_eq!(d.rows.len(), 1);
        assert_eq!(d.rows[0].amount, 2100.0);

        let out = detail(env.config(), Kind::Expense, "Casa", "Affitto", Some(MonthView::Month(1)))
            .await
            .unwrap();
        assert!(out.structure().unwrap().rows.is_empty());
    }
}
