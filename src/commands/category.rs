use crate::commands::table::Table;
use crate::commands::{open, Out};
use crate::model::{CategoryItem, Kind};
use crate::{Config, Result};

pub async fn category_add(
    config: Config,
    kind: Kind,
    group: &str,
    name: &str,
) -> Result<Out<CategoryItem>> {
    let mut planner = open(&config, None).await?;
    let index = planner.save_category(kind, None, group, name).await?;
    let item = planner.data().items(kind)[index].clone();
    Ok(Out::new(format!("Added {kind} category '{item}' at position {index}"), item))
}

/// Renames the item at `index`. Transactions booked on the old name are moved to the new one.
pub async fn category_edit(
    config: Config,
    kind: Kind,
    index: usize,
    group: &str,
    name: &str,
) -> Result<Out<CategoryItem>> {
    let mut planner = open(&config, None).await?;
    let old = planner.data().items(kind).get(index).cloned();
    let index = planner.save_category(kind, Some(index), group, name).await?;
    let item = planner.data().items(kind)[index].clone();
    let message = match old {
        Some(old) => format!("Renamed {kind} category '{old}' to '{item}'"),
        None => format!("Saved {kind} category '{item}'"),
    };
    Ok(Out::new(message, item))
}

pub async fn category_delete(config: Config, kind: Kind, index: usize) -> Result<Out<CategoryItem>> {
    let mut planner = open(&config, None).await?;
    let removed = planner.delete_category(kind, index).await?;
    let message = match kind {
        Kind::Income => format!("Deleted income category '{removed}' and its transactions"),
        Kind::Expense => format!("Deleted expense category '{removed}'"),
    };
    Ok(Out::new(message, removed))
}

/// Lists categories of `kind`, or of both kinds, with the positions other commands take.
pub async fn category_list(config: Config, kind: Option<Kind>) -> Result<Out<Vec<CategoryItem>>> {
    let planner = open(&config, None).await?;
    let kinds = match kind {
        Some(k) => vec![k],
        None => vec![Kind::Expense, Kind::Income],
    };

    let mut table = Table::new(["Kind", "#", "Category", "Sub-category"]);
    let mut all = Vec::new();
    for kind in kinds {
        for (i, item) in planner.data().items(kind).iter().enumerate() {
            table.push(vec![
                kind.to_string(),
                i.to_string(),
                item.display_group().to_string(),
                item.display_name().to_string(),
            ]);
            all.push(item.clone());
        }
    }
    let message = format!("{} categories in {}", all.len(), planner.year());
    let out = Out::new(message, all);
    Ok(if table.is_empty() {
        out
    } else {
        out.with_body(table.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{error_type, ErrorType};
    use crate::model::INCOME_ITEM_NAME;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_add_edit_delete() {
        let env = TestEnv::new().await;
        category_add(env.config(), Kind::Expense, "Casa", "Affitto")
            .await
            .unwrap();
        let out = category_add(env.config(), Kind::Income, "Stipendio", "")
            .await
            .unwrap();
        assert_eq!(out.structure().unwrap().name, INCOME_ITEM_NAME);

        let err = category_add(env.config(), Kind::Expense, "CASA", "affitto")
            .await
            .unwrap_err();
        assert_eq!(error_type(&err), Some(ErrorType::Conflict));

        let out = category_edit(env.config(), Kind::Expense, 0, "Casa", "Mutuo")
            .await
            .unwrap();
        assert_eq!(out.message(), "Renamed expense category 'Casa/Affitto' to 'Casa/Mutuo'");

        let out = category_list(env.config(), None).await.unwrap();
        assert_eq!(out.structure().unwrap().len(), 2);
        let body = out.body().unwrap();
        assert!(body.contains("Mutuo"));
        assert!(body.contains("Stipendio"));

        category_delete(env.config(), Kind::Expense, 0).await.unwrap();
        let out = category_list(env.config(), Some(Kind::Expense)).await.unwrap();
        assert!(out.structure().unwrap().is_empty());
        assert!(out.body().is_none());
    }
}
