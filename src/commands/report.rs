use crate::aggregate::Report;
use crate::args::ReportFormat;
use crate::commands::table::{money_or_empty, Table};
use crate::commands::{open, Out};
use crate::model::{current_month, MonthView, MONTHS, SHORT_MONTHS};
use crate::utils::format_money;
use crate::{Config, Result};
use anyhow::Context;

/// The expense category summary and the annual matrix, rendered as `format`.
///
/// The summary's month is the selected month, or today's month when the annual view is selected.
/// CSV carries the matrix only, with plain numbers.
pub async fn report(
    config: Config,
    month: Option<MonthView>,
    format: ReportFormat,
) -> Result<Out<Report>> {
    let planner = open(&config, month).await?;
    let report = planner.ledger().report(planner.view(), current_month());

    let body = match format {
        ReportFormat::Table => render_tables(&report),
        ReportFormat::Csv => render_csv(&report)?,
        ReportFormat::Json => {
            serde_json::to_string_pretty(&report).context("Unable to serialize the report")?
        }
    };
    let message = format!(
        "Report for {} over {} categories and {} sub-categories",
        planner.year(),
        report.category_summary.len(),
        report.rows.len()
    );
    Ok(Out::new(message, report).with_body(body))
}

fn render_tables(report: &Report) -> String {
    let month_label = MONTHS.get(report.cur_month).copied().unwrap_or_default();
    let mut summary =
        Table::new(["Categoria", month_label, "Totale anno", "Media mensile"]).numeric_from(1);
    for row in &report.category_summary {
        summary.push(vec![
            row.group.clone(),
            format_money(row.month_total),
            format_money(row.year_total),
            format_money(row.avg),
        ]);
    }

    let mut headers = vec!["Sottocategoria".to_string(), "Categoria".to_string()];
    headers.extend(SHORT_MONTHS.iter().map(|m| m.to_string()));
    headers.push("Totale".to_string());
    let mut matrix = Table::new(headers).numeric_from(2);
    for row in &report.rows {
        let mut cells = vec![row.name.clone(), row.group.clone()];
        cells.extend(row.month_vals.iter().map(|v| money_or_empty(*v)));
        cells.push(format_money(row.total));
        matrix.push(cells);
    }

    format!("{summary}\n{matrix}")
}

fn render_csv(report: &Report) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut headers = vec!["group", "name"];
    headers.extend(SHORT_MONTHS);
    headers.push("total");
    writer
        .write_record(&headers)
        .context("Unable to write the CSV header")?;
    for row in &report.rows {
        let mut record = vec![row.group.clone(), row.name.clone()];
        record.extend(row.month_vals.iter().map(|v| format!("{v:.2}")));
        record.push(format!("{:.2}", row.total));
        writer
            .write_record(&record)
            .with_context(|| format!("Unable to write the CSV row for {}/{}", row.group, row.name))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Unable to flush the CSV output: {e}"))?;
    String::from_utf8(bytes).context("The CSV output is not valid UTF-8")
}
