use budget_planner::args::{
    Args, BackupCommand, BudgetCommand, CategoryCommand, Command, TransactionCommand, WebhookCommand,
    YearCommand,
};
use budget_planner::{commands, Config, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().budget_home().to_path_buf();

    let _: () = match args.command() {
        Command::Init => commands::init(&home).await?.print(),

        Command::Year(year_args) => {
            let config = Config::load(&home).await?;
            match &year_args.command {
                YearCommand::Show => commands::year_show(config).await?.print(),
                YearCommand::Set { year } => commands::year_set(config, year).await?.print(),
                YearCommand::Reset { yes } => commands::year_reset(config, *yes).await?.print(),
            }
        }

        Command::Category(category_args) => {
            let config = Config::load(&home).await?;
            match &category_args.command {
                CategoryCommand::Add { kind, group, name } => {
                    commands::category_add(config, *kind, group, name)
                        .await?
                        .print()
                }
                CategoryCommand::Edit {
                    kind,
                    index,
                    group,
                    name,
                } => commands::category_edit(config, *kind, *index, group, name)
                    .await?
                    .print(),
                CategoryCommand::Delete { kind, index } => {
                    commands::category_delete(config, *kind, *index)
                        .await?
                        .print()
                }
                CategoryCommand::List { kind } => {
                    commands::category_list(config, *kind).await?.print()
                }
            }
        }

        Command::Transaction(transaction_args) => {
            let config = Config::load(&home).await?;
            match &transaction_args.command {
                TransactionCommand::Add(fields) => {
                    commands::transaction_add(config, fields.clone())
                        .await?
                        .print()
                }
                TransactionCommand::Edit { id, fields } => {
                    commands::transaction_edit(config, *id, fields.clone())
                        .await?
                        .print()
                }
                TransactionCommand::Delete { id } => {
                    commands::transaction_delete(config, *id).await?.print()
                }
                TransactionCommand::List { month, kind, group } => {
                    commands::transaction_list(config, *month, *kind, group.as_deref())
                        .await?
                        .print()
                }
            }
        }

        Command::Budget(budget_args) => {
            let config = Config::load(&home).await?;
            match &budget_args.command {
                BudgetCommand::Set {
                    kind,
                    index,
                    amount,
                    month,
                } => commands::budget_set(config, *kind, *index, *amount, *month)
                    .await?
                    .print(),
            }
        }

        Command::Overview(view_args) => {
            let config = Config::load(&home).await?;
            commands::overview(config, view_args.month).await?.print()
        }

        Command::Report(report_args) => {
            let config = Config::load(&home).await?;
            commands::report(config, report_args.month, report_args.format)
                .await?
                .print()
        }

        Command::Detail(detail_args) => {
            let config = Config::load(&home).await?;
            commands::detail(
                config,
                detail_args.kind,
                &detail_args.group,
                &detail_args.name,
                detail_args.month,
            )
            .await?
            .print()
        }

        Command::Backup(backup_args) => {
            let config = Config::load(&home).await?;
            match &backup_args.command {
                BackupCommand::Export { out } => {
                    commands::backup_export(config, out.clone()).await?.print()
                }
                BackupCommand::Restore { file } => {
                    commands::backup_restore(config, file).await?.print()
                }
            }
        }

        // The webhook keeps no local data, so it runs without a budget home.
        Command::Webhook(webhook_args) => match &webhook_args.command {
            WebhookCommand::Serve(serve_args) => {
                commands::webhook_serve(serve_args.clone()).await?.print()
            }
        },
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; log the library and the binary at the requested level.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level,
                env!("CARGO_CRATE_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
