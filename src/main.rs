use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;

mod classify;
mod db;
mod grid;
mod ingest;
mod insights;
mod kpi;
mod models;
mod normalize;
mod remote;
mod report;
mod schema;

use models::Department;
use normalize::OperatorAliases;

#[derive(Parser)]
#[command(name = "desk-kpi")]
#[command(about = "Support desk KPI ingestion and reporting pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ImportKindArg {
    Chat,
    Assistance,
    Development,
    Training,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import a chat/ticket/training export file
    Import {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, value_enum)]
        kind: ImportKindArg,
    },
    /// Pull fresh tickets from the remote ticketing system
    Sync,
    /// Ask the external webhook to refresh the remote data
    Resync,
    /// Print the KPI snapshot for the week containing a date
    Kpi {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Generate the markdown executive report
    Report {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Resync = cli.command {
        let webhook_url = std::env::var("RESYNC_WEBHOOK_URL")
            .context("RESYNC_WEBHOOK_URL must be set to trigger a resync")?;
        let client = reqwest::Client::new();
        remote::trigger_resync(&client, &webhook_url).await?;
        println!("Resync requested; the store refreshes asynchronously.");
        return Ok(());
    }

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { file, kind } => {
            let grid = grid::load_grid(&file)?;
            let aliases = OperatorAliases::default();

            let (accepted, rejected) = match kind {
                ImportKindArg::Chat => {
                    let batch = ingest::build_chat_batch(&grid, &aliases)?;
                    let written = db::upsert_chats(&pool, &batch.rows).await?;
                    (written, batch.rejected.total())
                }
                ImportKindArg::Assistance | ImportKindArg::Development => {
                    let department = match kind {
                        ImportKindArg::Development => Department::Development,
                        _ => Department::Assistance,
                    };
                    let batch = ingest::build_ticket_day_batch(&grid, department)?;
                    let written = db::upsert_ticket_days(&pool, &batch.rows).await?;
                    (written, batch.rejected.total())
                }
                ImportKindArg::Training => {
                    let rules = classify::ClassifierRules::default();
                    let batch = ingest::build_training_batch(&grid, &aliases, &rules)?;
                    let written = db::insert_trainings(&pool, &batch.rows).await?;
                    (written, batch.rejected.total())
                }
            };
            println!(
                "Imported {accepted} records ({rejected} rows rejected) from {}.",
                file.display()
            );
        }
        Commands::Sync => {
            let cfg = remote::RemoteConfig::from_env()?;
            let client = reqwest::Client::new();
            let token = remote::refresh_access_token(&client, &cfg).await?;
            let (assistance, development) =
                remote::fetch_all_tickets(&client, &cfg, &token).await?;

            let today = Utc::now().date_naive();
            let rollups = vec![
                remote::daily_rollup(&assistance, Department::Assistance, today),
                remote::daily_rollup(&development, Department::Development, today),
            ];

            db::upsert_tickets(&pool, &assistance).await?;
            db::upsert_tickets(&pool, &development).await?;
            db::upsert_ticket_days(&pool, &rollups).await?;
            println!(
                "Synced {} assistance and {} development tickets.",
                assistance.len(),
                development.len()
            );
        }
        Commands::Kpi { date } => {
            let anchor = date.unwrap_or_else(|| Utc::now().date_naive());
            let current = kpi::week_window(anchor);
            let previous = kpi::previous_window(&current);
            let dataset = db::fetch_all(&pool).await?;

            let current_kpi = kpi::aggregate(
                &dataset.chats,
                &dataset.assistance,
                &dataset.development,
                &current,
            );
            let previous_kpi = kpi::aggregate(
                &dataset.chats,
                &dataset.assistance,
                &dataset.development,
                &previous,
            );

            println!(
                "{} ({} to {}), compared with {}:",
                current.label, current.start, current.end, previous.label
            );
            for (name, trend) in kpi::trends(&current_kpi, &previous_kpi) {
                println!(
                    "- {name}: {:.1} ({:+.1} vs previous)",
                    trend.current, trend.delta
                );
            }
        }
        Commands::Report { date, out } => {
            let anchor = date.unwrap_or_else(|| Utc::now().date_naive());
            let current = kpi::week_window(anchor);
            let previous = kpi::previous_window(&current);
            let dataset = db::fetch_all(&pool).await?;

            let report = report::build_report(&dataset, &current, &previous);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Resync => unreachable!("handled before the pool is created"),
    }

    Ok(())
}
