//! # Back Office CLI
//!
//! Operational commands over the facture database.
//!
//! ## Usage
//! ```bash
//! backoffice [--config <PATH>] migrate
//! backoffice [--config <PATH>] status
//! backoffice [--config <PATH>] summary --as <USER_ID> [--date YYYY-MM-DD]
//! backoffice [--config <PATH>] aging   --as <USER_ID> [--date YYYY-MM-DD]
//! backoffice [--config <PATH>] overdue --as <USER_ID> [--date YYYY-MM-DD]
//! ```
//!
//! Reports are printed as JSON.

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use backoffice::{init_tracing, ApiError, BackofficeConfig, FactureService};
use chrono::{NaiveDate, Utc};
use facture_core::AccessScope;
use facture_db::Database;
use tracing::info;

struct Args {
    config: Option<PathBuf>,
    command: String,
    actor: Option<String>,
    date: Option<NaiveDate>,
}

fn print_help() {
    println!("Titan Back Office");
    println!();
    println!("Usage: backoffice [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  migrate            Apply pending database migrations");
    println!("  status             Show database health, migrations and invoice count");
    println!("  summary            Invoice counts and amounts per status");
    println!("  aging              Outstanding amounts by days overdue");
    println!("  overdue            Open invoices past their due date");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>  Config file (default: platform config dir)");
    println!("      --as <USER_ID>   Acting user for reports");
    println!("      --date <DATE>    As-of date for reports (default: today)");
    println!("  -h, --help           Show this help message");
}

fn parse_args() -> Result<Option<Args>> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args {
        config: None,
        command: String::new(),
        actor: None,
        date: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                let path = args.get(i).context("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--as" => {
                i += 1;
                parsed.actor = Some(args.get(i).context("--as needs a user id")?.clone());
            }
            "--date" => {
                i += 1;
                let raw = args.get(i).context("--date needs a value")?;
                let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .with_context(|| format!("invalid --date '{}'", raw))?;
                parsed.date = Some(date);
            }
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            other if parsed.command.is_empty() && !other.starts_with('-') => {
                parsed.command = other.to_string();
            }
            other => bail!("unexpected argument '{}'", other),
        }
        i += 1;
    }

    if parsed.command.is_empty() {
        print_help();
        return Ok(None);
    }
    Ok(Some(parsed))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let config = BackofficeConfig::load(args.config.clone()).context("loading configuration")?;
    info!(path = %config.database.path.display(), command = %args.command, "Back office CLI");

    match args.command.as_str() {
        "migrate" | "status" => {
            // Opened without auto-migration so pending files stay visible
            let db = Database::new(config.database.to_db_config().run_migrations(false))
                .await
                .context("opening database")?;
            if args.command == "migrate" {
                db.run_migrations().await?;
                println!("✓ Migrations applied");
            }
            let status = db.migration_status().await?;
            println!("Database healthy: {}", db.health_check().await);
            println!(
                "Migrations: {}/{} applied{}",
                status.applied,
                status.total,
                if status.is_current() { "" } else { " (pending)" }
            );
            if status.is_current() {
                let count = db.factures().count(&AccessScope::Unrestricted).await?;
                println!("Factures: {}", count);
            }
            db.close().await;
        }
        "summary" | "aging" | "overdue" => {
            let actor = args.actor.as_deref().context("--as <USER_ID> is required for reports")?;
            let today = args.date.unwrap_or_else(|| Utc::now().date_naive());
            let service = FactureService::connect(&config)
                .await
                .map_err(ApiError::from)
                .context("connecting to database")?;

            let json = match args.command.as_str() {
                "summary" => serde_json::to_string_pretty(
                    &service.summary(actor, today).await.map_err(ApiError::from)?,
                )?,
                "aging" => serde_json::to_string_pretty(
                    &service.aging_report(actor, today).await.map_err(ApiError::from)?,
                )?,
                _ => serde_json::to_string_pretty(
                    &service.overdue_payments(actor, today).await.map_err(ApiError::from)?,
                )?,
            };
            println!("{}", json);
            service.database().close().await;
        }
        other => bail!("unknown command '{}' (see --help)", other),
    }

    Ok(())
}
