//! Logs command - view and manage the event log

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::get_horizon_dir;
use crate::output;
use horizon_core::services::{EntryPoint, EventLogService};

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent log entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only errors
        #[arg(long)]
        errors: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear old log entries
    Clear {
        /// Delete logs older than N days
        #[arg(long, default_value = "30")]
        older_than_days: u64,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show log statistics and database path
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy the log database to a file for support requests
    Export {
        /// Destination path (defaults to ./horizon-logs.duckdb)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn open_event_log() -> Result<EventLogService> {
    let horizon_dir = get_horizon_dir();
    EventLogService::new(&horizon_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

fn format_timestamp(timestamp_ms: i64) -> String {
    use chrono::{TimeZone, Utc};
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

pub fn run(command: LogsCommands) -> Result<()> {
    let service = open_event_log()?;

    match command {
        LogsCommands::List {
            limit,
            errors,
            json,
        } => list(&service, limit, errors, json),
        LogsCommands::Clear {
            older_than_days,
            force,
            json,
        } => clear(&service, older_than_days, force, json),
        LogsCommands::Stats { json } => stats(&service, json),
        LogsCommands::Export { output } => export(&service, output),
    }
}

fn list(service: &EventLogService, limit: usize, errors_only: bool, json: bool) -> Result<()> {
    let entries = if errors_only {
        service.get_errors(limit)?
    } else {
        service.get_recent(limit)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No log entries found.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Time", "Source", "Event", "Context", "Error"]);

    for entry in &entries {
        let context = [entry.command.as_deref(), entry.aggregator.as_deref()]
            .iter()
            .filter_map(|&s| s)
            .collect::<Vec<_>>()
            .join(", ");

        let error_indicator = if entry.error_message.is_some() {
            "!".red().to_string()
        } else {
            String::new()
        };

        table.add_row(vec![
            format_timestamp(entry.timestamp),
            entry.entry_point.clone(),
            entry.event.clone(),
            context,
            error_indicator,
        ]);
    }

    println!("{}", table);

    // A listing that was not error-filtered still calls out recent failures.
    if !errors_only {
        let recent_errors = service.get_errors(3)?;
        if !recent_errors.is_empty() {
            println!();
            println!("{}", "Recent errors:".red().bold());
            for err in &recent_errors {
                println!(
                    "  {} [{}]: {}",
                    format_timestamp(err.timestamp).dimmed(),
                    err.event,
                    err.error_message.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    Ok(())
}

fn clear(service: &EventLogService, older_than_days: u64, force: bool, json: bool) -> Result<()> {
    let cutoff_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
        - (older_than_days as i64 * 24 * 60 * 60 * 1000);

    if !force && !json {
        use dialoguer::Confirm;
        if !Confirm::new()
            .with_prompt(format!("Delete logs older than {} days?", older_than_days))
            .default(false)
            .interact()?
        {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let deleted = service.delete_before(cutoff_ms)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": deleted }));
    } else {
        println!("Deleted {} log entries", deleted);
    }

    Ok(())
}

fn stats(service: &EventLogService, json: bool) -> Result<()> {
    let total = service.count()?;
    let errors = service.get_errors(1000)?.len();
    let db_path = service.db_path().to_path_buf();
    let size_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "total_entries": total,
                "error_count": errors,
                "database_path": db_path.to_string_lossy(),
                "database_size_bytes": size_bytes
            })
        );
    } else {
        println!("{}", "Log Statistics".bold());
        println!("  Total entries: {}", total);
        println!("  Errors: {}", errors);
        println!("  Database: {}", db_path.display());
        println!("  Size: {}", output::format_size(size_bytes));
    }

    Ok(())
}

fn export(service: &EventLogService, output_path: Option<PathBuf>) -> Result<()> {
    let dest = output_path.unwrap_or_else(|| PathBuf::from("horizon-logs.duckdb"));
    let written = service.export(&dest)?;
    output::success(&format!(
        "Exported {} log entries to {}",
        service.count()?,
        written.display()
    ));
    Ok(())
}
