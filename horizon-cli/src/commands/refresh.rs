//! Refresh command - pull accounts and transactions from the aggregator

use anyhow::Result;
use colored::Colorize;
use horizon_core::services::LogEvent;
use uuid::Uuid;

use super::{get_context, get_logger, log_event, require_user_scope};

pub fn run(item_id: Option<Uuid>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let scope = require_user_scope(&ctx)?;

    let result = ctx.refresh_service.refresh(&scope, item_id)?;

    let logger = get_logger();
    log_event(&logger, LogEvent::refresh_completed("plaid"));

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    for item in &result.results {
        if let Some(error) = &item.error {
            println!("{} {} - {}", "Error:".red(), item.institution, error);
        } else {
            println!("{} {}", "Refreshed:".green(), item.institution);
            println!("  Accounts: {}", item.accounts_refreshed);
            println!(
                "  Transactions: {} new, {} updated, {} removed",
                item.transactions_added, item.transactions_updated, item.transactions_removed
            );
            for warning in &item.warnings {
                println!("  {} {}", "Warning:".yellow(), warning);
            }
        }
        println!();
    }

    Ok(())
}
