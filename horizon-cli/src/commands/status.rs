//! Status command - show linked data summary

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::{get_context, require_user_scope};

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let scope = require_user_scope(&ctx)?;
    let status = ctx.status_service.status(&scope)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Horizon Status".bold());
    println!();

    // Summary table (vertical key-value pairs)
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec!["Linked banks", &status.linked_items.to_string()]);
    table.add_row(vec!["Accounts", &status.accounts.to_string()]);
    table.add_row(vec!["Transactions", &status.transactions.to_string()]);

    println!("{}", table);
    println!();

    if let Some(range) = &status.date_range {
        println!("Date range: {} to {}", range.earliest, range.latest);
        println!();
    }

    if !status.institutions.is_empty() {
        println!("{}", "Linked Institutions".bold());
        for name in &status.institutions {
            println!("  - {}", name);
        }
    }

    Ok(())
}
