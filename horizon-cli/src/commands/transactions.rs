//! Transactions command - show a page of cached transactions

use anyhow::Result;
use colored::Colorize;

use super::{get_context, require_user_scope};
use crate::output;

pub fn run(page: i64, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let scope = require_user_scope(&ctx)?;

    let result = ctx.transaction_service.page(&scope, page)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.transactions.is_empty() {
        if result.total_transactions == 0 {
            output::warning("No transactions cached. Use 'hz link' and 'hz refresh' first.");
        } else {
            println!(
                "Page {} is past the end ({} pages).",
                result.page, result.total_pages
            );
        }
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Date", "Description", "Amount", "Currency", ""]);
    for tx in &result.transactions {
        let pending = if tx.pending {
            "pending".dimmed().to_string()
        } else {
            String::new()
        };
        table.add_row(vec![
            tx.date.to_string(),
            tx.description.clone().unwrap_or_default(),
            tx.amount.to_string(),
            tx.currency.clone(),
            pending,
        ]);
    }
    println!("{}", table);
    println!();
    println!(
        "Page {} of {} ({} transactions)",
        result.page, result.total_pages, result.total_transactions
    );

    Ok(())
}
