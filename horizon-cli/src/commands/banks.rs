//! Banks command - list linked institutions and their accounts

use anyhow::Result;
use colored::Colorize;

use super::{get_context, require_user_scope};
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let scope = require_user_scope(&ctx)?;

    let items = ctx.registry_service.list_items(&scope)?;
    let accounts = ctx.account_service.list(&scope)?;
    let summary = ctx.account_service.summary(&scope)?;

    if json {
        let payload = serde_json::json!({
            "banks": items.iter().map(|item| serde_json::json!({
                "itemId": item.id,
                "institutionId": item.institution_id,
                "institution": item.institution_name,
                "linkedAt": item.created_at.to_rfc3339(),
                "accounts": accounts.iter().filter(|a| a.item_id == item.id).count(),
            })).collect::<Vec<_>>(),
            "totalAccounts": summary.total_accounts,
            "totalCurrentBalance": summary.total_current_balance,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if items.is_empty() {
        output::warning("No banks linked. Use 'hz link' to connect one.");
        return Ok(());
    }

    for item in &items {
        println!(
            "{}  {}",
            item.institution_name.bold(),
            item.id.to_string().dimmed()
        );

        let item_accounts: Vec<_> = accounts.iter().filter(|a| a.item_id == item.id).collect();
        if item_accounts.is_empty() {
            println!("  {}", "No cached accounts. Run 'hz refresh'.".dimmed());
        } else {
            let mut table = output::create_table();
            table.set_header(vec!["Account", "Type", "Currency", "Current", "Available"]);
            for account in item_accounts {
                table.add_row(vec![
                    account.name.clone(),
                    account
                        .subtype
                        .clone()
                        .or_else(|| account.account_type.clone())
                        .unwrap_or_default(),
                    account.currency.clone(),
                    account
                        .current_balance
                        .map(|b| b.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    account
                        .available_balance
                        .map(|b| b.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ]);
            }
            println!("{}", table);
        }
        println!();
    }

    println!(
        "{} accounts, total current balance {}",
        summary.total_accounts, summary.total_current_balance
    );

    Ok(())
}
