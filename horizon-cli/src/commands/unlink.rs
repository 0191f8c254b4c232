//! Unlink command - remove a linked bank and its cached data

use anyhow::Result;
use colored::Colorize;
use dialoguer::Confirm;
use horizon_core::services::LogEvent;
use uuid::Uuid;

use super::{get_context, get_logger, log_event, require_user_scope};
use crate::output;

pub fn run(item_id: Uuid, force: bool) -> Result<()> {
    let ctx = get_context()?;
    let scope = require_user_scope(&ctx)?;

    let items = ctx.registry_service.list_items(&scope)?;
    let name = match items.iter().find(|i| i.id == item_id) {
        Some(item) => item.institution_name.clone(),
        None => {
            eprintln!("{}", format!("Linked item '{}' not found", item_id).red());
            if !items.is_empty() {
                let names: Vec<_> = items
                    .iter()
                    .map(|i| format!("{} ({})", i.institution_name, i.id))
                    .collect();
                eprintln!("{}", format!("Linked banks: {}", names.join(", ")).dimmed());
            } else {
                eprintln!("{}", "No banks linked".dimmed());
            }
            std::process::exit(1);
        }
    };

    // Confirm removal unless --force
    if !force {
        println!(
            "\n{}",
            format!(
                "This will unlink '{}' and delete its cached accounts and transactions.",
                name
            )
            .yellow()
        );

        if !Confirm::new()
            .with_prompt("Are you sure?")
            .default(false)
            .interact()?
        {
            println!("{}\n", "Cancelled".dimmed());
            return Ok(());
        }
    }

    ctx.registry_service.unlink_item(&scope, item_id)?;

    let logger = get_logger();
    log_event(&logger, LogEvent::item_unlinked());

    output::success(&format!("Unlinked {}", name));

    Ok(())
}
