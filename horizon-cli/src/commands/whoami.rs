//! Whoami command - show the signed-in identity

use anyhow::Result;
use colored::Colorize;

use super::{get_context, require_user_scope};

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let scope = require_user_scope(&ctx)?;
    let identity = scope.identity();

    if json {
        println!("{}", serde_json::to_string_pretty(identity)?);
        return Ok(());
    }

    println!("{}", identity.display_name().bold());
    println!("  Email: {}", identity.email);
    println!("  Tier: {}", identity.tier.as_str());
    println!("  Registered: {}", identity.created_at.format("%Y-%m-%d"));

    Ok(())
}
