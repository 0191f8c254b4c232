//! Setup command - configure the horizon directory and Plaid credentials

use anyhow::Result;
use dialoguer::{Input, Password};
use horizon_core::adapters::plaid::PlaidClient;
use horizon_core::config::Config;
use horizon_core::services::generate_admin_key;
use uuid::Uuid;

use super::get_horizon_dir;
use crate::output;

pub fn run() -> Result<()> {
    let horizon_dir = get_horizon_dir();
    std::fs::create_dir_all(&horizon_dir)?;

    let mut config = Config::load(&horizon_dir).unwrap_or_default();

    // The admin key is minted once; later runs keep the existing one
    if config.admin_key.is_none() {
        config.admin_key = Some(generate_admin_key());
        println!("Generated server admin key");
    }

    let environment: String = Input::new()
        .with_prompt("Plaid environment (sandbox, development, production)")
        .default(config.plaid.environment.clone())
        .interact_text()?;

    let client_id: String = match config.plaid.client_id.clone() {
        Some(existing) => Input::new()
            .with_prompt("Plaid client ID")
            .default(existing)
            .interact_text()?,
        None => Input::new().with_prompt("Plaid client ID").interact_text()?,
    };

    let secret = Password::new().with_prompt("Plaid secret").interact()?;

    // Verify the credentials against the live API before storing them.
    // Creating a link token is the cheapest call that exercises both the
    // credentials and the configured product set.
    output::info("Verifying credentials with Plaid...");
    let client = PlaidClient::new(&client_id, &secret, &environment)?;
    client.create_link_token(&Uuid::new_v4().to_string(), "Horizon", &config.products)?;
    output::success("Plaid credentials verified");

    config.plaid.environment = environment;
    config.plaid.client_id = Some(client_id);
    config.plaid.secret = Some(secret);
    config.save(&horizon_dir)?;

    output::success(&format!(
        "Settings saved to {}",
        horizon_dir.join("settings.json").display()
    ));
    println!("Run 'hz register' to create an identity, then 'hz link' to connect a bank.");

    Ok(())
}
