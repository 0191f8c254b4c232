//! Register command - create a new identity and sign in

use anyhow::Result;
use chrono::NaiveDate;
use dialoguer::{Input, Password};
use horizon_core::services::LogEvent;
use horizon_core::NewIdentity;

use super::{get_context, get_logger, log_event, save_session_token};
use crate::output;

pub fn run(
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
) -> Result<()> {
    let ctx = get_context()?;

    // Registration is a server-side operation gated by the admin key
    let admin_key = ctx
        .config
        .admin_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("No admin key configured. Run 'hz setup' first."))?;
    let admin = ctx.session_service.create_admin_scope(&admin_key)?;

    let email = match email {
        Some(e) => e,
        None => Input::new().with_prompt("Email").interact_text()?,
    };
    let first_name = match first_name {
        Some(n) => n,
        None => Input::new().with_prompt("First name").interact_text()?,
    };
    let last_name = match last_name {
        Some(n) => n,
        None => Input::new().with_prompt("Last name").interact_text()?,
    };
    let password = Password::new()
        .with_prompt("Password")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;

    let address1: String = Input::new()
        .with_prompt("Street address (optional)")
        .allow_empty(true)
        .interact_text()?;
    let city: String = Input::new()
        .with_prompt("City (optional)")
        .allow_empty(true)
        .interact_text()?;
    let state: String = Input::new()
        .with_prompt("State (optional)")
        .allow_empty(true)
        .interact_text()?;
    let postal_code: String = Input::new()
        .with_prompt("Postal code (optional)")
        .allow_empty(true)
        .interact_text()?;
    let dob_raw: String = Input::new()
        .with_prompt("Date of birth (YYYY-MM-DD, optional)")
        .allow_empty(true)
        .interact_text()?;
    let date_of_birth = if dob_raw.trim().is_empty() {
        None
    } else {
        Some(
            NaiveDate::parse_from_str(dob_raw.trim(), "%Y-%m-%d")
                .map_err(|_| anyhow::anyhow!("Invalid date of birth, expected YYYY-MM-DD"))?,
        )
    };

    let new_identity = NewIdentity {
        email,
        password,
        first_name,
        last_name,
        address1: optional(address1),
        city: optional(city),
        state: optional(state),
        postal_code: optional(postal_code),
        date_of_birth,
    };

    let identity = ctx.session_service.register(&admin, &new_identity)?;

    let logger = get_logger();
    log_event(&logger, LogEvent::identity_registered());

    // Sign straight in, matching the web sign-up flow
    let signin = ctx
        .session_service
        .sign_in(&new_identity.email, &new_identity.password)?;
    save_session_token(&signin.token)?;
    log_event(&logger, LogEvent::session_created());

    output::success(&format!(
        "Registered {} ({})",
        identity.display_name(),
        identity.email
    ));
    println!(
        "Signed in until {}",
        signin.expires_at.format("%Y-%m-%d %H:%M UTC")
    );

    Ok(())
}

fn optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
