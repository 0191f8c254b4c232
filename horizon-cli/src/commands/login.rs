//! Login command - sign in and store a session token

use anyhow::Result;
use dialoguer::{Input, Password};
use horizon_core::services::LogEvent;

use super::{get_context, get_logger, log_event, save_session_token};
use crate::output;

pub fn run(email: Option<String>) -> Result<()> {
    let ctx = get_context()?;

    let email = match email {
        Some(e) => e,
        None => Input::new().with_prompt("Email").interact_text()?,
    };
    let password = Password::new().with_prompt("Password").interact()?;

    let signin = ctx.session_service.sign_in(&email, &password)?;
    save_session_token(&signin.token)?;

    let logger = get_logger();
    log_event(&logger, LogEvent::session_created());

    output::success(&format!("Signed in as {}", signin.identity.display_name()));
    println!(
        "Session expires {}",
        signin.expires_at.format("%Y-%m-%d %H:%M UTC")
    );

    Ok(())
}
