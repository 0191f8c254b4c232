//! Logout command - revoke the stored session

use anyhow::Result;
use horizon_core::services::LogEvent;

use super::{clear_session_token, get_context, get_logger, load_session_token, log_event};
use crate::output;

pub fn run() -> Result<()> {
    let token = match load_session_token() {
        Some(t) => t,
        None => {
            println!("Not signed in.");
            return Ok(());
        }
    };

    let ctx = get_context()?;
    // Revocation is quiet for tokens the server no longer knows
    ctx.session_service.sign_out(&token)?;
    clear_session_token();

    let logger = get_logger();
    log_event(&logger, LogEvent::session_revoked());

    output::success("Signed out");

    Ok(())
}
