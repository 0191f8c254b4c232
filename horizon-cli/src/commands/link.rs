//! Link command - connect a bank through the aggregator's hosted flow

use anyhow::Result;
use colored::Colorize;
use dialoguer::Input;
use horizon_core::services::{Handshake, LogEvent};

use super::{get_context, get_logger, log_event, require_user_scope};
use crate::output;

pub fn run(multi: bool, public_token: Option<String>) -> Result<()> {
    let ctx = get_context()?;
    let scope = require_user_scope(&ctx)?;
    let logger = get_logger();

    let mut handshake = Handshake::new();

    let link_token = ctx.link_service.request_link_token(&scope)?;
    handshake.token_requested();

    let public_token = match public_token {
        Some(t) => {
            handshake.authorization_opened();
            t
        }
        None => {
            println!();
            println!("{}", "Open the hosted link flow with this token:".bold());
            println!("  {}", link_token.token);
            if let Some(expires) = link_token.expires_at {
                println!("  (expires {})", expires.format("%H:%M UTC"));
            }
            println!();
            handshake.authorization_opened();
            Input::new()
                .with_prompt("Public token from the completed flow")
                .interact_text()?
        }
    };

    handshake.exchange_started();
    match ctx.link_service.finalize_link(&scope, &public_token, multi) {
        Ok(item) => {
            handshake.completed();
            log_event(&logger, LogEvent::link_completed("plaid"));
            output::success(&format!("Linked {}", item.institution_name));
            println!("Run 'hz refresh' to pull accounts and transactions.");
            Ok(())
        }
        Err(e) => {
            handshake.failed();
            log_event(&logger, LogEvent::link_failed("plaid").with_error(e.to_string()));
            Err(e.into())
        }
    }
}
