//! CLI command implementations

pub mod banks;
pub mod link;
pub mod login;
pub mod logout;
pub mod logs;
pub mod refresh;
pub mod register;
pub mod setup;
pub mod status;
pub mod transactions;
pub mod unlink;
pub mod whoami;

use std::path::PathBuf;

use anyhow::{Context, Result};
use horizon_core::services::{EntryPoint, EventLogService, LogEvent};
use horizon_core::{Error, HorizonContext, UserScope};

/// Get the event log service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<EventLogService> {
    let horizon_dir = get_horizon_dir();
    // Ensure directory exists
    std::fs::create_dir_all(&horizon_dir).ok()?;
    EventLogService::new(&horizon_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<EventLogService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Get the horizon directory from environment or default
pub fn get_horizon_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HORIZON_DIR") {
        PathBuf::from(dir)
    } else {
        dirs::home_dir()
            .expect("Could not find home directory")
            .join(".horizon")
    }
}

/// Get or create horizon context
pub fn get_context() -> Result<HorizonContext> {
    let horizon_dir = get_horizon_dir();

    // Create directory if it doesn't exist
    std::fs::create_dir_all(&horizon_dir)
        .with_context(|| format!("Failed to create horizon directory: {:?}", horizon_dir))?;

    HorizonContext::new(&horizon_dir)
}

/// Path of the saved session token
fn session_path() -> PathBuf {
    get_horizon_dir().join("session")
}

/// Persist the session token with owner-only permissions
pub fn save_session_token(token: &str) -> Result<()> {
    let path = session_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, token)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Read the saved session token, if any
pub fn load_session_token() -> Option<String> {
    let token = std::fs::read_to_string(session_path()).ok()?;
    let token = token.trim().to_string();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Delete the saved session token
pub fn clear_session_token() {
    let _ = std::fs::remove_file(session_path());
}

/// Resolve the saved session token into a user scope
pub fn require_user_scope(ctx: &HorizonContext) -> Result<UserScope> {
    let token = load_session_token()
        .ok_or_else(|| anyhow::anyhow!("Not signed in. Run 'hz login' first."))?;
    match ctx.session_service.create_user_scope(&token) {
        Ok(scope) => Ok(scope),
        Err(Error::Unauthenticated(_)) => {
            // Stale tokens get cleaned up so the next attempt prompts cleanly
            clear_session_token();
            anyhow::bail!("Session expired or invalid. Run 'hz login' again.")
        }
        Err(e) => Err(e.into()),
    }
}
