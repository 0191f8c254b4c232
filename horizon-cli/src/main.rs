//! Horizon CLI - Your banking dashboard in the terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

mod commands;
mod output;

use commands::{
    banks, link, login, logout, logs, refresh, register, setup, status, transactions, unlink,
    whoami,
};

/// Horizon - your banking dashboard in the terminal
#[derive(Parser)]
#[command(name = "hz", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up the horizon directory and aggregator credentials
    Setup,

    /// Register a new identity and sign in
    Register {
        /// Email address
        #[arg(long)]
        email: Option<String>,
        /// First name
        #[arg(long)]
        first_name: Option<String>,
        /// Last name
        #[arg(long)]
        last_name: Option<String>,
    },

    /// Sign in and store a session token
    Login {
        /// Email address
        #[arg(long)]
        email: Option<String>,
    },

    /// Revoke the stored session
    Logout,

    /// Show the signed-in identity
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Link a bank through the aggregator's hosted flow
    Link {
        /// Allow a second link to an already-linked institution
        #[arg(long)]
        multi: bool,
        /// Public token from a completed authorization (skips the prompt)
        #[arg(long)]
        public_token: Option<String>,
    },

    /// List linked banks and their accounts
    Banks {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Unlink a bank and delete its cached data
    Unlink {
        /// Linked item ID (see 'hz banks')
        item_id: Uuid,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Pull fresh accounts and transactions from the aggregator
    Refresh {
        /// Refresh a single linked item
        #[arg(long)]
        item_id: Option<Uuid>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a page of transactions
    Transactions {
        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show linked data summary
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Setup => setup::run(),
        Commands::Register {
            email,
            first_name,
            last_name,
        } => register::run(email, first_name, last_name),
        Commands::Login { email } => login::run(email),
        Commands::Logout => logout::run(),
        Commands::Whoami { json } => whoami::run(json),
        Commands::Link {
            multi,
            public_token,
        } => link::run(multi, public_token),
        Commands::Banks { json } => banks::run(json),
        Commands::Unlink { item_id, force } => unlink::run(item_id, force),
        Commands::Refresh { item_id, json } => refresh::run(item_id, json),
        Commands::Transactions { page, json } => transactions::run(page, json),
        Commands::Status { json } => status::run(json),
        Commands::Logs { command } => logs::run(command),
    }
}
