// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deskline - command-line client for the helpdesk backend.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod app;
mod chat;
mod notifications;
mod session;
mod shutdown;

use clap::{Parser, Subcommand};
use colored::Colorize;
use deskline_core::{ConversationId, DesklineError};

use crate::app::App;

/// Deskline - command-line client for the helpdesk backend.
#[derive(Parser, Debug)]
#[command(name = "deskline", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store the session.
    Login {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session.
    Logout,
    /// Show the logged-in account.
    Whoami,
    /// List conversations.
    Conversations,
    /// Open a conversation, follow it live, and send lines typed on stdin.
    Chat {
        /// Conversation id.
        id: u64,
    },
    /// List notifications.
    Notifications {
        /// Keep running and print the feed whenever it changes.
        #[arg(long)]
        follow: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match deskline_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            deskline_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.client.log_level);

    if let Err(e) = run(cli.command, config).await {
        eprintln!("{}: {e}", "error".red());
        if e.requires_login() {
            eprintln!("run {} to sign in again", "deskline login".yellow());
        }
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: deskline_config::DesklineConfig) -> Result<(), DesklineError> {
    let app = App::new(config)?;
    match command {
        Commands::Login { email, password } => session::login(&app, &email, password).await,
        Commands::Logout => session::logout(&app),
        Commands::Whoami => {
            session::whoami(&app);
            Ok(())
        }
        Commands::Conversations => chat::list(&app).await,
        Commands::Chat { id } => chat::follow(&app, ConversationId(id)).await,
        Commands::Notifications { follow } => notifications::show(&app, follow).await,
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("deskline={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["deskline", "chat", "12"]).unwrap();
        assert!(matches!(cli.command, Commands::Chat { id: 12 }));

        let cli = Cli::try_parse_from(["deskline", "notifications", "--follow"]).unwrap();
        assert!(matches!(cli.command, Commands::Notifications { follow: true }));

        let cli =
            Cli::try_parse_from(["deskline", "login", "--email", "ana@example.com"]).unwrap();
        assert!(matches!(cli.command, Commands::Login { password: None, .. }));
    }

    #[test]
    fn chat_requires_numeric_id() {
        assert!(Cli::try_parse_from(["deskline", "chat", "abc"]).is_err());
    }
}
