// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parley - a Telegram relay agent for OpenAI-compatible chat models.
//!
//! This is the binary entry point.

mod chats;
mod serve;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use parley_config::{ConfigError, ParleyConfig};

/// Parley - a Telegram relay agent for OpenAI-compatible chat models.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the relay agent.
    Serve,
    /// Manage the chats authorized to use the bot.
    Chats {
        #[command(subcommand)]
        action: ChatsAction,
    },
    /// Inspect Parley configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ChatsAction {
    /// List authorized chats.
    List,
    /// Authorize a chat.
    Add {
        #[arg(allow_hyphen_values = true)]
        chat_id: i64,
    },
    /// Revoke a chat's authorization.
    Remove {
        #[arg(allow_hyphen_values = true)]
        chat_id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Validate the configuration and report any problems.
    Check,
}

fn load_config(path: Option<&PathBuf>) -> Result<ParleyConfig, Vec<ConfigError>> {
    match path {
        Some(path) => parley_config::load_and_validate_path(path),
        None => parley_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            parley_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Chats { action }) => match action {
            ChatsAction::List => chats::list(&config).await,
            ChatsAction::Add { chat_id } => chats::add(&config, chat_id).await,
            ChatsAction::Remove { chat_id } => chats::remove(&config, chat_id).await,
        },
        Some(Commands::Config {
            action: ConfigAction::Check,
        }) => {
            println!(
                "configuration OK (mode={:?}, model={}, context.length={})",
                config.telegram.mode, config.provider.model, config.context.length
            );
            Ok(())
        }
        None => {
            println!("parley: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
