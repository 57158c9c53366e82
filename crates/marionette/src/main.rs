// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Marionette - a double-puppeting bridge between Matrix and a third-party network.
//!
//! This binary validates configuration and diagnoses a deployment. The bridge
//! itself runs inside an adapter binary via `marionette::serve::run_or_exit`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use marionette_config::MarionetteConfig;

/// Marionette - a double-puppeting bridge for Matrix.
#[derive(Parser, Debug)]
#[command(name = "marionette", version, about, long_about = None)]
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
    /// Validate the configuration and print a summary.
    Check,
    /// Run diagnostic checks against the database and homeserver.
    Doctor {
        /// Also run the SQLite integrity check.
        #[arg(long)]
        deep: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

fn load(path: Option<&PathBuf>) -> MarionetteConfig {
    let loaded = match path {
        Some(path) => marionette_config::load_and_validate_path(path),
        None => marionette_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            marionette_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load(cli.config.as_ref());

    match cli.command {
        Some(Commands::Check) => {
            println!("marionette: configuration is valid");
            println!(
                "  identity:   {} on {}",
                config.identity.id, config.identity.network
            );
            println!(
                "  homeserver: {} ({})",
                config.homeserver.url, config.homeserver.server_name
            );
            println!("  bot:        {}", config.homeserver.bot_user_id());
            println!(
                "  puppet:     {}",
                config.puppet.user_id.as_deref().unwrap_or("<not set>")
            );
            println!("  database:   {}", config.storage.database_path);
        }
        Some(Commands::Doctor { deep, plain }) => {
            match marionette::doctor::run_doctor(&config, cli.config.as_deref(), deep, plain).await
            {
                Ok(0) => {}
                Ok(_) => std::process::exit(1),
                Err(e) => {
                    eprintln!("marionette doctor: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => {
            println!("marionette: use --help for available commands");
        }
    }
}
