// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Waypoint - a cost-aware AI request router.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod check;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use waypoint_config::WaypointConfig;

/// Waypoint - a cost-aware AI request router.
#[derive(Parser, Debug)]
#[command(name = "waypoint", version, about, long_about = None)]
struct Cli {
    /// Load this config file instead of the standard search path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP router.
    Serve,
    /// Validate configuration and print the provider chain.
    Check,
}

fn load_config(path: Option<&PathBuf>) -> WaypointConfig {
    let loaded = match path {
        Some(path) => waypoint_config::load_and_validate_path(path),
        None => waypoint_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            waypoint_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => {
            let config = load_config(cli.config.as_ref());
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Check) => {
            let config = load_config(cli.config.as_ref());
            print!("{}", check::render_chain(&config));
        }
        None => {
            println!("waypoint: use --help for available commands");
        }
    }
}
