// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use clap::{Parser, Subcommand, ValueEnum};

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "marketsync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Offline-first sync agent for marketplace clients")]
#[command(
    long_about = "Offline-first sync agent for marketplace clients.\n\n\
    Queues remote writes locally while disconnected and drains them, in order, \
    once the remote service is reachable again."
)]
pub struct Cli {
    /// Run as if marketsync was started in <path>
    #[arg(short = 'C', long = "directory", global = true, value_name = "path")]
    pub directory: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a .msync directory
    #[command(after_help = "\
Examples:
  marketsync init                               Use the default local service
  marketsync init --url wss://sync.example/ws   Point at a remote service")]
    Init {
        /// Directory to initialize (default: current directory)
        path: Option<String>,

        /// Remote service URL (ws:// or wss://)
        #[arg(long)]
        url: Option<String>,
    },

    /// Queue a remote write
    #[command(after_help = "\
Examples:
  marketsync enqueue create orders '{\"sku\":\"A1\",\"qty\":2}'
  marketsync enqueue update orders '{\"id\":\"O1\",\"status\":\"delivered\"}'
  marketsync enqueue delete carts '{\"id\":\"C9\"}'")]
    Enqueue {
        /// Action kind: create, update or delete
        kind: String,

        /// Remote table name
        #[arg(value_parser = non_empty_string)]
        target: String,

        /// JSON object; update and delete need an "id" field
        payload: String,

        #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// List queued actions in drain order
    Pending {
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Inspect actions dropped after too many failures
    #[command(subcommand)]
    DeadLetters(DeadLetterCommand),

    /// Show queue and sync state
    Status {
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Connect, drain the queue once and exit
    Sync {
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Run the sync agent in the foreground until interrupted
    Run,

    /// Manage the entity cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand)]
pub enum DeadLetterCommand {
    /// List dropped actions, oldest first
    List {
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
    /// Put a dropped action back at the end of the queue
    Requeue {
        /// Action ID
        id: String,
    },
    /// Delete all dropped actions
    Purge,
}

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Delete expired cache entries
    Purge,
}

#[cfg(test)]
#[path = "../cli_tests/mod.rs"]
mod tests;
