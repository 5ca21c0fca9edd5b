// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ms-remote: reference table service for the marketsync engine.
//!
//! Keeps tables in memory and answers the sync protocol over WebSocket.
//! Useful for local development and for exercising retry and reconnect
//! behavior against a real socket.

mod server;
mod state;

use std::net::SocketAddr;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use state::{ServerOptions, ServerState};

/// ms-remote: in-memory remote table service
#[derive(Parser, Debug)]
#[command(name = "ms-remote")]
#[command(about = "In-memory remote table service speaking the marketsync protocol")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "127.0.0.1:7890")]
    bind: SocketAddr,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Refuse every write to this table (repeatable)
    #[arg(long = "reject-table", value_name = "TABLE")]
    reject_tables: Vec<String>,

    /// Refuse channel subscriptions that carry no session token
    #[arg(long)]
    require_token: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting ms-remote server");
    info!("  Bind address: {}", args.bind);
    if !args.reject_tables.is_empty() {
        info!("  Rejecting writes to: {}", args.reject_tables.join(", "));
    }
    if args.require_token {
        info!("  Channel requires a session token");
    }

    let state = ServerState::new(ServerOptions {
        reject_tables: args.reject_tables.into_iter().collect(),
        require_token: args.require_token,
    });

    server::run(args.bind, state).await?;

    Ok(())
}
