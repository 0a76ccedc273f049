//! # Game News MCP
//!
//! Collects official announcements, events and update notes for three games
//! and serves them as MCP tools over stdio.
//!
//! ## Sources
//!
//! - **Lordnine** and **Epic Seven**: STOVE community board JSON API
//! - **Lost Ark**: the official site, rendered in headless Chrome
//!
//! ## Usage
//!
//! ```sh
//! game_news_mcp                # MCP server on stdin/stdout
//! game_news_mcp call get_game_updates --game lost_ark --limit 5
//! ```
//!
//! ## Architecture
//!
//! 1. **Transport**: retrying HTTP client and a shared browser session
//! 2. **Scrapers**: one per game, normalizing upstream items into `NewsRecord`s
//! 3. **Dispatch**: six tool operations rendered as text responses
//! 4. **Server**: MCP tool router in front of the dispatcher
//!
//! Logs go to stderr; stdout carries the MCP protocol.

use anyhow::Result;
use clap::Parser;
use rmcp::ServiceExt;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dispatch;
mod error;
mod heuristics;
mod models;
mod scrapers;
mod server;
#[cfg(test)]
mod test_support;
mod transport;
mod utils;

use cli::{Cli, Command};
use dispatch::{Dispatcher, ToolArguments};
use scrapers::ScraperRegistry;
use server::GameNewsServer;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    let config = args.scraper_config();
    debug!(?config, "Parsed CLI arguments");

    let registry = Arc::new(ScraperRegistry::from_config(&config)?);
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry)));
    if args.warm_up {
        registry.open_all().await?;
    }
    info!(games = ?registry.games(), "scrapers ready");

    let outcome = match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(dispatcher).await.map(|()| ExitCode::SUCCESS),
        Command::Call {
            tool,
            game,
            url,
            limit,
        } => {
            let response = dispatcher
                .dispatch(&tool, &ToolArguments { game, url, limit })
                .await;
            println!("{}", response.text);
            Ok(if response.is_error {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    };

    // Browser processes outlive the runtime unless closed here.
    registry.close_all().await;

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), "shutdown complete");
    outcome
}

async fn serve(dispatcher: Arc<Dispatcher>) -> Result<()> {
    info!("starting MCP server on stdio");
    let server = GameNewsServer::new(dispatcher);
    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let service = server.serve(transport).await?;
    service.waiting().await?;
    info!("MCP client disconnected");
    Ok(())
}
