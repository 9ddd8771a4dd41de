//! Dialer CLI - Queue and inspect outbound calls
//!
//! Thin client over the Dialer HTTP API.

mod api;
mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use dialoguer::Password;

use api::{CallResponse, CreateCallRequest, DialerClient, UpdateCallRequest};
use config::Config;

#[derive(Parser)]
#[command(name = "dialer")]
#[command(about = "Dialer CLI - Queue and inspect outbound calls", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Login and store API key
    Login {
        /// API key (will prompt if not provided)
        #[arg(short, long)]
        key: Option<String>,
        /// Server URL (keeps the stored one if not provided)
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Call operations
    Call {
        #[command(subcommand)]
        action: CallAction,
    },

    /// Show call counts per status
    Metrics,

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum CallAction {
    /// Queue a new call
    Create {
        /// E.164 destination, e.g. +14155550123
        destination: String,
        /// Script to run on the call
        #[arg(short, long)]
        script: String,
        /// JSON object attached to the call
        #[arg(short, long)]
        metadata: Option<String>,
    },
    /// Show one call
    Get {
        /// Call ID
        id: String,
    },
    /// List calls, newest first
    List {
        /// Filter by status (pending, in_progress, completed, failed, expired)
        #[arg(short, long)]
        status: Option<String>,
        /// Page number (1-based)
        #[arg(short, long)]
        page: Option<i64>,
        /// Page size (max 100)
        #[arg(short, long)]
        limit: Option<i64>,
    },
    /// Edit a call that has not been dialed yet
    Update {
        /// Call ID
        id: String,
        /// New script
        #[arg(short, long)]
        script: Option<String>,
        /// New metadata (JSON object, replaces the old one)
        #[arg(short, long)]
        metadata: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Login { key, url } => cmd_login(key, url).await,
        Commands::Call { action } => cmd_call(action).await,
        Commands::Metrics => cmd_metrics().await,
        Commands::Config => cmd_config(),
    }
}

// ============================================
// Command Implementations
// ============================================

async fn cmd_login(key: Option<String>, url: Option<String>) -> Result<()> {
    let mut config = Config::load()?;

    if let Some(url) = url {
        config.base_url = url.trim_end_matches('/').to_string();
    }

    let api_key = match key {
        Some(k) => k,
        None => Password::new()
            .with_prompt("API Key")
            .interact()
            .context("Failed to read API key")?,
    };

    // Test connection
    let client = DialerClient::new(&config.base_url, &api_key);
    print!("Testing connection... ");

    match client.health().await {
        Ok(true) => {
            println!("{}", "OK".green());
        }
        _ => {
            println!("{}", "Failed".red());
            bail!("Could not reach Dialer API at {}", config.base_url);
        }
    }

    if let Err(e) = client.verify_key().await {
        bail!("API key rejected: {}", e);
    }

    config.api_key = Some(api_key);
    config.save()?;

    println!("{} API key saved to {:?}", "✓".green(), Config::config_path()?);

    Ok(())
}

async fn cmd_call(action: CallAction) -> Result<()> {
    let config = Config::load()?;
    let client = DialerClient::new(&config.base_url, config.require_api_key()?);

    match action {
        CallAction::Create {
            destination,
            script,
            metadata,
        } => {
            let request = CreateCallRequest {
                destination,
                script_id: script,
                metadata: parse_metadata(metadata.as_deref())?,
            };
            let call = client.create_call(&request).await?;

            println!(
                "{} Call queued for {}",
                "✓".green(),
                call.destination.cyan()
            );
            print_call(&call);
        }

        CallAction::Get { id } => {
            let call = client.get_call(&id).await?;
            print_call(&call);
        }

        CallAction::List {
            status,
            page,
            limit,
        } => {
            let page = client
                .list_calls(status.as_deref(), page, limit)
                .await?;

            if page.items.is_empty() {
                println!("No calls found.");
                return Ok(());
            }

            println!(
                "{} (page {}/{}, {} per page, {} total)",
                "Calls:".bold(),
                page.page,
                page.total_pages.max(1),
                page.limit,
                page.total
            );
            for call in &page.items {
                println!(
                    "  {} {} {} {} {}",
                    call.id.to_string().dimmed(),
                    status_badge(&call.status),
                    call.destination.cyan(),
                    call.script_id,
                    call.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
                );
            }
            if page.page < page.total_pages {
                println!(
                    "\n{}",
                    format!("Next page: dialer call list --page {}", page.page + 1).dimmed()
                );
            }
        }

        CallAction::Update {
            id,
            script,
            metadata,
        } => {
            if script.is_none() && metadata.is_none() {
                bail!("Nothing to update: pass --script and/or --metadata");
            }
            let request = UpdateCallRequest {
                script_id: script,
                metadata: parse_metadata(metadata.as_deref())?,
            };
            let call = client.update_call(&id, &request).await?;

            println!("{} Call updated", "✓".green());
            print_call(&call);
        }
    }

    Ok(())
}

async fn cmd_metrics() -> Result<()> {
    let config = Config::load()?;
    let client = DialerClient::new(&config.base_url, config.require_api_key()?);

    let metrics = client.metrics().await?;

    println!("{}", "Calls by status:".bold());
    println!("  {:<12} {}", "PENDING", metrics.pending.to_string().yellow());
    println!("  {:<12} {}", "IN_PROGRESS", metrics.in_progress.to_string().blue());
    println!("  {:<12} {}", "COMPLETED", metrics.completed.to_string().green());
    println!("  {:<12} {}", "FAILED", metrics.failed.to_string().red());
    println!("  {:<12} {}", "EXPIRED", metrics.expired.to_string().dimmed());
    println!("  {:<12} {}", "TOTAL", metrics.total.to_string().bold());

    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = Config::load()?;

    println!("{}", "Configuration:".bold());
    println!("  Path: {:?}", Config::config_path()?);
    println!("  Base URL: {}", config.base_url);
    println!(
        "  API Key: {}",
        if config.api_key.is_some() {
            "Set".green()
        } else {
            "Not set".red()
        }
    );

    Ok(())
}

// ============================================
// Helpers
// ============================================

fn parse_metadata(raw: Option<&str>) -> Result<Option<serde_json::Value>> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let value: serde_json::Value =
        serde_json::from_str(raw).context("--metadata must be valid JSON")?;
    if !value.is_object() {
        bail!("--metadata must be a JSON object");
    }
    Ok(Some(value))
}

fn status_badge(status: &str) -> ColoredString {
    let badge = format!("[{}]", status);
    match status {
        "PENDING" => badge.yellow(),
        "IN_PROGRESS" => badge.blue(),
        "COMPLETED" => badge.green(),
        "FAILED" => badge.red(),
        _ => badge.dimmed(),
    }
}

fn print_call(call: &CallResponse) {
    println!("  {} {}", "ID:".dimmed(), call.id);
    println!("  {} {}", "Status:".dimmed(), status_badge(&call.status));
    println!("  {} {}", "Destination:".dimmed(), call.destination);
    println!("  {} {}", "Script:".dimmed(), call.script_id);
    println!("  {} {}", "Attempts:".dimmed(), call.attempts);

    if call.metadata.as_object().is_some_and(|m| !m.is_empty()) {
        println!("  {} {}", "Metadata:".dimmed(), call.metadata);
    }
    if let Some(external_id) = &call.external_correlation_id {
        println!("  {} {}", "Provider ID:".dimmed(), external_id);
    }
    if let Some(next) = call.next_attempt_at {
        println!("  {} {}", "Next attempt:".dimmed(), next);
    }
    if let Some(error) = &call.last_error {
        println!("  {} {}", "Last error:".dimmed(), error.red());
    }
    println!("  {} {}", "Created:".dimmed(), call.created_at);
    if let Some(started) = call.started_at {
        println!("  {} {}", "Started:".dimmed(), started);
    }
    if let Some(ended) = call.ended_at {
        let duration = call
            .duration_sec
            .map(|d| format!(" ({d}s)"))
            .unwrap_or_default();
        println!("  {} {}{}", "Ended:".dimmed(), ended, duration);
    }
}
