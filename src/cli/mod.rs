//! Command-line interface for leadrelay.
//!
//! Provides commands for serving the intake endpoint, pushing a single
//! payload through the pipeline, inspecting log channels and showing the
//! resolved configuration.

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::config::ResolvedConfig;
use crate::core::{IntakeCoordinator, LogChannel, LogWriter, PipelineContext};
use crate::domain::TransportHints;

/// leadrelay - Durable lead intake relay
#[derive(Parser, Debug)]
#[command(name = "leadrelay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP intake server
    Serve {
        /// Address to bind to (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Push one JSON payload through the pipeline
    Submit {
        /// Payload file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Client address to record for the submission
        #[arg(long)]
        client_ip: Option<String>,
    },

    /// Show recent entries of a log channel
    Logs {
        /// Channel: submissions, whatsapp, sheets, replicator
        channel: String,

        /// Maximum number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = ResolvedConfig::load()?;

        match self.command {
            Commands::Serve { bind } => {
                let bind = bind.unwrap_or_else(|| config.bind.clone());
                let coordinator = IntakeCoordinator::new(PipelineContext::from_config(&config));
                crate::server::serve(&bind, coordinator).await
            }
            Commands::Submit { input, client_ip } => submit(&config, input, client_ip).await,
            Commands::Logs { channel, limit } => show_logs(&config, &channel, limit).await,
            Commands::Config => {
                show_config(&config);
                Ok(())
            }
        }
    }
}

/// Run one payload and wait for its replication to finish
async fn submit(config: &ResolvedConfig, input: Option<PathBuf>, client_ip: Option<String>) -> Result<()> {
    let content = match input {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            buffer
        }
    };

    let raw: Value = serde_json::from_str(&content).context("Payload is not valid JSON")?;
    let hints = TransportHints {
        forwarded_for: client_ip,
        ..Default::default()
    };

    let coordinator = IntakeCoordinator::new(PipelineContext::from_config(config));
    let accepted = coordinator.handle(raw, &hints).await?;

    println!("{}", serde_json::to_string(&accepted.ack)?);
    println!("Submission: {} ({})", accepted.submission_id, accepted.source);

    if let Some(task) = accepted.replication {
        println!("Waiting for partner form replication...");
        let outcome = task.await.context("Replication task panicked")?;
        println!("Replication: {:?} ({})", outcome.status, outcome.detail);
    }

    Ok(())
}

async fn show_logs(config: &ResolvedConfig, channel: &str, limit: usize) -> Result<()> {
    let channel = LogChannel::from_name(channel).with_context(|| {
        format!(
            "Unknown log channel '{}'. Expected one of: submissions, whatsapp, sheets, replicator",
            channel
        )
    })?;

    let writer = LogWriter::new(&config.log_dir);
    let records = writer.read(channel).await?;

    if records.is_empty() {
        println!("No entries in {}", writer.channel_path(channel).display());
        return Ok(());
    }

    let skip = records.len().saturating_sub(limit);
    for record in records.iter().skip(skip) {
        println!("{}", serde_json::to_string(record)?);
    }

    println!("\nShowing {} of {} entries", records.len() - skip, records.len());
    Ok(())
}

fn show_config(config: &ResolvedConfig) {
    let or_unset = |v: Option<&str>| v.unwrap_or("(not set)").to_string();

    println!("Configuration");
    println!("=============\n");
    println!(
        "Config file:     {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!("Home:            {}", config.home.display());
    println!("Log dir:         {}", config.log_dir.display());
    println!("Bind:            {}", config.bind);
    println!();
    println!("Sheets endpoint: {}", or_unset(config.sheets.endpoint.as_deref()));
    println!("Sheets timeout:  {:?}", config.sheets.timeout);
    println!();
    println!("Partner form:    {}", or_unset(config.partner.form_url.as_deref()));
    println!("Affiliate id:    {}", or_unset(Some(config.partner.affiliate_id.as_str()).filter(|s| !s.is_empty())));
    println!("Destination:     {}", config.partner.destination);
    println!("Navigation:      {:?}", config.partner.navigation_timeout);
    println!("Success wait:    {:?}", config.partner.success_wait);
    println!("Max sessions:    {}", config.partner.max_sessions);
    println!("Headless:        {}", config.partner.headless);
}
