use crate::config::toml_config::{TextExtractorKind, TomlConfig};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::Path;

#[derive(Debug, Clone, Parser)]
#[command(name = "price-monitor")]
#[command(about = "Extracts SMS supplier prices from emails and reports daily changes")]
pub struct CliConfig {
    /// Path to TOML configuration file (defaults apply when it does not exist)
    #[arg(short, long, default_value = "price-monitor.toml", global = true)]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Override monitoring setting from config
    #[arg(long, global = true)]
    pub monitor: Option<bool>,

    /// Show which emails would be processed without writing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Run date used in artefact names (YYYY-MM-DD), defaults to today
    #[arg(long, global = true)]
    pub date: Option<NaiveDate>,

    /// Override extract.max_messages (0 = all)
    #[arg(long, global = true)]
    pub max_messages: Option<usize>,

    /// Override extract.text_extractor
    #[arg(long, value_enum, global = true)]
    pub text_extractor: Option<TextExtractorKind>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Copy supplier emails into the daily inbox
    Fetch,
    /// Extract and normalize prices from the inbox
    Extract,
    /// Compare today's extraction with the previous snapshot
    Diff,
    /// Render the HTML summary for today's diff
    Summary,
    /// Fetch, extract, diff and summarize in one go
    Run,
}

impl CliConfig {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }

    /// Loads the TOML file (if present) and applies command line overrides.
    pub fn load_config(&self) -> crate::Result<TomlConfig> {
        let mut config = if Path::new(&self.config).exists() {
            TomlConfig::from_file(&self.config)?
        } else {
            tracing::warn!("⚠️  Config file {} not found, using defaults", self.config);
            TomlConfig::default()
        };

        if let Some(max) = self.max_messages {
            config.extract.max_messages = max;
            tracing::info!("🔧 max_messages overridden to: {}", max);
        }
        if let Some(kind) = self.text_extractor {
            config.extract.text_extractor = kind;
            tracing::info!("🔧 text_extractor overridden to: {:?}", kind);
        }
        if let Some(monitor) = self.monitor {
            config.monitoring.enabled = monitor;
        }

        Ok(config)
    }
}
