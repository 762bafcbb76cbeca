//! CLI interface and argument parsing

pub mod commands;

use clap::{Parser, Subcommand};

/// Tradex - combinatorial trade-record export tool
#[derive(Parser, Debug)]
#[command(name = "tradex")]
#[command(version, about, long_about = None)]
#[command(author = "Tradex Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "tradex.toml", env = "TRADEX_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "TRADEX_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export one spreadsheet per filter combination
    Export(commands::export::ExportArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
