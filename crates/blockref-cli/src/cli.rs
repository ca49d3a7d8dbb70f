use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::filter::LevelFilter;

/// Log level options for the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "blockref")]
#[command(about = "Index and render ((uuid)) block references in a markdown vault")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level; falls back to the config file value
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Shortcut for --log-level=debug
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (defaults to ~/.config/blockref/config.toml)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Vault root (overrides the config file)
    #[arg(long, global = true)]
    pub vault: Option<PathBuf>,

    #[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rebuild the index from every file in the vault
    Rebuild,

    /// Show one block by id
    Get { id: String },

    /// Find blocks whose content contains the query (case-insensitive)
    Search { query: String },

    /// Complete an open `((` at the end of the given line prefix
    Suggest { prefix: String },

    /// Render the block references of a file and print the result
    Preview {
        /// Vault-relative or absolute path
        file: PathBuf,
    },

    /// Copy a reference to the bullet on a line, adding an id when needed
    #[command(name = "ref")]
    Reference {
        file: PathBuf,
        /// 1-based line number of the bullet
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        line: u64,
    },

    /// Keep the index current until interrupted
    Watch,

    /// Index statistics
    Stats,

    /// Print the effective configuration
    Config,
}
